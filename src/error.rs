use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DockError {
    #[error("Ошибка конфигурации: {0}")]
    Config(#[from] anyhow::Error),

    #[error("Ошибка ввода-вывода: {0}")]
    Io(#[from] std::io::Error),

    /// Внешняя утилита отсутствует или завершилась с ненулевым кодом
    #[error("Утилита {tool} недоступна: {reason}")]
    ToolUnavailable { tool: String, reason: String },

    #[error("Утилита {tool} не ответила за {timeout_ms} мс")]
    ToolTimeout { tool: String, timeout_ms: u64 },

    /// Строка вывода утилиты не соответствует ожидаемому формату
    #[error("Неожиданный формат вывода: {0}")]
    ParseAnomaly(String),

    #[error("Нет доступа к {path:?}: {source}")]
    FileAccess {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Внутренняя ошибка: {0}")]
    Internal(String),
}

impl DockError {
    pub fn tool_unavailable<T>(tool: impl Into<String>, reason: impl Into<String>) -> Result<T> {
        Err(DockError::ToolUnavailable {
            tool: tool.into(),
            reason: reason.into(),
        })
    }

    /// Ошибки, после которых имеет смысл попробовать запасную утилиту
    pub fn is_tool_failure(&self) -> bool {
        matches!(
            self,
            DockError::ToolUnavailable { .. } | DockError::ToolTimeout { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, DockError>;

// Удобные макросы для создания ошибок
#[macro_export]
macro_rules! dock_error {
    (parse, $($arg:tt)*) => {
        $crate::error::DockError::ParseAnomaly(format!($($arg)*))
    };
    (internal, $($arg:tt)*) => {
        $crate::error::DockError::Internal(format!($($arg)*))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_failure_classification() {
        let unavailable = DockError::tool_unavailable::<()>("wmctrl", "not found").unwrap_err();
        assert!(unavailable.is_tool_failure());

        let timeout = DockError::ToolTimeout {
            tool: "xprop".to_string(),
            timeout_ms: 1500,
        };
        assert!(timeout.is_tool_failure());

        let parse = dock_error!(parse, "строка {}", 3);
        assert!(!parse.is_tool_failure());
        assert!(parse.to_string().contains("строка 3"));
    }
}
