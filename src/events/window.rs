use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use super::ApplicationDescriptor;

/// Нормализованный идентификатор окна.
///
/// Числовые идентификаторы (X11 window id) приводятся к виду `0x%08x`, поэтому
/// `0x3A00003` из wmctrl и `60817411` из xdotool дают один и тот же ключ.
/// Нечисловые идентификаторы сохраняются в нижнем регистре как непрозрачная строка.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WindowId(String);

impl WindowId {
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }

        let numeric = if let Some(hex) = raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
            u64::from_str_radix(hex, 16).ok()
        } else if raw.bytes().all(|b| b.is_ascii_digit()) {
            raw.parse::<u64>().ok()
        } else {
            None
        };

        Some(match numeric {
            Some(value) => Self(format!("0x{:08x}", value)),
            None => Self(raw.to_lowercase()),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_u64(&self) -> Option<u64> {
        self.0
            .strip_prefix("0x")
            .and_then(|hex| u64::from_str_radix(hex, 16).ok())
    }

    /// Десятичная форма для утилит, которые не принимают hex (xdotool)
    pub fn to_decimal(&self) -> String {
        match self.as_u64() {
            Some(value) => value.to_string(),
            None => self.0.clone(),
        }
    }
}

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Снимок одного открытого окна за один цикл опроса
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WindowRecord {
    pub window_id: WindowId,
    pub title: String,
    pub window_class: Option<String>,
    pub window_instance: Option<String>,
    /// -1 для окон, закреплённых на всех рабочих столах
    pub workspace_index: i32,
    pub is_focused: bool,
}

impl WindowRecord {
    pub fn new(window_id: WindowId, title: impl Into<String>) -> Self {
        Self {
            window_id,
            title: title.into(),
            window_class: None,
            window_instance: None,
            workspace_index: 0,
            is_focused: false,
        }
    }

    pub fn with_class(mut self, class: impl Into<String>) -> Self {
        self.window_class = non_empty(class.into());
        self
    }

    pub fn with_instance(mut self, instance: impl Into<String>) -> Self {
        self.window_instance = non_empty(instance.into());
        self
    }

    pub fn with_workspace(mut self, workspace_index: i32) -> Self {
        self.workspace_index = workspace_index;
        self
    }

    pub fn with_focus(mut self, is_focused: bool) -> Self {
        self.is_focused = is_focused;
        self
    }

    pub fn snapshot_key(&self) -> SnapshotKey {
        SnapshotKey {
            window_id: self.window_id.clone(),
            is_focused: self.is_focused,
            title: self.title.clone(),
        }
    }
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("n/a") {
        None
    } else {
        Some(trimmed.to_string())
    }
}

impl fmt::Display for WindowRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.window_class {
            Some(class) => write!(f, "{} \"{}\" ({})", self.window_id, self.title, class),
            None => write!(f, "{} \"{}\"", self.window_id, self.title),
        }
    }
}

/// Ключ сравнения снимков: публикуем только при изменении множества этих ключей
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SnapshotKey {
    pub window_id: WindowId,
    pub is_focused: bool,
    pub title: String,
}

/// Каким правилом окно было связано с приложением
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MatchStrategy {
    StartupWmClass,
    ClassExact,
    InstanceExactWithClass,
    ClassContains,
    InstanceContains,
    ClassInName,
    TitleExact,
    TitleWithoutSuffix,
    TitleContainsName,
    TitleFirstToken,
    TitleLastSegment,
    InstanceExact,
}

/// Результат сопоставления окна с приложением
#[derive(Debug, Clone, PartialEq)]
pub struct MatchResult {
    pub window: WindowRecord,
    /// `None` для неизвестных окон: они всё равно показываются с общей иконкой
    pub application: Option<Arc<ApplicationDescriptor>>,
    pub resolved_icon_path: Option<PathBuf>,
    pub is_svg: bool,
    pub strategy: Option<MatchStrategy>,
}

impl MatchResult {
    pub fn unmatched(window: WindowRecord) -> Self {
        Self {
            window,
            application: None,
            resolved_icon_path: None,
            is_svg: false,
            strategy: None,
        }
    }

    pub fn application_name(&self) -> Option<&str> {
        self.application.as_deref().map(|app| app.name.as_str())
    }
}

impl fmt::Display for MatchResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.application_name() {
            Some(name) => write!(f, "{} -> {}", self.window, name),
            None => write!(f, "{} -> ?", self.window),
        }
    }
}
