use crate::error::Result;
use crate::events::WindowId;
use crate::services::ToolRunner;
use std::sync::Arc;
use tracing::debug;

pub struct XpropDetector {
    runner: Arc<dyn ToolRunner>,
}

impl XpropDetector {
    pub fn new(runner: Arc<dyn ToolRunner>) -> Self {
        Self { runner }
    }

    /// Текстовое свойство окна (`_NET_WM_NAME`, `WM_NAME`); `None`, если свойства нет
    pub async fn text_property(&self, window_id: &WindowId, property: &str) -> Result<Option<String>> {
        let stdout = self
            .runner
            .run("xprop", &["-id", window_id.as_str(), property])
            .await?;
        Ok(parse_text_property(&stdout))
    }

    pub async fn wm_class(&self, window_id: &WindowId) -> Result<(Option<String>, Option<String>)> {
        let stdout = self
            .runner
            .run("xprop", &["-id", window_id.as_str(), "WM_CLASS"])
            .await?;
        Ok(parse_wm_class(&stdout))
    }

    pub async fn active_window(&self) -> Result<Option<WindowId>> {
        let stdout = self
            .runner
            .run("xprop", &["-root", "_NET_ACTIVE_WINDOW"])
            .await?;
        let active = parse_active_window(&stdout);
        debug!("xprop: активное окно {:?}", active);
        Ok(active)
    }
}

/// `_NET_WM_NAME(UTF8_STRING) = "Title"` -> `Title`.
/// `_NET_WM_NAME:  not found.` и пустые значения дают `None`.
pub fn parse_text_property(stdout: &str) -> Option<String> {
    let line = stdout.lines().next()?;
    let (_, value) = line.split_once('=')?;
    let value = value.trim();

    let text = match quoted_strings(value).into_iter().next() {
        Some(text) => text,
        None => value.to_string(),
    };

    let text = text.trim().to_string();
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

/// `WM_CLASS(STRING) = "navigator", "Firefox"` -> (instance, class)
pub fn parse_wm_class(stdout: &str) -> (Option<String>, Option<String>) {
    let Some((_, value)) = stdout.lines().next().and_then(|line| line.split_once('=')) else {
        return (None, None);
    };

    let mut strings = quoted_strings(value)
        .into_iter()
        .map(|s| Some(s).filter(|s| !s.is_empty()));
    let instance = strings.next().flatten();
    let class = strings.next().flatten();
    (instance, class)
}

/// `_NET_ACTIVE_WINDOW(WINDOW): window id # 0x3a00003`; `0x0` означает отсутствие фокуса
pub fn parse_active_window(stdout: &str) -> Option<WindowId> {
    let raw = stdout.split('#').nth(1)?.split([',', ' ']).find(|t| !t.is_empty())?;
    let id = WindowId::parse(raw)?;
    match id.as_u64() {
        Some(0) => None,
        _ => Some(id),
    }
}

/// Извлекает строки в двойных кавычках с учётом экранирования `\"` и `\\`
fn quoted_strings(value: &str) -> Vec<String> {
    let mut result = Vec::new();
    let mut chars = value.chars();

    while let Some(c) = chars.next() {
        if c != '"' {
            continue;
        }

        let mut current = String::new();
        while let Some(c) = chars.next() {
            match c {
                '\\' => {
                    if let Some(escaped) = chars.next() {
                        current.push(escaped);
                    }
                }
                '"' => break,
                other => current.push(other),
            }
        }
        result.push(current);
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_text_property() {
        assert_eq!(
            parse_text_property("_NET_WM_NAME(UTF8_STRING) = \"Документ — LibreOffice Writer\"\n").as_deref(),
            Some("Документ — LibreOffice Writer")
        );
        assert_eq!(
            parse_text_property("WM_NAME(STRING) = \"say \\\"hi\\\"\"").as_deref(),
            Some("say \"hi\"")
        );
        assert_eq!(parse_text_property("_NET_WM_NAME:  not found."), None);
        assert_eq!(parse_text_property("WM_NAME(STRING) = \"\""), None);
        assert_eq!(parse_text_property(""), None);
    }

    #[test]
    fn test_parse_wm_class() {
        assert_eq!(
            parse_wm_class("WM_CLASS(STRING) = \"navigator\", \"Firefox\"\n"),
            (Some("navigator".to_string()), Some("Firefox".to_string()))
        );
        assert_eq!(parse_wm_class("WM_CLASS:  not found."), (None, None));
    }

    #[test]
    fn test_parse_active_window() {
        assert_eq!(
            parse_active_window("_NET_ACTIVE_WINDOW(WINDOW): window id # 0x3a00003\n"),
            WindowId::parse("0x03a00003")
        );
        assert_eq!(parse_active_window("_NET_ACTIVE_WINDOW(WINDOW): window id # 0x0"), None);
        assert_eq!(parse_active_window("_NET_ACTIVE_WINDOW:  not found."), None);
    }
}
