use crate::debug_if_enabled;
use crate::dock_error;
use crate::error::Result;
use crate::events::{WindowId, WindowRecord};
use crate::services::ToolRunner;
use std::sync::Arc;

/// Основной источник окон: `wmctrl -lx`, при его отказе `wmctrl -l`
pub struct WmctrlDetector {
    runner: Arc<dyn ToolRunner>,
}

impl WmctrlDetector {
    pub fn new(runner: Arc<dyn ToolRunner>) -> Self {
        Self { runner }
    }

    /// `wmctrl -lx`: id, рабочий стол, instance.Class, хост, заголовок
    pub async fn list_extended(&self) -> Result<Vec<WindowRecord>> {
        let stdout = self.runner.run("wmctrl", &["-lx"]).await?;
        Ok(parse_listing(&stdout, parse_extended_line))
    }

    /// `wmctrl -l`: id, рабочий стол, хост, заголовок
    pub async fn list_basic(&self) -> Result<Vec<WindowRecord>> {
        let stdout = self.runner.run("wmctrl", &["-l"]).await?;
        Ok(parse_listing(&stdout, parse_basic_line))
    }

    pub async fn activate(&self, window_id: &WindowId) -> Result<()> {
        self.runner
            .run("wmctrl", &["-i", "-a", window_id.as_str()])
            .await
            .map(|_| ())
    }

    pub async fn close(&self, window_id: &WindowId) -> Result<()> {
        self.runner
            .run("wmctrl", &["-i", "-c", window_id.as_str()])
            .await
            .map(|_| ())
    }
}

/// Разбор построчного вывода: битая строка пропускается, остальные сохраняются
pub fn parse_listing(stdout: &str, parse_line: fn(&str) -> Result<WindowRecord>) -> Vec<WindowRecord> {
    stdout
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| match parse_line(line) {
            Ok(record) => Some(record),
            Err(e) => {
                debug_if_enabled!("Пропускаем строку wmctrl '{}': {}", line, e);
                None
            }
        })
        .collect()
}

pub fn parse_extended_line(line: &str) -> Result<WindowRecord> {
    let (fields, title) = split_fields(line, 4);
    let window_id = parse_id(&fields, line)?;
    let workspace = parse_workspace(&fields, line)?;

    let (instance, class) = fields
        .get(2)
        .map(|field| split_wm_class(field))
        .unwrap_or((None, None));

    let title = fallback_title(title, class.as_deref().or(instance.as_deref()), &window_id);

    let mut record = WindowRecord::new(window_id, title).with_workspace(workspace);
    if let Some(class) = class {
        record = record.with_class(class);
    }
    if let Some(instance) = instance {
        record = record.with_instance(instance);
    }
    Ok(record)
}

pub fn parse_basic_line(line: &str) -> Result<WindowRecord> {
    let (fields, title) = split_fields(line, 3);
    let window_id = parse_id(&fields, line)?;
    let workspace = parse_workspace(&fields, line)?;
    let title = fallback_title(title, None, &window_id);

    Ok(WindowRecord::new(window_id, title).with_workspace(workspace))
}

fn parse_id(fields: &[&str], line: &str) -> Result<WindowId> {
    let raw = fields
        .first()
        .ok_or_else(|| dock_error!(parse, "пустая строка: '{}'", line))?;

    if !raw.starts_with("0x") && !raw.starts_with("0X") {
        return Err(dock_error!(parse, "ожидался hex id окна: '{}'", line));
    }

    WindowId::parse(raw).ok_or_else(|| dock_error!(parse, "нет id окна: '{}'", line))
}

fn parse_workspace(fields: &[&str], line: &str) -> Result<i32> {
    match fields.get(1) {
        Some(raw) => raw
            .parse::<i32>()
            .map_err(|_| dock_error!(parse, "неверный номер рабочего стола в '{}'", line)),
        None => Ok(0),
    }
}

fn fallback_title(title: &str, class: Option<&str>, window_id: &WindowId) -> String {
    if !title.is_empty() {
        title.to_string()
    } else if let Some(class) = class {
        class.to_string()
    } else {
        window_id.to_string()
    }
}

/// Отделяет `count` полей по пробелам и возвращает остаток строки как есть
/// (заголовок может содержать несколько пробелов подряд).
fn split_fields(line: &str, count: usize) -> (Vec<&str>, &str) {
    let mut fields = Vec::with_capacity(count);
    let mut rest = line.trim_start();

    while fields.len() < count && !rest.is_empty() {
        let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
        fields.push(&rest[..end]);
        rest = rest[end..].trim_start();
    }

    (fields, rest.trim_end())
}

/// Делит поле WM_CLASS из `wmctrl -lx` на instance и class.
///
/// Обе части могут содержать точки (`org.gnome.Nautilus.Org.gnome.Nautilus`),
/// поэтому сначала проверяем, не состоит ли поле из двух одинаковых половин.
/// Иначе делим по последней точке: точки чаще бывают в instance, чем в class.
pub fn split_wm_class(field: &str) -> (Option<String>, Option<String>) {
    let field = field.trim();
    if field.is_empty() || field.eq_ignore_ascii_case("n/a") {
        return (None, None);
    }

    let parts: Vec<&str> = field.split('.').collect();
    if parts.len() >= 2 && parts.len() % 2 == 0 {
        let half = parts.len() / 2;
        let instance = parts[..half].join(".");
        let class = parts[half..].join(".");
        if instance.eq_ignore_ascii_case(&class) {
            return (Some(instance), Some(class));
        }
    }

    match field.rsplit_once('.') {
        Some((instance, class)) => (
            Some(instance.to_string()).filter(|s| !s.is_empty()),
            Some(class.to_string()).filter(|s| !s.is_empty()),
        ),
        None => (None, Some(field.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_extended_line() {
        let record =
            parse_extended_line("0x03a00003  0 Navigator.firefox  laptop GitHub  —  Mozilla Firefox")
                .unwrap();

        assert_eq!(record.window_id, WindowId::parse("0x3a00003").unwrap());
        assert_eq!(record.workspace_index, 0);
        assert_eq!(record.window_instance.as_deref(), Some("Navigator"));
        assert_eq!(record.window_class.as_deref(), Some("firefox"));
        assert_eq!(record.title, "GitHub  —  Mozilla Firefox");
    }

    #[test]
    fn test_parse_extended_line_without_title_uses_class() {
        let record = parse_extended_line("0x01e00007 -1 xfce4-terminal.Xfce4-terminal  host").unwrap();
        assert_eq!(record.workspace_index, -1);
        assert_eq!(record.title, "Xfce4-terminal");

        let record = parse_extended_line("0x01e00008  2").unwrap();
        assert_eq!(record.window_class, None);
        assert_eq!(record.title, "0x01e00008");
    }

    #[test]
    fn test_parse_basic_line() {
        let record = parse_basic_line("0x04400006  1 N/A Downloads - Files").unwrap();
        assert_eq!(record.workspace_index, 1);
        assert_eq!(record.window_class, None);
        assert_eq!(record.title, "Downloads - Files");
    }

    #[test]
    fn test_malformed_lines_are_skipped() {
        let stdout = "garbage line\n\
                      0x00c00001  0 code.Code  host main.rs - Visual Studio Code\n\
                      0x00c00002  x code.Code  host broken workspace\n\
                      \n\
                      0x00c00003  0 code.Code  host lib.rs - Visual Studio Code\n";

        let records = parse_listing(stdout, parse_extended_line);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].title, "main.rs - Visual Studio Code");
        assert_eq!(records[1].title, "lib.rs - Visual Studio Code");
    }

    #[test]
    fn test_split_wm_class() {
        assert_eq!(
            split_wm_class("org.gnome.Nautilus.Org.gnome.Nautilus"),
            (Some("org.gnome.Nautilus".to_string()), Some("Org.gnome.Nautilus".to_string()))
        );
        assert_eq!(
            split_wm_class("crx_abc.Google-chrome"),
            (Some("crx_abc".to_string()), Some("Google-chrome".to_string()))
        );
        assert_eq!(
            split_wm_class("org.foo.app.App"),
            (Some("org.foo.app".to_string()), Some("App".to_string()))
        );
        assert_eq!(split_wm_class("Steam"), (None, Some("Steam".to_string())));
        assert_eq!(split_wm_class("N/A"), (None, None));
    }
}
