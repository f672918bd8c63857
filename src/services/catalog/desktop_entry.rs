use crate::dock_error;
use crate::error::Result;
use crate::events::ApplicationDescriptor;
use crate::utils::SessionInfo;

/// Поля секции `[Desktop Entry]`, которые нужны доку
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DesktopEntry {
    pub entry_type: Option<String>,
    pub name: Option<String>,
    pub exec: Option<String>,
    pub icon: Option<String>,
    pub startup_wm_class: Option<String>,
    pub hidden: bool,
    pub only_show_in: Option<String>,
    pub not_show_in: Option<String>,
}

/// Разбирает только основную секцию; остальные секции (`[Desktop Action ...]`) игнорируются.
pub fn parse_desktop_entry(content: &str) -> Result<DesktopEntry> {
    let mut entry = DesktopEntry::default();
    let mut in_main = false;
    let mut seen_main = false;

    for line in content.lines().map(str::trim) {
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if line.starts_with('[') {
            if seen_main && in_main {
                // Основная секция закончилась
                break;
            }
            in_main = line == "[Desktop Entry]";
            seen_main |= in_main;
            continue;
        }

        if !in_main {
            continue;
        }

        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim();
        // Локализованные ключи (`Name[de]`) не нужны
        if key.contains('[') {
            continue;
        }
        let value = unescape(value.trim());

        match key {
            "Type" => entry.entry_type = Some(value),
            "Name" => entry.name = Some(value),
            "Exec" => entry.exec = Some(value),
            "Icon" => entry.icon = Some(value),
            "StartupWMClass" => entry.startup_wm_class = Some(value),
            "Hidden" => entry.hidden = value.eq_ignore_ascii_case("true"),
            "OnlyShowIn" => entry.only_show_in = Some(value),
            "NotShowIn" => entry.not_show_in = Some(value),
            _ => {}
        }
    }

    if !seen_main {
        return Err(dock_error!(parse, "нет секции [Desktop Entry]"));
    }

    Ok(entry)
}

fn unescape(value: &str) -> String {
    let mut result = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            result.push(c);
            continue;
        }
        match chars.next() {
            Some('s') => result.push(' '),
            Some('n') => result.push('\n'),
            Some('t') => result.push('\t'),
            Some('r') => result.push('\r'),
            Some(other) => result.push(other),
            None => result.push('\\'),
        }
    }
    result
}

impl DesktopEntry {
    /// Правила видимости:
    /// - `Hidden=true` исключает запись;
    /// - `NotShowIn` с текущей средой исключает запись;
    /// - `OnlyShowIn` исключает запись, только если текущая среда известна и не входит в список.
    pub fn is_visible(&self, session: &SessionInfo) -> bool {
        if self.hidden {
            return false;
        }

        if let Some(type_) = &self.entry_type {
            if type_ != "Application" {
                return false;
            }
        }

        if let Some(not_show_in) = &self.not_show_in {
            if session.desktop_in(not_show_in) {
                return false;
            }
        }

        if let Some(only_show_in) = &self.only_show_in {
            if session.desktop_known() && !session.desktop_in(only_show_in) {
                return false;
            }
        }

        true
    }

    /// Записи без имени или Exec отбрасываются
    pub fn into_descriptor(self) -> Option<ApplicationDescriptor> {
        let name = self.name.filter(|n| !n.trim().is_empty())?;
        let exec = self.exec.filter(|e| !e.trim().is_empty())?;

        let mut app = ApplicationDescriptor::new(name.trim()).with_command(exec);
        if app.launch_command.is_none() {
            return None;
        }

        if let Some(icon) = self.icon {
            app = app.with_icon_hint(icon);
        }
        if let Some(class) = self.startup_wm_class {
            app = app.with_startup_wm_class(class);
        }
        Some(app)
    }
}
