use crate::services::ToolRunner;
use std::path::Path;
use tracing::{debug, info};

/// Определяет активную тему иконок: gsettings, затем GTK3 settings.ini, затем kdeglobals.
/// Ошибки не пробрасываются: без темы поиск просто начинается с запасных тем.
pub async fn detect_active_theme(runner: &dyn ToolRunner) -> Option<String> {
    match runner
        .run("gsettings", &["get", "org.gnome.desktop.interface", "icon-theme"])
        .await
    {
        Ok(stdout) => {
            if let Some(theme) = parse_gsettings_value(&stdout) {
                info!("Тема иконок из gsettings: {}", theme);
                return Some(theme);
            }
        }
        Err(e) => debug!("gsettings недоступен: {}", e),
    }

    let config_dir = dirs::config_dir()?;
    let theme = theme_from_config_dir(&config_dir);
    match &theme {
        Some(theme) => info!("Тема иконок из конфигурации: {}", theme),
        None => info!("Тема иконок не определена, используем запасные темы"),
    }
    theme
}

fn theme_from_config_dir(config_dir: &Path) -> Option<String> {
    let gtk = std::fs::read_to_string(config_dir.join("gtk-3.0").join("settings.ini")).ok();
    if let Some(theme) = gtk.as_deref().and_then(|c| ini_value(c, "Settings", "gtk-icon-theme-name")) {
        return Some(theme);
    }

    let kde = std::fs::read_to_string(config_dir.join("kdeglobals")).ok();
    kde.as_deref().and_then(|c| ini_value(c, "Icons", "Theme"))
}

/// `'Adwaita'\n` -> `Adwaita`
pub(crate) fn parse_gsettings_value(stdout: &str) -> Option<String> {
    let value = stdout.trim().trim_matches(|c| c == '\'' || c == '"').trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

fn ini_value(content: &str, section: &str, key: &str) -> Option<String> {
    let header = format!("[{}]", section);
    let mut in_section = false;

    for line in content.lines().map(str::trim) {
        if line.starts_with('[') {
            in_section = line == header;
            continue;
        }
        if !in_section {
            continue;
        }
        if let Some((k, v)) = line.split_once('=') {
            if k.trim() == key {
                let v = v.trim().trim_matches('"');
                if !v.is_empty() {
                    return Some(v.to_string());
                }
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::tool_runner::testing::ScriptedRunner;

    #[test]
    fn test_parse_gsettings_value() {
        assert_eq!(parse_gsettings_value("'Yaru'\n").as_deref(), Some("Yaru"));
        assert_eq!(parse_gsettings_value("''\n"), None);
    }

    #[test]
    fn test_theme_from_config_dir() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(theme_from_config_dir(dir.path()), None);

        std::fs::write(
            dir.path().join("kdeglobals"),
            "[General]\nTheme=wrong\n\n[Icons]\nTheme=breeze-dark\n",
        )
        .unwrap();
        assert_eq!(theme_from_config_dir(dir.path()).as_deref(), Some("breeze-dark"));

        std::fs::create_dir_all(dir.path().join("gtk-3.0")).unwrap();
        std::fs::write(
            dir.path().join("gtk-3.0").join("settings.ini"),
            "[Settings]\ngtk-theme-name=Adwaita\ngtk-icon-theme-name = Papirus-Dark\n",
        )
        .unwrap();
        assert_eq!(theme_from_config_dir(dir.path()).as_deref(), Some("Papirus-Dark"));
    }

    #[tokio::test]
    async fn test_detect_prefers_gsettings() {
        let runner = ScriptedRunner::new();
        runner.set("gsettings get org.gnome.desktop.interface icon-theme", "'Yaru'\n");
        assert_eq!(detect_active_theme(&runner).await.as_deref(), Some("Yaru"));
    }
}
