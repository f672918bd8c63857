use anyhow::{Context, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub logging: LoggingConfig,
    pub poll: PollConfig,
    #[serde(default)]
    pub catalog: CatalogConfig,
    pub icons: IconsConfig,
    pub filter: FilterConfig,
    pub matcher: MatcherConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PollConfig {
    pub interval_ms: u64,
    /// Таймаут на каждый вызов внешней утилиты
    pub tool_timeout_ms: u64,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct CatalogConfig {
    /// Дополнительные каталоги .desktop файлов, сканируются последними
    #[serde(default)]
    pub extra_dirs: Vec<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IconsConfig {
    pub fallback_themes: Vec<String>,
    #[serde(default)]
    pub extra_dirs: Vec<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FilterConfig {
    /// Заголовки собственных окон дока
    pub own_titles: Vec<String>,
    pub ignored_classes: Vec<String>,
    pub ignored_titles: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MatcherConfig {
    pub title_suffixes: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "compact".to_string(),
            },
            poll: PollConfig {
                interval_ms: 500,
                tool_timeout_ms: 1500,
            },
            catalog: CatalogConfig::default(),
            icons: IconsConfig {
                fallback_themes: vec![
                    "hicolor".to_string(),
                    "Adwaita".to_string(),
                    "breeze".to_string(),
                    "Papirus".to_string(),
                ],
                extra_dirs: Vec::new(),
            },
            filter: FilterConfig {
                own_titles: vec!["taskdock".to_string()],
                ignored_classes: [
                    "desktop_window",
                    "xfdesktop",
                    "plasmashell",
                    "gnome-shell",
                    "xfce4-panel",
                    "xfce4-notifyd",
                    "mutter-x11-frames",
                    "desktop-icons",
                ]
                .iter()
                .map(|s| s.to_string())
                .collect(),
                ignored_titles: [
                    "Desktop",
                    "mutter guard window",
                    "xfce4-panel",
                    "plasmashell",
                    "gnome-shell",
                    "Notification",
                ]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            },
            matcher: MatcherConfig {
                title_suffixes: [
                    " - Mozilla Firefox",
                    " — Mozilla Firefox",
                    " - Google Chrome",
                    " - Chromium",
                    " - Visual Studio Code",
                    " - Sublime Text",
                    " - GNU Emacs",
                    " - LibreOffice",
                    " - Mozilla Thunderbird",
                ]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            },
        }
    }
}

impl Config {
    /// Загружает конфигурацию: значения по умолчанию, затем TOML файл (если есть), затем
    /// переменные окружения `TASKDOCK_*` (вложенные ключи через `__`).
    pub fn load<P: AsRef<Path>>(config_path: P) -> Result<Self> {
        let config_path = config_path.as_ref();

        let figment = Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file(config_path))
            .merge(Env::prefixed("TASKDOCK_").split("__"));

        let config: Config = figment
            .extract()
            .with_context(|| format!("Не удалось загрузить конфигурацию из {:?}", config_path))?;

        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        match self.logging.level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!("Неверный уровень логирования: {}", self.logging.level),
        }

        match self.logging.format.as_str() {
            "pretty" | "compact" => {}
            _ => anyhow::bail!("Неверный формат логирования: {}", self.logging.format),
        }

        if self.poll.interval_ms < 100 {
            anyhow::bail!("poll.interval_ms должно быть минимум 100");
        }

        if !(100..=10_000).contains(&self.poll.tool_timeout_ms) {
            anyhow::bail!(
                "poll.tool_timeout_ms должно быть в диапазоне 100..=10000, получено {}",
                self.poll.tool_timeout_ms
            );
        }

        for (i, suffix) in self.matcher.title_suffixes.iter().enumerate() {
            if suffix.trim().is_empty() {
                anyhow::bail!("Пустой суффикс заголовка #{}", i + 1);
            }
        }

        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll.interval_ms)
    }

    pub fn tool_timeout(&self) -> Duration {
        Duration::from_millis(self.poll.tool_timeout_ms)
    }
}
