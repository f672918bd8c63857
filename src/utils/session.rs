use tracing::{info, warn};

/// Тип графической сессии
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionType {
    X11,
    Wayland,
    Unknown,
}

/// Сведения о текущей графической сессии, нужные каталогу и перечислителю окон
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    pub session_type: SessionType,
    /// Элементы `XDG_CURRENT_DESKTOP` в нижнем регистре; пусто, если среда неизвестна
    pub current_desktops: Vec<String>,
    pub has_x_display: bool,
}

impl SessionInfo {
    pub fn detect() -> Self {
        Self::from_vars(
            std::env::var("XDG_CURRENT_DESKTOP").ok().as_deref(),
            std::env::var("XDG_SESSION_TYPE").ok().as_deref(),
            std::env::var("DISPLAY").ok().as_deref(),
        )
    }

    pub fn from_vars(
        current_desktop: Option<&str>,
        session_type: Option<&str>,
        display: Option<&str>,
    ) -> Self {
        let current_desktops = current_desktop
            .unwrap_or_default()
            .split(':')
            .map(|d| d.trim().to_lowercase())
            .filter(|d| !d.is_empty())
            .collect();

        let session_type = match session_type.map(|s| s.trim().to_lowercase()).as_deref() {
            Some("x11") => SessionType::X11,
            Some("wayland") => SessionType::Wayland,
            _ => SessionType::Unknown,
        };

        Self {
            session_type,
            current_desktops,
            has_x_display: display.map(|d| !d.trim().is_empty()).unwrap_or(false),
        }
    }

    pub fn desktop_known(&self) -> bool {
        !self.current_desktops.is_empty()
    }

    /// Пересекается ли список сред из .desktop файла (`GNOME;KDE;`) с текущей средой
    pub fn desktop_in(&self, list: &str) -> bool {
        list.split(';')
            .map(|d| d.trim().to_lowercase())
            .filter(|d| !d.is_empty())
            .any(|d| self.current_desktops.contains(&d))
    }

    /// Проверить окружение и предупредить о том, что окна X11 не будут видны
    pub fn log_summary(&self) {
        info!(
            "Сессия: {:?}, среда рабочего стола: {}",
            self.session_type,
            if self.desktop_known() {
                self.current_desktops.join(":")
            } else {
                "неизвестна".to_string()
            }
        );

        if !self.has_x_display {
            warn!("Переменная DISPLAY не задана: wmctrl/xdotool не увидят окна");
            if self.session_type == SessionType::Wayland {
                warn!("   Нативные Wayland окна без XWayland недоступны для перечисления");
            }
        }
    }
}
