use crate::error::{DockError, Result};
use crate::services::ToolRunner;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::time::{Duration, Instant};
use tracing::info;

/// Эмуляция wmctrl/xdotool для режима сухого запуска: набор фиктивных окон,
/// фокус переключается каждые 10 секунд, закрытые окна пропадают из списка.
pub struct DryRunRunner {
    started: Instant,
    closed: Mutex<HashSet<String>>,
}

const FAKE_WINDOWS: [(&str, &str, &str); 4] = [
    ("0x01e00003", "gnome-terminal-server.Gnome-terminal", "Terminal - dry_run"),
    ("0x02a00007", "Navigator.firefox", "Browser - dry_run — Mozilla Firefox"),
    ("0x03200004", "code.Code", "Editor - dry_run - Visual Studio Code"),
    ("0x04000002", "steam_app_1.steam_app_1", "Game - dry_run"),
];

const FOCUS_PERIOD: Duration = Duration::from_secs(10);

impl DryRunRunner {
    pub fn new() -> Self {
        info!("Dry-run режим - внешние утилиты эмулируются");
        Self {
            started: Instant::now(),
            closed: Mutex::new(HashSet::new()),
        }
    }

    fn open_windows(&self) -> Vec<(&'static str, &'static str, &'static str)> {
        let closed = self.closed.lock();
        FAKE_WINDOWS
            .iter()
            .copied()
            .filter(|(id, _, _)| !closed.contains(*id))
            .collect()
    }

    fn listing(&self) -> String {
        self.open_windows()
            .iter()
            .map(|(id, class, title)| format!("{}  0 {}  dry-run {}\n", id, class, title))
            .collect()
    }

    fn active_window(&self) -> Result<String> {
        let windows = self.open_windows();
        if windows.is_empty() {
            return DockError::tool_unavailable("xdotool", "нет активного окна");
        }

        let ticks = (self.started.elapsed().as_secs() / FOCUS_PERIOD.as_secs()) as usize;
        let (id, _, _) = windows[ticks % windows.len()];
        let decimal = u64::from_str_radix(id.trim_start_matches("0x"), 16)
            .map_err(|e| DockError::Internal(e.to_string()))?;
        Ok(format!("{}\n", decimal))
    }
}

impl Default for DryRunRunner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl ToolRunner for DryRunRunner {
    async fn run(&self, program: &str, args: &[&str]) -> Result<String> {
        match (program, args) {
            ("wmctrl", ["-lx"]) => Ok(self.listing()),
            ("wmctrl", ["-i", "-a", _]) => Ok(String::new()),
            ("wmctrl", ["-i", "-c", id]) => {
                info!("Dry-run: закрываем окно {}", id);
                self.closed.lock().insert(id.to_string());
                Ok(String::new())
            }
            ("xdotool", ["search", ..]) => Ok(String::new()),
            ("xdotool", ["getactivewindow"]) => self.active_window(),
            _ => DockError::tool_unavailable(program, "недоступно в dry-run режиме"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::services::window_detector::{WindowEnumerator, WindowFilter};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_dry_run_windows_enumerate_and_close() {
        let runner = Arc::new(DryRunRunner::new());
        let enumerator = WindowEnumerator::new(
            runner.clone(),
            WindowFilter::from_config(&Config::default().filter),
        );

        let records = enumerator.enumerate().await;
        assert_eq!(records.len(), FAKE_WINDOWS.len());
        assert_eq!(records.iter().filter(|r| r.is_focused).count(), 1);
        assert!(records[0].is_focused);

        let firefox = records[1].window_id.clone();
        enumerator.close(&firefox).await.unwrap();

        let records = enumerator.enumerate().await;
        assert_eq!(records.len(), FAKE_WINDOWS.len() - 1);
        assert!(records.iter().all(|r| r.window_id != firefox));
    }
}
