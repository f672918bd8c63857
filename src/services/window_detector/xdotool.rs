use crate::error::Result;
use crate::events::WindowId;
use crate::services::ToolRunner;
use crate::trace_if_enabled;
use std::sync::Arc;
use tracing::debug;

/// Дополнительный источник окон (видит окна, которые не попали в `wmctrl -l`)
/// и запасной путь для фокуса, активации и закрытия.
pub struct XdotoolDetector {
    runner: Arc<dyn ToolRunner>,
}

impl XdotoolDetector {
    pub fn new(runner: Arc<dyn ToolRunner>) -> Self {
        Self { runner }
    }

    /// Все видимые окна. xdotool печатает десятичные id по одному на строку.
    pub async fn search_visible(&self) -> Result<Vec<WindowId>> {
        let stdout = self
            .runner
            .run("xdotool", &["search", "--onlyvisible", "--name", ""])
            .await?;

        Ok(stdout
            .lines()
            .filter_map(|line| {
                let id = WindowId::parse(line).filter(|id| id.as_u64().is_some());
                if id.is_none() && !line.trim().is_empty() {
                    trace_if_enabled!("xdotool search: пропускаем строку '{}'", line);
                }
                id
            })
            .collect())
    }

    pub async fn window_name(&self, window_id: &WindowId) -> Result<Option<String>> {
        let stdout = self
            .runner
            .run("xdotool", &["getwindowname", &window_id.to_decimal()])
            .await?;
        let title = stdout.trim();
        Ok(Some(title.to_string()).filter(|t| !t.is_empty()))
    }

    pub async fn desktop_for_window(&self, window_id: &WindowId) -> Option<i32> {
        self.runner
            .run("xdotool", &["get_desktop_for_window", &window_id.to_decimal()])
            .await
            .ok()
            .and_then(|stdout| stdout.trim().parse::<i32>().ok())
    }

    pub async fn active_window(&self) -> Result<Option<WindowId>> {
        let stdout = self.runner.run("xdotool", &["getactivewindow"]).await?;
        let active = WindowId::parse(stdout.trim());
        debug!("xdotool: активное окно {:?}", active);
        Ok(active)
    }

    pub async fn activate(&self, window_id: &WindowId) -> Result<()> {
        self.runner
            .run("xdotool", &["windowactivate", &window_id.to_decimal()])
            .await
            .map(|_| ())
    }

    pub async fn close(&self, window_id: &WindowId) -> Result<()> {
        self.runner
            .run("xdotool", &["windowclose", &window_id.to_decimal()])
            .await
            .map(|_| ())
    }
}
