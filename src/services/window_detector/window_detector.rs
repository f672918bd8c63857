use crate::debug_if_enabled;
use crate::error::Result;
use crate::events::{WindowId, WindowRecord};
use crate::services::ToolRunner;
use parking_lot::RwLock;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::filter::WindowFilter;
use super::wmctrl::WmctrlDetector;
use super::xdotool::XdotoolDetector;
use super::xprop::XpropDetector;

/// Перечисляет открытые окна через несколько утилит по уровням:
/// `wmctrl -lx` (запасной вариант `wmctrl -l`), затем `xdotool search` для окон,
/// которых нет в списке wmctrl. Сбой любой утилиты не прерывает перечисление.
pub struct WindowEnumerator {
    wmctrl: WmctrlDetector,
    xdotool: XdotoolDetector,
    xprop: XpropDetector,
    filter: WindowFilter,
    last_good: RwLock<Option<Vec<WindowRecord>>>,
}

impl WindowEnumerator {
    pub fn new(runner: Arc<dyn ToolRunner>, filter: WindowFilter) -> Self {
        info!("Инициализация WindowEnumerator");

        Self {
            wmctrl: WmctrlDetector::new(runner.clone()),
            xdotool: XdotoolDetector::new(runner.clone()),
            xprop: XpropDetector::new(runner),
            filter,
            last_good: RwLock::new(None),
        }
    }

    /// Текущий список окон. Если wmctrl недоступен, возвращается последний успешный
    /// список без изменений, чтобы док не мигал. Только пока успешного списка ещё
    /// не было, используются окна от xdotool.
    pub async fn enumerate(&self) -> Vec<WindowRecord> {
        let (primary, primary_ok) = match self.primary_tier().await {
            Some(records) => (records, true),
            None => {
                let previous = self.last_good.read().clone();
                if let Some(previous) = previous {
                    warn!("Перечисление окон не удалось, оставляем предыдущий список");
                    return previous;
                }
                (Vec::new(), false)
            }
        };

        let known: HashSet<WindowId> = primary
            .iter()
            .map(|record| record.window_id.clone())
            .collect();
        let supplementary = self.supplementary_tier(&known).await;

        let mut seen = HashSet::new();
        let mut records: Vec<WindowRecord> = primary
            .into_iter()
            .chain(supplementary)
            .filter(|record| seen.insert(record.window_id.clone()))
            .filter(|record| {
                let excluded = self.filter.is_excluded(record);
                if excluded {
                    debug_if_enabled!("Окно исключено фильтром: {}", record);
                }
                !excluded
            })
            .collect();

        let focused = self.focused_window().await;
        for record in &mut records {
            record.is_focused = focused.as_ref() == Some(&record.window_id);
        }

        debug!("Найдено окон: {} (в фокусе: {:?})", records.len(), focused);
        // Список только от xdotool не считается успешным перечислением
        if primary_ok {
            *self.last_good.write() = Some(records.clone());
        }
        records
    }

    /// `None` означает, что обе версии wmctrl недоступны
    async fn primary_tier(&self) -> Option<Vec<WindowRecord>> {
        match self.wmctrl.list_extended().await {
            Ok(records) => return Some(records),
            Err(e) => debug!("wmctrl -lx не сработал: {}", e),
        }

        match self.wmctrl.list_basic().await {
            Ok(records) => {
                debug!("Используем wmctrl -l без классов окон");
                Some(records)
            }
            Err(e) => {
                warn!("wmctrl недоступен: {}", e);
                None
            }
        }
    }

    async fn supplementary_tier(&self, known: &HashSet<WindowId>) -> Vec<WindowRecord> {
        let ids = match self.xdotool.search_visible().await {
            Ok(ids) => ids,
            Err(e) => {
                debug!("xdotool search не сработал: {}", e);
                return Vec::new();
            }
        };

        let mut records = Vec::new();
        let mut visited = HashSet::new();
        for window_id in ids {
            if known.contains(&window_id) || !visited.insert(window_id.clone()) {
                continue;
            }

            let Some(title) = self.resolve_title(&window_id).await else {
                continue;
            };

            let mut record = WindowRecord::new(window_id.clone(), title);
            if let Ok((instance, class)) = self.xprop.wm_class(&window_id).await {
                if let Some(class) = class {
                    record = record.with_class(class);
                }
                if let Some(instance) = instance {
                    record = record.with_instance(instance);
                }
            }
            if let Some(workspace) = self.xdotool.desktop_for_window(&window_id).await {
                record = record.with_workspace(workspace);
            }

            debug_if_enabled!("Дополнительное окно от xdotool: {}", record);
            records.push(record);
        }

        records
    }

    /// `_NET_WM_NAME`, затем `WM_NAME`, затем `xdotool getwindowname`
    async fn resolve_title(&self, window_id: &WindowId) -> Option<String> {
        for property in ["_NET_WM_NAME", "WM_NAME"] {
            if let Ok(Some(title)) = self.xprop.text_property(window_id, property).await {
                return Some(title);
            }
        }

        self.xdotool.window_name(window_id).await.ok().flatten()
    }

    /// Запрашивается один раз за перечисление
    async fn focused_window(&self) -> Option<WindowId> {
        match self.xdotool.active_window().await {
            Ok(Some(id)) => return Some(id),
            Ok(None) => {}
            Err(e) => debug!("xdotool getactivewindow не сработал: {}", e),
        }

        self.xprop.active_window().await.ok().flatten()
    }

    pub async fn activate(&self, window_id: &WindowId) -> Result<()> {
        if let Err(e) = self.wmctrl.activate(window_id).await {
            debug!("wmctrl не активировал {}: {}, пробуем xdotool", window_id, e);
            return self.xdotool.activate(window_id).await;
        }
        Ok(())
    }

    pub async fn close(&self, window_id: &WindowId) -> Result<()> {
        if let Err(e) = self.wmctrl.close(window_id).await {
            debug!("wmctrl не закрыл {}: {}, пробуем xdotool", window_id, e);
            return self.xdotool.close(window_id).await;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::services::tool_runner::testing::ScriptedRunner;

    const WMCTRL_LX: &str = "\
0x03a00003  0 Navigator.firefox  host GitHub — Mozilla Firefox
0x01e00007  1 code.Code  host main.rs - Visual Studio Code
0x01e0000a  1 code.Code  host lib.rs - Visual Studio Code
0x00a00001 -1 desktop_window.Nautilus  host Desktop
";

    fn enumerator(runner: &Arc<ScriptedRunner>) -> WindowEnumerator {
        WindowEnumerator::new(
            runner.clone(),
            WindowFilter::from_config(&Config::default().filter),
        )
    }

    #[tokio::test]
    async fn test_primary_tier_with_focus_and_filter() {
        let runner = Arc::new(ScriptedRunner::new());
        runner.set("wmctrl -lx", WMCTRL_LX);
        runner.set("xdotool getactivewindow", "31457287\n");

        let records = enumerator(&runner).enumerate().await;

        assert_eq!(records.len(), 3);
        assert_eq!(records[0].window_class.as_deref(), Some("firefox"));
        let focused: Vec<_> = records.iter().filter(|r| r.is_focused).collect();
        assert_eq!(focused.len(), 1);
        assert_eq!(focused[0].title, "main.rs - Visual Studio Code");

        // Фокус запрашивается один раз за перечисление
        let focus_calls = runner
            .calls()
            .iter()
            .filter(|c| c.as_str() == "xdotool getactivewindow")
            .count();
        assert_eq!(focus_calls, 1);
    }

    #[tokio::test]
    async fn test_supplementary_tier_adds_unknown_windows_only() {
        let runner = Arc::new(ScriptedRunner::new());
        runner.set("wmctrl -lx", WMCTRL_LX);
        // 0x03a00003 уже известен, 0x05000001 новый, 0x05000002 без заголовка
        runner.set(
            "xdotool search --onlyvisible --name ",
            "60817411\n83886081\n83886082\n83886081\n",
        );
        runner.set("xprop -id 0x03a00003 _NET_WM_NAME", "_NET_WM_NAME(UTF8_STRING) = \"override\"");
        runner.set("xprop -id 0x05000001 _NET_WM_NAME", "_NET_WM_NAME:  not found.");
        runner.set("xprop -id 0x05000001 WM_NAME", "WM_NAME(STRING) = \"Telegram\"");
        runner.set("xprop -id 0x05000001 WM_CLASS", "WM_CLASS(STRING) = \"telegram-desktop\", \"TelegramDesktop\"");
        runner.set("xdotool get_desktop_for_window 83886081", "2\n");
        runner.set("xprop -id 0x05000002 _NET_WM_NAME", "_NET_WM_NAME:  not found.");
        runner.set("xprop -id 0x05000002 WM_NAME", "WM_NAME:  not found.");
        runner.set("xprop -root _NET_ACTIVE_WINDOW", "_NET_ACTIVE_WINDOW(WINDOW): window id # 0x5000001");

        let records = enumerator(&runner).enumerate().await;

        assert_eq!(records.len(), 4);
        let firefox = &records[0];
        assert_eq!(firefox.title, "GitHub — Mozilla Firefox");

        let telegram = records.last().unwrap();
        assert_eq!(telegram.window_id, WindowId::parse("0x05000001").unwrap());
        assert_eq!(telegram.title, "Telegram");
        assert_eq!(telegram.window_class.as_deref(), Some("TelegramDesktop"));
        assert_eq!(telegram.window_instance.as_deref(), Some("telegram-desktop"));
        assert_eq!(telegram.workspace_index, 2);
        assert!(telegram.is_focused);

        let ids: HashSet<_> = records.iter().map(|r| r.window_id.clone()).collect();
        assert_eq!(ids.len(), records.len());
        assert!(!runner.calls().iter().any(|c| c.contains("0x03a00003")));
    }

    #[tokio::test]
    async fn test_falls_back_to_basic_listing() {
        let runner = Arc::new(ScriptedRunner::new());
        runner.fail("wmctrl -lx");
        runner.set("wmctrl -l", "0x04400006  0 N/A Downloads - Files\n");

        let records = enumerator(&runner).enumerate().await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].window_class, None);
        assert_eq!(records[0].title, "Downloads - Files");
    }

    #[tokio::test]
    async fn test_tool_failure_keeps_previous_list() {
        let runner = Arc::new(ScriptedRunner::new());
        runner.set("wmctrl -lx", WMCTRL_LX);
        let enumerator = enumerator(&runner);

        let first = enumerator.enumerate().await;
        assert_eq!(first.len(), 3);

        runner.fail("wmctrl -lx");
        runner.fail("wmctrl -l");
        let second = enumerator.enumerate().await;
        assert_eq!(second, first);
    }

    #[tokio::test]
    async fn test_wmctrl_failure_ignores_xdotool_when_history_exists() {
        let runner = Arc::new(ScriptedRunner::new());
        runner.set("wmctrl -lx", WMCTRL_LX);
        let enumerator = enumerator(&runner);

        let first = enumerator.enumerate().await;
        assert_eq!(first.len(), 3);

        runner.fail("wmctrl -lx");
        runner.fail("wmctrl -l");
        runner.set("xdotool search --onlyvisible --name ", "83886081\n");
        runner.set("xprop -id 0x05000001 _NET_WM_NAME", "_NET_WM_NAME(UTF8_STRING) = \"helper\"");

        let second = enumerator.enumerate().await;
        assert_eq!(second, first);
        assert!(!runner.calls().iter().any(|c| c.starts_with("xprop -id 0x05000001")));
    }

    #[tokio::test]
    async fn test_xdotool_only_without_wmctrl_history() {
        let runner = Arc::new(ScriptedRunner::new());
        runner.fail("wmctrl -lx");
        runner.fail("wmctrl -l");
        runner.set("xdotool search --onlyvisible --name ", "83886081\n");
        runner.set("xprop -id 0x05000001 _NET_WM_NAME", "_NET_WM_NAME(UTF8_STRING) = \"helper\"");
        let enumerator = enumerator(&runner);

        let first = enumerator.enumerate().await;
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].title, "helper");

        // Без успешного wmctrl список от xdotool обновляется каждый цикл
        runner.set("xdotool search --onlyvisible --name ", "");
        assert!(enumerator.enumerate().await.is_empty());
    }

    #[tokio::test]
    async fn test_no_tools_and_no_history_is_empty() {
        let runner = Arc::new(ScriptedRunner::new());
        assert!(enumerator(&runner).enumerate().await.is_empty());
    }

    #[tokio::test]
    async fn test_activation_falls_back_to_xdotool() {
        let runner = Arc::new(ScriptedRunner::new());
        runner.fail("wmctrl -i -a 0x03a00003");
        runner.set("xdotool windowactivate 60817411", "");
        let enumerator = enumerator(&runner);

        let id = WindowId::parse("0x03a00003").unwrap();
        assert!(enumerator.activate(&id).await.is_ok());
        assert!(enumerator.close(&id).await.is_err());
    }
}
