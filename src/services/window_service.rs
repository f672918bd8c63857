//! Цикл опроса окон.
//!
//! По таймеру запускает перечисление и сопоставление, сравнивает результат с
//! предыдущим снимком по `(window_id, is_focused, title)` и публикует подписчикам
//! только изменения. Пока цикл выполняется, следующие тики пропускаются.
//! После `stop()` результаты недоработавшего цикла отбрасываются.

use crate::debug_if_enabled;
use crate::error::{DockError, Result};
use crate::events::{MatchResult, SnapshotKey, WindowId, WindowList};
use crate::services::{ApplicationCatalog, CatalogEntries, WindowEnumerator, WindowMatcher};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const CHANNEL_CAPACITY: usize = 16;

struct PublishState {
    /// `None` после остановки: поздние результаты некуда публиковать
    sender: Option<broadcast::Sender<WindowList>>,
    previous: Option<HashSet<SnapshotKey>>,
    current: WindowList,
}

struct ServiceInner {
    enumerator: WindowEnumerator,
    matcher: WindowMatcher,
    catalog: Arc<ApplicationCatalog>,
    busy: AtomicBool,
    state: Mutex<PublishState>,
}

/// Снимает флаг занятости при завершении или отмене цикла
struct BusyGuard {
    inner: Arc<ServiceInner>,
}

impl BusyGuard {
    fn try_acquire(inner: &Arc<ServiceInner>) -> Option<Self> {
        inner
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self {
                inner: Arc::clone(inner),
            })
    }
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.inner.busy.store(false, Ordering::Release);
    }
}

pub struct WindowService {
    inner: Arc<ServiceInner>,
    interval: Duration,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl WindowService {
    pub fn new(
        enumerator: WindowEnumerator,
        matcher: WindowMatcher,
        catalog: Arc<ApplicationCatalog>,
        interval: Duration,
    ) -> Self {
        info!("Инициализация WindowService (интервал {:?})", interval);

        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(ServiceInner {
                enumerator,
                matcher,
                catalog,
                busy: AtomicBool::new(false),
                state: Mutex::new(PublishState {
                    sender: Some(sender),
                    previous: None,
                    current: Arc::new(Vec::new()),
                }),
            }),
            interval,
            cancel: CancellationToken::new(),
            task: Mutex::new(None),
        }
    }

    /// Запускает периодический опрос. Повторный запуск и запуск после остановки - ошибка.
    pub fn start(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(DockError::Internal("WindowService уже остановлен".to_string()));
        }

        let mut task = self.task.lock();
        if task.is_some() {
            return Err(DockError::Internal("WindowService уже запущен".to_string()));
        }

        let inner = Arc::clone(&self.inner);
        let cancel = self.cancel.clone();
        let period = self.interval;

        *task = Some(tokio::spawn(async move {
            info!("Цикл опроса окон запущен");
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        let Some(guard) = BusyGuard::try_acquire(&inner) else {
                            debug_if_enabled!("Предыдущий цикл ещё выполняется, пропускаем тик");
                            continue;
                        };

                        let cycle_inner = Arc::clone(&inner);
                        let cycle_cancel = cancel.clone();
                        tokio::spawn(async move {
                            let _guard = guard;
                            // Отмена прерывает цикл вместе с запущенными утилитами
                            tokio::select! {
                                _ = cycle_cancel.cancelled() => {}
                                _ = cycle_inner.poll_cycle(&cycle_cancel) => {}
                            }
                        });
                    }
                }
            }

            info!("Цикл опроса окон остановлен");
        }));

        Ok(())
    }

    /// Останавливает таймер и закрывает канал публикации
    pub fn stop(&self) {
        self.cancel.cancel();
        let sender = self.inner.state.lock().sender.take();
        if sender.is_some() {
            info!("WindowService остановлен");
        }
        if let Some(task) = self.task.lock().take() {
            task.abort();
        }
    }

    pub fn is_running(&self) -> bool {
        !self.cancel.is_cancelled() && self.task.lock().is_some()
    }

    /// Подписка на изменения списка окон. После остановки возвращает закрытый канал.
    pub fn subscribe(&self) -> broadcast::Receiver<WindowList> {
        match &self.inner.state.lock().sender {
            Some(sender) => sender.subscribe(),
            None => broadcast::channel(1).1,
        }
    }

    /// Последний опубликованный список
    pub fn current(&self) -> WindowList {
        Arc::clone(&self.inner.state.lock().current)
    }

    /// Один цикл опроса вне таймера. `None`, если цикл уже идёт, список не изменился
    /// или сервис остановлен.
    pub async fn poll_now(&self) -> Option<WindowList> {
        let _guard = BusyGuard::try_acquire(&self.inner)?;
        self.inner.poll_cycle(&self.cancel).await
    }

    pub async fn activate_window(&self, window_id: &WindowId) -> bool {
        match self.inner.enumerator.activate(window_id).await {
            Ok(()) => {
                debug!("Окно {} активировано", window_id);
                true
            }
            Err(e) => {
                warn!("Не удалось активировать окно {}: {}", window_id, e);
                false
            }
        }
    }

    pub async fn close_window(&self, window_id: &WindowId) -> bool {
        match self.inner.enumerator.close(window_id).await {
            Ok(()) => {
                debug!("Окну {} отправлен запрос на закрытие", window_id);
                true
            }
            Err(e) => {
                warn!("Не удалось закрыть окно {}: {}", window_id, e);
                false
            }
        }
    }
}

impl Drop for WindowService {
    fn drop(&mut self) {
        self.stop();
    }
}

impl ServiceInner {
    async fn poll_cycle(&self, cancel: &CancellationToken) -> Option<WindowList> {
        let catalog = self.load_catalog().await;
        let records = self.enumerator.enumerate().await;
        let matches = self.matcher.match_all(&records, &catalog);

        if cancel.is_cancelled() {
            debug!("Сервис остановлен во время цикла, результат отброшен");
            return None;
        }

        self.publish_if_changed(matches)
    }

    /// Первая загрузка каталога читает файловую систему, поэтому уходит в blocking пул
    async fn load_catalog(&self) -> CatalogEntries {
        if let Some(entries) = self.catalog.cached() {
            return entries;
        }

        let catalog = Arc::clone(&self.catalog);
        match tokio::task::spawn_blocking(move || catalog.load_all()).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Загрузка каталога приложений прервана: {}", e);
                Arc::new(Vec::new())
            }
        }
    }

    fn publish_if_changed(&self, matches: Vec<MatchResult>) -> Option<WindowList> {
        let keys: HashSet<SnapshotKey> = matches.iter().map(|m| m.window.snapshot_key()).collect();

        let mut state = self.state.lock();
        let sender = state.sender.clone()?;

        if state.previous.as_ref() == Some(&keys) {
            debug_if_enabled!("Список окон не изменился");
            return None;
        }

        let list: WindowList = Arc::new(matches);
        state.previous = Some(keys);
        state.current = Arc::clone(&list);

        info!("Список окон изменился: {} окон", list.len());
        // Ошибка означает только отсутствие подписчиков
        let _ = sender.send(Arc::clone(&list));
        Some(list)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::events::ApplicationDescriptor;
    use crate::services::tool_runner::testing::ScriptedRunner;
    use crate::services::WindowFilter;
    use tokio::sync::broadcast::error::RecvError;
    use tokio::time::timeout;

    const TWO_WINDOWS: &str = "\
0x03a00003  0 Navigator.firefox  host GitHub — Mozilla Firefox
0x04400006  0 N/A  host Downloads - Files
";

    fn service(runner: &Arc<ScriptedRunner>, period: Duration) -> WindowService {
        let config = Config::default();
        let catalog = ApplicationCatalog::from_descriptors(vec![
            ApplicationDescriptor::new("Firefox").with_command("firefox %u"),
            ApplicationDescriptor::new("Files").with_command("nautilus"),
        ]);
        WindowService::new(
            WindowEnumerator::new(runner.clone(), WindowFilter::from_config(&config.filter)),
            WindowMatcher::from_config(&config.matcher, None),
            Arc::new(catalog),
            period,
        )
    }

    async fn next(rx: &mut broadcast::Receiver<WindowList>) -> WindowList {
        timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("публикация не пришла")
            .expect("канал закрыт")
    }

    #[tokio::test]
    async fn test_poll_now_publishes_only_changes() {
        let runner = Arc::new(ScriptedRunner::new());
        runner.set("wmctrl -lx", TWO_WINDOWS);
        let service = service(&runner, Duration::from_millis(500));
        let mut rx = service.subscribe();

        let first = service.poll_now().await.unwrap();
        assert_eq!(first.len(), 2);
        assert_eq!(first[0].application_name(), Some("Firefox"));
        assert_eq!(first[1].application_name(), Some("Files"));
        assert_eq!(next(&mut rx).await.len(), 2);

        // Тот же список: публикации нет
        assert!(service.poll_now().await.is_none());

        // Фокус изменился: публикуем
        runner.set("xdotool getactivewindow", "60817411\n");
        let focused = service.poll_now().await.unwrap();
        assert!(focused[0].window.is_focused);
        assert!(Arc::ptr_eq(&service.current(), &focused));
    }

    #[tokio::test]
    async fn test_closed_and_opened_windows() {
        let runner = Arc::new(ScriptedRunner::new());
        runner.set("wmctrl -lx", TWO_WINDOWS);
        let service = service(&runner, Duration::from_millis(500));
        service.poll_now().await.unwrap();

        runner.set(
            "wmctrl -lx",
            "0x04400006  0 N/A  host Downloads - Files\n0x05000001  0 xeyes.XEyes  host xeyes\n",
        );
        let list = service.poll_now().await.unwrap();

        let ids: Vec<&str> = list.iter().map(|m| m.window.window_id.as_str()).collect();
        assert_eq!(ids, vec!["0x04400006", "0x05000001"]);
        // Неизвестное окно остаётся в списке без приложения
        assert!(list[1].application.is_none());
    }

    #[tokio::test]
    async fn test_tool_failure_does_not_flicker() {
        let runner = Arc::new(ScriptedRunner::new());
        runner.set("wmctrl -lx", TWO_WINDOWS);
        let service = service(&runner, Duration::from_millis(500));
        let first = service.poll_now().await.unwrap();

        runner.fail("wmctrl -lx");
        runner.fail("wmctrl -l");
        // xdotool ещё отвечает, но его окна не заменяют последний список
        runner.set("xdotool search --onlyvisible --name ", "83886081\n");
        runner.set("xprop -id 0x05000001 _NET_WM_NAME", "_NET_WM_NAME(UTF8_STRING) = \"helper\"");
        assert!(service.poll_now().await.is_none());
        assert!(Arc::ptr_eq(&service.current(), &first));
    }

    #[tokio::test]
    async fn test_timer_loop_publishes_and_stop_closes_channel() {
        let runner = Arc::new(ScriptedRunner::new());
        runner.set("wmctrl -lx", TWO_WINDOWS);
        let service = service(&runner, Duration::from_millis(20));
        let mut rx = service.subscribe();

        service.start().unwrap();
        assert!(service.is_running());
        assert!(service.start().is_err());
        assert_eq!(next(&mut rx).await.len(), 2);

        runner.set("wmctrl -lx", "0x04400006  0 N/A  host Downloads - Files\n");
        assert_eq!(next(&mut rx).await.len(), 1);

        service.stop();
        assert!(!service.is_running());
        let closed = timeout(Duration::from_secs(2), async {
            loop {
                match rx.recv().await {
                    Err(RecvError::Closed) => break true,
                    Err(RecvError::Lagged(_)) | Ok(_) => continue,
                }
            }
        })
        .await
        .unwrap();
        assert!(closed);

        assert!(matches!(service.subscribe().recv().await, Err(RecvError::Closed)));
        assert!(service.start().is_err());
        assert!(service.poll_now().await.is_none());
    }

    #[tokio::test]
    async fn test_slow_cycles_never_overlap() {
        let runner = Arc::new(ScriptedRunner::new());
        runner.set("wmctrl -lx", TWO_WINDOWS);
        runner.set_delay(Duration::from_millis(60));
        let service = service(&runner, Duration::from_millis(10));
        let mut rx = service.subscribe();

        service.start().unwrap();
        next(&mut rx).await;
        tokio::time::sleep(Duration::from_millis(200)).await;
        service.stop();

        assert_eq!(runner.max_in_flight(), 1);
    }

    #[tokio::test]
    async fn test_late_results_are_discarded_after_stop() {
        let runner = Arc::new(ScriptedRunner::new());
        runner.set("wmctrl -lx", TWO_WINDOWS);
        runner.set_delay(Duration::from_millis(100));
        let service = Arc::new(service(&runner, Duration::from_millis(500)));

        let in_flight = {
            let service = Arc::clone(&service);
            tokio::spawn(async move { service.poll_now().await })
        };
        tokio::time::sleep(Duration::from_millis(30)).await;
        service.stop();

        assert!(in_flight.await.unwrap().is_none());
        assert!(service.current().is_empty());
    }

    #[tokio::test]
    async fn test_activate_and_close_report_success() {
        let runner = Arc::new(ScriptedRunner::new());
        runner.set("wmctrl -i -a 0x03a00003", "");
        let service = service(&runner, Duration::from_millis(500));
        let id = WindowId::parse("0x3a00003").unwrap();

        assert!(service.activate_window(&id).await);
        assert!(!service.close_window(&id).await);
    }
}
