//! Единая точка вызова внешних утилит (wmctrl, xdotool, xprop, gsettings).
//!
//! Каждый вызов ограничен таймаутом: зависшая утилита не должна останавливать весь док.
//! Отсутствующий бинарник и ненулевой код возврата превращаются в `ToolUnavailable`,
//! истёкший таймаут в `ToolTimeout`. Процесс убивается при отмене future.

use crate::error::{DockError, Result};
use crate::trace_if_enabled;
use std::collections::HashMap;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

#[async_trait::async_trait]
pub trait ToolRunner: Send + Sync {
    /// Запустить утилиту и вернуть её stdout
    async fn run(&self, program: &str, args: &[&str]) -> Result<String>;
}

pub struct SystemToolRunner {
    timeout: Duration,
    sudo_user: Option<String>,
    env_overrides: HashMap<String, String>,
}

/// Под sudo утилиты должны видеть сессию вызвавшего пользователя, а не root
fn build_env_overrides() -> HashMap<String, String> {
    let mut env_vars = HashMap::new();

    if std::env::var("USER").unwrap_or_default() == "root" {
        if let Ok(sudo_user) = std::env::var("SUDO_USER") {
            if let Ok(output) = std::process::Command::new("id").args(["-u", &sudo_user]).output() {
                if let Ok(uid_str) = String::from_utf8(output.stdout) {
                    let uid = uid_str.trim();
                    let user_runtime_dir = format!("/run/user/{}", uid);
                    let dbus_address = format!("unix:path={}/bus", user_runtime_dir);

                    debug!("Подставляем переменные окружения для пользователя {}: uid={}", sudo_user, uid);
                    env_vars.insert("DBUS_SESSION_BUS_ADDRESS".to_string(), dbus_address);
                    env_vars.insert("XDG_RUNTIME_DIR".to_string(), user_runtime_dir);
                    env_vars.insert("USER".to_string(), sudo_user);
                }
            }
        }
    }

    if let Ok(display_var) = std::env::var("DISPLAY") {
        env_vars.insert("DISPLAY".to_string(), display_var);
    }

    env_vars
}

impl SystemToolRunner {
    pub fn new(timeout: Duration) -> Self {
        let env_overrides = build_env_overrides();
        let sudo_user = env_overrides.get("USER").cloned();

        Self {
            timeout,
            sudo_user,
            env_overrides,
        }
    }

    fn create_command(&self, program: &str, args: &[&str]) -> Command {
        let mut cmd = if let Some(sudo_user) = &self.sudo_user {
            let mut cmd = Command::new("sudo");
            cmd.args(["-E", "-u", sudo_user.as_str(), program]);
            cmd.args(args);
            cmd
        } else {
            let mut cmd = Command::new(program);
            cmd.args(args);
            cmd
        };

        for (key, value) in &self.env_overrides {
            cmd.env(key, value);
        }

        cmd.stdin(Stdio::null()).kill_on_drop(true);
        cmd
    }
}

#[async_trait::async_trait]
impl ToolRunner for SystemToolRunner {
    async fn run(&self, program: &str, args: &[&str]) -> Result<String> {
        trace_if_enabled!("Запуск {} {:?}", program, args);

        let mut cmd = self.create_command(program, args);
        let output = match tokio::time::timeout(self.timeout, cmd.output()).await {
            Err(_) => {
                debug!("{} не ответил за {:?}", program, self.timeout);
                return Err(DockError::ToolTimeout {
                    tool: program.to_string(),
                    timeout_ms: self.timeout.as_millis() as u64,
                });
            }
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                return DockError::tool_unavailable(program, "не найден в PATH");
            }
            Ok(Err(e)) => return DockError::tool_unavailable(program, e.to_string()),
            Ok(Ok(output)) => output,
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            debug!("{} вернул ошибку ({}): {}", program, output.status, stderr.trim());
            return DockError::tool_unavailable(
                program,
                format!("{}: {}", output.status, stderr.trim()),
            );
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Подставной раннер: ответы задаются по строке `program arg1 arg2`
    #[derive(Default)]
    pub struct ScriptedRunner {
        responses: Mutex<HashMap<String, std::result::Result<String, String>>>,
        calls: Mutex<Vec<String>>,
        delay: Mutex<Option<Duration>>,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    impl ScriptedRunner {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn set(&self, command: &str, stdout: &str) {
            self.responses
                .lock()
                .insert(command.to_string(), Ok(stdout.to_string()));
        }

        pub fn fail(&self, command: &str) {
            self.responses
                .lock()
                .insert(command.to_string(), Err("exit status: 1".to_string()));
        }

        pub fn set_delay(&self, delay: Duration) {
            *self.delay.lock() = Some(delay);
        }

        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().clone()
        }

        pub fn max_in_flight(&self) -> usize {
            self.max_in_flight.load(Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl ToolRunner for ScriptedRunner {
        async fn run(&self, program: &str, args: &[&str]) -> Result<String> {
            let key = std::iter::once(program)
                .chain(args.iter().copied())
                .collect::<Vec<_>>()
                .join(" ");
            self.calls.lock().push(key.clone());

            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);

            let delay = *self.delay.lock();
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            match self.responses.lock().get(&key).cloned() {
                Some(Ok(stdout)) => Ok(stdout),
                Some(Err(reason)) => DockError::tool_unavailable(program, reason),
                None => DockError::tool_unavailable(program, "не найден в PATH"),
            }
        }
    }
}
