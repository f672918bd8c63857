use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Описание запускаемого приложения из .desktop файла. После загрузки не изменяется.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ApplicationDescriptor {
    pub name: String,
    /// Команда запуска без field codes (`%U`, `%f` ...)
    pub launch_command: Option<String>,
    pub icon_hint: Option<String>,
    pub startup_wm_class: Option<String>,
    /// Заполняется каталогом при загрузке, если подключён поиск иконок
    pub icon_path: Option<PathBuf>,
}

impl ApplicationDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            launch_command: None,
            icon_hint: None,
            startup_wm_class: None,
            icon_path: None,
        }
    }

    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.launch_command = Some(strip_field_codes(&command.into())).filter(|c| !c.is_empty());
        self
    }

    pub fn with_icon_hint(mut self, hint: impl Into<String>) -> Self {
        self.icon_hint = Some(hint.into()).filter(|h| !h.trim().is_empty());
        self
    }

    pub fn with_startup_wm_class(mut self, class: impl Into<String>) -> Self {
        self.startup_wm_class = Some(class.into()).filter(|c| !c.trim().is_empty());
        self
    }

    pub fn with_icon_path(mut self, path: PathBuf) -> Self {
        self.icon_path = Some(path);
        self
    }

    /// Имя исполняемого файла: последний сегмент пути первого токена команды
    pub fn executable_base(&self) -> Option<String> {
        self.launch_command.as_deref().and_then(executable_base)
    }
}

impl fmt::Display for ApplicationDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.launch_command {
            Some(command) => write!(f, "{} [{}]", self.name, command),
            None => write!(f, "{}", self.name),
        }
    }
}

/// Убирает field codes из строки Exec. `%%` превращается в литеральный `%`.
/// Аргументы в кавычках сохраняются как есть.
pub fn strip_field_codes(exec: &str) -> String {
    split_exec(exec)
        .into_iter()
        .filter(|token| !is_field_code(token))
        .map(|token| token.replace("%%", "%"))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Делит строку Exec по пробелам вне кавычек, токены возвращаются вместе с кавычками
fn split_exec(exec: &str) -> Vec<&str> {
    let mut tokens = Vec::new();
    let mut start: Option<usize> = None;
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for (i, c) in exec.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match quote {
            Some('"') if c == '\\' => escaped = true,
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None if c.is_whitespace() => {
                if let Some(s) = start.take() {
                    tokens.push(&exec[s..i]);
                }
                continue;
            }
            None if c == '"' || c == '\'' => quote = Some(c),
            None if c == '\\' => escaped = true,
            None => {}
        }
        start.get_or_insert(i);
    }

    if let Some(s) = start {
        tokens.push(&exec[s..]);
    }
    tokens
}

/// Снимает кавычки и экранирование с одного токена
fn unquote(token: &str) -> String {
    let mut out = String::with_capacity(token.len());
    let mut quote: Option<char> = None;
    let mut chars = token.chars();

    while let Some(c) = chars.next() {
        match quote {
            Some(q) if c == q => quote = None,
            Some('"') if c == '\\' => out.extend(chars.next()),
            Some(_) => out.push(c),
            None if c == '"' || c == '\'' => quote = Some(c),
            None if c == '\\' => out.extend(chars.next()),
            None => out.push(c),
        }
    }
    out
}

fn is_field_code(token: &str) -> bool {
    let bytes = token.as_bytes();
    bytes.len() == 2 && bytes[0] == b'%' && bytes[1].is_ascii_alphabetic()
}

/// Первый значимый токен команды без пути. `env VAR=value prog` пропускает обёртку.
pub fn executable_base(command: &str) -> Option<String> {
    let mut tokens = split_exec(command)
        .into_iter()
        .filter(|token| !is_field_code(token))
        .map(unquote)
        .peekable();

    if tokens.peek().map(|t| base_name(t) == "env").unwrap_or(false) {
        tokens.next();
        while tokens
            .peek()
            .map(|t| t.contains('=') || t.starts_with('-'))
            .unwrap_or(false)
        {
            tokens.next();
        }
    }

    tokens
        .next()
        .map(|token| base_name(&token).to_string())
        .filter(|base| !base.is_empty())
}

fn base_name(token: &str) -> &str {
    Path::new(token)
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_field_codes() {
        assert_eq!(strip_field_codes("firefox %u"), "firefox");
        assert_eq!(strip_field_codes("code --new-window %F"), "code --new-window");
        assert_eq!(strip_field_codes("printf 100%%"), "printf 100%");
        assert_eq!(strip_field_codes("%U"), "");
    }

    #[test]
    fn test_executable_base() {
        assert_eq!(executable_base("/usr/bin/firefox %u").as_deref(), Some("firefox"));
        assert_eq!(executable_base("gimp-2.10").as_deref(), Some("gimp-2.10"));
        assert_eq!(
            executable_base("env GDK_BACKEND=x11 /opt/app/bin/telegram -- %u").as_deref(),
            Some("telegram")
        );
        assert_eq!(executable_base("'/usr/bin/gedit'").as_deref(), Some("gedit"));
        assert_eq!(executable_base("   ").as_deref(), None);
    }

    #[test]
    fn test_quoted_path_with_spaces() {
        assert_eq!(
            executable_base("\"/opt/My App/bin/app\" --flag %U").as_deref(),
            Some("app")
        );
        assert_eq!(executable_base("/opt/My\\ Tool/run").as_deref(), Some("run"));
        assert_eq!(
            executable_base("env 'LANG=en US' \"/opt/Some App/app\"").as_deref(),
            Some("app")
        );

        let app = ApplicationDescriptor::new("My App").with_command("\"/opt/My  App/bin/app\" %F");
        assert_eq!(app.launch_command.as_deref(), Some("\"/opt/My  App/bin/app\""));
        assert_eq!(app.executable_base().as_deref(), Some("app"));
    }

    #[test]
    fn test_descriptor_builder_drops_empty_command() {
        let app = ApplicationDescriptor::new("Odd").with_command("%U").with_icon_hint(" ");
        assert_eq!(app.launch_command, None);
        assert_eq!(app.icon_hint, None);
        assert_eq!(app.executable_base(), None);

        let firefox = ApplicationDescriptor::new("Firefox").with_command("firefox %u");
        assert_eq!(firefox.launch_command.as_deref(), Some("firefox"));
        assert_eq!(firefox.executable_base().as_deref(), Some("firefox"));
    }
}
