//! Сопоставление окна с записью каталога приложений.
//!
//! Между окном и .desktop файлом нет общего ключа, поэтому правила применяются
//! строго по приоритету и первое сработавшее побеждает:
//! 1. класс окна (StartupWMClass, имя исполняемого файла, вхождения);
//! 2. заголовок окна;
//! 3. instance окна.
//!
//! Несопоставленное окно не ошибка: оно публикуется с `application: None`.

use crate::config::MatcherConfig;
use crate::events::{ApplicationDescriptor, MatchResult, MatchStrategy, WindowRecord};
use crate::services::icons::{is_svg, IconResolver};
use crate::trace_if_enabled;
use std::path::PathBuf;
use std::sync::Arc;

/// Минимальная длина нормализованной строки для проверки вхождения
const MIN_CONTAINS_LEN: usize = 3;

/// Нижний регистр без `-`, `_` и пробелов
pub fn normalize(value: &str) -> String {
    value
        .chars()
        .filter(|c| !matches!(c, '-' | '_') && !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

fn contains_either(a: &str, b: &str) -> bool {
    a.len() >= MIN_CONTAINS_LEN && b.len() >= MIN_CONTAINS_LEN && (a.contains(b) || b.contains(a))
}

fn exec_len(candidate: &Candidate<'_>) -> usize {
    candidate.exec.as_ref().map(String::len).unwrap_or(0)
}

fn is_dash(c: char) -> bool {
    matches!(c, '-' | '—' | '–')
}

/// Запись каталога с заранее нормализованными ключами
struct Candidate<'a> {
    app: &'a Arc<ApplicationDescriptor>,
    exec: Option<String>,
    name_norm: String,
    name_lower: String,
    wm_class: Option<String>,
}

impl<'a> Candidate<'a> {
    fn new(app: &'a Arc<ApplicationDescriptor>) -> Self {
        Self {
            app,
            exec: app
                .executable_base()
                .map(|e| normalize(&e))
                .filter(|e| !e.is_empty()),
            name_norm: normalize(&app.name),
            name_lower: app.name.trim().to_lowercase(),
            wm_class: app
                .startup_wm_class
                .as_deref()
                .map(normalize)
                .filter(|c| !c.is_empty()),
        }
    }
}

/// Нормализованный каталог для сопоставления нескольких окон за один цикл
pub struct MatchIndex<'a> {
    candidates: Vec<Candidate<'a>>,
}

impl<'a> MatchIndex<'a> {
    pub fn new(catalog: &'a [Arc<ApplicationDescriptor>]) -> Self {
        Self {
            candidates: catalog.iter().map(Candidate::new).collect(),
        }
    }

    fn first<F>(&self, predicate: F) -> Option<&Candidate<'a>>
    where
        F: Fn(&Candidate<'a>) -> bool,
    {
        self.candidates.iter().find(|c| predicate(*c))
    }

    /// Самый длинный подходящий ключ; при равенстве первый по порядку каталога
    fn longest<F, K>(&self, predicate: F, key_len: K) -> Option<&Candidate<'a>>
    where
        F: Fn(&Candidate<'a>) -> bool,
        K: Fn(&Candidate<'a>) -> usize,
    {
        let mut best: Option<&Candidate<'a>> = None;
        for candidate in self.candidates.iter().filter(|c| predicate(*c)) {
            if best.map(|b| key_len(candidate) > key_len(b)).unwrap_or(true) {
                best = Some(candidate);
            }
        }
        best
    }
}

pub struct WindowMatcher {
    icons: Option<Arc<IconResolver>>,
    title_suffixes: Vec<String>,
}

impl WindowMatcher {
    pub fn new(icons: Option<Arc<IconResolver>>, title_suffixes: Vec<String>) -> Self {
        Self {
            icons,
            title_suffixes,
        }
    }

    pub fn from_config(config: &MatcherConfig, icons: Option<Arc<IconResolver>>) -> Self {
        Self::new(icons, config.title_suffixes.clone())
    }

    pub fn match_window(&self, window: &WindowRecord, catalog: &[Arc<ApplicationDescriptor>]) -> MatchResult {
        self.match_indexed(window, &MatchIndex::new(catalog))
    }

    /// Каталог нормализуется один раз на все окна цикла
    pub fn match_all(&self, windows: &[WindowRecord], catalog: &[Arc<ApplicationDescriptor>]) -> Vec<MatchResult> {
        let index = MatchIndex::new(catalog);
        windows
            .iter()
            .map(|window| self.match_indexed(window, &index))
            .collect()
    }

    pub fn match_indexed(&self, window: &WindowRecord, index: &MatchIndex<'_>) -> MatchResult {
        let found = self
            .match_by_class(window, index)
            .or_else(|| self.match_by_title(window, index))
            .or_else(|| self.match_by_instance(window, index));

        let Some((candidate, strategy)) = found else {
            trace_if_enabled!("Окно не сопоставлено: {}", window);
            return MatchResult::unmatched(window.clone());
        };

        trace_if_enabled!("{} -> {} ({:?})", window, candidate.app.name, strategy);
        let resolved_icon_path = self.resolve_icon(candidate.app);
        MatchResult {
            window: window.clone(),
            application: Some(Arc::clone(candidate.app)),
            is_svg: resolved_icon_path.as_deref().map(is_svg).unwrap_or(false),
            resolved_icon_path,
            strategy: Some(strategy),
        }
    }

    fn match_by_class<'i, 'a>(
        &self,
        window: &WindowRecord,
        index: &'i MatchIndex<'a>,
    ) -> Option<(&'i Candidate<'a>, MatchStrategy)> {
        let class = window.window_class.as_deref().map(normalize).filter(|c| !c.is_empty())?;
        let instance = window
            .window_instance
            .as_deref()
            .map(normalize)
            .filter(|i| !i.is_empty());

        if let Some(c) = index.first(|c| c.wm_class.as_deref() == Some(class.as_str())) {
            return Some((c, MatchStrategy::StartupWmClass));
        }

        if let Some(c) = index.first(|c| c.exec.as_deref() == Some(class.as_str())) {
            return Some((c, MatchStrategy::ClassExact));
        }

        if let Some(instance) = &instance {
            if let Some(c) = index.first(|c| {
                c.exec.as_deref() == Some(instance.as_str())
                    || c.wm_class.as_deref() == Some(instance.as_str())
            }) {
                return Some((c, MatchStrategy::InstanceExactWithClass));
            }
        }

        if let Some(c) = index.longest(
            |c| c.exec.as_deref().map(|e| contains_either(&class, e)).unwrap_or(false),
            exec_len,
        ) {
            return Some((c, MatchStrategy::ClassContains));
        }

        if let Some(instance) = &instance {
            if let Some(c) = index.longest(
                |c| c.exec.as_deref().map(|e| contains_either(instance, e)).unwrap_or(false),
                exec_len,
            ) {
                return Some((c, MatchStrategy::InstanceContains));
            }
        }

        index
            .longest(|c| contains_either(&class, &c.name_norm), |c| c.name_norm.len())
            .map(|c| (c, MatchStrategy::ClassInName))
    }

    fn match_by_title<'i, 'a>(
        &self,
        window: &WindowRecord,
        index: &'i MatchIndex<'a>,
    ) -> Option<(&'i Candidate<'a>, MatchStrategy)> {
        let title = window.title.trim().to_lowercase();
        if title.is_empty() {
            return None;
        }

        if let Some(c) = index.first(|c| c.name_lower == title) {
            return Some((c, MatchStrategy::TitleExact));
        }

        if let Some(c) = self.match_title_suffix(&title, index) {
            return Some((c, MatchStrategy::TitleWithoutSuffix));
        }

        if let Some(c) = index.longest(
            |c| c.name_lower.chars().count() >= MIN_CONTAINS_LEN && title.contains(&c.name_lower),
            |c| c.name_lower.len(),
        ) {
            return Some((c, MatchStrategy::TitleContainsName));
        }

        let first_token = title
            .split(|c: char| c.is_whitespace() || is_dash(c))
            .find(|token| !token.is_empty())
            .unwrap_or_default();
        if first_token.chars().count() > 2 {
            if let Some(c) = index
                .first(|c| c.name_lower == first_token)
                .or_else(|| index.first(|c| c.name_lower.starts_with(first_token)))
            {
                return Some((c, MatchStrategy::TitleFirstToken));
            }
        }

        let last_segment = title.rsplit(is_dash).next().unwrap_or_default().trim();
        if !last_segment.is_empty() {
            if let Some(c) = index.first(|c| c.name_lower == last_segment) {
                return Some((c, MatchStrategy::TitleLastSegment));
            }
        }

        None
    }

    /// Заголовок без брендового суффикса совпадает с именем записи, либо сам бренд
    /// (`Visual Studio Code` из ` - Visual Studio Code`) совпадает с именем.
    fn match_title_suffix<'i, 'a>(&self, title: &str, index: &'i MatchIndex<'a>) -> Option<&'i Candidate<'a>> {
        for suffix in &self.title_suffixes {
            let suffix = suffix.to_lowercase();
            let Some(stripped) = title.strip_suffix(suffix.as_str()) else {
                continue;
            };

            let stripped = stripped.trim();
            let brand = suffix.trim_start_matches(|c: char| c.is_whitespace() || is_dash(c)).trim();

            if let Some(c) = index.first(|c| c.name_lower == stripped || c.name_lower == brand) {
                return Some(c);
            }
        }
        None
    }

    fn match_by_instance<'i, 'a>(
        &self,
        window: &WindowRecord,
        index: &'i MatchIndex<'a>,
    ) -> Option<(&'i Candidate<'a>, MatchStrategy)> {
        let instance = window
            .window_instance
            .as_deref()
            .map(normalize)
            .filter(|i| !i.is_empty())?;

        index
            .first(|c| c.exec.as_deref() == Some(instance.as_str()))
            .map(|c| (c, MatchStrategy::InstanceExact))
    }

    /// Уже найденная иконка записи, иначе поиск по Icon, имени и имени исполняемого файла.
    ///
    /// `Icon=` проверяется раньше имени: это иконка, которую запись объявляет сама,
    /// а имя и исполняемый файл только догадки.
    fn resolve_icon(&self, app: &ApplicationDescriptor) -> Option<PathBuf> {
        if let Some(path) = &app.icon_path {
            return Some(path.clone());
        }

        let icons = self.icons.as_ref()?;
        app.icon_hint
            .as_deref()
            .and_then(|hint| icons.resolve(hint))
            .or_else(|| icons.resolve(&app.name))
            .or_else(|| app.executable_base().and_then(|exec| icons.resolve(&exec)))
    }
}
