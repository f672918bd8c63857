use crate::config::FilterConfig;
use crate::events::WindowRecord;
use std::collections::HashSet;

/// Отсекает окно самого дока и служебные окна оболочки/композитора
#[derive(Debug, Clone, Default)]
pub struct WindowFilter {
    own_titles: HashSet<String>,
    ignored_classes: HashSet<String>,
    ignored_titles: HashSet<String>,
}

impl WindowFilter {
    pub fn from_config(config: &FilterConfig) -> Self {
        let lower = |items: &[String]| -> HashSet<String> {
            items.iter().map(|s| s.trim().to_lowercase()).collect()
        };
        Self {
            own_titles: lower(&config.own_titles),
            ignored_classes: lower(&config.ignored_classes),
            ignored_titles: lower(&config.ignored_titles),
        }
    }

    pub fn is_excluded(&self, record: &WindowRecord) -> bool {
        let title = record.title.trim().to_lowercase();
        if self.own_titles.contains(&title) || self.ignored_titles.contains(&title) {
            return true;
        }

        [&record.window_class, &record.window_instance]
            .into_iter()
            .flatten()
            .any(|value| self.ignored_classes.contains(&value.to_lowercase()))
    }
}
