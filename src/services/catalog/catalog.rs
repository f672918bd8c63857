use crate::config::CatalogConfig;
use crate::debug_if_enabled;
use crate::error::DockError;
use crate::events::ApplicationDescriptor;
use crate::services::IconResolver;
use crate::utils::SessionInfo;
use once_cell::sync::OnceCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use super::desktop_entry::parse_desktop_entry;

/// Загруженный каталог приложений, отсортированный по имени без учёта регистра
pub type CatalogEntries = Arc<Vec<Arc<ApplicationDescriptor>>>;

/// Каталог приложений из .desktop файлов.
///
/// Каталоги сканируются от системных к пользовательским; при совпадении имени
/// побеждает последняя найденная запись. Результат кэшируется до конца процесса.
pub struct ApplicationCatalog {
    dirs: Vec<PathBuf>,
    session: SessionInfo,
    icons: Option<Arc<IconResolver>>,
    cache: OnceCell<CatalogEntries>,
}

impl ApplicationCatalog {
    pub fn new(dirs: Vec<PathBuf>, session: SessionInfo) -> Self {
        Self {
            dirs,
            session,
            icons: None,
            cache: OnceCell::new(),
        }
    }

    pub fn from_config(config: &CatalogConfig, session: SessionInfo) -> Self {
        let mut dirs = Self::default_dirs();
        dirs.extend(config.extra_dirs.iter().cloned());
        Self::new(dirs, session)
    }

    /// Готовый каталог без сканирования файловой системы
    pub fn from_descriptors(descriptors: Vec<ApplicationDescriptor>) -> Self {
        let catalog = Self::new(Vec::new(), SessionInfo::from_vars(None, None, None));
        let entries = Arc::new(dedup_and_sort(descriptors));
        // Ячейка только что создана, set не может не сработать
        let _ = catalog.cache.set(entries);
        catalog
    }

    /// Иконки записей будут найдены один раз при загрузке
    pub fn with_icon_resolver(mut self, icons: Arc<IconResolver>) -> Self {
        self.icons = Some(icons);
        self
    }

    /// Порядок важен: более поздние каталоги переопределяют более ранние
    pub fn default_dirs() -> Vec<PathBuf> {
        let mut dirs_list = vec![
            PathBuf::from("/usr/share/applications"),
            PathBuf::from("/usr/local/share/applications"),
            PathBuf::from("/var/lib/snapd/desktop/applications"),
            PathBuf::from("/var/lib/flatpak/exports/share/applications"),
        ];

        // XDG_DATA_DIRS перечислены по убыванию приоритета, поэтому идём с конца
        if let Ok(data_dirs) = std::env::var("XDG_DATA_DIRS") {
            for dir in data_dirs.split(':').rev().filter(|d| !d.is_empty()) {
                dirs_list.push(Path::new(dir).join("applications"));
            }
        }

        if let Some(data_dir) = dirs::data_dir() {
            dirs_list.push(data_dir.join("flatpak/exports/share/applications"));
            dirs_list.push(data_dir.join("applications"));
        }

        // Повтор каталога сохраняет позицию последнего вхождения (более высокий приоритет)
        let mut unique: Vec<PathBuf> = Vec::new();
        for dir in dirs_list {
            unique.retain(|d| d != &dir);
            unique.push(dir);
        }
        unique
    }

    pub fn cached(&self) -> Option<CatalogEntries> {
        self.cache.get().cloned()
    }

    /// Никогда не завершается ошибкой: нечитаемые файлы и каталоги пропускаются
    pub fn load_all(&self) -> CatalogEntries {
        self.cache
            .get_or_init(|| {
                let entries = self.scan();
                info!("Каталог приложений загружен: {} записей", entries.len());
                Arc::new(entries)
            })
            .clone()
    }

    fn scan(&self) -> Vec<Arc<ApplicationDescriptor>> {
        let mut descriptors = Vec::new();

        for dir in &self.dirs {
            if !dir.is_dir() {
                debug_if_enabled!("Каталог приложений отсутствует: {:?}", dir);
                continue;
            }
            self.scan_dir(dir, &mut descriptors);
        }

        dedup_and_sort(descriptors)
    }

    fn scan_dir(&self, dir: &Path, descriptors: &mut Vec<ApplicationDescriptor>) {
        let mut files: Vec<PathBuf> = WalkDir::new(dir)
            .follow_links(true)
            .max_depth(4)
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!("Не удалось прочитать {:?}: {}", dir, e);
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| entry.into_path())
            .filter(|path| path.extension().map(|ext| ext == "desktop").unwrap_or(false))
            .collect();
        // Порядок read_dir не определён
        files.sort();

        for path in files {
            match self.load_file(&path) {
                Some(app) => descriptors.push(app),
                None => debug_if_enabled!("Пропускаем {:?}", path),
            }
        }
    }

    fn load_file(&self, path: &Path) -> Option<ApplicationDescriptor> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(source) => {
                let err = DockError::FileAccess {
                    path: path.to_path_buf(),
                    source,
                };
                warn!("{}", err);
                return None;
            }
        };

        let entry = match parse_desktop_entry(&content) {
            Ok(entry) => entry,
            Err(e) => {
                debug!("{:?}: {}", path, e);
                return None;
            }
        };

        if !entry.is_visible(&self.session) {
            return None;
        }

        let mut app = entry.into_descriptor()?;
        if let (Some(icons), Some(hint)) = (&self.icons, &app.icon_hint) {
            if let Some(icon_path) = icons.resolve(hint) {
                app = app.with_icon_path(icon_path);
            }
        }
        Some(app)
    }
}

/// Последняя запись с тем же именем побеждает; сортировка по имени без учёта регистра
fn dedup_and_sort(descriptors: Vec<ApplicationDescriptor>) -> Vec<Arc<ApplicationDescriptor>> {
    let mut by_name: HashMap<String, ApplicationDescriptor> = HashMap::new();
    for app in descriptors {
        by_name.insert(app.name.clone(), app);
    }

    let mut entries: Vec<Arc<ApplicationDescriptor>> = by_name.into_values().map(Arc::new).collect();
    entries.sort_by(|a, b| {
        a.name
            .to_lowercase()
            .cmp(&b.name.to_lowercase())
            .then_with(|| a.name.cmp(&b.name))
    });
    entries
}
