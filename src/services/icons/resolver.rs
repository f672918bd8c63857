use crate::config::IconsConfig;
use crate::trace_if_enabled;
use dashmap::DashMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Размеры по убыванию; scalable первым, чтобы векторная иконка выигрывала
const ICON_SIZES: [&str; 12] = [
    "scalable", "512x512", "256x256", "192x192", "128x128", "96x96", "64x64", "48x48", "32x32",
    "24x24", "22x22", "16x16",
];

const ICON_CATEGORIES: [&str; 9] = [
    "apps",
    "applications",
    "actions",
    "devices",
    "places",
    "categories",
    "status",
    "mimetypes",
    "legacy",
];

const ICON_EXTENSIONS: [&str; 3] = ["svg", "png", "xpm"];

#[derive(Debug)]
struct ThemeRoots {
    name: String,
    roots: Vec<PathBuf>,
}

/// Поиск файла иконки по имени из .desktop файла.
///
/// Порядок: активная тема, затем запасные темы; внутри темы размеры по убыванию,
/// затем категории, затем расширения. Если в темах ничего нет, проверяются
/// плоские каталоги (`/usr/share/pixmaps`). Результаты, включая промахи, кэшируются.
pub struct IconResolver {
    themes: Vec<ThemeRoots>,
    legacy_dirs: Vec<PathBuf>,
    cache: DashMap<String, Option<PathBuf>>,
}

impl IconResolver {
    pub fn new(
        base_dirs: &[PathBuf],
        legacy_dirs: Vec<PathBuf>,
        active_theme: Option<String>,
        fallback_themes: &[String],
    ) -> Self {
        let mut names: Vec<String> = Vec::new();
        for name in active_theme.into_iter().chain(fallback_themes.iter().cloned()) {
            if !name.trim().is_empty() && !names.contains(&name) {
                names.push(name);
            }
        }

        // Темы без каталогов на диске пропускаются сразу
        let themes: Vec<ThemeRoots> = names
            .into_iter()
            .map(|name| ThemeRoots {
                roots: base_dirs
                    .iter()
                    .map(|base| base.join(&name))
                    .filter(|root| root.is_dir())
                    .collect(),
                name,
            })
            .filter(|theme| !theme.roots.is_empty())
            .collect();

        debug!(
            "Темы иконок: {:?}",
            themes.iter().map(|t| t.name.as_str()).collect::<Vec<_>>()
        );

        Self {
            themes,
            legacy_dirs,
            cache: DashMap::new(),
        }
    }

    pub fn from_config(config: &IconsConfig, active_theme: Option<String>) -> Self {
        let mut base_dirs = Self::default_base_dirs();
        base_dirs.extend(config.extra_dirs.iter().cloned());
        Self::new(
            &base_dirs,
            Self::default_legacy_dirs(),
            active_theme,
            &config.fallback_themes,
        )
    }

    /// Пользовательские каталоги первыми, затем `XDG_DATA_DIRS`, затем системные
    pub fn default_base_dirs() -> Vec<PathBuf> {
        let mut dirs_list = Vec::new();
        if let Some(data_dir) = dirs::data_dir() {
            dirs_list.push(data_dir.join("icons"));
            dirs_list.push(data_dir.join("flatpak/exports/share/icons"));
        }
        if let Some(home) = dirs::home_dir() {
            dirs_list.push(home.join(".icons"));
        }

        let data_dirs = std::env::var("XDG_DATA_DIRS")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| "/usr/local/share:/usr/share".to_string());
        dirs_list.extend(
            data_dirs
                .split(':')
                .filter(|d| !d.is_empty())
                .map(|d| Path::new(d).join("icons")),
        );

        dirs_list.push(PathBuf::from("/usr/share/icons"));
        dirs_list.push(PathBuf::from("/usr/local/share/icons"));
        dirs_list.push(PathBuf::from("/var/lib/flatpak/exports/share/icons"));

        let mut unique = Vec::new();
        for dir in dirs_list {
            if !unique.contains(&dir) {
                unique.push(dir);
            }
        }
        unique
    }

    pub fn default_legacy_dirs() -> Vec<PathBuf> {
        vec![
            PathBuf::from("/usr/share/pixmaps"),
            PathBuf::from("/usr/local/share/pixmaps"),
        ]
    }

    pub fn resolve(&self, hint: &str) -> Option<PathBuf> {
        if let Some(cached) = self.cache.get(hint) {
            return cached.clone();
        }

        let resolved = self.lookup(hint);
        trace_if_enabled!("Иконка '{}' -> {:?}", hint, resolved);
        self.cache.insert(hint.to_string(), resolved.clone());
        resolved
    }

    fn lookup(&self, hint: &str) -> Option<PathBuf> {
        let hint = hint.trim();
        if hint.is_empty() {
            return None;
        }

        let path = Path::new(hint);
        if path.is_absolute() {
            if path.is_file() {
                return Some(resolve_symlinks(path));
            }
            // Несуществующий абсолютный путь: ищем по имени файла
            let stem = path.file_stem()?.to_str()?;
            return self.lookup_name(stem);
        }

        self.lookup_name(strip_image_extension(hint))
    }

    fn lookup_name(&self, name: &str) -> Option<PathBuf> {
        if name.is_empty() {
            return None;
        }
        self.lookup_themed(name)
            .or_else(|| self.lookup_legacy(name))
    }

    fn lookup_themed(&self, name: &str) -> Option<PathBuf> {
        for theme in &self.themes {
            for size in ICON_SIZES {
                // hicolor: 48x48/apps, breeze: apps/48
                let short_size = size.split('x').next().unwrap_or(size);
                for category in ICON_CATEGORIES {
                    for root in &theme.roots {
                        for dir in [root.join(size).join(category), root.join(category).join(short_size)] {
                            if !dir.is_dir() {
                                continue;
                            }
                            if let Some(found) = find_with_extensions(&dir, name) {
                                return Some(found);
                            }
                        }
                    }
                }
            }
        }
        None
    }

    fn lookup_legacy(&self, name: &str) -> Option<PathBuf> {
        self.legacy_dirs
            .iter()
            .filter(|dir| dir.is_dir())
            .find_map(|dir| find_with_extensions(dir, name))
    }
}

fn find_with_extensions(dir: &Path, name: &str) -> Option<PathBuf> {
    ICON_EXTENSIONS
        .iter()
        .map(|ext| dir.join(format!("{}.{}", name, ext)))
        .find(|candidate| candidate.is_file())
        .map(|found| resolve_symlinks(&found))
}

fn resolve_symlinks(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

fn strip_image_extension(hint: &str) -> &str {
    for ext in ICON_EXTENSIONS {
        if let Some(dot) = hint.len().checked_sub(ext.len() + 1) {
            if hint.is_char_boundary(dot)
                && hint[dot..].starts_with('.')
                && hint[dot + 1..].eq_ignore_ascii_case(ext)
            {
                return &hint[..dot];
            }
        }
    }
    hint
}

/// Векторная ли иконка (расширение `.svg` без учёта регистра)
pub fn is_svg(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("svg"))
        .unwrap_or(false)
}
