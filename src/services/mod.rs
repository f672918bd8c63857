pub mod catalog;
pub mod icons;
pub mod matcher;
pub mod tool_runner;
pub mod window_detector;
pub mod window_service;

pub use catalog::{ApplicationCatalog, CatalogEntries};
pub use icons::{detect_active_theme, IconResolver};
pub use matcher::WindowMatcher;
pub use tool_runner::{SystemToolRunner, ToolRunner};
pub use window_detector::{create_tool_runner, DryRunRunner, WindowEnumerator, WindowFilter};
pub use window_service::WindowService;
