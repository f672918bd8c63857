//! Ядро док-панели для Linux: обнаружение открытых окон через wmctrl/xdotool/xprop,
//! сопоставление окон с приложениями из .desktop файлов, поиск иконок и
//! публикация списка окон подписчикам по мере его изменения.

pub mod config;
pub mod error;
pub mod events;
pub mod services;
pub mod utils;

pub use config::Config;
pub use error::{DockError, Result};
pub use events::{ApplicationDescriptor, MatchResult, WindowId, WindowList, WindowRecord};
pub use services::WindowService;
