pub mod application;
pub mod window;

pub use application::ApplicationDescriptor;
pub use window::{MatchResult, MatchStrategy, SnapshotKey, WindowId, WindowRecord};

use std::sync::Arc;

/// Опубликованный список окон, который получает UI слой
pub type WindowList = Arc<Vec<MatchResult>>;
