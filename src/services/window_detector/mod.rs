//! WindowDetector service: responsibility and boundaries
//!
//! This module and its submodules are responsible ONLY for discovering open windows
//! through external tools (wmctrl, xdotool, xprop), normalizing their output into
//! `WindowRecord`s and forwarding activate/close requests. It MUST NOT contain any
//! logic that associates windows with applications; that belongs to WindowMatcher.

mod dry_run;
mod filter;
mod wmctrl;
mod xdotool;
mod xprop;
mod window_detector;
mod r#trait;

pub use self::dry_run::DryRunRunner;
pub use self::filter::WindowFilter;
pub use self::r#trait::create_tool_runner;
pub use self::window_detector::WindowEnumerator;
