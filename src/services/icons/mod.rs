mod resolver;
mod theme;

pub use resolver::{is_svg, IconResolver};
pub use theme::detect_active_theme;
