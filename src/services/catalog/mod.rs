mod catalog;
mod desktop_entry;

pub use catalog::{ApplicationCatalog, CatalogEntries};
pub use desktop_entry::{parse_desktop_entry, DesktopEntry};
