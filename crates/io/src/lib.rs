// Sheet persistence

pub mod xml;

pub use xml::{load_from_path, load_sheet, save_sheet, save_to_path, SaveError, SheetLoadError};

/// File extension used for sheet files.
pub const SHEET_EXTENSION: &str = "ss";
