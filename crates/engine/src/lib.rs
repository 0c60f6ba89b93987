pub mod cell;
pub mod cell_name;
pub mod dep_graph;
pub mod error;
pub mod formula;
pub mod recalc;
pub mod sheet;

pub use cell::{Cell, CellContents, CellValue};
pub use cell_name::NameValidator;
pub use error::SheetError;
pub use sheet::Spreadsheet;
