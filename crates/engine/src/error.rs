use crate::formula::FormulaFormatError;
use crate::recalc::CycleReport;

/// A rejected sheet operation. The sheet is unchanged when one is returned.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SheetError {
    #[error("invalid cell name '{0}'")]
    InvalidName(String),

    #[error("invalid formula: {0}")]
    FormulaFormat(#[from] FormulaFormatError),

    #[error("{0}")]
    CircularDependency(#[from] CycleReport),
}
