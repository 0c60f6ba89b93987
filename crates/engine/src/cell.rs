use std::fmt;

use crate::formula::{EvalError, Formula, FormulaFormatError};

/// What the user put in a cell.
#[derive(Debug, Clone, PartialEq)]
pub enum CellContents {
    Number(f64),
    Text(String),
    Formula(Formula),
}

/// What a cell currently shows.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Number(f64),
    Text(String),
    Error(EvalError),
}

/// Contents and value of one stored cell.
#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    pub contents: CellContents,
    pub value: CellValue,
}

pub(crate) static EMPTY_CONTENTS: CellContents = CellContents::Text(String::new());
pub(crate) static EMPTY_VALUE: CellValue = CellValue::Text(String::new());

impl CellContents {
    /// Classify raw input.
    ///
    /// Input that parses (after trimming) as a finite number is a Number.
    /// Input starting with `=` is a formula over the rest of the text; its
    /// variables are upper-cased and must satisfy `is_valid_name`. Anything
    /// else is Text, kept verbatim.
    pub fn from_input(
        raw: &str,
        is_valid_name: impl Fn(&str) -> bool,
    ) -> Result<Self, FormulaFormatError> {
        if let Ok(n) = raw.trim().parse::<f64>() {
            if n.is_finite() {
                return Ok(CellContents::Number(n));
            }
        }

        if let Some(src) = raw.strip_prefix('=') {
            let formula =
                Formula::with_rules(src, |v| Some(v.to_ascii_uppercase()), is_valid_name)?;
            return Ok(CellContents::Formula(formula));
        }

        Ok(CellContents::Text(raw.to_string()))
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, CellContents::Text(t) if t.is_empty())
    }

    pub fn is_formula(&self) -> bool {
        matches!(self, CellContents::Formula(_))
    }

    /// Cells this contents reads. Empty unless it is a formula.
    pub fn references(&self) -> Vec<String> {
        match self {
            CellContents::Formula(f) => f.variables().into_iter().map(str::to_string).collect(),
            _ => Vec::new(),
        }
    }

    /// Value before any formula is evaluated.
    pub(crate) fn initial_value(&self) -> CellValue {
        match self {
            CellContents::Number(n) => CellValue::Number(*n),
            CellContents::Text(t) => CellValue::Text(t.clone()),
            CellContents::Formula(_) => CellValue::Text(String::new()),
        }
    }
}

/// Input form: feeding this string back through [`CellContents::from_input`]
/// yields equal contents.
impl fmt::Display for CellContents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellContents::Number(n) => write!(f, "{}", n),
            CellContents::Text(t) => f.write_str(t),
            CellContents::Formula(formula) => write!(f, "={}", formula),
        }
    }
}

impl CellValue {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            CellValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, CellValue::Error(_))
    }

    /// Like `Display`, but errors show their reason instead of a marker.
    pub fn describe(&self) -> String {
        match self {
            CellValue::Error(e) => format!("{} ({})", e.marker(), e),
            other => other.to_string(),
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Number(n) => write!(f, "{}", n),
            CellValue::Text(t) => f.write_str(t),
            CellValue::Error(e) => f.write_str(e.marker()),
        }
    }
}

impl Cell {
    pub(crate) fn new(contents: CellContents) -> Self {
        let value = contents.initial_value();
        Self { contents, value }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify(raw: &str) -> CellContents {
        CellContents::from_input(raw, |_| true).unwrap()
    }

    #[test]
    fn test_classify_numbers() {
        assert_eq!(classify("42"), CellContents::Number(42.0));
        assert_eq!(classify("  3.5 "), CellContents::Number(3.5));
        assert_eq!(classify("-2"), CellContents::Number(-2.0));
        assert_eq!(classify("1e3"), CellContents::Number(1000.0));
    }

    #[test]
    fn test_classify_non_finite_is_text() {
        assert_eq!(classify("inf"), CellContents::Text("inf".to_string()));
        assert_eq!(classify("NaN"), CellContents::Text("NaN".to_string()));
    }

    #[test]
    fn test_classify_text_verbatim() {
        assert_eq!(classify("hello"), CellContents::Text("hello".to_string()));
        assert_eq!(classify("  spaced  "), CellContents::Text("  spaced  ".to_string()));
        assert_eq!(classify(""), CellContents::Text(String::new()));
        assert!(classify("").is_empty());
    }

    #[test]
    fn test_classify_formula() {
        let contents = classify("=a1 + b2");
        assert!(contents.is_formula());
        assert_eq!(contents.references(), vec!["A1", "B2"]);
        assert_eq!(contents.to_string(), "=A1+B2");
    }

    #[test]
    fn test_classify_strips_only_first_equals() {
        assert!(CellContents::from_input("==1", |_| true).is_err());
    }

    #[test]
    fn test_classify_formula_respects_validator() {
        let result = CellContents::from_input("=A1 + B1", |v| v == "A1");
        assert_eq!(
            result,
            Err(FormulaFormatError::RejectedVariable("B1".to_string()))
        );
    }

    #[test]
    fn test_display_round_trips() {
        for raw in ["7", "0.1", "1e21", "text", "=(A1+2)*B3"] {
            let contents = classify(raw);
            assert_eq!(classify(&contents.to_string()), contents);
        }
    }

    #[test]
    fn test_value_display() {
        assert_eq!(CellValue::Number(2.5).to_string(), "2.5");
        assert_eq!(CellValue::Text("hi".into()).to_string(), "hi");
        assert_eq!(CellValue::Error(EvalError::DivisionByZero).to_string(), "#DIV/0!");
        assert_eq!(
            CellValue::Error(EvalError::DivisionByZero).describe(),
            "#DIV/0! (division by zero)"
        );
    }

    #[test]
    fn test_new_cell_initial_value() {
        assert_eq!(Cell::new(classify("5")).value, CellValue::Number(5.0));
        assert_eq!(Cell::new(classify("x")).value, CellValue::Text("x".to_string()));
        assert_eq!(Cell::new(classify("=1")).value, CellValue::Text(String::new()));
    }
}
