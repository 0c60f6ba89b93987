//! Cell names.
//!
//! A cell name is one or more ASCII letters (the column) followed by a
//! row number without leading zeros: `A1`, `zz10`, `BC300`. Names are
//! case-insensitive; the canonical form is upper case.
//!
//! A sheet may narrow the accepted names further with a [`NameValidator`].

use regex::Regex;
use std::cmp::Ordering;

/// Returns true if `name` has the shape letters + non-zero digit + digits.
pub fn is_structurally_valid(name: &str) -> bool {
    match split(name) {
        Some((_, row)) => !row.starts_with('0'),
        None => false,
    }
}

/// Canonical (upper-case) form of a cell name.
pub fn canonicalize(name: &str) -> String {
    name.to_ascii_uppercase()
}

/// Split a name into its column letters and row digits.
///
/// Returns `None` unless both parts are non-empty and nothing else follows.
pub fn split(name: &str) -> Option<(&str, &str)> {
    let letters = name.bytes().take_while(u8::is_ascii_alphabetic).count();
    let (col, row) = name.split_at(letters);
    if col.is_empty() || row.is_empty() || !row.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some((col, row))
}

/// Compare two names by position: column first (A < Z < AA), then row.
///
/// Names that are not structurally valid sort after valid ones, by text.
pub fn position_cmp(a: &str, b: &str) -> Ordering {
    // With no leading zeros, comparing (length, text) orders both parts
    // numerically without parsing, so arbitrarily long names cannot overflow.
    fn key(name: &str) -> Option<(usize, String, usize, &str)> {
        let (col, row) = split(name)?;
        Some((col.len(), col.to_ascii_uppercase(), row.len(), row))
    }

    match (key(a), key(b)) {
        (Some(ka), Some(kb)) => ka.cmp(&kb),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.cmp(b),
    }
}

/// Extra constraint on cell names, expressed as a regular expression over
/// the canonical name.
///
/// Matching follows `Regex::is_match`, so unanchored patterns accept any
/// name containing a match. The pattern is persisted alongside the sheet.
#[derive(Debug, Clone)]
pub struct NameValidator {
    pattern: String,
    /// `None` accepts everything (the default pattern).
    regex: Option<Regex>,
}

impl NameValidator {
    /// Pattern of the validator that accepts every name.
    pub const ACCEPT_ALL: &'static str = "^.*$";

    /// Validator that accepts every structurally valid name.
    pub fn accept_all() -> Self {
        Self {
            pattern: Self::ACCEPT_ALL.to_string(),
            regex: None,
        }
    }

    /// Compile a validator from a regular expression.
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        if pattern == Self::ACCEPT_ALL {
            return Ok(Self::accept_all());
        }
        Ok(Self {
            pattern: pattern.to_string(),
            regex: Some(Regex::new(pattern)?),
        })
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn accepts(&self, canonical_name: &str) -> bool {
        self.regex
            .as_ref()
            .map_or(true, |re| re.is_match(canonical_name))
    }
}

impl Default for NameValidator {
    fn default() -> Self {
        Self::accept_all()
    }
}

impl PartialEq for NameValidator {
    fn eq(&self, other: &Self) -> bool {
        self.pattern == other.pattern
    }
}
