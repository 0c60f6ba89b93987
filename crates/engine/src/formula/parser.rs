// Formula construction - grammar validation and variable normalization
// A Formula is an immutable, validated token sequence. There is no AST:
// evaluation walks the tokens directly (see eval.rs).

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use super::tokenizer::{is_variable, tokenize, Token};

/// Why formula text was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FormulaFormatError {
    #[error("formula is empty")]
    Empty,

    #[error("invalid token '{0}'")]
    InvalidToken(String),

    #[error("formula cannot start with '{0}'")]
    InvalidStart(String),

    #[error("formula cannot end with '{0}'")]
    InvalidEnd(String),

    #[error("')' has no matching '('")]
    UnmatchedClose,

    #[error("'{token}' cannot follow '{after}'")]
    UnexpectedToken { token: String, after: String },

    #[error("unbalanced parentheses: {open} '(' vs {close} ')'")]
    UnbalancedParens { open: usize, close: usize },

    #[error("variable '{0}' could not be normalized")]
    NormalizeFailed(String),

    #[error("variable '{original}' normalizes to '{normalized}', which is not a variable")]
    NormalizedNotVariable { original: String, normalized: String },

    #[error("variable '{0}' is not allowed here")]
    RejectedVariable(String),
}

/// A validated formula in the four-operator expression language.
///
/// Variable tokens are stored in normalized form. Two formulas are equal
/// when their normalized token sequences are equal.
#[derive(Debug, Clone, PartialEq)]
pub struct Formula {
    tokens: Vec<Token>,
}

impl Formula {
    /// Parse with identity normalization and no extra variable check.
    pub fn parse(src: &str) -> Result<Self, FormulaFormatError> {
        Self::with_rules(src, |v| Some(v.to_string()), |_| true)
    }

    /// Parse, normalizing every variable with `normalize` and checking the
    /// normalized name with `is_valid`.
    ///
    /// `normalize` returning `None` rejects the formula. The normalized name
    /// must itself lex as a variable.
    pub fn with_rules<N, V>(src: &str, normalize: N, is_valid: V) -> Result<Self, FormulaFormatError>
    where
        N: Fn(&str) -> Option<String>,
        V: Fn(&str) -> bool,
    {
        let mut tokens: Vec<Token> = Vec::new();
        let mut depth: usize = 0;
        let mut opens: usize = 0;
        let mut closes: usize = 0;

        for token in tokenize(src) {
            if let Token::Invalid(text) = &token {
                return Err(FormulaFormatError::InvalidToken(text.clone()));
            }

            match tokens.last() {
                None if !token.starts_operand() => {
                    return Err(FormulaFormatError::InvalidStart(token.to_string()));
                }
                Some(prev) if token.starts_operand() && prev.ends_operand() => {
                    return Err(FormulaFormatError::UnexpectedToken {
                        token: token.to_string(),
                        after: prev.to_string(),
                    });
                }
                Some(prev) if !token.starts_operand() && !prev.ends_operand() => {
                    return Err(FormulaFormatError::UnexpectedToken {
                        token: token.to_string(),
                        after: prev.to_string(),
                    });
                }
                _ => {}
            }

            let token = match token {
                Token::LParen => {
                    depth += 1;
                    opens += 1;
                    Token::LParen
                }
                Token::RParen => {
                    depth = depth.checked_sub(1).ok_or(FormulaFormatError::UnmatchedClose)?;
                    closes += 1;
                    Token::RParen
                }
                Token::Var(name) => Token::Var(normalize_variable(&name, &normalize, &is_valid)?),
                other => other,
            };
            tokens.push(token);
        }

        match tokens.last() {
            None => return Err(FormulaFormatError::Empty),
            Some(last) if !last.ends_operand() => {
                return Err(FormulaFormatError::InvalidEnd(last.to_string()));
            }
            _ => {}
        }

        if opens != closes {
            return Err(FormulaFormatError::UnbalancedParens {
                open: opens,
                close: closes,
            });
        }

        Ok(Self { tokens })
    }

    /// The distinct normalized variables, in sorted order.
    pub fn variables(&self) -> BTreeSet<&str> {
        self.tokens
            .iter()
            .filter_map(|t| match t {
                Token::Var(name) => Some(name.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }
}

fn normalize_variable<N, V>(name: &str, normalize: &N, is_valid: &V) -> Result<String, FormulaFormatError>
where
    N: Fn(&str) -> Option<String>,
    V: Fn(&str) -> bool,
{
    let normalized =
        normalize(name).ok_or_else(|| FormulaFormatError::NormalizeFailed(name.to_string()))?;
    if !is_variable(&normalized) {
        return Err(FormulaFormatError::NormalizedNotVariable {
            original: name.to_string(),
            normalized,
        });
    }
    if !is_valid(&normalized) {
        return Err(FormulaFormatError::RejectedVariable(normalized));
    }
    Ok(normalized)
}

/// Canonical form: normalized tokens with no separators.
impl fmt::Display for Formula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for token in &self.tokens {
            write!(f, "{}", token)?;
        }
        Ok(())
    }
}

impl FromStr for Formula {
    type Err = FormulaFormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
