// Formula tokenizer - splits formula text into a lazy token stream
// Tokens: ( ) + - * / variables (x, A1, ab12) numbers (3, 2.5, .5, 1e9)
// Anything else is collected into an Invalid run and rejected by the parser

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Add,
    Sub,
    Mul,
    Div,
}

impl Operator {
    pub fn symbol(self) -> char {
        match self {
            Operator::Add => '+',
            Operator::Sub => '-',
            Operator::Mul => '*',
            Operator::Div => '/',
        }
    }

    /// `*` and `/` bind tighter than `+` and `-`.
    pub fn is_multiplicative(self) -> bool {
        matches!(self, Operator::Mul | Operator::Div)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    LParen,
    RParen,
    Op(Operator),
    Var(String),
    /// Number literal. `text` is the source spelling, kept so the formula
    /// prints back the way it was written.
    Number { text: String, value: f64 },
    /// A run of characters that cannot start any other token.
    Invalid(String),
}

impl Token {
    /// Number, variable or `(`.
    pub fn starts_operand(&self) -> bool {
        matches!(self, Token::Number { .. } | Token::Var(_) | Token::LParen)
    }

    /// Number, variable or `)`.
    pub fn ends_operand(&self) -> bool {
        matches!(self, Token::Number { .. } | Token::Var(_) | Token::RParen)
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::LParen => f.write_str("("),
            Token::RParen => f.write_str(")"),
            Token::Op(op) => write!(f, "{}", op.symbol()),
            Token::Var(name) => f.write_str(name),
            Token::Number { text, .. } => f.write_str(text),
            Token::Invalid(text) => f.write_str(text),
        }
    }
}

/// Lazy token stream over formula text. Call [`tokenize`] again to restart.
#[derive(Debug, Clone)]
pub struct Tokens<'a> {
    src: &'a str,
    pos: usize,
}

/// Tokenize formula text. Whitespace is skipped and never produces a token.
pub fn tokenize(src: &str) -> Tokens<'_> {
    Tokens { src, pos: 0 }
}

/// Returns true if `s` is exactly one variable token: an ASCII letter
/// followed by ASCII letters or digits.
pub fn is_variable(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() => chars.all(|c| c.is_ascii_alphanumeric()),
        _ => false,
    }
}

impl<'a> Tokens<'a> {
    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    /// Length in bytes of the number literal at the start of `s`, if any.
    fn number_len(s: &str) -> Option<usize> {
        let bytes = s.as_bytes();
        let digits = |from: usize| {
            bytes[from..]
                .iter()
                .take_while(|b| b.is_ascii_digit())
                .count()
        };

        let int_len = digits(0);
        let mut len = int_len;
        if bytes.get(len) == Some(&b'.') {
            let frac_len = digits(len + 1);
            if int_len == 0 && frac_len == 0 {
                return None;
            }
            len += 1 + frac_len;
        } else if int_len == 0 {
            return None;
        }

        // Lower-case exponent only, and only if at least one digit follows
        if bytes.get(len) == Some(&b'e') {
            let mut exp = len + 1;
            if matches!(bytes.get(exp), Some(b'+' | b'-')) {
                exp += 1;
            }
            let exp_digits = digits(exp);
            if exp_digits > 0 {
                len = exp + exp_digits;
            }
        }

        Some(len)
    }

    /// True if a token (or whitespace) begins at the start of `s`.
    fn starts_token(s: &str) -> bool {
        match s.chars().next() {
            Some(c) if c.is_whitespace() => true,
            Some('(' | ')' | '+' | '-' | '*' | '/') => true,
            Some(c) if c.is_ascii_alphanumeric() => true,
            Some('.') => Self::number_len(s).is_some(),
            _ => false,
        }
    }
}

impl Iterator for Tokens<'_> {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        let trimmed = self.rest().trim_start();
        self.pos = self.src.len() - trimmed.len();

        let c = trimmed.chars().next()?;
        let simple = match c {
            '(' => Some(Token::LParen),
            ')' => Some(Token::RParen),
            '+' => Some(Token::Op(Operator::Add)),
            '-' => Some(Token::Op(Operator::Sub)),
            '*' => Some(Token::Op(Operator::Mul)),
            '/' => Some(Token::Op(Operator::Div)),
            _ => None,
        };
        if let Some(token) = simple {
            self.pos += 1;
            return Some(token);
        }

        if c.is_ascii_alphabetic() {
            let len = trimmed
                .bytes()
                .take_while(|b| b.is_ascii_alphanumeric())
                .count();
            self.pos += len;
            return Some(Token::Var(trimmed[..len].to_string()));
        }

        if let Some(len) = Self::number_len(trimmed) {
            let text = &trimmed[..len];
            self.pos += len;
            // number_len only accepts shapes f64 parsing understands
            let value = text.parse::<f64>().unwrap_or(f64::NAN);
            return Some(Token::Number {
                text: text.to_string(),
                value,
            });
        }

        // Invalid run: everything up to the next character that starts a token
        let mut len = 0;
        for (i, ch) in trimmed.char_indices() {
            if i > 0 && Self::starts_token(&trimmed[i..]) {
                break;
            }
            len = i + ch.len_utf8();
        }
        self.pos += len;
        Some(Token::Invalid(trimmed[..len].to_string()))
    }
}
