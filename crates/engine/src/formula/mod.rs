// Formula tokenizing, validation and evaluation

pub mod tokenizer;
pub mod parser;
pub mod eval;

pub use eval::EvalError;
pub use parser::{Formula, FormulaFormatError};
pub use tokenizer::{tokenize, Operator, Token, Tokens};
