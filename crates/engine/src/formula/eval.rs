// Formula evaluation - operand/operator stacks over the validated tokens
// * and / apply as soon as their right operand is known
// + and - wait until the next + or -, a closing ')' or the end

use super::parser::Formula;
use super::tokenizer::{Operator, Token};

/// Why a formula could not produce a number. Recovered into a cell value,
/// never propagated as a failure of the edit that triggered evaluation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EvalError {
    #[error("undefined variable '{0}'")]
    UndefinedVariable(String),

    #[error("division by zero")]
    DivisionByZero,

    #[error("malformed expression")]
    MalformedExpression,
}

impl EvalError {
    /// Short marker shown in place of a value.
    pub fn marker(&self) -> &'static str {
        match self {
            EvalError::UndefinedVariable(_) => "#REF!",
            EvalError::DivisionByZero => "#DIV/0!",
            EvalError::MalformedExpression => "#ERROR!",
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Pending {
    Op(Operator),
    LParen,
}

#[derive(Default)]
struct Stacks {
    values: Vec<f64>,
    ops: Vec<Pending>,
}

impl Stacks {
    fn top_op(&self) -> Option<Operator> {
        match self.ops.last() {
            Some(Pending::Op(op)) => Some(*op),
            _ => None,
        }
    }

    fn pop_value(&mut self) -> Result<f64, EvalError> {
        self.values.pop().ok_or(EvalError::MalformedExpression)
    }

    /// Pop one operator and two operands, push the result.
    fn reduce(&mut self) -> Result<(), EvalError> {
        let Some(Pending::Op(op)) = self.ops.pop() else {
            return Err(EvalError::MalformedExpression);
        };
        let right = self.pop_value()?;
        let left = self.pop_value()?;
        self.values.push(apply(op, left, right)?);
        Ok(())
    }

    fn reduce_if(&mut self, pred: impl Fn(Operator) -> bool) -> Result<(), EvalError> {
        if self.top_op().is_some_and(pred) {
            self.reduce()?;
        }
        Ok(())
    }

    fn push_operand(&mut self, value: f64) -> Result<(), EvalError> {
        self.values.push(value);
        self.reduce_if(Operator::is_multiplicative)
    }
}

fn apply(op: Operator, left: f64, right: f64) -> Result<f64, EvalError> {
    Ok(match op {
        Operator::Add => left + right,
        Operator::Sub => left - right,
        Operator::Mul => left * right,
        Operator::Div => {
            if right == 0.0 {
                return Err(EvalError::DivisionByZero);
            }
            left / right
        }
    })
}

impl Formula {
    /// Evaluate with `lookup` supplying variable values.
    ///
    /// `lookup` is called once per variable occurrence, left to right, and
    /// evaluation stops at the first variable it cannot resolve.
    pub fn evaluate<L>(&self, mut lookup: L) -> Result<f64, EvalError>
    where
        L: FnMut(&str) -> Option<f64>,
    {
        let mut stacks = Stacks::default();

        for token in self.tokens() {
            match token {
                Token::Number { value, .. } => stacks.push_operand(*value)?,
                Token::Var(name) => {
                    let value =
                        lookup(name).ok_or_else(|| EvalError::UndefinedVariable(name.clone()))?;
                    stacks.push_operand(value)?;
                }
                Token::Op(op) if op.is_multiplicative() => stacks.ops.push(Pending::Op(*op)),
                Token::Op(op) => {
                    stacks.reduce_if(|top| !top.is_multiplicative())?;
                    stacks.ops.push(Pending::Op(*op));
                }
                Token::LParen => stacks.ops.push(Pending::LParen),
                Token::RParen => {
                    stacks.reduce_if(|top| !top.is_multiplicative())?;
                    match stacks.ops.pop() {
                        Some(Pending::LParen) => {}
                        _ => return Err(EvalError::MalformedExpression),
                    }
                    stacks.reduce_if(Operator::is_multiplicative)?;
                }
                Token::Invalid(_) => return Err(EvalError::MalformedExpression),
            }
        }

        stacks.reduce_if(|top| !top.is_multiplicative())?;

        match (stacks.values.as_slice(), stacks.ops.is_empty()) {
            ([result], true) => Ok(*result),
            _ => Err(EvalError::MalformedExpression),
        }
    }
}
