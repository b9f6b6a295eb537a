// SPDX-License-Identifier: MIT

//! Tokens produced by the tokenizer

use std::fmt;

use crate::engine::model::Operator;

/// A single lexical item of an arithmetic expression
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Token {
    /// A run of digits
    Number(f64),
    /// One of `+ - * /`
    Op(Operator),
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Number(n) => write!(f, "{}", n),
            Token::Op(op) => write!(f, "{}", op),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_display() {
        assert_eq!(format!("{}", Token::Number(42.0)), "42");
        assert_eq!(format!("{}", Token::Op(Operator::Divide)), "/");
    }
}
