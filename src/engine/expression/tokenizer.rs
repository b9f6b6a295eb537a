// SPDX-License-Identifier: MIT

//! Expression validation and tokenization
//!
//! Accepted input consists of digits, whitespace, the four binary operators
//! and parentheses. Parentheses pass validation but are dropped during
//! tokenization; they do not change precedence.

use super::token::Token;
use crate::common::{CalcError, Result};
use crate::engine::model::Operator;

fn is_allowed(c: char) -> bool {
    c.is_ascii_digit() || c.is_whitespace() || Operator::from_char(c).is_some() || c == '(' || c == ')'
}

/// Check an expression string against the accepted character set
pub fn validate(input: &str) -> Result<()> {
    if input.trim().is_empty() {
        return Err(CalcError::invalid_expression("expression is empty"));
    }

    if let Some((pos, c)) = input.char_indices().find(|(_, c)| !is_allowed(*c)) {
        return Err(CalcError::invalid_expression(format!(
            "unexpected character '{}' at position {}",
            c, pos
        )));
    }

    Ok(())
}

/// Split an expression into numbers and operators, left to right
pub fn tokenize(input: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = input.char_indices().peekable();

    while let Some((pos, c)) = chars.next() {
        if c.is_ascii_digit() {
            let mut end = pos + c.len_utf8();
            while let Some(&(next_pos, next)) = chars.peek() {
                if !next.is_ascii_digit() {
                    break;
                }
                end = next_pos + next.len_utf8();
                chars.next();
            }
            let literal = &input[pos..end];
            let value = literal.parse::<f64>().map_err(|e| {
                CalcError::invalid_expression(format!("bad number '{}': {}", literal, e))
            })?;
            if !value.is_finite() {
                return Err(CalcError::invalid_expression(format!(
                    "number at position {} is out of range",
                    pos
                )));
            }
            tokens.push(Token::Number(value));
        } else if let Some(op) = Operator::from_char(c) {
            tokens.push(Token::Op(op));
        } else if c.is_whitespace() || c == '(' || c == ')' {
            continue;
        } else {
            return Err(CalcError::invalid_expression(format!(
                "unexpected character '{}' at position {}",
                c, pos
            )));
        }
    }

    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_simple() {
        let tokens = tokenize("2 + 3 * 4").unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::Number(2.0),
                Token::Op(Operator::Add),
                Token::Number(3.0),
                Token::Op(Operator::Multiply),
                Token::Number(4.0),
            ]
        );
    }

    #[test]
    fn test_tokenize_multi_digit_without_spaces() {
        let tokens = tokenize("12*305-7").unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::Number(12.0),
                Token::Op(Operator::Multiply),
                Token::Number(305.0),
                Token::Op(Operator::Subtract),
                Token::Number(7.0),
            ]
        );
    }

    #[test]
    fn test_tokenize_drops_parentheses() {
        let tokens = tokenize("(1 + 2) / 3").unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::Number(1.0),
                Token::Op(Operator::Add),
                Token::Number(2.0),
                Token::Op(Operator::Divide),
                Token::Number(3.0),
            ]
        );
    }

    #[test]
    fn test_tokenize_rejects_unknown_character() {
        let err = tokenize("2 ^ 3").unwrap_err();
        assert!(matches!(err, CalcError::InvalidExpression(_)));
    }

    #[test]
    fn test_tokenize_rejects_out_of_range_literal() {
        let huge = format!("1{}", "0".repeat(400));
        let err = tokenize(&huge).unwrap_err();
        assert!(matches!(err, CalcError::InvalidExpression(_)));

        let err = tokenize(&format!("{} + 1", huge)).unwrap_err();
        assert!(matches!(err, CalcError::InvalidExpression(_)));

        let big = format!("1{}", "0".repeat(300));
        assert_eq!(tokenize(&big).unwrap(), vec![Token::Number(1e300)]);
    }

    #[test]
    fn test_validate_accepts_grammar() {
        assert!(validate("1 + (2 * 3) - 4 / 5").is_ok());
        assert!(validate("42").is_ok());
    }

    #[test]
    fn test_validate_rejects_letters_and_decimals() {
        assert!(matches!(
            validate("2 + x"),
            Err(CalcError::InvalidExpression(_))
        ));
        assert!(matches!(
            validate("1.5 + 2"),
            Err(CalcError::InvalidExpression(_))
        ));
    }

    #[test]
    fn test_validate_rejects_empty() {
        assert!(validate("").is_err());
        assert!(validate("   ").is_err());
    }
}
