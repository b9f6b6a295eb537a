// SPDX-License-Identifier: MIT

//! Arithmetic expression handling
//!
//! This module turns expression text into tasks:
//! - `validate` / `tokenize` - character-level checks and lexing
//! - `decompose` - two-pass fold of tokens into a task DAG

mod decomposer;
mod token;
mod tokenizer;

pub use decomposer::{decompose, Decomposition};
pub use token::Token;
pub use tokenizer::{tokenize, validate};

use crate::common::Result;

/// Validate, tokenize and decompose `input` for the expression `expression_id`
pub fn parse(input: &str, expression_id: &str) -> Result<Decomposition> {
    validate(input)?;
    let tokens = tokenize(input)?;
    decompose(&tokens, expression_id)
}
