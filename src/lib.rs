// SPDX-License-Identifier: MIT

//! Distributed arithmetic expression orchestrator
//!
//! Expressions are decomposed into binary tasks that external workers pull,
//! compute and push back; results cascade until the expression resolves.

pub mod common;
pub mod engine;
pub mod server;
pub mod worker;

pub use common::{CalcError, Result};
