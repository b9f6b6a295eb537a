// SPDX-License-Identifier: MIT

//! Decomposition and resolution engine
//!
//! Expression text flows through `expression` into tasks, which are persisted
//! by a `store`. Workers pull ready tasks through `dispatch` and feed results
//! back, which cascades through dependents until the expression completes.

pub mod calculator;
pub mod config;
pub mod dispatch;
pub mod expression;
pub mod model;
pub mod store;

pub use calculator::Calculator;
pub use dispatch::{Dispatcher, SubmitRequest, TaskDescriptor, TaskReport};
