// SPDX-License-Identifier: MIT

//! Persistence for expressions and tasks
//!
//! This module provides:
//! - `ExpressionStore` - plain CRUD over expression records
//! - `TaskStore` - bulk task creation, the readiness claim and the result cascade
//! - `SqliteStore` - a rusqlite-backed implementation of both
//!
//! Every mutating operation runs in its own transaction; a failure leaves the
//! store exactly as it was before the call.

mod schema;
mod sqlite;

pub use sqlite::SqliteStore;

use crate::common::Result;
use crate::engine::model::{CascadeOutcome, Expression, ExpressionStatus, Task};

pub trait ExpressionStore: Send + Sync {
    /// Insert a new expression record
    fn create(&self, expression: &Expression) -> Result<()>;

    /// Move an expression forward in its lifecycle. Status never regresses,
    /// and a terminal expression only accepts an identical update.
    fn update_status_and_result(
        &self,
        id: &str,
        status: ExpressionStatus,
        result: Option<f64>,
    ) -> Result<()>;

    /// Fails with `NotFound` for unknown ids
    fn get(&self, id: &str) -> Result<Expression>;

    fn list(&self) -> Result<Vec<Expression>>;

    /// Remove an expression and any tasks it owns; unknown ids are a no-op
    fn delete(&self, id: &str) -> Result<()>;
}

pub trait TaskStore: Send + Sync {
    /// Insert one expression's task batch, all or nothing
    fn create_all(&self, tasks: &[Task]) -> Result<()>;

    /// Return one ready task without changing its state, or `None`
    ///
    /// Claiming is advisory: the same task can be handed out again until a
    /// result for it is applied.
    fn claim_next_ready(&self) -> Result<Option<Task>>;

    /// Record a task result, substitute it into dependents and complete the
    /// owning expression when nothing is left unresolved
    ///
    /// Fails with `UnknownTask` for ids the store has never seen. A second
    /// submission for an already-resolved task is accepted and ignored.
    fn apply_result(&self, task_id: &str, value: f64) -> Result<CascadeOutcome>;

    /// Mark a task as unable to produce a result and fail its expression
    ///
    /// Every other unsettled task of the expression is failed with it, so none
    /// of them is dispatched again. Settled tasks are left alone and the call
    /// is ignored, as with `apply_result`.
    fn fail_task(&self, task_id: &str, reason: &str) -> Result<CascadeOutcome>;

    /// Fails with `UnknownTask` for ids the store has never seen
    fn get_task(&self, task_id: &str) -> Result<Task>;

    /// All tasks of one expression in emission order
    fn tasks_for_expression(&self, expression_id: &str) -> Result<Vec<Task>>;
}
