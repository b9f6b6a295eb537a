// SPDX-License-Identifier: MIT

//! Expression intake: validation, decomposition and persistence

use std::sync::Arc;

use crate::common::{CalcError, Result};
use crate::engine::expression::{self, Decomposition};
use crate::engine::model::{Expression, ExpressionStatus};
use crate::engine::store::{ExpressionStore, TaskStore};

/// Accepts expressions from owners and serves them back
#[derive(Clone)]
pub struct Calculator {
    expressions: Arc<dyn ExpressionStore>,
    tasks: Arc<dyn TaskStore>,
}

impl Calculator {
    pub fn new(expressions: Arc<dyn ExpressionStore>, tasks: Arc<dyn TaskStore>) -> Self {
        Self { expressions, tasks }
    }

    /// Decompose `text` and persist the expression with its tasks
    ///
    /// An expression without operators completes immediately with its literal
    /// value, since it produces no task that could ever complete it.
    pub fn submit(&self, owner_id: i64, text: &str) -> Result<Expression> {
        let mut expr = Expression::new(owner_id, text);

        let decomposition = expression::parse(text, &expr.id).map_err(|e| {
            if matches!(e, CalcError::MalformedExpression(_)) {
                log::error!("Decomposition fault for {:?}: {}", text, e);
            }
            e
        })?;
        expr.root_task_id = decomposition.root_task_id().map(str::to_string);

        self.expressions.create(&expr)?;

        if let Err(e) = self.activate(&mut expr, &decomposition) {
            log::error!("Failed to persist expression {}: {}", expr.id, e);
            if let Err(cleanup) = self.expressions.delete(&expr.id) {
                log::error!("Failed to remove expression {}: {}", expr.id, cleanup);
            }
            return Err(e);
        }

        log::info!(
            "Accepted expression {} from owner {} ({} task(s))",
            expr.id,
            owner_id,
            decomposition.tasks.len()
        );
        Ok(expr)
    }

    /// Store the task batch (or the literal value) and move the expression on
    fn activate(&self, expr: &mut Expression, decomposition: &Decomposition) -> Result<()> {
        match decomposition.literal_value() {
            Some(value) => {
                self.expressions.update_status_and_result(
                    &expr.id,
                    ExpressionStatus::Completed,
                    Some(value),
                )?;
                expr.status = ExpressionStatus::Completed;
                expr.result = Some(value);
            }
            None => {
                self.tasks.create_all(&decomposition.tasks)?;
                self.expressions.update_status_and_result(
                    &expr.id,
                    ExpressionStatus::InProgress,
                    None,
                )?;
                expr.status = ExpressionStatus::InProgress;
            }
        }
        Ok(())
    }

    /// Fetch one of the owner's expressions; other owners' records read as missing
    pub fn get(&self, owner_id: i64, id: &str) -> Result<Expression> {
        let expr = self.expressions.get(id)?;
        if expr.owner_id != owner_id {
            return Err(CalcError::not_found("expression", id));
        }
        Ok(expr)
    }

    pub fn list(&self, owner_id: i64) -> Result<Vec<Expression>> {
        Ok(self
            .expressions
            .list()?
            .into_iter()
            .filter(|e| e.owner_id == owner_id)
            .collect())
    }
}
