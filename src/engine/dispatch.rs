// SPDX-License-Identifier: MIT

//! Worker-facing adapters: handing out ready tasks and accepting results

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use crate::common::{CalcError, Result};
use crate::engine::config::OperationTimes;
use crate::engine::model::{CascadeOutcome, Operator, Task};
use crate::engine::store::TaskStore;

/// What a worker receives for a ready task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskDescriptor {
    pub id: String,
    pub arg1: f64,
    pub arg2: f64,
    pub operation: Operator,
    pub operation_time_ms: u64,
    pub expression_id: String,
}

impl TaskDescriptor {
    pub fn from_task(task: &Task, times: &OperationTimes) -> Result<Self> {
        match (task.arg1.as_literal(), task.arg2.as_literal()) {
            (Some(arg1), Some(arg2)) => Ok(Self {
                id: task.id.clone(),
                arg1,
                arg2,
                operation: task.operation,
                operation_time_ms: times.for_operator(task.operation),
                expression_id: task.expression_id.clone(),
            }),
            _ => Err(CalcError::Other(format!(
                "task {} still has unresolved operands",
                task.id
            ))),
        }
    }
}

/// What a worker reports back for a task
#[derive(Debug, Clone, PartialEq)]
pub enum TaskReport {
    Result(f64),
    /// The task cannot produce a number (division by zero, overflow)
    Failed(String),
}

/// A validated submission: `{"id", "result"}` or `{"id", "error"}`
#[derive(Debug, Clone, PartialEq)]
pub struct SubmitRequest {
    pub id: String,
    pub report: TaskReport,
}

impl SubmitRequest {
    pub fn result(id: impl Into<String>, value: f64) -> Self {
        Self {
            id: id.into(),
            report: TaskReport::Result(value),
        }
    }

    pub fn failure(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            report: TaskReport::Failed(reason.into()),
        }
    }

    /// Validate a raw submission payload
    pub fn from_json(payload: &Value) -> Result<Self> {
        let obj = payload
            .as_object()
            .ok_or_else(|| CalcError::invalid_payload("expected a JSON object"))?;

        let id = match obj.get("id") {
            Some(Value::String(s)) if !s.trim().is_empty() => s.clone(),
            None | Some(Value::Null) | Some(Value::String(_)) => {
                return Err(CalcError::invalid_payload("missing task id"))
            }
            Some(_) => return Err(CalcError::invalid_payload("task id must be a string")),
        };

        let result = obj.get("result").filter(|v| !v.is_null());
        let error = obj.get("error").filter(|v| !v.is_null());

        let report = match (result, error) {
            (Some(_), Some(_)) => {
                return Err(CalcError::invalid_payload(
                    "submit either a result or an error, not both",
                ))
            }
            (Some(Value::Number(n)), None) => TaskReport::Result(
                n.as_f64()
                    .ok_or_else(|| CalcError::invalid_payload("result is not representable"))?,
            ),
            (Some(_), None) => return Err(CalcError::invalid_payload("result must be a number")),
            (None, Some(Value::String(reason))) if !reason.trim().is_empty() => {
                TaskReport::Failed(reason.clone())
            }
            (None, Some(_)) => {
                return Err(CalcError::invalid_payload("error must be a non-empty string"))
            }
            (None, None) => return Err(CalcError::invalid_payload("missing result")),
        };

        Ok(Self { id, report })
    }
}

/// Dispatch (`next`) and submission (`accept`) over a task store
#[derive(Clone)]
pub struct Dispatcher {
    tasks: Arc<dyn TaskStore>,
    times: OperationTimes,
}

impl Dispatcher {
    pub fn new(tasks: Arc<dyn TaskStore>, times: OperationTimes) -> Self {
        Self { tasks, times }
    }

    /// Next ready task, or `None` when nothing is ready
    pub fn next(&self) -> Result<Option<TaskDescriptor>> {
        match self.tasks.claim_next_ready()? {
            Some(task) => {
                log::debug!("Dispatching task {} ({})", task.id, task.operation);
                TaskDescriptor::from_task(&task, &self.times).map(Some)
            }
            None => Ok(None),
        }
    }

    /// Apply a worker's report and cascade it through the expression
    ///
    /// A non-finite result fails the task, the same as an explicit error.
    pub fn accept(&self, request: &SubmitRequest) -> Result<CascadeOutcome> {
        let outcome = match &request.report {
            TaskReport::Result(value) if value.is_finite() => {
                self.tasks.apply_result(&request.id, *value)?
            }
            TaskReport::Result(value) => self
                .tasks
                .fail_task(&request.id, &format!("non-finite result {}", value))?,
            TaskReport::Failed(reason) => self.tasks.fail_task(&request.id, reason)?,
        };

        if outcome.expression_completed {
            log::info!(
                "Expression {} completed with result {:?}",
                outcome.expression_id,
                outcome.expression_result
            );
        } else if outcome.expression_failed {
            log::info!("Expression {} failed", outcome.expression_id);
        }
        Ok(outcome)
    }
}
