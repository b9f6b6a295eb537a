// SPDX-License-Identifier: MIT

//! Expression and task records shared by the decomposer, the stores and the adapters

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::common::CalcError;

/// Binary operators understood by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    #[serde(rename = "+")]
    Add,
    #[serde(rename = "-")]
    Subtract,
    #[serde(rename = "*")]
    Multiply,
    #[serde(rename = "/")]
    Divide,
}

impl Operator {
    pub fn from_char(c: char) -> Option<Self> {
        match c {
            '+' => Some(Operator::Add),
            '-' => Some(Operator::Subtract),
            '*' => Some(Operator::Multiply),
            '/' => Some(Operator::Divide),
            _ => None,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Operator::Add => "+",
            Operator::Subtract => "-",
            Operator::Multiply => "*",
            Operator::Divide => "/",
        }
    }

    /// `*` and `/` bind tighter than `+` and `-`
    pub fn is_multiplicative(&self) -> bool {
        matches!(self, Operator::Multiply | Operator::Divide)
    }

    /// Compute `lhs op rhs`. Division by zero yields a non-finite value.
    pub fn apply(&self, lhs: f64, rhs: f64) -> f64 {
        match self {
            Operator::Add => lhs + rhs,
            Operator::Subtract => lhs - rhs,
            Operator::Multiply => lhs * rhs,
            Operator::Divide => lhs / rhs,
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl FromStr for Operator {
    type Err = CalcError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.chars();
        match (chars.next().and_then(Operator::from_char), chars.next()) {
            (Some(op), None) => Ok(op),
            _ => Err(CalcError::Other(format!("unknown operator: {}", s))),
        }
    }
}

/// A task operand: either a resolved number or the id of another task whose
/// result will be substituted here once known
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Literal(f64),
    Reference(String),
}

impl Operand {
    pub fn is_literal(&self) -> bool {
        matches!(self, Operand::Literal(_))
    }

    pub fn as_literal(&self) -> Option<f64> {
        match self {
            Operand::Literal(v) => Some(*v),
            Operand::Reference(_) => None,
        }
    }

    pub fn as_reference(&self) -> Option<&str> {
        match self {
            Operand::Literal(_) => None,
            Operand::Reference(id) => Some(id),
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Literal(v) => write!(f, "{}", v),
            Operand::Reference(id) => write!(f, "<{}>", id),
        }
    }
}

/// An atomic binary operation belonging to one expression
#[derive(Debug, Clone, PartialEq)]
pub struct Task {
    pub id: String,
    pub arg1: Operand,
    pub arg2: Operand,
    pub operation: Operator,
    pub result: Option<f64>,
    /// Set when the task can never produce a result (division by zero, overflow)
    pub error: Option<String>,
    pub expression_id: String,
}

impl Task {
    pub fn new(arg1: Operand, operation: Operator, arg2: Operand, expression_id: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            arg1,
            arg2,
            operation,
            result: None,
            error: None,
            expression_id: expression_id.to_string(),
        }
    }

    /// Both operands are numbers and neither a result nor a failure has been recorded
    pub fn is_ready(&self) -> bool {
        self.result.is_none()
            && self.error.is_none()
            && self.arg1.is_literal()
            && self.arg2.is_literal()
    }

    /// Ids of the tasks this one is still waiting on
    pub fn references(&self) -> impl Iterator<Item = &str> {
        self.arg1
            .as_reference()
            .into_iter()
            .chain(self.arg2.as_reference())
    }
}

/// Expression lifecycle. Ordering follows the lifecycle so regressions can be detected.
///
/// `Completed` and `Failed` are both terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpressionStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl ExpressionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExpressionStatus::Pending => "pending",
            ExpressionStatus::InProgress => "in_progress",
            ExpressionStatus::Completed => "completed",
            ExpressionStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ExpressionStatus::Completed | ExpressionStatus::Failed)
    }
}

impl fmt::Display for ExpressionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExpressionStatus {
    type Err = CalcError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ExpressionStatus::Pending),
            "in_progress" => Ok(ExpressionStatus::InProgress),
            "completed" => Ok(ExpressionStatus::Completed),
            "failed" => Ok(ExpressionStatus::Failed),
            other => Err(CalcError::Other(format!("unknown expression status: {}", other))),
        }
    }
}

/// A submitted arithmetic expression
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    pub id: String,
    pub owner_id: i64,
    pub text: String,
    pub status: ExpressionStatus,
    /// Final value; only meaningful once `status` is `Completed`
    pub result: Option<f64>,
    /// Task whose result becomes the final value
    pub root_task_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Expression {
    /// A fresh `pending` expression with a generated id
    pub fn new(owner_id: i64, text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            owner_id,
            text: text.into(),
            status: ExpressionStatus::Pending,
            result: None,
            root_task_id: None,
            created_at: Utc::now(),
        }
    }

    /// Result as seen by API callers: hidden until completed
    pub fn visible_result(&self) -> Option<f64> {
        match self.status {
            ExpressionStatus::Completed => self.result,
            _ => None,
        }
    }
}

/// What `apply_result` or `fail_task` did
#[derive(Debug, Clone, PartialEq)]
pub struct CascadeOutcome {
    pub task_id: String,
    pub expression_id: String,
    /// `false` when the task was already settled and the submission was ignored
    pub applied: bool,
    /// Number of dependent tasks whose operands were rewritten
    pub substituted: usize,
    /// The owning expression transitioned to `completed` in this call
    pub expression_completed: bool,
    pub expression_result: Option<f64>,
    /// The owning expression transitioned to `failed` in this call
    pub expression_failed: bool,
}

impl CascadeOutcome {
    /// Outcome for a submission against an already-settled task
    pub fn ignored(task_id: &str, expression_id: String) -> Self {
        Self {
            task_id: task_id.to_string(),
            expression_id,
            applied: false,
            substituted: 0,
            expression_completed: false,
            expression_result: None,
            expression_failed: false,
        }
    }
}
