// SPDX-License-Identifier: MIT

//! [`SqliteStore`] - rusqlite-backed expression and task storage

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use super::schema::SCHEMA_STATEMENTS;
use super::{ExpressionStore, TaskStore};
use crate::common::{CalcError, Result};
use crate::engine::model::{CascadeOutcome, Expression, ExpressionStatus, Operand, Task};

const TASK_COLUMNS: &str =
    "id, arg1, arg1_ref, arg2, arg2_ref, operation, result, expression_id, error";

const EXPRESSION_COLUMNS: &str =
    "id, owner_id, expression, status, result, root_task_id, created_at";

/// Rewrites every unresolved operand that references ?1 into the number ?2
const SUBSTITUTE_SQL: &str = r#"
    UPDATE tasks
    SET
        arg1     = CASE WHEN arg1_ref = ?1 THEN ?2 ELSE arg1 END,
        arg1_ref = CASE WHEN arg1_ref = ?1 THEN NULL ELSE arg1_ref END,
        arg2     = CASE WHEN arg2_ref = ?1 THEN ?2 ELSE arg2 END,
        arg2_ref = CASE WHEN arg2_ref = ?1 THEN NULL ELSE arg2_ref END
    WHERE expression_id = ?3
      AND result IS NULL
      AND id <> ?1
      AND (arg1_ref = ?1 OR arg2_ref = ?1)
"#;

/// SQLite-backed implementation of [`ExpressionStore`] and [`TaskStore`]
///
/// The connection sits behind a `Mutex`, so every operation observes and
/// applies its transaction without interleaving with other callers.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) a database file and initialise the schema
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        log::info!("Opening SQLite database at {}", path.display());

        let conn = Connection::open(path).map_err(|e| {
            CalcError::StoreUnavailable(format!("failed to open {}: {}", path.display(), e))
        })?;
        Self::init(conn)
    }

    /// Open a private in-memory database (tests, throwaway runs)
    pub fn open_in_memory() -> Result<Self> {
        log::debug!("Opening in-memory SQLite database");
        let conn = Connection::open_in_memory().map_err(|e| {
            CalcError::StoreUnavailable(format!("failed to open in-memory db: {}", e))
        })?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = 5000;",
        )?;
        for stmt in SCHEMA_STATEMENTS {
            conn.execute_batch(stmt)?;
        }

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock_conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| CalcError::StoreUnavailable(format!("connection lock poisoned: {}", e)))
    }
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore").finish_non_exhaustive()
    }
}

fn conversion_error(idx: usize, ty: Type, err: CalcError) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, ty, Box::new(err))
}

/// Read the operand stored at `value_idx` (number) and `value_idx + 1` (reference)
fn operand_from_row(row: &Row<'_>, value_idx: usize) -> rusqlite::Result<Operand> {
    let value: Option<f64> = row.get(value_idx)?;
    let reference: Option<String> = row.get(value_idx + 1)?;
    match (value, reference) {
        (Some(v), None) => Ok(Operand::Literal(v)),
        (None, Some(r)) => Ok(Operand::Reference(r)),
        _ => Err(rusqlite::Error::InvalidColumnType(
            value_idx,
            "operand".to_string(),
            Type::Null,
        )),
    }
}

fn operand_columns(operand: &Operand) -> (Option<f64>, Option<&str>) {
    match operand {
        Operand::Literal(v) => (Some(*v), None),
        Operand::Reference(id) => (None, Some(id.as_str())),
    }
}

fn task_from_row(row: &Row<'_>) -> rusqlite::Result<Task> {
    let operation: String = row.get(5)?;
    Ok(Task {
        id: row.get(0)?,
        arg1: operand_from_row(row, 1)?,
        arg2: operand_from_row(row, 3)?,
        operation: operation
            .parse()
            .map_err(|e| conversion_error(5, Type::Text, e))?,
        result: row.get(6)?,
        error: row.get(8)?,
        expression_id: row.get(7)?,
    })
}

fn expression_from_row(row: &Row<'_>) -> rusqlite::Result<Expression> {
    let status: String = row.get(3)?;
    let created_at: String = row.get(6)?;
    Ok(Expression {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        text: row.get(2)?,
        status: status
            .parse()
            .map_err(|e| conversion_error(3, Type::Text, e))?,
        result: row.get(4)?,
        root_task_id: row.get(5)?,
        created_at: DateTime::parse_from_rfc3339(&created_at)
            .map(|d| d.with_timezone(&Utc))
            .map_err(|e| conversion_error(6, Type::Text, CalcError::Other(e.to_string())))?,
    })
}

impl ExpressionStore for SqliteStore {
    fn create(&self, expression: &Expression) -> Result<()> {
        let conn = self.lock_conn()?;
        conn.execute(
            "INSERT INTO expressions (id, owner_id, expression, status, result, root_task_id, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                expression.id,
                expression.owner_id,
                expression.text,
                expression.status.as_str(),
                expression.result,
                expression.root_task_id,
                expression.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn update_status_and_result(
        &self,
        id: &str,
        status: ExpressionStatus,
        result: Option<f64>,
    ) -> Result<()> {
        let mut conn = self.lock_conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let (current, current_result): (String, Option<f64>) = tx
            .query_row(
                "SELECT status, result FROM expressions WHERE id = ?1",
                params![id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?
            .ok_or_else(|| CalcError::not_found("expression", id))?;
        let current: ExpressionStatus = current.parse()?;

        if current.is_terminal() {
            if status == current && result == current_result {
                return Ok(());
            }
            return Err(CalcError::invalid_payload(format!(
                "expression {} is already {}",
                id, current
            )));
        }
        if status < current {
            return Err(CalcError::invalid_payload(format!(
                "expression {} cannot move from {} back to {}",
                id, current, status
            )));
        }

        tx.execute(
            "UPDATE expressions SET status = ?1, result = ?2 WHERE id = ?3",
            params![status.as_str(), result, id],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn get(&self, id: &str) -> Result<Expression> {
        let conn = self.lock_conn()?;
        conn.query_row(
            &format!("SELECT {} FROM expressions WHERE id = ?1", EXPRESSION_COLUMNS),
            params![id],
            expression_from_row,
        )
        .optional()?
        .ok_or_else(|| CalcError::not_found("expression", id))
    }

    fn list(&self) -> Result<Vec<Expression>> {
        let conn = self.lock_conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM expressions ORDER BY created_at, rowid",
            EXPRESSION_COLUMNS
        ))?;
        let rows = stmt.query_map([], expression_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn delete(&self, id: &str) -> Result<()> {
        let mut conn = self.lock_conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let tasks = tx.execute("DELETE FROM tasks WHERE expression_id = ?1", params![id])?;
        let removed = tx.execute("DELETE FROM expressions WHERE id = ?1", params![id])?;
        tx.commit()?;

        log::debug!("Deleted expression {} ({} row(s), {} task(s))", id, removed, tasks);
        Ok(())
    }
}

/// Owning expression of `task_id` and whether the task already has a result or error
fn settled_state(tx: &rusqlite::Transaction<'_>, task_id: &str) -> Result<(String, bool)> {
    tx.query_row(
        "SELECT expression_id, result IS NOT NULL OR error IS NOT NULL FROM tasks WHERE id = ?1",
        params![task_id],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )
    .optional()?
    .ok_or_else(|| CalcError::UnknownTask(task_id.to_string()))
}

impl TaskStore for SqliteStore {
    fn create_all(&self, tasks: &[Task]) -> Result<()> {
        if tasks.is_empty() {
            return Ok(());
        }

        let mut conn = self.lock_conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO tasks (id, arg1, arg1_ref, arg2, arg2_ref, operation, result, error, expression_id, seq)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            )?;
            for (seq, task) in tasks.iter().enumerate() {
                let (arg1, arg1_ref) = operand_columns(&task.arg1);
                let (arg2, arg2_ref) = operand_columns(&task.arg2);
                stmt.execute(params![
                    task.id,
                    arg1,
                    arg1_ref,
                    arg2,
                    arg2_ref,
                    task.operation.symbol(),
                    task.result,
                    task.error,
                    task.expression_id,
                    seq as i64,
                ])?;
            }
        }
        tx.commit()?;

        log::debug!("Inserted {} task(s)", tasks.len());
        Ok(())
    }

    fn claim_next_ready(&self) -> Result<Option<Task>> {
        let mut conn = self.lock_conn()?;
        let tx = conn.transaction()?;
        let task = tx
            .query_row(
                &format!(
                    "SELECT {} FROM tasks
                     WHERE result IS NULL AND error IS NULL
                       AND arg1_ref IS NULL AND arg2_ref IS NULL
                     ORDER BY rowid
                     LIMIT 1",
                    TASK_COLUMNS
                ),
                [],
                task_from_row,
            )
            .optional()?;
        tx.commit()?;
        Ok(task)
    }

    fn apply_result(&self, task_id: &str, value: f64) -> Result<CascadeOutcome> {
        let mut conn = self.lock_conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let (expression_id, settled) = settled_state(&tx, task_id)?;
        if settled {
            log::debug!("Task {} already settled, ignoring resubmission", task_id);
            return Ok(CascadeOutcome::ignored(task_id, expression_id));
        }

        tx.execute(
            "UPDATE tasks SET result = ?1 WHERE id = ?2 AND result IS NULL",
            params![value, task_id],
        )?;
        let substituted = tx.execute(SUBSTITUTE_SQL, params![task_id, value, expression_id])?;

        let unresolved: i64 = tx.query_row(
            "SELECT COUNT(*) FROM tasks WHERE expression_id = ?1 AND result IS NULL",
            params![expression_id],
            |row| row.get(0),
        )?;

        let mut expression_completed = false;
        let mut expression_result = None;
        if unresolved == 0 {
            let final_value: Option<f64> = tx
                .query_row(
                    "SELECT t.result FROM expressions e
                     JOIN tasks t ON t.id = e.root_task_id
                     WHERE e.id = ?1",
                    params![expression_id],
                    |row| row.get(0),
                )
                .optional()?
                .flatten();

            let changed = tx.execute(
                "UPDATE expressions SET status = 'completed', result = ?1
                 WHERE id = ?2 AND status NOT IN ('completed', 'failed')",
                params![final_value, expression_id],
            )?;
            expression_completed = changed > 0;
            expression_result = final_value;
        }

        tx.commit()?;

        log::debug!(
            "Applied result {} to task {} ({} dependent(s) rewritten, {} unresolved)",
            value,
            task_id,
            substituted,
            unresolved
        );

        Ok(CascadeOutcome {
            task_id: task_id.to_string(),
            expression_id,
            applied: true,
            substituted,
            expression_completed,
            expression_result,
            expression_failed: false,
        })
    }

    fn fail_task(&self, task_id: &str, reason: &str) -> Result<CascadeOutcome> {
        let mut conn = self.lock_conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let (expression_id, settled) = settled_state(&tx, task_id)?;
        if settled {
            log::debug!("Task {} already settled, ignoring failure report", task_id);
            return Ok(CascadeOutcome::ignored(task_id, expression_id));
        }

        tx.execute(
            "UPDATE tasks SET error = ?1 WHERE id = ?2",
            params![reason, task_id],
        )?;
        let abandoned = tx.execute(
            "UPDATE tasks SET error = ?1
             WHERE expression_id = ?2 AND result IS NULL AND error IS NULL",
            params![format!("abandoned after task {} failed", task_id), expression_id],
        )?;
        let changed = tx.execute(
            "UPDATE expressions SET status = 'failed', result = NULL
             WHERE id = ?1 AND status NOT IN ('completed', 'failed')",
            params![expression_id],
        )?;
        tx.commit()?;

        log::warn!(
            "Task {} failed ({}); expression {} failed, {} other task(s) abandoned",
            task_id,
            reason,
            expression_id,
            abandoned
        );

        Ok(CascadeOutcome {
            task_id: task_id.to_string(),
            expression_id,
            applied: true,
            substituted: 0,
            expression_completed: false,
            expression_result: None,
            expression_failed: changed > 0,
        })
    }

    fn get_task(&self, task_id: &str) -> Result<Task> {
        let conn = self.lock_conn()?;
        conn.query_row(
            &format!("SELECT {} FROM tasks WHERE id = ?1", TASK_COLUMNS),
            params![task_id],
            task_from_row,
        )
        .optional()?
        .ok_or_else(|| CalcError::UnknownTask(task_id.to_string()))
    }

    fn tasks_for_expression(&self, expression_id: &str) -> Result<Vec<Task>> {
        let conn = self.lock_conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM tasks WHERE expression_id = ?1 ORDER BY seq",
            TASK_COLUMNS
        ))?;
        let rows = stmt.query_map(params![expression_id], task_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::expression::{self, Decomposition};
    use crate::engine::model::Operator;
    use pretty_assertions::assert_eq;

    /// Persist an expression the way the calculator does, returning its decomposition
    fn seed(store: &SqliteStore, text: &str) -> (Expression, Decomposition) {
        let mut expr = Expression::new(7, text);
        let d = expression::parse(text, &expr.id).unwrap();
        expr.root_task_id = d.root_task_id().map(str::to_string);
        store.create(&expr).unwrap();
        store.create_all(&d.tasks).unwrap();
        store
            .update_status_and_result(&expr.id, ExpressionStatus::InProgress, None)
            .unwrap();
        (expr, d)
    }

    #[test]
    fn test_open_in_memory() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert!(store.list().unwrap().is_empty());
        assert!(store.claim_next_ready().unwrap().is_none());
    }

    #[test]
    fn test_create_and_get_expression() {
        let store = SqliteStore::open_in_memory().unwrap();
        let expr = Expression::new(3, "1 + 1");
        store.create(&expr).unwrap();

        let loaded = store.get(&expr.id).unwrap();
        assert_eq!(loaded.id, expr.id);
        assert_eq!(loaded.owner_id, 3);
        assert_eq!(loaded.text, "1 + 1");
        assert_eq!(loaded.status, ExpressionStatus::Pending);
        assert_eq!(loaded.result, None);
        assert_eq!(store.list().unwrap().len(), 1);
    }

    #[test]
    fn test_get_unknown_expression() {
        let store = SqliteStore::open_in_memory().unwrap();
        let err = store.get("missing").unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_tasks_round_trip_with_references() {
        let store = SqliteStore::open_in_memory().unwrap();
        let (expr, d) = seed(&store, "2 + 3 * 4");

        let tasks = store.tasks_for_expression(&expr.id).unwrap();
        assert_eq!(tasks, d.tasks);
        assert_eq!(tasks[1].arg2, Operand::Reference(tasks[0].id.clone()));
        assert_eq!(store.get_task(&tasks[0].id).unwrap().operation, Operator::Multiply);
    }

    #[test]
    fn test_create_all_is_atomic() {
        let store = SqliteStore::open_in_memory().unwrap();
        let expr = Expression::new(1, "1 + 2 + 3");
        store.create(&expr).unwrap();

        let d = expression::parse("1 + 2 + 3", &expr.id).unwrap();
        let mut batch = d.tasks.clone();
        // Duplicate primary key in the middle of the batch
        batch.push(d.tasks[0].clone());

        let err = store.create_all(&batch).unwrap_err();
        assert!(err.is_persistence());
        assert!(store.tasks_for_expression(&expr.id).unwrap().is_empty());
    }

    #[test]
    fn test_claim_skips_tasks_waiting_on_references() {
        let store = SqliteStore::open_in_memory().unwrap();
        let (_, d) = seed(&store, "2 + 3 * 4");

        let claimed = store.claim_next_ready().unwrap().unwrap();
        assert_eq!(claimed.id, d.tasks[0].id);

        // Claiming is advisory: no state change, same task again
        let again = store.claim_next_ready().unwrap().unwrap();
        assert_eq!(again.id, claimed.id);
        assert_eq!(store.get_task(&claimed.id).unwrap().result, None);
    }

    #[test]
    fn test_cascade_completes_expression() {
        let store = SqliteStore::open_in_memory().unwrap();
        let (expr, d) = seed(&store, "2 + 3 * 4");
        let (t1, t2) = (&d.tasks[0], &d.tasks[1]);

        let outcome = store.apply_result(&t1.id, 12.0).unwrap();
        assert!(outcome.applied);
        assert_eq!(outcome.substituted, 1);
        assert!(!outcome.expression_completed);

        let rewritten = store.get_task(&t2.id).unwrap();
        assert_eq!(rewritten.arg2, Operand::Literal(12.0));
        assert!(rewritten.is_ready());
        assert_eq!(store.claim_next_ready().unwrap().unwrap().id, t2.id);

        let outcome = store.apply_result(&t2.id, 14.0).unwrap();
        assert!(outcome.expression_completed);
        assert_eq!(outcome.expression_result, Some(14.0));

        let done = store.get(&expr.id).unwrap();
        assert_eq!(done.status, ExpressionStatus::Completed);
        assert_eq!(done.result, Some(14.0));
        assert!(store.claim_next_ready().unwrap().is_none());
    }

    #[test]
    fn test_same_reference_in_both_operands_is_rewritten() {
        let store = SqliteStore::open_in_memory().unwrap();
        let expr = Expression::new(1, "synthetic");
        store.create(&expr).unwrap();

        let t1 = Task::new(Operand::Literal(2.0), Operator::Add, Operand::Literal(3.0), &expr.id);
        let t2 = Task::new(
            Operand::Reference(t1.id.clone()),
            Operator::Multiply,
            Operand::Reference(t1.id.clone()),
            &expr.id,
        );
        store.create_all(&[t1.clone(), t2.clone()]).unwrap();

        let outcome = store.apply_result(&t1.id, 5.0).unwrap();
        assert_eq!(outcome.substituted, 1);
        let t2 = store.get_task(&t2.id).unwrap();
        assert_eq!(t2.arg1, Operand::Literal(5.0));
        assert_eq!(t2.arg2, Operand::Literal(5.0));
    }

    #[test]
    fn test_resubmission_is_ignored() {
        let store = SqliteStore::open_in_memory().unwrap();
        let (expr, d) = seed(&store, "5 + 7");
        let t1 = &d.tasks[0];

        let first = store.apply_result(&t1.id, 12.0).unwrap();
        assert!(first.applied);
        assert!(first.expression_completed);

        let second = store.apply_result(&t1.id, 99.0).unwrap();
        assert!(!second.applied);
        assert!(!second.expression_completed);

        assert_eq!(store.get_task(&t1.id).unwrap().result, Some(12.0));
        assert_eq!(store.get(&expr.id).unwrap().result, Some(12.0));
    }

    #[test]
    fn test_unknown_task_mutates_nothing() {
        let store = SqliteStore::open_in_memory().unwrap();
        let (expr, d) = seed(&store, "1 + 2 * 3");

        let err = store.apply_result("no-such-task", 1.0).unwrap_err();
        assert!(matches!(err, CalcError::UnknownTask(ref id) if id == "no-such-task"));

        assert_eq!(store.tasks_for_expression(&expr.id).unwrap(), d.tasks);
        assert_eq!(store.get(&expr.id).unwrap().status, ExpressionStatus::InProgress);
    }

    #[test]
    fn test_status_cannot_regress() {
        let store = SqliteStore::open_in_memory().unwrap();
        let expr = Expression::new(1, "3");
        store.create(&expr).unwrap();
        store
            .update_status_and_result(&expr.id, ExpressionStatus::Completed, Some(3.0))
            .unwrap();

        let err = store
            .update_status_and_result(&expr.id, ExpressionStatus::InProgress, None)
            .unwrap_err();
        assert!(matches!(err, CalcError::InvalidPayload(_)));
        assert_eq!(store.get(&expr.id).unwrap().result, Some(3.0));
    }

    #[test]
    fn test_completed_result_cannot_be_overwritten() {
        let store = SqliteStore::open_in_memory().unwrap();
        let expr = Expression::new(1, "3");
        store.create(&expr).unwrap();
        store
            .update_status_and_result(&expr.id, ExpressionStatus::Completed, Some(3.0))
            .unwrap();

        // Repeating the same terminal update is harmless
        store
            .update_status_and_result(&expr.id, ExpressionStatus::Completed, Some(3.0))
            .unwrap();

        let err = store
            .update_status_and_result(&expr.id, ExpressionStatus::Completed, Some(4.0))
            .unwrap_err();
        assert!(matches!(err, CalcError::InvalidPayload(_)));
        let err = store
            .update_status_and_result(&expr.id, ExpressionStatus::Failed, None)
            .unwrap_err();
        assert!(matches!(err, CalcError::InvalidPayload(_)));
        assert_eq!(store.get(&expr.id).unwrap().result, Some(3.0));
    }

    #[test]
    fn test_failed_task_releases_the_queue() {
        let store = SqliteStore::open_in_memory().unwrap();
        let (bad, bad_tasks) = seed(&store, "1 / 0 + 1");
        let (good, good_tasks) = seed(&store, "2 + 2");

        let claimed = store.claim_next_ready().unwrap().unwrap();
        assert_eq!(claimed.id, bad_tasks.tasks[0].id);

        let outcome = store.fail_task(&claimed.id, "division by zero").unwrap();
        assert!(outcome.applied);
        assert!(outcome.expression_failed);
        assert_eq!(outcome.expression_id, bad.id);

        let failed = store.get(&bad.id).unwrap();
        assert_eq!(failed.status, ExpressionStatus::Failed);
        assert_eq!(failed.result, None);
        for task in store.tasks_for_expression(&bad.id).unwrap() {
            assert!(task.error.is_some());
            assert!(!task.is_ready());
        }
        assert_eq!(
            store.get_task(&claimed.id).unwrap().error.as_deref(),
            Some("division by zero")
        );

        let next = store.claim_next_ready().unwrap().unwrap();
        assert_eq!(next.id, good_tasks.tasks[0].id);
        let outcome = store.apply_result(&next.id, 4.0).unwrap();
        assert!(outcome.expression_completed);
        assert_eq!(store.get(&good.id).unwrap().result, Some(4.0));
        assert!(store.claim_next_ready().unwrap().is_none());
    }

    #[test]
    fn test_settled_tasks_ignore_later_reports() {
        let store = SqliteStore::open_in_memory().unwrap();
        let (expr, d) = seed(&store, "8 / 0");
        let task = &d.tasks[0];

        store.fail_task(&task.id, "division by zero").unwrap();

        let late_result = store.apply_result(&task.id, 1.0).unwrap();
        assert!(!late_result.applied);
        let repeat = store.fail_task(&task.id, "again").unwrap();
        assert!(!repeat.applied);
        assert!(!repeat.expression_failed);

        let stored = store.get_task(&task.id).unwrap();
        assert_eq!(stored.result, None);
        assert_eq!(stored.error.as_deref(), Some("division by zero"));
        assert_eq!(store.get(&expr.id).unwrap().status, ExpressionStatus::Failed);

        let (done, d) = seed(&store, "1 + 1");
        store.apply_result(&d.tasks[0].id, 2.0).unwrap();
        let outcome = store.fail_task(&d.tasks[0].id, "too late").unwrap();
        assert!(!outcome.applied);
        assert_eq!(store.get(&done.id).unwrap().status, ExpressionStatus::Completed);
    }

    #[test]
    fn test_fail_unknown_task() {
        let store = SqliteStore::open_in_memory().unwrap();
        let err = store.fail_task("ghost", "boom").unwrap_err();
        assert!(matches!(err, CalcError::UnknownTask(_)));
    }

    #[test]
    fn test_delete_removes_expression_and_tasks() {
        let store = SqliteStore::open_in_memory().unwrap();
        let (expr, d) = seed(&store, "1 + 2 * 3");
        let (kept, _) = seed(&store, "4 - 1");

        store.delete(&expr.id).unwrap();
        assert!(store.get(&expr.id).unwrap_err().is_not_found());
        assert!(store.tasks_for_expression(&expr.id).unwrap().is_empty());
        assert!(matches!(
            store.get_task(&d.tasks[0].id),
            Err(CalcError::UnknownTask(_))
        ));
        assert_eq!(store.list().unwrap().len(), 1);
        assert_eq!(store.list().unwrap()[0].id, kept.id);

        store.delete("missing").unwrap();
    }

    #[test]
    fn test_update_unknown_expression() {
        let store = SqliteStore::open_in_memory().unwrap();
        let err = store
            .update_status_and_result("missing", ExpressionStatus::InProgress, None)
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.db");

        let expr_id = {
            let store = SqliteStore::open(&path).unwrap();
            let (expr, _) = seed(&store, "6 / 3");
            expr.id
        };

        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(store.get(&expr_id).unwrap().status, ExpressionStatus::InProgress);
        assert_eq!(store.tasks_for_expression(&expr_id).unwrap().len(), 1);
    }
}
