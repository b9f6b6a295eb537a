// SPDX-License-Identifier: MIT

//! DDL for the SQLite store
//!
//! Operands are stored as a pair of columns (`argN` for a number, `argN_ref`
//! for a task reference) with a CHECK that exactly one is set. A task is
//! settled once either `result` or `error` is set.

pub const SCHEMA_STATEMENTS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS expressions (
        id            TEXT PRIMARY KEY,
        owner_id      INTEGER NOT NULL,
        expression    TEXT NOT NULL,
        status        TEXT NOT NULL DEFAULT 'pending'
                      CHECK (status IN ('pending', 'in_progress', 'completed', 'failed')),
        result        REAL,
        root_task_id  TEXT,
        created_at    TEXT NOT NULL
    );
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS tasks (
        id             TEXT PRIMARY KEY,
        arg1           REAL,
        arg1_ref       TEXT,
        arg2           REAL,
        arg2_ref       TEXT,
        operation      TEXT NOT NULL CHECK (operation IN ('+', '-', '*', '/')),
        result         REAL,
        error          TEXT,
        expression_id  TEXT NOT NULL REFERENCES expressions (id),
        seq            INTEGER NOT NULL,
        CHECK (result IS NULL OR error IS NULL),
        CHECK ((arg1 IS NULL) <> (arg1_ref IS NULL)),
        CHECK ((arg2 IS NULL) <> (arg2_ref IS NULL))
    );
    "#,
    "CREATE INDEX IF NOT EXISTS idx_tasks_expression ON tasks (expression_id, seq);",
    "CREATE INDEX IF NOT EXISTS idx_tasks_arg1_ref ON tasks (arg1_ref) WHERE arg1_ref IS NOT NULL;",
    "CREATE INDEX IF NOT EXISTS idx_tasks_arg2_ref ON tasks (arg2_ref) WHERE arg2_ref IS NOT NULL;",
    "CREATE INDEX IF NOT EXISTS idx_expressions_owner ON expressions (owner_id);",
];
