//! Table-level operations over a borrowed [`SqlExecutor`].
//!
//! Every operation validates its arguments, checks whether the table
//! exists, builds the statement, executes it and shapes the output, in
//! that order. Nothing reaches the executor until validation passes.

use std::ops::{Deref, DerefMut};

use tracing::{debug, error, info, warn};

use crate::error::{DriverError, Error, Result};
use crate::executor::{DriverResult, SqlExecutor};
use crate::mapper::to_rows;
use crate::sql_builder;
use crate::validation::{
    row_skip_reason, validate_column_spec, validate_rows, validate_select_columns,
    validate_table_name, validate_values, validate_where_clause,
};
use crate::value::{ColumnSpec, Row, Value};

/// Result of a batched insert.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    pub inserted: u64,
    pub skipped: usize,
}

/// Turns auto-commit off for its lifetime and puts the previous mode back
/// when dropped, whichever way the batch ends.
struct AutoCommitGuard<'g, E: SqlExecutor> {
    executor: &'g mut E,
    previous: bool,
}

impl<'g, E: SqlExecutor> AutoCommitGuard<'g, E> {
    fn disable(executor: &'g mut E) -> DriverResult<Self> {
        let previous = executor.auto_commit();
        executor.set_auto_commit(false)?;
        Ok(Self { executor, previous })
    }
}

impl<E: SqlExecutor> Deref for AutoCommitGuard<'_, E> {
    type Target = E;

    fn deref(&self) -> &E {
        self.executor
    }
}

impl<E: SqlExecutor> DerefMut for AutoCommitGuard<'_, E> {
    fn deref_mut(&mut self) -> &mut E {
        self.executor
    }
}

impl<E: SqlExecutor> Drop for AutoCommitGuard<'_, E> {
    fn drop(&mut self) {
        if let Err(e) = self.executor.set_auto_commit(self.previous) {
            error!(
                previous = self.previous,
                "failed to restore auto-commit mode: {}", e
            );
        }
    }
}

/// Consecutive rows with the same key set share one prepared statement.
fn group_by_statement(table: &str, rows: &[&Row]) -> Result<Vec<(String, Vec<Vec<Value>>)>> {
    let mut groups: Vec<(String, Vec<Vec<Value>>)> = Vec::new();
    for row in rows {
        let sql = sql_builder::insert(table, row)?;
        let params: Vec<Value> = row.values().cloned().collect();
        match groups.last_mut() {
            Some((last_sql, batch)) if *last_sql == sql => batch.push(params),
            _ => groups.push((sql, vec![params])),
        }
    }
    Ok(groups)
}

fn scalar_to_count(table: &str, value: &Value) -> Result<i64> {
    match value {
        Value::Integer(n) => Ok(*n),
        Value::Real(r) => Ok(*r as i64),
        Value::Text(s) => s
            .trim()
            .parse()
            .map_err(|_| Error::CountQuery(table.to_string())),
        _ => Err(Error::CountQuery(table.to_string())),
    }
}

pub struct TableOps<'a, E: SqlExecutor> {
    executor: &'a mut E,
}

impl<'a, E: SqlExecutor> TableOps<'a, E> {
    pub fn new(executor: &'a mut E) -> Self {
        Self { executor }
    }

    fn exists(&mut self, operation: &str, table: &str) -> Result<bool> {
        self.executor
            .table_exists(table)
            .map_err(|e| Error::sql(operation, table, e))
    }

    fn require_table(&mut self, operation: &str, table: &str) -> Result<()> {
        if !self.exists(operation, table)? {
            warn!(operation, table, "table does not exist");
            return Err(Error::TableNotFound(table.to_string()));
        }
        Ok(())
    }

    fn execute(&mut self, operation: &str, table: &str, sql: &str, params: &[Value]) -> Result<u64> {
        debug!(operation, table, sql, "executing statement");
        self.executor.execute(sql, params).map_err(|e| {
            error!(operation, table, "statement failed: {}", e);
            Error::sql(operation, table, e)
        })
    }

    fn query_rows(&mut self, operation: &str, table: &str, sql: &str) -> Result<Vec<Row>> {
        debug!(operation, table, sql, "running query");
        let result = self.executor.query(sql, &[]).map_err(|e| {
            error!(operation, table, "query failed: {}", e);
            Error::sql(operation, table, e)
        })?;
        Ok(to_rows(result))
    }

    pub fn create_table(&mut self, table: &str, columns: &ColumnSpec) -> Result<()> {
        validate_table_name(table)?;
        validate_column_spec(table, columns)?;

        if self.exists("create_table", table)? {
            warn!(table, "refusing to create a table that already exists");
            return Err(Error::TableAlreadyExists(table.to_string()));
        }

        let sql = sql_builder::create_table(table, columns)?;
        self.execute("create_table", table, &sql, &[])?;
        info!(table, columns = columns.len(), "table created");
        Ok(())
    }

    pub fn insert_row(&mut self, table: &str, values: &Row) -> Result<u64> {
        validate_table_name(table)?;
        validate_values(table, values)?;
        self.require_table("insert_row", table)?;

        let sql = sql_builder::insert(table, values)?;
        let params: Vec<Value> = values.values().cloned().collect();
        let affected = self.execute("insert_row", table, &sql, &params)?;
        info!(table, affected, "row inserted");
        Ok(affected)
    }

    /// Insert many rows under one transaction.
    ///
    /// Rows that fail the batch value rules are skipped with a warning.
    /// If any statement fails, the whole batch is rolled back. Auto-commit
    /// is restored to its previous mode on every exit.
    pub fn insert_rows(&mut self, table: &str, rows: &[Row]) -> Result<BatchOutcome> {
        validate_table_name(table)?;
        validate_rows(table, rows)?;
        self.require_table("insert_rows", table)?;

        let mut queued = Vec::with_capacity(rows.len());
        let mut skipped = 0usize;
        for (idx, row) in rows.iter().enumerate() {
            match row_skip_reason(row) {
                Some(reason) => {
                    warn!(table, row = idx, "skipping row: {}", reason);
                    skipped += 1;
                }
                None => queued.push(row),
            }
        }
        let groups = group_by_statement(table, &queued)?;

        let mut guard = AutoCommitGuard::disable(&mut *self.executor).map_err(|e| {
            Error::Transaction {
                table: table.to_string(),
                detail: format!("could not disable auto-commit: {}", e),
            }
        })?;

        let mut inserted = 0u64;
        let mut failure: Option<DriverError> = None;
        for (sql, batch) in &groups {
            match guard.execute_batch(sql, batch) {
                Ok(counts) => inserted += counts.iter().sum::<u64>(),
                Err(e) => {
                    failure = Some(e);
                    break;
                }
            }
        }

        if let Some(e) = failure {
            error!(table, "batch insert failed, rolling back: {}", e);
            if let Err(rb) = guard.rollback() {
                error!(table, "rollback failed: {}", rb);
            }
            return Err(Error::sql("insert_rows", table, e));
        }

        if let Err(e) = guard.commit() {
            error!(table, "commit failed: {}", e);
            if let Err(rb) = guard.rollback() {
                error!(table, "rollback failed: {}", rb);
            }
            return Err(Error::Transaction {
                table: table.to_string(),
                detail: format!("commit failed: {}", e),
            }
            .with_context("insert_rows", Some(table)));
        }

        info!(table, inserted, skipped, "batch committed");
        Ok(BatchOutcome { inserted, skipped })
    }

    pub fn update_row(&mut self, table: &str, values: &Row, where_clause: &str) -> Result<u64> {
        validate_table_name(table)?;
        validate_values(table, values)?;
        validate_where_clause(table, where_clause)?;
        self.require_table("update_row", table)?;

        let sql = sql_builder::update(table, values, where_clause)?;
        let params: Vec<Value> = values.values().cloned().collect();
        let affected = self.execute("update_row", table, &sql, &params)?;
        info!(table, affected, "rows updated");
        Ok(affected)
    }

    pub fn delete_from_table(&mut self, table: &str, where_clause: &str) -> Result<u64> {
        validate_table_name(table)?;
        validate_where_clause(table, where_clause)?;
        self.require_table("delete_from_table", table)?;

        let sql = sql_builder::delete(table, where_clause);
        let affected = self.execute("delete_from_table", table, &sql, &[])?;
        info!(table, affected, "rows deleted");
        Ok(affected)
    }

    pub fn select_from_table(
        &mut self,
        table: &str,
        columns: &[&str],
        where_clause: &str,
    ) -> Result<Vec<Row>> {
        validate_table_name(table)?;
        validate_select_columns(table, columns)?;
        validate_where_clause(table, where_clause)?;
        self.require_table("select_from_table", table)?;

        let sql = sql_builder::select(table, columns, where_clause)?;
        self.query_rows("select_from_table", table, &sql)
    }

    /// Every column of the matching rows, keyed by result label.
    pub fn generate_report(&mut self, table: &str, where_clause: &str) -> Result<Vec<Row>> {
        validate_table_name(table)?;
        validate_where_clause(table, where_clause)?;
        self.require_table("generate_report", table)?;

        let sql = sql_builder::select_all(table, where_clause);
        let rows = self.query_rows("generate_report", table, &sql)?;
        info!(table, rows = rows.len(), "report generated");
        Ok(rows)
    }

    pub fn drop_table(&mut self, table: &str) -> Result<()> {
        validate_table_name(table)?;
        self.require_table("drop_table", table)?;

        let sql = sql_builder::drop_table(table);
        self.execute("drop_table", table, &sql, &[])?;
        info!(table, "table dropped");
        Ok(())
    }

    pub fn count_rows(&mut self, table: &str) -> Result<i64> {
        validate_table_name(table)?;
        self.require_table("count_rows", table)?;

        let sql = sql_builder::count(table);
        let result = self
            .executor
            .query(&sql, &[])
            .map_err(|e| Error::sql("count_rows", table, e))?;

        match result.rows.first().and_then(|r| r.first()) {
            Some(value) => scalar_to_count(table, value),
            None => {
                error!(table, "count query returned no rows");
                Err(Error::CountQuery(table.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::QueryResult;

    /// Records every call and answers from canned data.
    #[derive(Default)]
    struct Scripted {
        tables: Vec<String>,
        calls: Vec<String>,
        query_result: QueryResult,
        auto_commit: bool,
        fail_execute: bool,
        fail_commit: bool,
        fail_rollback: bool,
        fail_disable: bool,
    }

    impl Scripted {
        fn with_tables(tables: &[&str]) -> Self {
            Self {
                tables: tables.iter().map(|t| t.to_string()).collect(),
                auto_commit: true,
                ..Default::default()
            }
        }
    }

    impl SqlExecutor for Scripted {
        fn execute(&mut self, sql: &str, _params: &[Value]) -> DriverResult<u64> {
            self.calls.push(sql.to_string());
            if self.fail_execute {
                return Err(DriverError::new("duplicate key"));
            }
            Ok(1)
        }
        fn query(&mut self, sql: &str, _params: &[Value]) -> DriverResult<QueryResult> {
            self.calls.push(sql.to_string());
            Ok(self.query_result.clone())
        }
        fn auto_commit(&self) -> bool {
            self.auto_commit
        }
        fn set_auto_commit(&mut self, enabled: bool) -> DriverResult<()> {
            self.calls.push(format!("autocommit={}", enabled));
            if !enabled && self.fail_disable {
                return Err(DriverError::new("connection is read-only"));
            }
            self.auto_commit = enabled;
            Ok(())
        }
        fn commit(&mut self) -> DriverResult<()> {
            self.calls.push("commit".into());
            if self.fail_commit {
                return Err(DriverError::new("disk full"));
            }
            Ok(())
        }
        fn rollback(&mut self) -> DriverResult<()> {
            self.calls.push("rollback".into());
            if self.fail_rollback {
                return Err(DriverError::new("connection lost"));
            }
            Ok(())
        }
        fn table_exists(&mut self, table: &str) -> DriverResult<bool> {
            self.calls.push(format!("exists {}", table));
            Ok(self.tables.iter().any(|t| t == table))
        }
    }

    #[test]
    fn test_validation_failure_never_touches_executor() {
        let mut exec = Scripted::with_tables(&["t"]);
        let err = TableOps::new(&mut exec).drop_table("bad name").unwrap_err();
        assert!(err.is_validation());
        assert!(exec.calls.is_empty());
    }

    #[test]
    fn test_create_table_fails_when_present() {
        let mut exec = Scripted::with_tables(&["t"]);
        let cols = ColumnSpec::new().with_column("a", "INT");
        let err = TableOps::new(&mut exec).create_table("t", &cols).unwrap_err();
        assert!(matches!(err, Error::TableAlreadyExists(name) if name == "t"));
        assert_eq!(exec.calls, vec!["exists t"]);
    }

    #[test]
    fn test_create_table_executes_built_sql() {
        let mut exec = Scripted::with_tables(&[]);
        let cols = ColumnSpec::new()
            .with_column("a", "INT")
            .with_column("b", "VARCHAR(10)");
        TableOps::new(&mut exec).create_table("t", &cols).unwrap();
        assert_eq!(
            exec.calls.last().map(String::as_str),
            Some("CREATE TABLE t (a INT, b VARCHAR(10))")
        );
    }

    #[test]
    fn test_delete_fails_when_absent() {
        let mut exec = Scripted::with_tables(&[]);
        let err = TableOps::new(&mut exec)
            .delete_from_table("t", "id = 1")
            .unwrap_err();
        assert!(matches!(err, Error::TableNotFound(_)));
    }

    #[test]
    fn test_count_rows_empty_result_is_error() {
        let mut exec = Scripted::with_tables(&["t"]);
        exec.query_result = QueryResult::new(vec!["COUNT(*)".into()], vec![]);
        let err = TableOps::new(&mut exec).count_rows("t").unwrap_err();
        assert!(matches!(err, Error::CountQuery(name) if name == "t"));
    }

    #[test]
    fn test_count_rows_parses_text_scalar() {
        let mut exec = Scripted::with_tables(&["t"]);
        exec.query_result =
            QueryResult::new(vec!["COUNT(*)".into()], vec![vec![Value::from("42")]]);
        assert_eq!(TableOps::new(&mut exec).count_rows("t").unwrap(), 42);
    }

    #[test]
    fn test_insert_rows_groups_and_restores_autocommit() {
        let mut exec = Scripted::with_tables(&["t"]);
        let rows = vec![
            Row::new().with_value("a", "x"),
            Row::new().with_value("a", "y"),
            Row::new().with_value("b", "z"),
            Row::new().with_value("a", ""),
        ];
        let outcome = TableOps::new(&mut exec).insert_rows("t", &rows).unwrap();
        assert_eq!(outcome, BatchOutcome { inserted: 3, skipped: 1 });
        assert_eq!(
            exec.calls,
            vec![
                "exists t",
                "autocommit=false",
                "INSERT INTO t (a) VALUES (?)",
                "INSERT INTO t (a) VALUES (?)",
                "INSERT INTO t (b) VALUES (?)",
                "commit",
                "autocommit=true",
            ]
        );
        assert!(exec.auto_commit);
    }

    #[test]
    fn test_insert_rows_commit_failure_is_transaction_error() {
        let mut exec = Scripted::with_tables(&["t"]);
        exec.fail_commit = true;
        let err = TableOps::new(&mut exec)
            .insert_rows("t", &[Row::new().with_value("a", "x")])
            .unwrap_err();

        match err {
            Error::Transaction { table, detail } => {
                assert_eq!(table, "t");
                assert!(detail.starts_with("[operation=insert_rows, table=t]"));
                assert!(detail.contains("disk full"));
            }
            other => panic!("Expected Transaction, got {:?}", other),
        }
        assert_eq!(
            &exec.calls[exec.calls.len() - 3..],
            ["commit", "rollback", "autocommit=true"]
        );
        assert!(exec.auto_commit);
    }

    #[test]
    fn test_insert_rows_rollback_failure_keeps_statement_error() {
        let mut exec = Scripted::with_tables(&["t"]);
        exec.fail_execute = true;
        exec.fail_rollback = true;
        let err = TableOps::new(&mut exec)
            .insert_rows("t", &[Row::new().with_value("a", "x")])
            .unwrap_err();

        match err {
            Error::SqlExecution {
                operation,
                table,
                source,
            } => {
                assert_eq!(operation, "insert_rows");
                assert_eq!(table, "t");
                assert_eq!(source.message, "duplicate key");
            }
            other => panic!("Expected SqlExecution, got {:?}", other),
        }
        assert!(exec.calls.iter().any(|c| c == "rollback"));
        assert!(!exec.calls.iter().any(|c| c == "commit"));
        assert!(exec.auto_commit);
    }

    #[test]
    fn test_insert_rows_disable_failure_leaves_mode_alone() {
        let mut exec = Scripted::with_tables(&["t"]);
        exec.fail_disable = true;
        let err = TableOps::new(&mut exec)
            .insert_rows("t", &[Row::new().with_value("a", "x")])
            .unwrap_err();

        assert!(matches!(err, Error::Transaction { ref table, .. } if table == "t"));
        assert!(err.to_string().contains("connection is read-only"));
        assert_eq!(exec.calls, vec!["exists t", "autocommit=false"]);
        assert!(exec.auto_commit);
    }

    #[test]
    fn test_insert_rows_requires_rows() {
        let mut exec = Scripted::with_tables(&["t"]);
        assert!(TableOps::new(&mut exec).insert_rows("t", &[]).is_err());
        assert!(exec.calls.is_empty());
    }

    #[test]
    fn test_group_by_statement_keeps_order() {
        let a = Row::new().with_value("a", "1");
        let b = Row::new().with_value("b", "2");
        let groups = group_by_statement("t", &[&a, &b, &a]).unwrap();
        assert_eq!(groups.len(), 3);
        assert_eq!(groups[1].0, "INSERT INTO t (b) VALUES (?)");
    }
}
