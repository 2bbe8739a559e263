use std::path::Path;

use chrono::NaiveDate;
use rusqlite::types::{ToSqlOutput, Value as SqlValue, ValueRef};
use rusqlite::{params_from_iter, Connection, OptionalExtension, ToSql};
use tracing::debug;

use super::{DriverResult, QueryResult, SqlExecutor};
use crate::error::DriverError;
use crate::value::Value;

const DATE_FORMAT: &str = "%Y-%m-%d";

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Null => ToSqlOutput::Owned(SqlValue::Null),
            Value::Integer(i) => ToSqlOutput::from(*i),
            Value::Real(r) => ToSqlOutput::from(*r),
            Value::Text(s) => ToSqlOutput::from(s.as_str()),
            Value::Blob(b) => ToSqlOutput::from(b.as_slice()),
            Value::Boolean(b) => ToSqlOutput::from(*b),
            Value::Date(d) => ToSqlOutput::from(d.format(DATE_FORMAT).to_string()),
        })
    }
}

/// SQLite has no date or boolean storage class, so the declared column
/// type decides whether stored text or integers come back as one.
/// Expressions without a declared type keep their storage class.
fn value_from_ref(value: ValueRef<'_>, decl_type: Option<&str>) -> Value {
    match (value, decl_type) {
        (ValueRef::Null, _) => Value::Null,
        (ValueRef::Integer(i), Some("BOOLEAN" | "BOOL")) => Value::Boolean(i != 0),
        (ValueRef::Integer(i), _) => Value::Integer(i),
        (ValueRef::Real(r), _) => Value::Real(r),
        (ValueRef::Text(t), decl) => {
            let text = String::from_utf8_lossy(t);
            match decl {
                Some("DATE") => match NaiveDate::parse_from_str(&text, DATE_FORMAT) {
                    Ok(date) => Value::Date(date),
                    Err(_) => Value::Text(text.into_owned()),
                },
                _ => Value::Text(text.into_owned()),
            }
        }
        (ValueRef::Blob(b), _) => Value::Blob(b.to_vec()),
    }
}

/// [`SqlExecutor`] over a rusqlite connection.
///
/// SQLite only knows explicit transactions, so turning auto-commit off
/// opens one with `BEGIN` and every commit or rollback opens the next,
/// which is how a JDBC-style connection behaves.
pub struct SqliteExecutor {
    connection: Connection,
    auto_commit: bool,
}

impl SqliteExecutor {
    pub fn open(path: impl AsRef<Path>) -> DriverResult<Self> {
        let path = path.as_ref();
        debug!("opening sqlite database at path: {}", path.display());
        Ok(Self::from_connection(Connection::open(path)?))
    }

    pub fn open_in_memory() -> DriverResult<Self> {
        Ok(Self::from_connection(Connection::open_in_memory()?))
    }

    pub fn from_connection(connection: Connection) -> Self {
        Self {
            connection,
            auto_commit: true,
        }
    }

    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    fn in_transaction(&self) -> bool {
        !self.connection.is_autocommit()
    }
}

impl SqlExecutor for SqliteExecutor {
    fn execute(&mut self, sql: &str, params: &[Value]) -> DriverResult<u64> {
        let changed = self.connection.execute(sql, params_from_iter(params.iter()))?;
        Ok(changed as u64)
    }

    fn query(&mut self, sql: &str, params: &[Value]) -> DriverResult<QueryResult> {
        let mut stmt = self.connection.prepare(sql)?;
        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let decl_types: Vec<Option<String>> = stmt
            .columns()
            .iter()
            .map(|c| c.decl_type().map(str::to_ascii_uppercase))
            .collect();
        let width = columns.len();

        let mut rows = stmt.query(params_from_iter(params.iter()))?;
        let mut values = Vec::new();
        while let Some(row) = rows.next()? {
            let mut record = Vec::with_capacity(width);
            for idx in 0..width {
                record.push(value_from_ref(row.get_ref(idx)?, decl_types[idx].as_deref()));
            }
            values.push(record);
        }
        Ok(QueryResult::new(columns, values))
    }

    fn execute_batch(&mut self, sql: &str, batch: &[Vec<Value>]) -> DriverResult<Vec<u64>> {
        let mut stmt = self.connection.prepare(sql)?;
        batch
            .iter()
            .map(|params| {
                stmt.execute(params_from_iter(params.iter()))
                    .map(|n| n as u64)
                    .map_err(DriverError::from)
            })
            .collect()
    }

    fn auto_commit(&self) -> bool {
        self.auto_commit
    }

    fn set_auto_commit(&mut self, enabled: bool) -> DriverResult<()> {
        if enabled == self.auto_commit {
            return Ok(());
        }
        if enabled {
            if self.in_transaction() {
                self.connection.execute_batch("COMMIT")?;
            }
        } else {
            self.connection.execute_batch("BEGIN")?;
        }
        self.auto_commit = enabled;
        Ok(())
    }

    fn commit(&mut self) -> DriverResult<()> {
        if self.auto_commit {
            return Err(DriverError::new("cannot commit while auto-commit is enabled"));
        }
        if self.in_transaction() {
            self.connection.execute_batch("COMMIT")?;
        }
        self.connection.execute_batch("BEGIN")?;
        Ok(())
    }

    fn rollback(&mut self) -> DriverResult<()> {
        if self.auto_commit {
            return Err(DriverError::new("cannot roll back while auto-commit is enabled"));
        }
        if self.in_transaction() {
            self.connection.execute_batch("ROLLBACK")?;
        }
        self.connection.execute_batch("BEGIN")?;
        Ok(())
    }

    fn table_exists(&mut self, table: &str) -> DriverResult<bool> {
        let found: Option<i64> = self
            .connection
            .query_row(
                "SELECT 1 FROM sqlite_master WHERE type IN ('table', 'view') AND name = ?1",
                [table],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }
}
