mod sqlite;

pub use self::sqlite::SqliteExecutor;

use crate::error::DriverError;
use crate::value::Value;

pub type DriverResult<T> = std::result::Result<T, DriverError>;

/// Tabular output of a query: column labels plus rows in result order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl QueryResult {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        Self { columns, rows }
    }

    pub fn column_index(&self, label: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.eq_ignore_ascii_case(label))
    }
}

/// An open connection able to run statements and manage transactions.
///
/// Implementations are not expected to be thread-safe; callers hold them
/// by `&mut` for the length of one operation.
pub trait SqlExecutor {
    /// Run a statement and return the number of rows it changed.
    fn execute(&mut self, sql: &str, params: &[Value]) -> DriverResult<u64>;

    fn query(&mut self, sql: &str, params: &[Value]) -> DriverResult<QueryResult>;

    /// Run one prepared statement once per parameter set.
    ///
    /// Stops at the first failing set; changes from earlier sets stay in
    /// the current transaction for the caller to commit or roll back.
    fn execute_batch(&mut self, sql: &str, batch: &[Vec<Value>]) -> DriverResult<Vec<u64>> {
        let mut affected = Vec::with_capacity(batch.len());
        for params in batch {
            affected.push(self.execute(sql, params)?);
        }
        Ok(affected)
    }

    fn auto_commit(&self) -> bool;

    fn set_auto_commit(&mut self, enabled: bool) -> DriverResult<()>;

    fn commit(&mut self) -> DriverResult<()>;

    fn rollback(&mut self) -> DriverResult<()>;

    fn table_exists(&mut self, table: &str) -> DriverResult<bool>;
}
