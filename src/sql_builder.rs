//! Statement text for each table and maintenance operation.
//!
//! Builders only concatenate; callers validate identifiers first. Values
//! are never inlined: every builder that carries data emits one `?` per
//! value, in key order.

use crate::error::{Error, Result};
use crate::value::{ColumnSpec, Row};

fn push_joined<'a>(sql: &mut String, items: impl Iterator<Item = &'a str>, suffix: &str) {
    for (i, item) in items.enumerate() {
        if i > 0 {
            sql.push_str(", ");
        }
        sql.push_str(item);
        sql.push_str(suffix);
    }
}

fn empty_columns(table: &str) -> Error {
    Error::EmptyColumnSet {
        table: table.to_string(),
    }
}

pub fn create_table(table: &str, columns: &ColumnSpec) -> Result<String> {
    if columns.is_empty() {
        return Err(empty_columns(table));
    }
    let mut sql = String::with_capacity(16 + table.len() + columns.len() * 24);
    sql.push_str("CREATE TABLE ");
    sql.push_str(table);
    sql.push_str(" (");
    for (i, (name, type_text)) in columns.iter().enumerate() {
        if i > 0 {
            sql.push_str(", ");
        }
        sql.push_str(name);
        sql.push(' ');
        sql.push_str(type_text);
    }
    sql.push(')');
    Ok(sql)
}

pub fn insert(table: &str, row: &Row) -> Result<String> {
    if row.is_empty() {
        return Err(empty_columns(table));
    }
    let mut sql = String::with_capacity(24 + table.len() + row.len() * 16);
    sql.push_str("INSERT INTO ");
    sql.push_str(table);
    sql.push_str(" (");
    push_joined(&mut sql, row.keys(), "");
    sql.push_str(") VALUES (");
    push_joined(&mut sql, std::iter::repeat("?").take(row.len()), "");
    sql.push(')');
    Ok(sql)
}

pub fn update(table: &str, values: &Row, where_clause: &str) -> Result<String> {
    if values.is_empty() {
        return Err(empty_columns(table));
    }
    let mut sql = String::with_capacity(24 + table.len() + values.len() * 16 + where_clause.len());
    sql.push_str("UPDATE ");
    sql.push_str(table);
    sql.push_str(" SET ");
    push_joined(&mut sql, values.keys(), " = ?");
    sql.push_str(" WHERE ");
    sql.push_str(where_clause);
    Ok(sql)
}

pub fn delete(table: &str, where_clause: &str) -> String {
    format!("DELETE FROM {} WHERE {}", table, where_clause)
}

pub fn select(table: &str, columns: &[&str], where_clause: &str) -> Result<String> {
    if columns.is_empty() {
        return Err(empty_columns(table));
    }
    let mut sql = String::with_capacity(24 + table.len() + columns.len() * 12 + where_clause.len());
    sql.push_str("SELECT ");
    push_joined(&mut sql, columns.iter().copied(), "");
    sql.push_str(" FROM ");
    sql.push_str(table);
    sql.push_str(" WHERE ");
    sql.push_str(where_clause);
    Ok(sql)
}

pub fn select_all(table: &str, where_clause: &str) -> String {
    format!("SELECT * FROM {} WHERE {}", table, where_clause)
}

pub fn drop_table(table: &str) -> String {
    format!("DROP TABLE {}", table)
}

pub fn count(table: &str) -> String {
    format!("SELECT COUNT(*) FROM {}", table)
}

pub fn create_database(name: &str) -> String {
    format!("CREATE DATABASE {}", name)
}

/// The backup path is bound to the single placeholder.
pub fn backup(db_name: &str) -> String {
    format!("BACKUP DATABASE {} TO DISK = ?", db_name)
}

pub fn restore(db_name: &str, replace: bool) -> String {
    let mut sql = format!("RESTORE DATABASE {} FROM DISK = ?", db_name);
    if replace {
        sql.push_str(" WITH REPLACE");
    }
    sql
}

/// The database name is bound to the `CHECKDB(?)` placeholder.
pub fn integrity_check(repair_option: Option<&str>, use_tablock: bool) -> String {
    let mut sql = String::from("DBCC CHECKDB(?) WITH NO_INFOMSGS, ALL_ERRORMSGS");
    if let Some(option) = repair_option {
        sql.push_str(", REPAIR_");
        sql.push_str(option);
    }
    if use_tablock {
        sql.push_str(", TABLOCK");
    }
    sql
}
