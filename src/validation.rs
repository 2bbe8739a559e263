use regex::Regex;
use std::sync::LazyLock;
use tracing::debug;

use crate::error::{Error, Result, ValidationKind};
use crate::value::{ColumnSpec, Row, Value};

pub const MAX_BATCH_TEXT_LEN: usize = 250;

static IDENTIFIER_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^[a-zA-Z0-9_"'.,:;]+$"#).expect("IDENTIFIER_REGEX pattern is valid")
});

static DATE_LITERAL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\d{2}/\d{2}/\d{4}$").expect("DATE_LITERAL_REGEX pattern is valid")
});

static BATCH_TEXT_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9]+$").expect("BATCH_TEXT_REGEX pattern is valid")
});

const PARAMETERIZED_TYPES: [&str; 3] = ["VARCHAR(", "CHAR(", "DECIMAL("];

pub fn is_valid_identifier(name: &str) -> bool {
    !name.is_empty() && IDENTIFIER_REGEX.is_match(name)
}

pub fn is_valid_type(type_text: &str) -> bool {
    if type_text.is_empty() {
        return false;
    }
    IDENTIFIER_REGEX.is_match(type_text)
        || DATE_LITERAL_REGEX.is_match(type_text)
        || PARAMETERIZED_TYPES
            .iter()
            .any(|prefix| type_text.starts_with(prefix) && type_text.ends_with(')'))
        || type_text == "DATE"
}

/// Only short alphanumeric text is accepted on the batch path.
pub fn is_valid_scalar_for_batch(value: &Value) -> bool {
    match value {
        Value::Text(s) => s.chars().count() <= MAX_BATCH_TEXT_LEN && BATCH_TEXT_REGEX.is_match(s),
        _ => false,
    }
}

pub fn validate_table_name(name: &str) -> Result<()> {
    if !is_valid_identifier(name) {
        return Err(Error::validation(
            ValidationKind::InvalidIdentifier,
            format!("Invalid table name: {:?}", name),
        ));
    }
    debug!(table = name, "table name is valid");
    Ok(())
}

fn validate_column_name(table: &str, name: &str) -> Result<()> {
    if !is_valid_identifier(name) {
        return Err(Error::validation(
            ValidationKind::InvalidIdentifier,
            format!("Invalid column name {:?} for table {}", name, table),
        ));
    }
    Ok(())
}

pub fn validate_column_spec(table: &str, columns: &ColumnSpec) -> Result<()> {
    if columns.is_empty() {
        return Err(Error::EmptyColumnSet {
            table: table.to_string(),
        });
    }
    for (name, type_text) in columns.iter() {
        validate_column_name(table, name)?;
        if !is_valid_type(type_text) {
            return Err(Error::validation(
                ValidationKind::InvalidType,
                format!("Invalid type {:?} for column {} of table {}", type_text, name, table),
            ));
        }
    }
    debug!(table, columns = columns.len(), "column spec is valid");
    Ok(())
}

/// Projection list for SELECT; `*` stands for every column.
pub fn validate_select_columns(table: &str, columns: &[&str]) -> Result<()> {
    if columns.is_empty() {
        return Err(Error::EmptyColumnSet {
            table: table.to_string(),
        });
    }
    for column in columns {
        if *column != "*" {
            validate_column_name(table, column)?;
        }
    }
    Ok(())
}

pub fn validate_values(table: &str, values: &Row) -> Result<()> {
    if values.is_empty() {
        return Err(Error::EmptyColumnSet {
            table: table.to_string(),
        });
    }
    for (column, value) in values.iter() {
        validate_column_name(table, column)?;
        if value.is_null() {
            return Err(Error::validation(
                ValidationKind::InvalidValue,
                format!("Column {} of table {} cannot be NULL", column, table),
            ));
        }
    }
    Ok(())
}

pub fn validate_where_clause(table: &str, where_clause: &str) -> Result<()> {
    if where_clause.trim().is_empty() {
        return Err(Error::validation(
            ValidationKind::InvalidValue,
            format!("WHERE clause for table {} cannot be empty", table),
        ));
    }
    Ok(())
}

pub fn validate_rows(table: &str, rows: &[Row]) -> Result<()> {
    if rows.is_empty() {
        return Err(Error::validation(
            ValidationKind::InvalidValue,
            format!("No rows given for table {}", table),
        ));
    }
    Ok(())
}

/// Why a batch row must be dropped, or `None` when it can be queued.
pub fn row_skip_reason(row: &Row) -> Option<String> {
    if row.is_empty() {
        return Some("row is empty".to_string());
    }
    for (column, value) in row.iter() {
        if !is_valid_identifier(column) {
            return Some(format!("column name {:?} is not valid", column));
        }
        if !is_valid_scalar_for_batch(value) {
            return Some(format!("value {} for column {} is not valid", value, column));
        }
    }
    None
}
