use thiserror::Error;

/// Failure reported by the connection underneath an operation.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{message}")]
pub struct DriverError {
    pub message: String,
}

impl DriverError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<rusqlite::Error> for DriverError {
    fn from(err: rusqlite::Error) -> Self {
        Self::new(err.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationKind {
    InvalidIdentifier,
    InvalidType,
    InvalidValue,
}

impl std::fmt::Display for ValidationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ValidationKind::InvalidIdentifier => "invalid identifier",
            ValidationKind::InvalidType => "invalid type",
            ValidationKind::InvalidValue => "invalid value",
        };
        f.write_str(s)
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("Validation error ({kind}): {detail}")]
    Validation { kind: ValidationKind, detail: String },

    #[error("Table {table} needs at least one column")]
    EmptyColumnSet { table: String },

    #[error("Table already exists: {0}")]
    TableAlreadyExists(String),

    #[error("Table not found: {0}")]
    TableNotFound(String),

    #[error("SQL error during {operation} on {table}: {source}")]
    SqlExecution {
        operation: String,
        table: String,
        #[source]
        source: DriverError,
    },

    #[error("Transaction error on {table}: {detail}")]
    Transaction { table: String, detail: String },

    #[error("Count query on {0} returned no rows")]
    CountQuery(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Cipher error: {0}")]
    Cipher(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn validation(kind: ValidationKind, detail: impl Into<String>) -> Self {
        Error::Validation {
            kind,
            detail: detail.into(),
        }
    }

    pub fn sql(operation: &str, table: &str, source: impl Into<DriverError>) -> Self {
        Error::SqlExecution {
            operation: operation.to_string(),
            table: table.to_string(),
            source: source.into(),
        }
    }

    /// Prefixes free-form messages with `[operation=…, table=…]`.
    pub fn with_context(self, operation: &str, table: Option<&str>) -> Self {
        let context = match table {
            Some(t) => format!("[operation={}, table={}]", operation, t),
            None => format!("[operation={}]", operation),
        };

        match self {
            Error::Transaction { table, detail } => Error::Transaction {
                table,
                detail: format!("{} {}", context, detail),
            },
            Error::Config(msg) => Error::Config(format!("{} {}", context, msg)),
            Error::Cipher(msg) => Error::Cipher(format!("{} {}", context, msg)),
            other => other,
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Error::Validation { .. } | Error::EmptyColumnSet { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
