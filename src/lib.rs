//! Schema-agnostic table manipulation over an open SQL connection.
//!
//! # Intention
//!
//! - Validate table names, column names, types and values before any SQL
//!   is sent.
//! - Build statement text for each operation and run it through a
//!   caller-owned [`SqlExecutor`].
//! - Offer backup, restore and integrity checks with an audit trail.
//!
//! # Architectural Boundaries
//!
//! - The connection belongs to the caller; operations borrow it for one
//!   call and never pool or share it.
//! - Archive encryption is consumed through [`ArchiveCipher`] only.
//! - No query planning, migrations or dialect handling beyond string
//!   building.

pub mod cipher;
pub mod config;
pub mod creator;
pub mod diagnostics;
pub mod error;
pub mod executor;
pub mod logging;
pub mod maintenance;
pub mod mapper;
pub mod sql_builder;
pub mod table_ops;
pub mod validation;
pub mod value;

pub use cipher::ArchiveCipher;
pub use config::{Config, ConnectionSettings, DatabaseName, LogFormat};
pub use creator::DatabaseCreator;
pub use diagnostics::DiagnosticSink;
pub use error::{DriverError, Error, Result, ValidationKind};
pub use executor::{QueryResult, SqlExecutor, SqliteExecutor};
pub use maintenance::{IntegrityReport, Maintenance, RestoreVerification};
pub use table_ops::{BatchOutcome, TableOps};
pub use value::{ColumnSpec, Row, Value};
