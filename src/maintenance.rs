//! Backup, restore and integrity checks.
//!
//! Unlike [`crate::table_ops`], these operations report statement
//! failures twice: once in a diagnostic file written through
//! [`DiagnosticSink`], and once to the caller.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{error, info, warn};

use crate::cipher::ArchiveCipher;
use crate::diagnostics::DiagnosticSink;
use crate::error::{DriverError, Error, Result, ValidationKind};
use crate::executor::SqlExecutor;
use crate::sql_builder;
use crate::validation::{is_valid_identifier, validate_table_name};
use crate::value::Value;

const MESSAGE_COLUMN: &str = "MessageText";

/// How a restore is confirmed after the RESTORE statement succeeds.
#[derive(Debug, Clone, PartialEq)]
pub enum RestoreVerification {
    /// A `COUNT(*)` against this table must succeed.
    Probe { table: String },
    /// Every listed table must exist afterwards.
    ExpectedTables(Vec<String>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum IntegrityReport {
    Clean,
    Issues(Vec<String>),
    /// The check itself could not run; nothing is known about integrity.
    Unknown { reason: String },
}

impl IntegrityReport {
    pub fn is_clean(&self) -> bool {
        matches!(self, IntegrityReport::Clean)
    }
}

fn validate_database_name(name: &str) -> Result<()> {
    if !is_valid_identifier(name) {
        return Err(Error::validation(
            ValidationKind::InvalidIdentifier,
            format!("Invalid database name: {:?}", name),
        ));
    }
    Ok(())
}

fn path_param(path: &Path) -> Value {
    Value::Text(path.to_string_lossy().into_owned())
}

/// A backup counts only if the file is there and not empty.
fn backup_file_ok(path: &Path) -> bool {
    match fs::metadata(path) {
        Ok(meta) if meta.is_file() && meta.len() > 0 => {
            info!(path = %path.display(), bytes = meta.len(), "backup file verified");
            true
        }
        Ok(_) => {
            warn!(path = %path.display(), "backup file is empty");
            false
        }
        Err(e) => {
            warn!(path = %path.display(), "backup file missing: {}", e);
            false
        }
    }
}

pub struct Maintenance<'a, E: SqlExecutor> {
    executor: &'a mut E,
    diagnostics: DiagnosticSink,
}

impl<'a, E: SqlExecutor> Maintenance<'a, E> {
    pub fn new(executor: &'a mut E, diagnostics: DiagnosticSink) -> Self {
        Self {
            executor,
            diagnostics,
        }
    }

    fn report(&self, context: &str, err: &DriverError) {
        error!("{}: {}", context, err);
        self.diagnostics.record(context, &err.message);
    }

    pub fn backup_database(&mut self, backup_path: &Path, db_name: &str) -> Result<bool> {
        validate_database_name(db_name)?;

        let sql = sql_builder::backup(db_name);
        if let Err(e) = self.executor.execute(&sql, &[path_param(backup_path)]) {
            self.report(&format!("backup of database {} failed", db_name), &e);
            return Err(Error::sql("backup_database", db_name, e));
        }

        Ok(backup_file_ok(backup_path))
    }

    pub fn restore_database(
        &mut self,
        backup_path: &Path,
        db_name: &str,
        replace: bool,
        verification: &RestoreVerification,
    ) -> Result<bool> {
        validate_database_name(db_name)?;
        match verification {
            RestoreVerification::Probe { table } => validate_table_name(table)?,
            RestoreVerification::ExpectedTables(tables) => {
                for table in tables {
                    validate_table_name(table)?;
                }
            }
        }

        let sql = sql_builder::restore(db_name, replace);
        if let Err(e) = self.executor.execute(&sql, &[path_param(backup_path)]) {
            self.report(&format!("restore of database {} failed", db_name), &e);
            return Err(Error::sql("restore_database", db_name, e));
        }

        Ok(self.verify_restore(db_name, verification))
    }

    fn verify_restore(&mut self, db_name: &str, verification: &RestoreVerification) -> bool {
        match verification {
            RestoreVerification::Probe { table } => {
                let sql = sql_builder::count(table);
                match self.executor.query(&sql, &[]) {
                    Ok(result) if !result.rows.is_empty() => {
                        info!(db = db_name, table = %table, "restore probe succeeded");
                        true
                    }
                    Ok(_) => {
                        warn!(db = db_name, table = %table, "restore probe returned no rows");
                        false
                    }
                    Err(e) => {
                        self.report(&format!("verifying restore of {} failed", db_name), &e);
                        false
                    }
                }
            }
            RestoreVerification::ExpectedTables(tables) => {
                for table in tables {
                    match self.executor.table_exists(table) {
                        Ok(true) => {}
                        Ok(false) => {
                            warn!(db = db_name, table = %table, "table missing after restore");
                            return false;
                        }
                        Err(e) => {
                            self.report(&format!("verifying restore of {} failed", db_name), &e);
                            return false;
                        }
                    }
                }
                info!(db = db_name, tables = tables.len(), "restored tables verified");
                true
            }
        }
    }

    /// Run `DBCC CHECKDB` and collect its messages.
    ///
    /// Only invalid arguments are returned as errors. A failing check
    /// becomes [`IntegrityReport::Unknown`].
    pub fn check_integrity(
        &mut self,
        db_name: &str,
        repair_option: Option<&str>,
        use_tablock: bool,
    ) -> Result<IntegrityReport> {
        validate_database_name(db_name)?;
        if let Some(option) = repair_option {
            if !is_valid_identifier(option) {
                return Err(Error::validation(
                    ValidationKind::InvalidValue,
                    format!("Invalid repair option: {:?}", option),
                ));
            }
        }

        let sql = sql_builder::integrity_check(repair_option, use_tablock);
        let result = match self.executor.query(&sql, &[Value::from(db_name)]) {
            Ok(result) => result,
            Err(e) => {
                self.report(&format!("integrity check of {} failed", db_name), &e);
                return Ok(IntegrityReport::Unknown { reason: e.message });
            }
        };

        let column = result.column_index(MESSAGE_COLUMN).unwrap_or(0);
        let messages: Vec<String> = result
            .rows
            .iter()
            .filter_map(|row| row.get(column))
            .filter(|v| !v.is_null())
            .map(|v| v.as_text().map_or_else(|| v.to_string(), str::to_owned))
            .collect();

        if messages.is_empty() {
            info!(db = db_name, "integrity check found no issues");
            Ok(IntegrityReport::Clean)
        } else {
            warn!(db = db_name, issues = messages.len(), "integrity check reported issues");
            Ok(IntegrityReport::Issues(messages))
        }
    }

    /// Back up, then encrypt the verified archive. `None` when the backup
    /// could not be verified.
    pub fn backup_and_encrypt<C: ArchiveCipher>(
        &mut self,
        cipher: &C,
        backup_path: &Path,
        db_name: &str,
        key: &str,
    ) -> Result<Option<PathBuf>> {
        if !self.backup_database(backup_path, db_name)? {
            return Ok(None);
        }
        let encrypted = cipher
            .encrypt(backup_path, key)
            .map_err(|e| e.with_context("backup_and_encrypt", Some(db_name)))?;
        info!(db = db_name, path = %encrypted.display(), "backup encrypted");
        Ok(Some(encrypted))
    }

    pub fn decrypt_and_restore<C: ArchiveCipher>(
        &mut self,
        cipher: &C,
        encrypted_path: &Path,
        db_name: &str,
        key: &str,
        replace: bool,
        verification: &RestoreVerification,
    ) -> Result<bool> {
        let plain = cipher
            .decrypt(encrypted_path, key)
            .map_err(|e| e.with_context("decrypt_and_restore", Some(db_name)))?;
        self.restore_database(&plain, db_name, replace, verification)
    }
}
