use tracing::{error, info};

use crate::config::{ConnectionSettings, DatabaseName, Engine};
use crate::error::{Error, Result};
use crate::executor::SqlExecutor;
use crate::sql_builder;

/// Creates databases on a server, chosen once from the configured engine.
#[derive(Debug, Clone, PartialEq)]
pub enum DatabaseCreator {
    MySql { url: String, user: String },
    PostgreSql { url: String, user: String },
}

impl DatabaseCreator {
    pub fn from_settings(settings: &ConnectionSettings) -> Self {
        let url = settings.url();
        let user = settings.user.get().to_string();
        match settings.engine {
            Engine::Mysql => DatabaseCreator::MySql { url, user },
            Engine::Postgresql => DatabaseCreator::PostgreSql { url, user },
        }
    }

    pub fn url(&self) -> &str {
        match self {
            DatabaseCreator::MySql { url, .. } | DatabaseCreator::PostgreSql { url, .. } => url,
        }
    }

    /// Issue `CREATE DATABASE` through `executor`, which must already be
    /// connected to the server behind [`DatabaseCreator::url`].
    pub fn create_database<E: SqlExecutor>(
        &self,
        executor: &mut E,
        name: &DatabaseName,
    ) -> Result<bool> {
        let sql = sql_builder::create_database(name.get());
        match executor.execute(&sql, &[]) {
            Ok(_) => {
                info!(url = self.url(), database = name.get(), "database created");
                Ok(true)
            }
            Err(e) => {
                error!(url = self.url(), database = name.get(), "could not create database: {}", e);
                Err(Error::sql("create_database", name.get(), e))
            }
        }
    }
}
