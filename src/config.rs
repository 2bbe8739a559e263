use serde::Deserialize;
use std::fmt;
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::diagnostics::DiagnosticSink;
use crate::error::{Error, Result};
use crate::validation::is_valid_identifier;

pub const DEFAULT_IP: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 3306;
pub const DEFAULT_USER: &str = "root";
pub const DEFAULT_DATABASE: &str = "fenix";
pub const MAX_USER_LEN: usize = 15;
pub const MAX_DATABASE_NAME_LEN: usize = 9;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IpAddress(String);

impl IpAddress {
    pub fn new(ip: &str) -> Result<Self> {
        ip.parse::<Ipv4Addr>()
            .map_err(|_| Error::Config(format!("Invalid IPv4 address: {}", ip)))?;
        Ok(Self(ip.to_string()))
    }

    pub fn get(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Port(u16);

impl Port {
    pub fn new(port: u32) -> Result<Self> {
        if port == 0 || port > u16::MAX as u32 {
            return Err(Error::Config(format!("Port out of range: {}", port)));
        }
        Ok(Self(port as u16))
    }

    pub fn get(&self) -> u16 {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserName(String);

impl UserName {
    pub fn new(user: &str) -> Result<Self> {
        if user.is_empty() || user.chars().count() > MAX_USER_LEN {
            return Err(Error::Config(format!(
                "User name must be 1 to {} characters",
                MAX_USER_LEN
            )));
        }
        Ok(Self(user.to_string()))
    }

    pub fn get(&self) -> &str {
        &self.0
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct Password(String);

impl Password {
    pub fn new(password: &str) -> Self {
        Self(password.to_string())
    }

    pub fn get(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Password(***)")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseName(String);

impl DatabaseName {
    pub fn new(name: &str) -> Result<Self> {
        if name.is_empty() || name.chars().count() > MAX_DATABASE_NAME_LEN {
            return Err(Error::Config(format!(
                "Database name must be 1 to {} characters",
                MAX_DATABASE_NAME_LEN
            )));
        }
        if !is_valid_identifier(name) {
            return Err(Error::Config(format!("Invalid database name: {}", name)));
        }
        Ok(Self(name.to_string()))
    }

    /// Like [`DatabaseName::new`], also refusing names already in `known`.
    pub fn new_unique(name: &str, known: &[DatabaseName]) -> Result<Self> {
        let candidate = Self::new(name)?;
        if known.contains(&candidate) {
            return Err(Error::Config(format!("Database name already in use: {}", name)));
        }
        Ok(candidate)
    }

    pub fn get(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Engine {
    #[default]
    Mysql,
    Postgresql,
}

/// Validated connection settings, built once and passed around by value.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionSettings {
    pub ip: IpAddress,
    pub port: Port,
    pub user: UserName,
    pub password: Password,
    pub database: DatabaseName,
    pub engine: Engine,
}

impl ConnectionSettings {
    /// Server URL without a database, e.g. `mysql://127.0.0.1:3306/`.
    pub fn url(&self) -> String {
        let scheme = match self.engine {
            Engine::Mysql => "mysql",
            Engine::Postgresql => "postgresql",
        };
        format!("{}://{}:{}/", scheme, self.ip.get(), self.port.get())
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ConnectionConfig {
    #[serde(default = "default_ip")]
    pub ip: String,
    #[serde(default = "default_port")]
    pub port: u32,
    #[serde(default = "default_user")]
    pub user: String,
    #[serde(default)]
    pub password: String,
    #[serde(default = "default_database")]
    pub database: String,
    #[serde(default)]
    pub engine: Engine,
}

fn default_ip() -> String {
    DEFAULT_IP.to_string()
}

fn default_port() -> u32 {
    DEFAULT_PORT as u32
}

fn default_user() -> String {
    DEFAULT_USER.to_string()
}

fn default_database() -> String {
    DEFAULT_DATABASE.to_string()
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            ip: default_ip(),
            port: default_port(),
            user: default_user(),
            password: String::new(),
            database: default_database(),
            engine: Engine::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct DiagnosticsConfig {
    #[serde(default = "std::env::temp_dir")]
    pub dir: PathBuf,
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            dir: std::env::temp_dir(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Json,
    #[default]
    Text,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct LoggingConfig {
    #[serde(default)]
    pub format: LogFormat,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub connection: ConnectionConfig,
    #[serde(default)]
    pub diagnostics: DiagnosticsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) => {
                let contents = std::fs::read_to_string(p)
                    .map_err(|e| Error::Config(format!("Cannot read config file: {}", e)))?;
                toml::from_str(&contents)
                    .map_err(|e| Error::Config(format!("Invalid config file: {}", e)))?
            }
            None => Config::default(),
        };

        if let Ok(val) = std::env::var("DBMANIP_IP") {
            config.connection.ip = val;
        }
        if let Ok(val) = std::env::var("DBMANIP_PORT") {
            config.connection.port = val
                .parse()
                .map_err(|_| Error::Config(format!("Invalid DBMANIP_PORT: {}", val)))?;
        }
        if let Ok(val) = std::env::var("DBMANIP_USER") {
            config.connection.user = val;
        }
        if let Ok(val) = std::env::var("DBMANIP_PASSWORD") {
            config.connection.password = val;
        }
        if let Ok(val) = std::env::var("DBMANIP_DATABASE") {
            config.connection.database = val;
        }
        if let Ok(val) = std::env::var("DBMANIP_DIAGNOSTICS_DIR") {
            config.diagnostics.dir = PathBuf::from(val);
        }
        if let Ok(val) = std::env::var("DBMANIP_LOG_FORMAT") {
            config.logging.format = match val.to_lowercase().as_str() {
                "json" => LogFormat::Json,
                _ => LogFormat::Text,
            };
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.connection()?;
        if !self.diagnostics.dir.is_dir() {
            warn!(
                "Diagnostics directory does not exist: {:?}",
                self.diagnostics.dir
            );
        }
        if self.connection.password.is_empty() {
            warn!("No password configured for user {}", self.connection.user);
        }
        Ok(())
    }

    pub fn connection(&self) -> Result<ConnectionSettings> {
        let raw = &self.connection;
        Ok(ConnectionSettings {
            ip: IpAddress::new(&raw.ip)?,
            port: Port::new(raw.port)?,
            user: UserName::new(&raw.user)?,
            password: Password::new(&raw.password),
            database: DatabaseName::new(&raw.database)?,
            engine: raw.engine,
        })
    }

    pub fn diagnostic_sink(&self) -> DiagnosticSink {
        DiagnosticSink::new(self.diagnostics.dir.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        let settings = config.connection().unwrap();
        assert_eq!(settings.ip.get(), "127.0.0.1");
        assert_eq!(settings.port.get(), 3306);
        assert_eq!(settings.user.get(), "root");
        assert_eq!(settings.database.get(), "fenix");
        assert_eq!(settings.engine, Engine::Mysql);
        assert_eq!(config.logging.format, LogFormat::Text);
    }

    #[test]
    #[serial]
    fn test_config_load_valid_toml() {
        let dir = tempfile::tempdir().unwrap();
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[connection]
ip = "10.0.0.5"
port = 5432
user = "admin"
password = "hunter2"
database = "shop"
engine = "postgresql"

[diagnostics]
dir = "{}"

[logging]
format = "json"
"#,
            dir.path().display()
        )
        .unwrap();

        let config = Config::load(Some(file.path())).unwrap();
        let settings = config.connection().unwrap();
        assert_eq!(settings.url(), "postgresql://10.0.0.5:5432/");
        assert_eq!(settings.user.get(), "admin");
        assert_eq!(settings.password.get(), "hunter2");
        assert_eq!(config.diagnostics.dir, dir.path());
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    #[serial]
    fn test_config_load_invalid_toml() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "not valid toml {{{{").unwrap();
        assert!(Config::load(Some(file.path())).is_err());
    }

    #[test]
    #[serial]
    fn test_config_load_rejects_bad_connection() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[connection]\nip = \"999.1.1.1\"").unwrap();
        assert!(Config::load(Some(file.path())).is_err());
    }

    #[test]
    #[serial]
    fn test_config_load_missing_file() {
        let result = Config::load(Some(Path::new("/nonexistent/dbmanip.toml")));
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    #[serial]
    fn test_env_var_override_user() {
        env::set_var("DBMANIP_USER", "operator");
        let config = Config::load(None).unwrap();
        env::remove_var("DBMANIP_USER");

        assert_eq!(config.connection.user, "operator");
    }

    #[test]
    fn test_ip_address_validation() {
        assert!(IpAddress::new("192.168.1.20").is_ok());
        assert!(IpAddress::new("256.1.1.1").is_err());
        assert!(IpAddress::new("localhost").is_err());
    }

    #[test]
    fn test_port_validation() {
        assert!(Port::new(1).is_ok());
        assert!(Port::new(65535).is_ok());
        assert!(Port::new(0).is_err());
        assert!(Port::new(70000).is_err());
    }

    #[test]
    fn test_user_name_length() {
        assert!(UserName::new(&"u".repeat(15)).is_ok());
        assert!(UserName::new(&"u".repeat(16)).is_err());
    }

    #[test]
    fn test_database_name_rules() {
        assert!(DatabaseName::new("fenix").is_ok());
        assert!(DatabaseName::new("").is_err());
        assert!(DatabaseName::new("tenletters").is_err());
        assert!(DatabaseName::new("bad name").is_err());
    }

    #[test]
    fn test_database_name_unique() {
        let known = vec![DatabaseName::new("fenix").unwrap()];
        assert!(DatabaseName::new_unique("fenix", &known).is_err());
        assert!(DatabaseName::new_unique("shop", &known).is_ok());
    }

    #[test]
    fn test_password_debug_is_redacted() {
        let debug = format!("{:?}", Password::new("hunter2"));
        assert!(!debug.contains("hunter2"));
    }
}
