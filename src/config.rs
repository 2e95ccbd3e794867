use crate::core::{AdminError, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Top-level configuration structure parsed from a TOML file.
///
/// Every section is optional; missing sections and keys fall back to the
/// defaults below.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub security: SecurityConfig,
    pub management: ManagementConfig,
}

/// MySQL connection configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub charset: String,
    pub collation: String,
    pub connect_timeout_secs: u64,
    pub read_timeout_secs: u64,
    pub write_timeout_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        DatabaseConfig {
            host: "127.0.0.1".to_string(),
            port: 3306,
            user: "root".to_string(),
            password: String::new(),
            charset: "utf8mb4".to_string(),
            collation: "utf8mb4_unicode_ci".to_string(),
            connect_timeout_secs: 10,
            read_timeout_secs: 30,
            write_timeout_secs: 30,
        }
    }
}

/// Tool server configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub name: String,
    /// Only "stdio" is supported
    pub transport: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            name: "MySQL Admin Server".to_string(),
            transport: "stdio".to_string(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive, e.g. "info" or "mysqladm=debug"
    pub level: String,
    /// Log file to append to; stderr when absent
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: "info".to_string(),
            file: None,
        }
    }
}

/// Input limits and protected objects.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    pub max_query_length: usize,
    /// Statement kinds `execute_sql` may run; "*" allows everything
    pub allowed_operations: Vec<String>,
    pub table_name_pattern: String,
    pub max_results: u64,
    pub protected_databases: Vec<String>,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        SecurityConfig {
            max_query_length: 10_000,
            allowed_operations: vec!["SELECT".to_string()],
            table_name_pattern: r"^[a-zA-Z0-9_-]+$".to_string(),
            max_results: 1000,
            protected_databases: vec![
                "mysql".to_string(),
                "information_schema".to_string(),
                "performance_schema".to_string(),
                "sys".to_string(),
            ],
        }
    }
}

/// Database management policy.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ManagementConfig {
    pub default_charset: String,
    pub default_collation: String,
    pub allow_system_db_operations: bool,
    pub max_database_name_length: usize,
    pub backup_before_delete: bool,
    pub auto_switch_on_create: bool,
    /// Drop a copy target created by `copy_database` when a later step fails
    pub compensate_failed_copy: bool,
}

impl Default for ManagementConfig {
    fn default() -> Self {
        ManagementConfig {
            default_charset: "utf8mb4".to_string(),
            default_collation: "utf8mb4_unicode_ci".to_string(),
            allow_system_db_operations: false,
            max_database_name_length: 64,
            backup_before_delete: true,
            auto_switch_on_create: false,
            compensate_failed_copy: false,
        }
    }
}

impl Config {
    /// Parses configuration from TOML text and validates it.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(content).map_err(|e| AdminError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Applies `MYSQL_*` and `LOG_*` environment overrides through `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("MYSQL_HOST") {
            self.database.host = host;
        }
        if let Some(port) = lookup("MYSQL_PORT") {
            self.database.port = port
                .parse()
                .map_err(|_| AdminError::Config(format!("Invalid MYSQL_PORT '{}'", port)))?;
        }
        if let Some(user) = lookup("MYSQL_USER") {
            self.database.user = user;
        }
        if let Some(password) = lookup("MYSQL_PASSWORD") {
            self.database.password = password;
        }
        if let Some(level) = lookup("LOG_LEVEL") {
            self.logging.level = level.to_lowercase();
        }
        if let Some(file) = lookup("LOG_FILE") {
            self.logging.file = Some(PathBuf::from(file));
        }
        Ok(())
    }

    /// Checks values that deserialize fine but cannot be used.
    pub fn validate(&self) -> Result<()> {
        if self.server.transport != "stdio" {
            return Err(AdminError::Config(format!(
                "Unsupported transport '{}', only 'stdio' is available",
                self.server.transport
            )));
        }
        if self.security.max_results == 0 {
            return Err(AdminError::Config("security.max_results must be at least 1".to_string()));
        }
        if self.management.max_database_name_length == 0 {
            return Err(AdminError::Config(
                "management.max_database_name_length must be at least 1".to_string(),
            ));
        }
        regex::Regex::new(&self.security.table_name_pattern).map_err(|e| {
            AdminError::Config(format!("Invalid security.table_name_pattern: {}", e))
        })?;
        Ok(())
    }
}

/// Loads configuration from a TOML file at the given path.
///
/// # Arguments
///
/// * `path` - The file path to the TOML configuration file.
///
/// # Example
///
/// ```no_run
/// let config = mysqladm::config::load_config("config.toml").expect("Failed to load config");
/// println!("{:?}", config);
/// ```
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let content = fs::read_to_string(path)?;
    Config::from_toml(&content)
}

/// Resolves the configuration file: explicit path, then `$MYSQLADM_CONFIG`,
/// then `<config dir>/mysqladm/config.toml` if it exists.
pub fn config_path(explicit: Option<&str>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(PathBuf::from(path));
    }
    if let Ok(path) = std::env::var("MYSQLADM_CONFIG") {
        return Some(PathBuf::from(path));
    }
    dirs::config_dir()
        .map(|dir| dir.join("mysqladm").join("config.toml"))
        .filter(|path| path.exists())
}

/// Loads the startup configuration: file (if any), then environment overrides.
pub fn load(explicit: Option<&str>) -> Result<Config> {
    let mut config = match config_path(explicit) {
        Some(path) => load_config(path)?,
        None => Config::default(),
    };
    config.apply_overrides(|key| std::env::var(key).ok())?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const SAMPLE_CONFIG: &str = r#"
[database]
host = "db.internal"
port = 3307
user = "admin"
password = "secret"

[logging]
level = "debug"
file = "/var/log/mysqladm.log"

[security]
max_results = 500
allowed_operations = ["SELECT", "SHOW"]

[management]
backup_before_delete = false
auto_switch_on_create = true
"#;

    #[test]
    fn test_load_config_from_str() {
        let config = Config::from_toml(SAMPLE_CONFIG).expect("Failed to parse sample config");
        assert_eq!(config.database.host, "db.internal");
        assert_eq!(config.database.port, 3307);
        assert_eq!(config.database.charset, "utf8mb4");
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.file, Some(PathBuf::from("/var/log/mysqladm.log")));
        assert_eq!(config.security.max_results, 500);
        assert_eq!(config.security.allowed_operations, vec!["SELECT", "SHOW"]);
        assert_eq!(config.security.max_query_length, 10_000);
        assert!(!config.management.backup_before_delete);
        assert!(config.management.auto_switch_on_create);
        assert_eq!(config.management.max_database_name_length, 64);
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config.database.port, 3306);
        assert_eq!(config.server.transport, "stdio");
        assert_eq!(config.security.protected_databases.len(), 4);
        assert!(config.management.backup_before_delete);
        assert!(!config.management.allow_system_db_operations);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(Config::from_toml("[server]\ntransport = \"streamable-http\"").is_err());
        assert!(Config::from_toml("[security]\nmax_results = 0").is_err());
        assert!(Config::from_toml("[security]\ntable_name_pattern = \"([\"").is_err());
        assert!(Config::from_toml("[database]\nport = \"abc\"").is_err());
    }

    #[test]
    fn test_environment_overrides() {
        let env: HashMap<&str, &str> = [
            ("MYSQL_HOST", "10.0.0.5"),
            ("MYSQL_PORT", "3310"),
            ("MYSQL_PASSWORD", "hunter2"),
            ("LOG_LEVEL", "WARN"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config
            .apply_overrides(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.database.host, "10.0.0.5");
        assert_eq!(config.database.port, 3310);
        assert_eq!(config.database.user, "root");
        assert_eq!(config.database.password, "hunter2");
        assert_eq!(config.logging.level, "warn");

        let mut config = Config::default();
        let result = config.apply_overrides(|key| (key == "MYSQL_PORT").then(|| "nope".to_string()));
        assert!(matches!(result, Err(AdminError::Config(_))));
    }
}
