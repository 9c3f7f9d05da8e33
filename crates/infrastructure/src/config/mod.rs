//! Application configuration
//!
//! Split into focused sub-modules:
//! - `database`: SQLite pool and migration settings
//! - `tenancy`: paging limits, lock defaults, per-tenant defaults
//! - `telemetry`: log filter and format
//!
//! Values are layered: built-in defaults, then an optional `config.toml`,
//! then environment variables such as `TENANCY_DATABASE__MAX_CONNECTIONS`.

mod database;
mod telemetry;
mod tenancy;

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

pub use database::DatabaseConfig;
pub use telemetry::{LogFormat, TelemetryAppConfig};
pub use tenancy::TenancyConfig;

/// Prefix of configuration environment variables
pub const ENV_PREFIX: &str = "TENANCY";

/// Shared default for boolean `true` fields across config structs
pub(crate) const fn default_true() -> bool {
    true
}

/// Application environment (development or production)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Development environment
    #[default]
    Development,
    /// Production environment
    Production,
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Development => write!(f, "development"),
            Self::Production => write!(f, "production"),
        }
    }
}

impl std::str::FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "development" | "dev" => Ok(Self::Development),
            "production" | "prod" => Ok(Self::Production),
            _ => Err(format!(
                "Invalid environment: {s}. Use 'development' or 'production'"
            )),
        }
    }
}

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Application environment (development or production)
    #[serde(default)]
    pub environment: Environment,

    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Tenancy limits and defaults
    #[serde(default)]
    pub tenancy: TenancyConfig,

    /// Logging configuration
    #[serde(default)]
    pub telemetry: TelemetryAppConfig,
}

impl AppConfig {
    /// Load configuration from environment and optional `config.*` file
    pub fn load() -> Result<Self, config::ConfigError> {
        Self::build(config::File::with_name("config").required(false))
    }

    /// Load configuration from a specific file, still honoring the environment
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, config::ConfigError> {
        Self::build(config::File::from(path.as_ref()).required(false))
    }

    fn build<S>(file: S) -> Result<Self, config::ConfigError>
    where
        S: config::Source + Send + Sync + 'static,
    {
        let builder = config::Config::builder()
            // Start with defaults
            .set_default("environment", "development")?
            .set_default("database.url", "sqlite:tenancy.db")?
            .set_default("telemetry.log_filter", "info")?
            // Load from file if exists
            .add_source(file)
            // Override with environment variables (e.g., TENANCY_DATABASE__URL)
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Whether running in production
    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn environment_default_is_development() {
        assert_eq!(Environment::default(), Environment::Development);
    }

    #[test]
    fn environment_from_str() {
        assert_eq!(
            "prod".parse::<Environment>().unwrap(),
            Environment::Production
        );
        assert_eq!(
            "DEVELOPMENT".parse::<Environment>().unwrap(),
            Environment::Development
        );
        assert!("staging".parse::<Environment>().is_err());
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load_from(dir.path().join("absent.toml")).unwrap();

        assert_eq!(config.environment, Environment::Development);
        assert_eq!(config.database.url, "sqlite:tenancy.db");
        assert_eq!(config.database.max_connections, 5);
        assert_eq!(config.tenancy.max_page_size, 1000);
        assert_eq!(config.telemetry.log_filter, "info");
    }

    #[test]
    fn file_values_override_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tenancy.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            r#"
environment = "production"

[database]
url = "sqlite:/var/lib/tenancy/data.db"
max_connections = 8

[tenancy]
export_lock_name = "sheets-api"
default_lock_ttl_secs = 10

[telemetry]
log_format = "json"
"#
        )
        .unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert!(config.is_production());
        assert_eq!(config.database.max_connections, 8);
        assert!(config.database.run_migrations);
        assert_eq!(config.tenancy.export_lock_name, "sheets-api");
        assert_eq!(config.tenancy.default_lock_ttl_secs, 10);
        assert_eq!(config.telemetry.log_format, LogFormat::Json);
    }
}
