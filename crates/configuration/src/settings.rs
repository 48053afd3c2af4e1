use crate::error::ConfigError;
use serde::Deserialize;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_TAG: &str = "pg_query";
pub const DEFAULT_INTERVAL: u64 = 300;

pub const DEFAULT_PG_HOST: &str = "localhost";
pub const DEFAULT_PG_PORT: i64 = 5432;
pub const DEFAULT_PG_CONNECT_TIMEOUT: i64 = 10;
pub const DEFAULT_PG_TRY_COUNT: i64 = 3;
pub const DEFAULT_PG_TRY_DELAY: i64 = 5;

/// The root configuration structure for one polling input.
///
/// Numeric connection fields are read as signed integers so that negative
/// values reach `validate` and are reported as configuration errors instead
/// of opaque deserialization failures.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Base tag that every emitted event batch is routed under.
    #[serde(default = "default_tag")]
    pub tag: String,
    /// Seconds between two polling cycles.
    #[serde(default = "default_interval")]
    pub interval: u64,

    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: i64,
    pub database: String,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub sslmode: SslMode,
    /// Connection timeout, in seconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: i64,
    /// Maximum number of attempts for one query.
    #[serde(default = "default_try_count")]
    pub try_count: i64,
    /// Seconds to wait between two attempts.
    #[serde(default = "default_try_delay")]
    pub try_delay: i64,
    /// Root certificate used to verify the server with `verify-ca`/`verify-full`.
    #[serde(default)]
    pub ca_cert: Option<PathBuf>,

    /// The `[[query]]` tables, in the order they are run.
    #[serde(default, rename = "query")]
    pub queries: Vec<QuerySettings>,
}

/// A single query to run on every polling cycle.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct QuerySettings {
    pub sql: String,
    /// Appended to the base tag as `<tag>.<suffix>` when present.
    #[serde(default)]
    pub tag: Option<String>,
}

/// PostgreSQL `sslmode` values accepted in the configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SslMode {
    Disable,
    #[default]
    Allow,
    Prefer,
    Require,
    VerifyCa,
    VerifyFull,
}

impl SslMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SslMode::Disable => "disable",
            SslMode::Allow => "allow",
            SslMode::Prefer => "prefer",
            SslMode::Require => "require",
            SslMode::VerifyCa => "verify-ca",
            SslMode::VerifyFull => "verify-full",
        }
    }
}

impl fmt::Display for SslMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Settings {
    /// Checks every constraint that must hold before the input starts.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tag.is_empty() {
            return Err(invalid("tag should not be empty"));
        }
        if self.interval == 0 {
            return Err(invalid("interval should be > 0"));
        }
        self.validate_connection()?;
        self.validate_queries()
    }

    fn validate_connection(&self) -> Result<(), ConfigError> {
        if !(0..=i64::from(u16::MAX)).contains(&self.port) {
            return Err(invalid("port should be >= 0 and <= 65535"));
        }
        if self.database.is_empty() {
            return Err(invalid("database should not be empty"));
        }
        if self.connect_timeout < 0 {
            return Err(invalid("connect_timeout should be >= 0"));
        }
        if self.try_count < 0 {
            return Err(invalid("try_count should be >= 0"));
        }
        if self.try_delay < 0 {
            return Err(invalid("try_delay should be >= 0"));
        }
        Ok(())
    }

    fn validate_queries(&self) -> Result<(), ConfigError> {
        if self.queries.is_empty() {
            return Err(invalid("queries should not be empty"));
        }
        if let Some(index) = self.queries.iter().position(|q| q.sql.trim().is_empty()) {
            return Err(invalid(&format!("query #{} should have a non-empty sql", index + 1)));
        }
        Ok(())
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval)
    }
}

fn invalid(message: &str) -> ConfigError {
    ConfigError::ValidationError(message.to_string())
}

fn default_tag() -> String {
    DEFAULT_TAG.to_string()
}

fn default_interval() -> u64 {
    DEFAULT_INTERVAL
}

fn default_host() -> String {
    DEFAULT_PG_HOST.to_string()
}

fn default_port() -> i64 {
    DEFAULT_PG_PORT
}

fn default_connect_timeout() -> i64 {
    DEFAULT_PG_CONNECT_TIMEOUT
}

fn default_try_count() -> i64 {
    DEFAULT_PG_TRY_COUNT
}

fn default_try_delay() -> i64 {
    DEFAULT_PG_TRY_DELAY
}
