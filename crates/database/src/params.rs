use crate::error::DbError;
use configuration::{Settings, SslMode};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 5432;
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

pub const DEFAULT_TRY_COUNT: u32 = 3;
pub const DEFAULT_TRY_DELAY: Duration = Duration::from_secs(5);

/// Everything needed to open a connection. Fixed once the client is built.
#[derive(Clone, PartialEq)]
pub struct ConnectionParams {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: Option<String>,
    pub password: Option<String>,
    pub sslmode: SslMode,
    /// A zero timeout waits for as long as the driver does.
    pub connect_timeout: Duration,
    pub ca_cert: Option<PathBuf>,
}

impl Default for ConnectionParams {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            database: String::new(),
            user: None,
            password: None,
            sslmode: SslMode::Allow,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            ca_cert: None,
        }
    }
}

// Hand-written so the password never ends up in a log line.
impl fmt::Debug for ConnectionParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionParams")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("sslmode", &self.sslmode)
            .field("connect_timeout", &self.connect_timeout)
            .field("ca_cert", &self.ca_cert)
            .finish()
    }
}

impl TryFrom<&Settings> for ConnectionParams {
    type Error = DbError;

    fn try_from(settings: &Settings) -> Result<Self, Self::Error> {
        let port = u16::try_from(settings.port)
            .map_err(|_| DbError::InvalidParameter(format!("port {}", settings.port)))?;
        let connect_timeout = u64::try_from(settings.connect_timeout).map_err(|_| {
            DbError::InvalidParameter(format!("connect_timeout {}", settings.connect_timeout))
        })?;

        Ok(Self {
            host: settings.host.clone(),
            port,
            database: settings.database.clone(),
            user: settings.user.clone(),
            password: settings.password.clone(),
            sslmode: settings.sslmode,
            connect_timeout: Duration::from_secs(connect_timeout),
            ca_cert: settings.ca_cert.clone(),
        })
    }
}

/// How often, and how far apart, a failing query is attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of attempts. `0` still makes one attempt.
    pub try_count: u32,
    pub try_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { try_count: DEFAULT_TRY_COUNT, try_delay: DEFAULT_TRY_DELAY }
    }
}

impl TryFrom<&Settings> for RetryPolicy {
    type Error = DbError;

    fn try_from(settings: &Settings) -> Result<Self, Self::Error> {
        let try_count = u32::try_from(settings.try_count)
            .map_err(|_| DbError::InvalidParameter(format!("try_count {}", settings.try_count)))?;
        let try_delay = u64::try_from(settings.try_delay)
            .map_err(|_| DbError::InvalidParameter(format!("try_delay {}", settings.try_delay)))?;

        Ok(Self { try_count, try_delay: Duration::from_secs(try_delay) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(extra: &str) -> Settings {
        configuration::load_config_from_str(&format!(
            "database = \"test\"\n{extra}\n[[query]]\nsql = \"select 1\"\n"
        ))
        .unwrap()
    }

    #[test]
    fn defaults_follow_the_configuration_defaults() {
        let settings = settings("");
        let params = ConnectionParams::try_from(&settings).unwrap();
        let retry = RetryPolicy::try_from(&settings).unwrap();

        assert_eq!(params, ConnectionParams { database: "test".to_string(), ..Default::default() });
        assert_eq!(retry, RetryPolicy::default());
    }

    #[test]
    fn converts_every_field() {
        let settings = settings(
            "host = \"db\"\nport = 6432\nuser = \"u\"\npassword = \"p\"\nsslmode = \"require\"\n\
             connect_timeout = 0\ntry_count = 1\ntry_delay = 2\nca_cert = \"/ca.pem\"",
        );
        let params = ConnectionParams::try_from(&settings).unwrap();
        let retry = RetryPolicy::try_from(&settings).unwrap();

        assert_eq!(params.host, "db");
        assert_eq!(params.port, 6432);
        assert_eq!(params.user.as_deref(), Some("u"));
        assert_eq!(params.password.as_deref(), Some("p"));
        assert_eq!(params.sslmode, SslMode::Require);
        assert_eq!(params.connect_timeout, Duration::ZERO);
        assert_eq!(params.ca_cert, Some(PathBuf::from("/ca.pem")));
        assert_eq!(retry, RetryPolicy { try_count: 1, try_delay: Duration::from_secs(2) });
    }

    #[test]
    fn debug_output_hides_the_password() {
        let params = ConnectionParams { password: Some("hunter2".to_string()), ..Default::default() };
        let printed = format!("{params:?}");

        assert!(!printed.contains("hunter2"));
        assert!(printed.contains("***"));
    }
}
