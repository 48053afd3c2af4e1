use crate::error::DbError;
use crate::params::ConnectionParams;
use crate::row::row_to_record;
use async_trait::async_trait;
use configuration::SslMode;
use events::Record;
use futures::TryStreamExt;
use sqlx::postgres::{PgConnectOptions, PgSslMode};
use sqlx::{ConnectOptions, Either, Executor, PgConnection};

/// Opens connections. This is the seam between the client's retry logic and
/// the actual database driver.
#[async_trait]
pub trait Connector: Send + Sync {
    type Conn: Connection;

    async fn connect(&self, params: &ConnectionParams) -> Result<Self::Conn, DbError>;
}

/// A single open connection.
#[async_trait]
pub trait Connection: Send + Sync {
    /// Runs the SQL text as-is and returns the rows of its last statement.
    async fn execute(&mut self, sql: &str) -> Result<Vec<Record>, DbError>;

    async fn close(self) -> Result<(), DbError>;
}

/// The PostgreSQL driver, backed by a single `sqlx::PgConnection`.
#[derive(Debug, Default, Clone, Copy)]
pub struct PgConnector;

/// An open `sqlx` connection.
pub struct PgSession {
    conn: PgConnection,
}

#[async_trait]
impl Connector for PgConnector {
    type Conn = PgSession;

    async fn connect(&self, params: &ConnectionParams) -> Result<PgSession, DbError> {
        let options = connect_options(params);

        let conn = if params.connect_timeout.is_zero() {
            options.connect().await?
        } else {
            tokio::time::timeout(params.connect_timeout, options.connect())
                .await
                .map_err(|_| DbError::ConnectTimeout(params.connect_timeout))??
        };

        Ok(PgSession { conn })
    }
}

#[async_trait]
impl Connection for PgSession {
    async fn execute(&mut self, sql: &str) -> Result<Vec<Record>, DbError> {
        // The simple query protocol sends the text verbatim, multiple statements included.
        let mut steps = Executor::fetch_many(&mut self.conn, sqlx::raw_sql(sql));
        let mut result = LastResult::default();
        while let Some(step) = steps.try_next().await? {
            match step {
                Either::Left(_) => result.statement_done(),
                Either::Right(row) => result.push(row_to_record(&row)),
            }
        }
        Ok(result.into_rows())
    }

    async fn close(self) -> Result<(), DbError> {
        sqlx::Connection::close(self.conn).await?;
        Ok(())
    }
}

/// Keeps the rows of the most recently completed statement.
///
/// A multi-statement text yields one result per statement; only the last one
/// is returned, even when it has no rows (e.g. a trailing `UPDATE`).
#[derive(Debug, Default)]
struct LastResult {
    current: Vec<Record>,
    last: Vec<Record>,
}

impl LastResult {
    fn push(&mut self, record: Record) {
        self.current.push(record);
    }

    fn statement_done(&mut self) {
        self.last = std::mem::take(&mut self.current);
    }

    fn into_rows(self) -> Vec<Record> {
        // Rows without a completion are the tail of an unfinished statement.
        if self.current.is_empty() { self.last } else { self.current }
    }
}

/// Builds the driver options from the connection parameters.
///
/// Unset user and password fall back to the driver's own defaults
/// (`PGUSER`, `PGPASSWORD`, ...).
pub fn connect_options(params: &ConnectionParams) -> PgConnectOptions {
    let mut options = PgConnectOptions::new()
        .host(&params.host)
        .port(params.port)
        .database(&params.database)
        .ssl_mode(pg_ssl_mode(params.sslmode));

    if let Some(user) = &params.user {
        options = options.username(user);
    }
    if let Some(password) = &params.password {
        options = options.password(password);
    }
    if let Some(ca_cert) = &params.ca_cert {
        options = options.ssl_root_cert(ca_cert);
    }

    options
}

fn pg_ssl_mode(mode: SslMode) -> PgSslMode {
    match mode {
        SslMode::Disable => PgSslMode::Disable,
        SslMode::Allow => PgSslMode::Allow,
        SslMode::Prefer => PgSslMode::Prefer,
        SslMode::Require => PgSslMode::Require,
        SslMode::VerifyCa => PgSslMode::VerifyCa,
        SslMode::VerifyFull => PgSslMode::VerifyFull,
    }
}
