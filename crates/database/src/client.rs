use crate::connection::{Connection, Connector, PgConnector};
use crate::error::DbError;
use crate::params::{ConnectionParams, RetryPolicy};
use events::Record;

/// Result of running one query through the retry loop.
///
/// `Exhausted` is a terminal outcome, not an error: `PgClient::query` always
/// turns it into zero rows.
#[derive(Debug)]
enum QueryOutcome {
    Rows(Vec<Record>),
    Exhausted { attempts: u32, last_error: DbError },
}

/// Owns the (lazily opened) database connection and runs queries on it.
///
/// The connection is opened on first use, dropped whenever a query fails or
/// the client is put on standby, and reopened by the next query. Nothing
/// outside this struct can reach it.
pub struct PgClient<C: Connector = PgConnector> {
    connector: C,
    params: ConnectionParams,
    retry: RetryPolicy,
    conn: Option<C::Conn>,
}

impl<C: Connector> PgClient<C> {
    pub fn new(connector: C, params: ConnectionParams, retry: RetryPolicy) -> Self {
        Self { connector, params, retry, conn: None }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    pub fn is_connected(&self) -> bool {
        self.conn.is_some()
    }

    /// Runs `sql` and returns its rows.
    ///
    /// Failures are retried according to the retry policy. Once the attempts
    /// are used up the error is logged and an empty result is returned; this
    /// method never fails.
    pub async fn query(&mut self, sql: &str) -> Vec<Record> {
        match self.query_with_retry(sql).await {
            QueryOutcome::Rows(rows) => rows,
            QueryOutcome::Exhausted { attempts, last_error } => {
                tracing::error!(
                    attempts,
                    try_count = self.retry.try_count,
                    error = %last_error,
                    "PG error after {} attempts, returning no rows.",
                    attempts
                );
                Vec::new()
            }
        }
    }

    async fn query_with_retry(&mut self, sql: &str) -> QueryOutcome {
        let try_count = self.retry.try_count;
        let mut attempt: u32 = 0;

        loop {
            match self.try_query(sql).await {
                Ok(rows) => return QueryOutcome::Rows(rows),
                Err(e) => {
                    attempt += 1;
                    // try_count 0 and 1 both stop after the first attempt.
                    if attempt >= try_count {
                        return QueryOutcome::Exhausted { attempts: attempt, last_error: e };
                    }

                    tracing::warn!(
                        attempt,
                        try_count,
                        error = %e,
                        "PG error on attempt {}/{}, reconnecting in {:?}.",
                        attempt,
                        try_count,
                        self.retry.try_delay
                    );
                    self.close().await;
                    tokio::time::sleep(self.retry.try_delay).await;
                }
            }
        }
    }

    async fn try_query(&mut self, sql: &str) -> Result<Vec<Record>, DbError> {
        self.connection().await?.execute(sql).await
    }

    async fn connection(&mut self) -> Result<&mut C::Conn, DbError> {
        let conn = match self.conn.take() {
            Some(conn) => conn,
            None => {
                tracing::debug!(
                    host = %self.params.host,
                    port = self.params.port,
                    database = %self.params.database,
                    "Connecting to PostgreSQL."
                );
                self.connector.connect(&self.params).await?
            }
        };
        Ok(self.conn.insert(conn))
    }

    /// Releases the connection, if any. Safe to call repeatedly; the handle
    /// is cleared even when the driver fails to close it.
    pub async fn close(&mut self) {
        if let Some(conn) = self.conn.take() {
            tracing::debug!(database = %self.params.database, "Closing PostgreSQL connection.");
            if let Err(e) = conn.close().await {
                tracing::debug!(error = %e, "Error while closing the connection, discarding it.");
            }
        }
    }

    /// Drops the connection between two polling cycles.
    pub async fn standby(&mut self) {
        self.close().await;
    }
}
