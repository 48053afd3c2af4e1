//! A scripted driver for exercising `PgClient` without a server.
//!
//! Connect and execute results are consumed in order; once a script runs
//! dry, connects succeed and queries return no rows. Every call is recorded
//! so tests can count attempts, reconnects and closes.

use crate::connection::{Connection, Connector};
use crate::error::DbError;
use crate::params::ConnectionParams;
use async_trait::async_trait;
use events::Record;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default)]
struct Script {
    connect_results: VecDeque<Result<(), DbError>>,
    execute_results: VecDeque<Result<Vec<Record>, DbError>>,
    executed: Vec<String>,
    connects: usize,
    closes: usize,
    fail_closes: bool,
}

#[derive(Debug, Default, Clone)]
pub struct ScriptedConnector {
    script: Arc<Mutex<Script>>,
}

#[derive(Debug)]
pub struct ScriptedConnection {
    script: Arc<Mutex<Script>>,
}

fn lock(script: &Mutex<Script>) -> MutexGuard<'_, Script> {
    script.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ScriptedConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_connect(&self, result: Result<(), DbError>) {
        lock(&self.script).connect_results.push_back(result);
    }

    pub fn push_execute(&self, result: Result<Vec<Record>, DbError>) {
        lock(&self.script).execute_results.push_back(result);
    }

    /// Makes every `close` report a driver error.
    pub fn fail_closes(&self) {
        lock(&self.script).fail_closes = true;
    }

    /// The SQL text of every execute call, in order.
    pub fn executed(&self) -> Vec<String> {
        lock(&self.script).executed.clone()
    }

    pub fn connects(&self) -> usize {
        lock(&self.script).connects
    }

    pub fn closes(&self) -> usize {
        lock(&self.script).closes
    }
}

#[async_trait]
impl Connector for ScriptedConnector {
    type Conn = ScriptedConnection;

    async fn connect(&self, _params: &ConnectionParams) -> Result<ScriptedConnection, DbError> {
        let mut script = lock(&self.script);
        script.connects += 1;
        script.connect_results.pop_front().unwrap_or(Ok(()))?;
        Ok(ScriptedConnection { script: Arc::clone(&self.script) })
    }
}

#[async_trait]
impl Connection for ScriptedConnection {
    async fn execute(&mut self, sql: &str) -> Result<Vec<Record>, DbError> {
        let mut script = lock(&self.script);
        script.executed.push(sql.to_string());
        script.execute_results.pop_front().unwrap_or_else(|| Ok(Vec::new()))
    }

    async fn close(self) -> Result<(), DbError> {
        let mut script = lock(&self.script);
        script.closes += 1;
        if script.fail_closes {
            return Err(DbError::ConnectionError(sqlx::Error::PoolClosed));
        }
        Ok(())
    }
}

/// A successful execute result made of JSON objects.
pub fn rows(values: Vec<serde_json::Value>) -> Result<Vec<Record>, DbError> {
    Ok(values
        .into_iter()
        .filter_map(|value| match value {
            serde_json::Value::Object(record) => Some(record),
            _ => None,
        })
        .collect())
}

/// A failed execute result.
pub fn failure(message: &str) -> Result<Vec<Record>, DbError> {
    Err(DbError::ConnectionError(sqlx::Error::Protocol(message.to_string())))
}
