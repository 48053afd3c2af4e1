//! # pg-query Database Crate
//!
//! This crate owns everything that touches PostgreSQL: the connection
//! parameters, the single lazily opened connection, and the retry policy
//! around every query.
//!
//! ## Architectural Principles
//!
//! - **Fail-soft:** `PgClient::query` never returns an error. Failed attempts
//!   are retried with a fixed delay and a fresh connection; once the attempts
//!   are used up the query yields no rows.
//! - **One connection, one owner:** there is no pool. The connection lives in
//!   an `Option` inside `PgClient` and is reopened on demand.
//! - **Swappable driver:** `Connector`/`Connection` separate the retry logic
//!   from `sqlx`, so the client can be driven by a scripted driver in tests.
//!
//! ## Public API
//!
//! - `PgClient`: runs queries with retry, `close` and `standby`.
//! - `ConnectionParams`, `RetryPolicy`: built from the validated settings.
//! - `PgConnector`: the `sqlx`-backed driver.
//! - `DbError`: the specific error types that can be returned from this crate.

// Declare the modules that constitute this crate.
pub mod client;
pub mod connection;
pub mod error;
pub mod params;
pub mod row;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

// Re-export the key components to create a clean, public-facing API.
pub use client::PgClient;
pub use connection::{Connection, Connector, PgConnector, PgSession};
pub use error::DbError;
pub use params::{ConnectionParams, RetryPolicy};
