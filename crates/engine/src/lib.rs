//! # pg-query Engine
//!
//! Turns validated settings into a running input: a `PollingExecutor` that
//! runs every configured query through the `PgClient` on each timer fire and
//! routes the rows as one event batch per query.

pub mod error;
pub mod executor;
pub mod input;
pub mod scheduler;

pub use error::EngineError;
pub use executor::PollingExecutor;
pub use input::PgQueryInput;
pub use scheduler::{Job, Scheduler, Timer, TimerScheduler};
