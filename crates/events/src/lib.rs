//! # pg-query Events
//!
//! This crate defines what the input produces: records, timestamped events,
//! event batches, and the `EventRouter` sink those batches are handed to.
//!
//! It is a leaf crate; the engine depends on it, never the other way around.

// Declare the modules that make up this crate.
pub mod error;
pub mod messages;
pub mod router;

// Re-export the core types to provide a clean public API.
pub use error::EventsError;
pub use messages::{Event, EventStream, Record, TaggedEvent};
pub use router::{ChannelRouter, EventRouter, StdoutRouter};
