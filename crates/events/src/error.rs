use thiserror::Error;

#[derive(Error, Debug)]
pub enum EventsError {
    #[error("Failed to serialize event: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Failed to write events: {0}")]
    Io(#[from] std::io::Error),

    #[error("The event channel is closed.")]
    Closed,
}
