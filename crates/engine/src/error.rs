use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] configuration::ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] database::DbError),

    #[error("Failed to emit events: {0}")]
    Events(#[from] events::EventsError),
}
