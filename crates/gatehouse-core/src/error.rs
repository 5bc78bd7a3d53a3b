use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    // Identifier errors
    #[error("Invalid card identifier: {0}")]
    InvalidIdentifier(String),

    // Event lifecycle errors
    #[error("Event {0} was already delivered")]
    AlreadyDelivered(String),

    #[error("Invalid event id: {0}")]
    InvalidEventId(String),

    // Controller errors
    #[error("Invalid state transition from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Missing configuration key: {0}")]
    MissingConfig(String),
}

pub type Result<T> = std::result::Result<T, Error>;
