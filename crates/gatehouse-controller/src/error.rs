use gatehouse_hardware::HardwareError;
use gatehouse_network::NetworkError;
use gatehouse_storage::StorageError;
use thiserror::Error;

/// Errors raised while assembling or running the gate.
///
/// None of these escape the decision loop once it is running; they come
/// from configuration loading, start-up, and operator commands.
#[derive(Debug, Error)]
pub enum ControllerError {
    #[error(transparent)]
    Core(#[from] gatehouse_core::Error),

    #[error("Hardware error: {0}")]
    Hardware(#[from] HardwareError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    /// The configuration file is missing, unreadable or inconsistent
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration file: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ControllerError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}

/// Result type for controller operations
pub type Result<T> = std::result::Result<T, ControllerError>;
