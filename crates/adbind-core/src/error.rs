//! Error types for Adbind

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// A required input was empty or malformed
    #[error("Validation failed: {0}")]
    Validation(String),

    /// The directory server could not be reached
    #[error("Connection failed: {0}")]
    Connection(String),

    /// The service account bind was rejected
    #[error("Bind failed: {0}")]
    Bind(String),

    #[error("Search failed: {0}")]
    Search(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// Operation not valid in the current connection state
    #[error("Invalid state: {0}")]
    State(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Validation(_) => "ValidationError",
            Error::Connection(_) => "ConnectionError",
            Error::Bind(_) => "BindError",
            Error::Search(_) => "SearchError",
            Error::NotFound(_) => "NotFoundError",
            Error::State(_) => "StateError",
            Error::Config(_) => "ConfigError",
        }
    }

    /// Whether the error came from the directory server or the network
    /// rather than from the caller's input.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Error::Connection(_) | Error::Bind(_) | Error::Search(_)
        )
    }
}
