//! Error types for profile-bridge
//!
//! This module provides the error type hierarchy using `thiserror`
//! for proper error handling across all components.

use thiserror::Error;

/// The main error type for profile-bridge operations
#[derive(Error, Debug)]
pub enum Error {
    /// Profile-manager service errors
    #[error("Profile manager error: {0}")]
    Profile(#[from] ProfileError),

    /// CDP connection errors
    #[error("Connection error: {0}")]
    Connect(#[from] ConnectError),

    /// Context/page acquisition errors
    #[error("Resource error: {0}")]
    Resource(#[from] ResourceError),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// HTTP transport errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// ChromiumOxide errors
    #[error("CDP error: {0}")]
    Cdp(String),

    /// Generic error with message
    #[error("{0}")]
    Generic(String),
}

/// Profile-manager service errors
#[derive(Error, Debug)]
pub enum ProfileError {
    /// The service did not answer its status endpoint
    #[error("Profile manager service is unreachable at {0}")]
    ServiceUnavailable(String),

    /// The profile id is not in the service's profile list
    #[error("Profile not found: {0}")]
    NotFound(String),

    /// The start endpoint returned a non-zero code; carries the service's
    /// message verbatim
    #[error("Failed to start profile: {0}")]
    StartFailed(String),
}

/// CDP connection errors
#[derive(Error, Debug)]
pub enum ConnectError {
    /// A single connect attempt exceeded its timeout
    #[error("CDP connect timed out after {0}ms")]
    Timeout(u64),

    /// All connect attempts failed
    #[error("CDP connect failed after {attempts} attempts: {last}")]
    RetriesExhausted {
        /// Number of attempts made
        attempts: u32,
        /// Message of the last failure
        last: String,
    },
}

/// Context/page acquisition errors
#[derive(Error, Debug)]
pub enum ResourceError {
    /// Failed to get or create a browser context
    #[error("Failed to acquire browser context: {0}")]
    Context(String),

    /// Failed to get or create a page
    #[error("Failed to acquire page: {0}")]
    Page(String),

    /// An operation needed a live connection and none was held
    #[error("Browser not connected")]
    NotConnected,
}

/// Result type alias for profile-bridge operations
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create a generic error from a string
    pub fn generic<S: Into<String>>(msg: S) -> Self {
        Error::Generic(msg.into())
    }

    /// Create a configuration error from a string
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Error::Config(msg.into())
    }

    /// Create a CDP error from a string
    pub fn cdp<S: Into<String>>(msg: S) -> Self {
        Error::Cdp(msg.into())
    }
}

/// Convert chromiumoxide errors
impl From<chromiumoxide::error::CdpError> for Error {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        Error::Cdp(err.to_string())
    }
}
