//! Error types for the device catalog service

/// Errors that can occur in the device catalog service
///
/// Payloads are plain strings so that a single load outcome can be cloned
/// out to every caller waiting on the same in-flight load.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CatalogError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Catalog load aborted: {0}")]
    LoadAborted(String),

    #[error("Invalid date range: {0}")]
    InvalidDateRange(String),

    #[error("Unknown device: {0}")]
    UnknownDevice(String),
}

/// Result type alias for device catalog operations
pub type Result<T> = std::result::Result<T, CatalogError>;
