use thiserror::Error;

/// Result type for blob operations
pub type BlobResult<T> = Result<T, BlobError>;

/// Errors that can occur while moving a blob between a client and a backend
#[derive(Error, Debug)]
pub enum BlobError {
    #[error("Malformed request: {message}")]
    MalformedRequest { message: String },

    #[error("Capacity exceeded: appending {attempted} bytes to {len}/{capacity}")]
    CapacityExceeded {
        capacity: u64,
        len: u64,
        attempted: u64,
    },

    #[error("Incomplete transfer: expected {expected} bytes, received {received}")]
    IncompleteTransfer { expected: u64, received: u64 },

    #[error("Cannot write, read-only blob")]
    ReadOnlyViolation,

    #[error("Blob not found: {id}")]
    NotFound { id: String },

    #[error("Backend not supported: {mode}")]
    UnsupportedBackend { mode: String },

    #[error("Transport failure: {reason}")]
    TransportFailure { reason: String },

    /// Terminal signal of a chunk iterator, not a failure of the transfer
    #[error("Passed end of buffer")]
    EndOfBuffer,

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
}

impl BlobError {
    /// Create a malformed request error
    pub fn malformed<S: Into<String>>(message: S) -> Self {
        Self::MalformedRequest {
            message: message.into(),
        }
    }

    /// Create a not found error
    pub fn not_found<S: Into<String>>(id: S) -> Self {
        Self::NotFound { id: id.into() }
    }

    /// Create an unsupported backend error
    pub fn unsupported<S: Into<String>>(mode: S) -> Self {
        Self::UnsupportedBackend { mode: mode.into() }
    }

    /// Create a transport failure from any displayable error
    pub fn transport<E: std::fmt::Display>(error: E) -> Self {
        Self::TransportFailure {
            reason: error.to_string(),
        }
    }

    /// Create a configuration error
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Whether a caller may reasonably retry the whole transfer.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::TransportFailure { .. } | Self::Io { .. })
    }
}
