//! Error types for sensor acquisition.
//!
//! The taxonomy separates the four failure classes the drivers care about:
//! a device that cannot be located ([`SensorError::Discovery`]), a link that
//! cannot be opened or written ([`SensorError::Connection`]), a response that
//! arrived but does not parse ([`SensorError::Protocol`]), and identification
//! I/O that failed outright ([`SensorError::Handshake`], distinct from an
//! identification field that merely did not match, which is not an error).

/// Result type alias for sensor operations.
pub type Result<T> = std::result::Result<T, SensorError>;

/// Errors that can occur while acquiring measurements from a sensor.
#[derive(Debug, thiserror::Error)]
pub enum SensorError {
    /// No matching device was found in the OS device listing or radio scan.
    #[error("Discovery failed: {message}")]
    Discovery { message: String },

    /// Open/write/close I/O failure at the link layer.
    #[error("Connection error: {message}")]
    Connection { message: String },

    /// A response was present but structurally or numerically unparsable.
    #[error("Protocol error: {message}")]
    Protocol { message: String },

    /// Identification I/O failed.
    #[error("Identification handshake failed: {message}")]
    Handshake { message: String },

    /// A read or publish deadline elapsed.
    #[error("Operation timeout after {duration_ms}ms")]
    Timeout { duration_ms: u64 },

    /// The link or stream has been closed and can no longer be used.
    #[error("Link closed: {message}")]
    Closed { message: String },

    /// Invalid configuration value (bad regex, bad address, ...).
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Generic I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SensorError {
    /// Create a new discovery error.
    pub fn discovery(message: impl Into<String>) -> Self {
        Self::Discovery {
            message: message.into(),
        }
    }

    /// Create a new connection error.
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Create a new protocol error.
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Create a new handshake error.
    pub fn handshake(message: impl Into<String>) -> Self {
        Self::Handshake {
            message: message.into(),
        }
    }

    /// Create a new timeout error.
    pub fn timeout(duration_ms: u64) -> Self {
        Self::Timeout { duration_ms }
    }

    /// Create a new closed-link error.
    pub fn closed(message: impl Into<String>) -> Self {
        Self::Closed {
            message: message.into(),
        }
    }

    /// Create a new configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Whether this error came from the steady-state read path and is safe
    /// to retry against the same session.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. } | Self::Protocol { .. } | Self::Timeout { .. } | Self::Io(_)
        )
    }
}
