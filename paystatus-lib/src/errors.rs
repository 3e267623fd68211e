//! Error types for payment status operations.
//!
//! None of these errors reach the UI once a subscription exists: decode
//! failures are dropped, transport failures drive the reconnect policy.
//! They surface from constructors, config loading and the transport seam.

/// Error codes for FFI and mobile integration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum StatusErrorCode {
    /// Transport/network layer error
    Transport = 2000,
    /// Connection attempt failed
    ConnectionFailed = 2001,
    /// Malformed status payload
    Decode = 5002,
    /// Invalid configuration value
    InvalidConfig = 5003,
    /// No async runtime available
    Runtime = 9000,
}

/// Errors produced by the status synchronization core.
#[derive(thiserror::Error, Debug)]
pub enum StatusError {
    /// A frame or response body could not be decoded.
    #[error("decode error: {0}")]
    Decode(String),

    /// Generic transport failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// Connecting to the status endpoint failed.
    #[error("connection to {target} failed: {reason}")]
    ConnectionFailed {
        /// Endpoint URL
        target: String,
        /// Underlying error message
        reason: String,
    },

    /// A configuration value was rejected.
    #[error("invalid config {field}: {reason}")]
    InvalidConfig {
        /// Offending field
        field: String,
        /// Why it was rejected
        reason: String,
    },

    /// No tokio runtime was available to drive timers and connections.
    #[error("runtime unavailable: {0}")]
    Runtime(String),
}

impl StatusError {
    /// Get the error code for FFI/mobile integration.
    pub fn code(&self) -> StatusErrorCode {
        match self {
            Self::Decode(_) => StatusErrorCode::Decode,
            Self::Transport(_) => StatusErrorCode::Transport,
            Self::ConnectionFailed { .. } => StatusErrorCode::ConnectionFailed,
            Self::InvalidConfig { .. } => StatusErrorCode::InvalidConfig,
            Self::Runtime(_) => StatusErrorCode::Runtime,
        }
    }

    /// Returns true if retrying the operation may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::ConnectionFailed { .. })
    }

    /// Create a connection failure for the given target.
    pub fn connection_failed(target: impl Into<String>, reason: impl ToString) -> Self {
        Self::ConnectionFailed {
            target: target.into(),
            reason: reason.to_string(),
        }
    }

    /// Create an invalid config error.
    pub fn invalid_config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for StatusError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let err = StatusError::connection_failed("wss://example.test/ws", "refused");
        assert_eq!(err.code(), StatusErrorCode::ConnectionFailed);
        assert!(err.is_retryable());
        assert!(err.to_string().contains("wss://example.test/ws"));

        let err = StatusError::invalid_config("max_reconnect_attempts", "must be at least 1");
        assert_eq!(err.code(), StatusErrorCode::InvalidConfig);
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_from_serde_json() {
        let err: StatusError = serde_json::from_str::<serde_json::Value>("{not json")
            .unwrap_err()
            .into();
        assert_eq!(err.code(), StatusErrorCode::Decode);
    }
}
