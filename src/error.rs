//! Top-level error type for the sensor node
//!
//! Component errors stay local to their modules and are handled inside the
//! publish loop; `NodeError` only covers what can stop the binary at startup.

use thiserror::Error;

/// Main error type for sensor node operations
#[derive(Debug, Error)]
pub enum NodeError {
    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Startup failed: {message}")]
    Startup { message: String },
}

impl NodeError {
    /// Create startup error
    pub fn startup<S: Into<String>>(message: S) -> Self {
        Self::Startup {
            message: message.into(),
        }
    }
}

/// Result type for sensor node operations
pub type NodeResult<T> = Result<T, NodeError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigError;

    #[test]
    fn test_startup_constructor() {
        let error = NodeError::startup("no sensors bound");
        assert!(matches!(error, NodeError::Startup { .. }));
        assert_eq!(error.to_string(), "Startup failed: no sensors bound");
    }

    #[test]
    fn test_config_error_conversion() {
        let error: NodeError = ConfigError::InvalidDeviceId("bad id".to_string()).into();
        assert!(matches!(error, NodeError::Config(_)));
        assert!(error.to_string().starts_with("Configuration error"));
    }

    #[test]
    fn test_io_error_display() {
        let error: NodeError =
            std::io::Error::new(std::io::ErrorKind::NotFound, "missing").into();
        assert_eq!(error.to_string(), "I/O error: missing");
    }
}
