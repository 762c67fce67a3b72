//! Error types for the resilience subsystem

/// Result type alias using the resilience [`Error`]
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while monitoring or recovering a connection
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid configuration parameter
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// WebRTC peer connection error
    #[error("Peer connection error: {0}")]
    PeerConnection(String),

    /// SDP negotiation error (offer creation, description install)
    #[error("SDP negotiation error: {0}")]
    Sdp(String),

    /// ICE-restart offer delivery failed (transport error or non-2xx status)
    #[error("ICE restart delivery failed: {0}")]
    RestartDelivery(String),

    /// ICE-restart offer delivery did not complete in time
    #[error("ICE restart delivery timed out after {0}ms")]
    RestartTimeout(u64),

    /// Recovery gave up after exhausting the attempt budget
    #[error("Recovery exhausted after {0} attempts")]
    RecoveryExhausted(u32),

    /// The monitor has been torn down
    #[error("Monitor is closed")]
    Closed,

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Any other error
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// Whether the recovery controller may schedule another attempt after
    /// this error.
    ///
    /// Delivery failures (HTTP status, transport, timeout) are transient;
    /// local SDP failures and configuration problems are not.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::RestartDelivery(_) | Error::RestartTimeout(_) | Error::Io(_)
        )
    }

    /// Check if this error is a configuration error
    pub fn is_config_error(&self) -> bool {
        matches!(self, Error::InvalidConfig(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::InvalidConfig("test".to_string());
        assert_eq!(err.to_string(), "Invalid configuration: test");

        let err = Error::RestartTimeout(5000);
        assert_eq!(err.to_string(), "ICE restart delivery timed out after 5000ms");
    }

    #[test]
    fn test_delivery_errors_are_retryable() {
        assert!(Error::RestartDelivery("500".to_string()).is_retryable());
        assert!(Error::RestartTimeout(1000).is_retryable());
    }

    #[test]
    fn test_local_errors_are_not_retryable() {
        assert!(!Error::Sdp("bad offer".to_string()).is_retryable());
        assert!(!Error::InvalidConfig("test".to_string()).is_retryable());
        assert!(!Error::RecoveryExhausted(5).is_retryable());
    }

    #[test]
    fn test_error_is_config_error() {
        assert!(Error::InvalidConfig("test".to_string()).is_config_error());
        assert!(!Error::Sdp("test".to_string()).is_config_error());
    }
}
