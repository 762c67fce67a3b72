//! Error types for WHIP/WHEP signaling

/// Result type alias using the signaling [`Error`]
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during offer exchange
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid configuration parameter
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The endpoint answered with a non-success status
    #[error("Signaling endpoint returned {status}")]
    Http {
        /// HTTP status code of the failed response
        status: u16,
    },

    /// The request never produced a response
    #[error("Signaling transport error: {0}")]
    Transport(String),

    /// Every attempt of the retry budget failed
    #[error("Signaling failed after {attempts} attempts: {last}")]
    RetriesExhausted {
        /// Attempts that were made
        attempts: u32,
        /// The error of the final attempt
        #[source]
        last: Box<Error>,
    },

    /// Any other error
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// Whether the retry loop should try again after this error
    ///
    /// Every HTTP-level failure is retried; only success (200/201) stops
    /// the loop early.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Http { .. } | Error::Transport(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::Http { status: 503 };
        assert_eq!(err.to_string(), "Signaling endpoint returned 503");
    }

    #[test]
    fn test_http_and_transport_are_retryable() {
        assert!(Error::Http { status: 500 }.is_retryable());
        assert!(Error::Http { status: 404 }.is_retryable());
        assert!(Error::Transport("connection refused".to_string()).is_retryable());
        assert!(!Error::InvalidConfig("bad url".to_string()).is_retryable());
    }

    #[test]
    fn test_exhausted_retries_carry_the_last_error() {
        let err = Error::RetriesExhausted {
            attempts: 3,
            last: Box::new(Error::Http { status: 503 }),
        };
        assert_eq!(
            err.to_string(),
            "Signaling failed after 3 attempts: Signaling endpoint returned 503"
        );
    }
}
