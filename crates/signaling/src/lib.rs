//! WHIP/WHEP HTTP signaling for livecast sessions
//!
//! The thin wire layer that turns a local SDP offer into a live session:
//! POST the offer as `application/sdp`, read the answer from the response
//! body, remember the `Location` resource for teardown. Transient server
//! failures (a loaded relay answering 503, a dropped connection) are
//! absorbed by a bounded exponential retry.
//!
//! Connection-level resilience (quality monitoring, ICE restart,
//! reconnection) is a separate concern and lives in
//! `livecast-resilience`; this crate deliberately knows nothing about it.
//!
//! # Example
//!
//! ```no_run
//! use livecast_signaling::{SessionKind, SignalingClient, SignalingConfig};
//!
//! # async fn example(offer_sdp: String) -> livecast_signaling::Result<()> {
//! let client = SignalingClient::new(SignalingConfig::new("https://relay.example.com"))?;
//!
//! let session = client.publish(SessionKind::Whip, &offer_sdp).await?;
//! // ... apply session.answer_sdp to the peer connection ...
//!
//! client.terminate(&session).await?;
//! # Ok(())
//! # }
//! ```

#![warn(clippy::all)]

pub mod client;
pub mod error;
pub mod retry;

// Re-exports for public API
pub use client::{SessionKind, SignalingClient, SignalingConfig, SignalingSession};
pub use error::{Error, Result};
pub use retry::RetryPolicy;

/// Get the version of this crate
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
