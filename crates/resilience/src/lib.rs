//! Connection resilience for WHIP/WHEP WebRTC sessions
//!
//! This crate keeps a live media session alive across network
//! degradation. It continuously samples the peer connection's statistics,
//! classifies degradation against configured thresholds, and drives
//! recovery (ICE restarts and bounded, exponentially backed-off
//! reconnection) without double-triggering or leaking timers.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  RTCPeerConnection (webrtc-rs)                               │
//! │   │ get_stats()            │ state-change handlers           │
//! │   ▼                        ▼                                 │
//! │  MetricsCollector ──> QualityEvaluator ──┐                   │
//! │   (delta rates)        (issue set)       ├─> StateMachine    │
//! │                                          │    (pure core)    │
//! │  IceRestartClient <── RecoveryMonitor <──┘                   │
//! │   (offer + HTTP)       (async driver)                        │
//! │                          │         │                         │
//! │                 ReconnectScheduler EventSink                 │
//! │                  (backoff timers)  (typed events)            │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use livecast_resilience::{
//!     ChannelSink, RecoveryMonitor, ResilienceConfig, RestartEndpoint,
//! };
//!
//! # async fn example(pc: Arc<webrtc::peer_connection::RTCPeerConnection>)
//! #     -> livecast_resilience::Result<()> {
//! let config = ResilienceConfig::default().with_endpoint(
//!     RestartEndpoint::Base {
//!         url: "https://relay.example.com".to_string(),
//!     },
//!     "session-1",
//! );
//!
//! let (sink, mut events) = ChannelSink::with_default_capacity();
//! let monitor = RecoveryMonitor::new(pc, config, Arc::new(sink))?;
//! monitor.start().await;
//!
//! while let Ok(event) = events.recv().await {
//!     println!("recovery event: {:?}", event);
//! }
//!
//! monitor.cleanup().await;
//! # Ok(())
//! # }
//! ```

#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod events;
pub mod metrics;
pub mod quality;
pub mod recovery;

// Re-exports for public API
pub use config::{ConnectionType, QualityThresholds, ResilienceConfig, RestartEndpoint};
pub use error::{Error, Result};
pub use events::{CallbackSink, ChannelSink, EventSink, EventSinkError, JsonlSink, RecoveryEvent};
pub use metrics::{extract_snapshot, ConnectionMetrics, MetricsCollector, StatsSnapshot};
pub use quality::{QualityDelta, QualityEvaluator};
pub use recovery::{
    IceRestartClient, RecoveryMonitor, RecoveryState, ReconnectScheduler, ResilienceState,
    RestartOutcome,
};

/// Get the version of this crate
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
