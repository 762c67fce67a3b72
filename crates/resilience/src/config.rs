//! Configuration types for connection resilience

use serde::{Deserialize, Serialize};

/// Direction of the monitored session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionType {
    /// Publishing media toward the server (WHIP)
    Ingest,
    /// Receiving media from the server (WHEP)
    Egress,
}

impl ConnectionType {
    /// Protocol path segment used when synthesizing signaling URLs
    pub fn path_segment(&self) -> &'static str {
        match self {
            ConnectionType::Ingest => "whip",
            ConnectionType::Egress => "whep",
        }
    }
}

/// Where ICE-restart offers are delivered
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum RestartEndpoint {
    /// Full resource URL, used verbatim. Typically the `Location` value
    /// captured when the session was created.
    Resource { url: String },
    /// Base URL; the delivery path becomes `{base}/{whip|whep}/{session_id}`.
    Base { url: String },
}

/// Thresholds that turn a metrics sample into quality issues
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualityThresholds {
    /// Bitrate below this is reported as an issue, in kbps.
    ///
    /// Only applied once any data has flowed (bitrate > 0), so a session
    /// that has not started sending yet is not flagged.
    pub min_bitrate_kbps: f64,

    /// Round-trip latency above this is reported as an issue, in ms
    pub max_latency_ms: f64,

    /// Packet loss above this is reported as an issue, in percent
    pub max_packet_loss_pct: f64,
}

impl Default for QualityThresholds {
    fn default() -> Self {
        Self {
            min_bitrate_kbps: 100.0,
            max_latency_ms: 500.0,
            max_packet_loss_pct: 5.0,
        }
    }
}

/// Per-session resilience configuration
///
/// Immutable once a monitor is created. Controls how often the connection
/// is polled, what counts as degradation, and how persistently recovery is
/// attempted before giving up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResilienceConfig {
    /// Maximum reconnection attempts before entering the terminal failed
    /// state (default: 5)
    pub max_reconnect_attempts: u32,

    /// Base reconnection backoff in milliseconds; attempt `n` waits
    /// `base * 2^(n-1)` (default: 2000ms)
    pub reconnect_backoff_ms: u64,

    /// Quality-check poll interval in milliseconds (default: 5000ms)
    pub quality_check_interval_ms: u64,

    /// Upper bound on ICE-restart offer delivery, in milliseconds
    /// (default: 10000ms)
    pub connection_timeout_ms: u64,

    /// Minimum spacing between ICE-restart attempts triggered by ICE state
    /// changes, in milliseconds (default: 10000ms)
    pub ice_restart_threshold_ms: u64,

    /// Quality thresholds evaluated on every poll
    pub thresholds: QualityThresholds,

    /// ICE-restart delivery endpoint. `None` keeps restarts local-only,
    /// which is what signaling-less test harnesses rely on.
    pub ice_restart_endpoint: Option<RestartEndpoint>,

    /// Session identifier used when synthesizing the delivery path from a
    /// base endpoint
    pub session_id: Option<String>,

    /// Whether this session publishes (WHIP) or views (WHEP)
    pub connection_type: ConnectionType,
}

impl Default for ResilienceConfig {
    fn default() -> Self {
        Self {
            max_reconnect_attempts: 5,
            reconnect_backoff_ms: 2000,
            quality_check_interval_ms: 5000,
            connection_timeout_ms: 10000,
            ice_restart_threshold_ms: 10000,
            thresholds: QualityThresholds::default(),
            ice_restart_endpoint: None,
            session_id: None,
            connection_type: ConnectionType::Ingest,
        }
    }
}

impl ResilienceConfig {
    /// Validate configuration parameters
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `max_reconnect_attempts` is 0
    /// - any interval or backoff value is 0
    /// - a base restart endpoint is configured without a `session_id`
    pub fn validate(&self) -> crate::Result<()> {
        use crate::Error;

        if self.max_reconnect_attempts == 0 {
            return Err(Error::InvalidConfig(
                "max_reconnect_attempts must be at least 1".to_string(),
            ));
        }

        if self.reconnect_backoff_ms == 0 {
            return Err(Error::InvalidConfig(
                "reconnect_backoff_ms must be non-zero".to_string(),
            ));
        }

        if self.quality_check_interval_ms == 0 {
            return Err(Error::InvalidConfig(
                "quality_check_interval_ms must be non-zero".to_string(),
            ));
        }

        if self.connection_timeout_ms == 0 {
            return Err(Error::InvalidConfig(
                "connection_timeout_ms must be non-zero".to_string(),
            ));
        }

        if matches!(self.ice_restart_endpoint, Some(RestartEndpoint::Base { .. }))
            && self.session_id.is_none()
        {
            return Err(Error::InvalidConfig(
                "a base ICE restart endpoint requires a session_id".to_string(),
            ));
        }

        Ok(())
    }

    /// Preset for latency-sensitive sessions: tighter polling, faster and
    /// more numerous reconnection attempts.
    pub fn low_latency_preset() -> Self {
        Self {
            max_reconnect_attempts: 10,
            reconnect_backoff_ms: 1000,
            quality_check_interval_ms: 2000,
            connection_timeout_ms: 5000,
            ice_restart_threshold_ms: 5000,
            thresholds: QualityThresholds {
                min_bitrate_kbps: 100.0,
                max_latency_ms: 300.0,
                max_packet_loss_pct: 3.0,
            },
            ice_restart_endpoint: None,
            session_id: None,
            connection_type: ConnectionType::Ingest,
        }
    }

    /// Preset for cellular or otherwise unstable networks: looser
    /// thresholds, slower polling, longer-spaced restarts.
    pub fn mobile_network_preset() -> Self {
        Self {
            max_reconnect_attempts: 8,
            reconnect_backoff_ms: 3000,
            quality_check_interval_ms: 8000,
            connection_timeout_ms: 15000,
            ice_restart_threshold_ms: 20000,
            thresholds: QualityThresholds {
                min_bitrate_kbps: 50.0,
                max_latency_ms: 800.0,
                max_packet_loss_pct: 10.0,
            },
            ice_restart_endpoint: None,
            session_id: None,
            connection_type: ConnectionType::Ingest,
        }
    }

    /// Set the restart delivery endpoint and session id
    ///
    /// Useful for chaining with preset constructors.
    pub fn with_endpoint(mut self, endpoint: RestartEndpoint, session_id: &str) -> Self {
        self.ice_restart_endpoint = Some(endpoint);
        self.session_id = Some(session_id.to_string());
        self
    }

    /// Set the session direction
    pub fn with_connection_type(mut self, connection_type: ConnectionType) -> Self {
        self.connection_type = connection_type;
        self
    }

    /// Replace the quality thresholds
    pub fn with_thresholds(mut self, thresholds: QualityThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }
}
