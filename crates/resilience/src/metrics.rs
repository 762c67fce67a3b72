//! Connection statistics collection
//!
//! Turns the cumulative counters of consecutive `get_stats()` reports into
//! per-interval rates. The first poll after a (re)connection only stores a
//! baseline and reports zeros; every later poll computes deltas against the
//! previous snapshot.

use std::time::Instant;

use tracing::debug;
use webrtc::stats::{StatsReport, StatsReportType};

use crate::config::ConnectionType;

/// Raw cumulative counters extracted from one `get_stats()` report
///
/// Counters are summed across candidate pairs / RTP streams, so the
/// snapshot describes the whole connection rather than a single track.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StatsSnapshot {
    /// Transport-level bytes sent (ICE candidate pairs)
    pub bytes_sent: u64,
    /// Transport-level bytes received (ICE candidate pairs)
    pub bytes_received: u64,
    /// RTP packets sent (outbound streams)
    pub packets_sent: u64,
    /// RTP packets received (inbound streams)
    pub packets_received: u64,
    /// Packets the remote end reported lost (RTCP receiver reports)
    pub packets_lost: u64,
    /// Most recent candidate-pair round-trip time, in seconds
    pub rtt_secs: f64,
    /// Cumulative frame count, when the media layer reports one
    pub frame_count: Option<u64>,
    /// Instantaneous frames-per-second, when reported directly
    pub frames_per_second: Option<f64>,
}

/// One evaluated metrics sample
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConnectionMetrics {
    /// Send or receive bitrate (per [`ConnectionType`]), in kbps
    pub bitrate_kbps: f64,
    /// Round-trip latency, in ms
    pub latency_ms: f64,
    /// Packet loss over the last interval, in percent
    pub packet_loss_pct: f64,
    /// Smoothed latency variation, in ms
    pub jitter_ms: f64,
    /// Frame rate, in frames per second
    pub frame_rate: f64,
    /// Last time any byte counter moved
    pub last_activity_at: Option<Instant>,
}

impl ConnectionMetrics {
    /// All-zero sample, reported on the baseline poll
    pub fn zeroed() -> Self {
        Self {
            bitrate_kbps: 0.0,
            latency_ms: 0.0,
            packet_loss_pct: 0.0,
            jitter_ms: 0.0,
            frame_rate: 0.0,
            last_activity_at: None,
        }
    }
}

/// Extract a [`StatsSnapshot`] from a webrtc-rs stats report
///
/// Walks every report entry: candidate pairs carry the transport byte
/// counters and the current round-trip time, outbound/inbound RTP streams
/// carry packet counts, and remote-inbound entries carry the loss the far
/// end observed. Frame counters are not surfaced by webrtc-rs stats; they
/// stay `None` unless the media layer fills them in.
pub fn extract_snapshot(report: &StatsReport) -> StatsSnapshot {
    let mut snapshot = StatsSnapshot::default();

    for (_id, stat) in &report.reports {
        match stat {
            StatsReportType::CandidatePair(pair) => {
                snapshot.bytes_sent += pair.bytes_sent as u64;
                snapshot.bytes_received += pair.bytes_received as u64;
                if pair.current_round_trip_time > 0.0 {
                    snapshot.rtt_secs = pair.current_round_trip_time;
                }
            }
            StatsReportType::OutboundRTP(outbound) => {
                snapshot.packets_sent += outbound.packets_sent;
            }
            StatsReportType::InboundRTP(inbound) => {
                snapshot.packets_received += inbound.packets_received;
            }
            StatsReportType::RemoteInboundRTP(remote) => {
                snapshot.packets_lost += remote.packets_lost.max(0) as u64;
            }
            _ => {}
        }
    }

    snapshot
}

/// Delta-based metrics computation over consecutive snapshots
///
/// One collector per monitored peer connection. `reset()` re-arms the
/// baseline after a reconnect so stale counters from before the restart
/// cannot produce a bogus spike.
#[derive(Debug)]
pub struct MetricsCollector {
    connection_type: ConnectionType,
    previous: Option<(StatsSnapshot, Instant)>,
    jitter_ms: f64,
    last_rtt_ms: f64,
    last_activity_at: Option<Instant>,
}

impl MetricsCollector {
    /// Create a collector for the given session direction
    pub fn new(connection_type: ConnectionType) -> Self {
        Self {
            connection_type,
            previous: None,
            jitter_ms: 0.0,
            last_rtt_ms: 0.0,
            last_activity_at: None,
        }
    }

    /// Forget the baseline and smoothing state
    ///
    /// The next `update` call stores a fresh baseline and reports zeros.
    pub fn reset(&mut self) {
        self.previous = None;
        self.jitter_ms = 0.0;
        self.last_rtt_ms = 0.0;
        self.last_activity_at = None;
    }

    /// Fold one snapshot into the collector and return the metrics sample
    pub fn update(&mut self, snapshot: StatsSnapshot, now: Instant) -> ConnectionMetrics {
        let Some((prev, prev_at)) = self.previous else {
            if snapshot.bytes_sent > 0 || snapshot.bytes_received > 0 {
                self.last_activity_at = Some(now);
            }
            self.previous = Some((snapshot, now));
            return ConnectionMetrics {
                last_activity_at: self.last_activity_at,
                ..ConnectionMetrics::zeroed()
            };
        };

        let secs = now.saturating_duration_since(prev_at).as_secs_f64();
        if secs <= 0.0 {
            // Two polls in the same instant; keep the baseline untouched.
            return ConnectionMetrics {
                last_activity_at: self.last_activity_at,
                ..ConnectionMetrics::zeroed()
            };
        }

        // Counters can only move forward; saturating deltas absorb a
        // counter reset after renegotiation.
        let bytes_delta = match self.connection_type {
            ConnectionType::Ingest => snapshot.bytes_sent.saturating_sub(prev.bytes_sent),
            ConnectionType::Egress => snapshot.bytes_received.saturating_sub(prev.bytes_received),
        };
        let bitrate_kbps = (bytes_delta as f64 * 8.0) / secs / 1000.0;

        let lost_delta = snapshot.packets_lost.saturating_sub(prev.packets_lost);
        let packets_delta = match self.connection_type {
            ConnectionType::Ingest => snapshot.packets_sent.saturating_sub(prev.packets_sent),
            ConnectionType::Egress => snapshot
                .packets_received
                .saturating_sub(prev.packets_received),
        };
        let packet_loss_pct = if packets_delta > 0 {
            ((lost_delta as f64 / packets_delta as f64) * 100.0).min(100.0)
        } else {
            0.0
        };

        let latency_ms = (snapshot.rtt_secs * 1000.0).max(0.0);

        // RFC 3550 style smoothing over the RTT deviation; webrtc-rs does
        // not surface RTP inter-arrival jitter on these stats.
        if latency_ms > 0.0 {
            if self.last_rtt_ms > 0.0 {
                let deviation = (latency_ms - self.last_rtt_ms).abs();
                self.jitter_ms += (deviation - self.jitter_ms) / 16.0;
            }
            self.last_rtt_ms = latency_ms;
        }

        let frame_rate = match (
            snapshot.frames_per_second,
            snapshot.frame_count,
            prev.frame_count,
        ) {
            (Some(fps), _, _) => fps.max(0.0),
            (None, Some(frames), Some(prev_frames)) => {
                frames.saturating_sub(prev_frames) as f64 / secs
            }
            _ => 0.0,
        };

        if snapshot.bytes_sent != prev.bytes_sent || snapshot.bytes_received != prev.bytes_received
        {
            self.last_activity_at = Some(now);
        }

        self.previous = Some((snapshot, now));

        let metrics = ConnectionMetrics {
            bitrate_kbps,
            latency_ms,
            packet_loss_pct,
            jitter_ms: self.jitter_ms,
            frame_rate,
            last_activity_at: self.last_activity_at,
        };

        debug!(
            bitrate_kbps = metrics.bitrate_kbps,
            latency_ms = metrics.latency_ms,
            loss_pct = metrics.packet_loss_pct,
            jitter_ms = metrics.jitter_ms,
            "metrics sample"
        );

        metrics
    }

    /// Extract and fold a live stats report
    pub fn collect(&mut self, report: &StatsReport) -> ConnectionMetrics {
        self.update(extract_snapshot(report), Instant::now())
    }
}
