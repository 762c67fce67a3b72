//! Quality threshold evaluation
//!
//! Compares each metrics sample against the configured thresholds and
//! tracks the set of active issues across polls, so issue-detected and
//! quality-recovered transitions fire once per edge rather than once per
//! poll.

use std::collections::BTreeSet;
use std::time::{Duration, Instant};

use crate::config::QualityThresholds;
use crate::metrics::ConnectionMetrics;

/// Media is considered stalled after this long without any byte movement.
/// Deliberately independent of the configured thresholds.
const ACTIVITY_TIMEOUT: Duration = Duration::from_secs(10);

/// Outcome of folding one metrics sample into the evaluator
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QualityDelta {
    /// Issues that were not active on the previous poll, in rule order
    pub new_issues: Vec<String>,
    /// The active set transitioned from non-empty to empty
    pub recovered: bool,
    /// Number of currently active issues
    pub active: usize,
}

/// Build the issue list for one sample. Pure; stable rule order.
pub fn evaluate(
    metrics: &ConnectionMetrics,
    thresholds: &QualityThresholds,
    now: Instant,
) -> Vec<String> {
    let mut issues = Vec::new();

    // Bitrate is only judged once data has flowed, so a session that has
    // not started sending is not flagged.
    if metrics.bitrate_kbps > 0.0 && metrics.bitrate_kbps < thresholds.min_bitrate_kbps {
        issues.push(format!("Low bitrate: {:.0}kbps", metrics.bitrate_kbps));
    }

    if metrics.latency_ms > thresholds.max_latency_ms {
        issues.push(format!("High latency: {:.0}ms", metrics.latency_ms));
    }

    if metrics.packet_loss_pct > thresholds.max_packet_loss_pct {
        issues.push(format!(
            "High packet loss: {:.1}%",
            metrics.packet_loss_pct
        ));
    }

    if let Some(last) = metrics.last_activity_at {
        if now.saturating_duration_since(last) > ACTIVITY_TIMEOUT {
            issues.push("No media activity".to_string());
        }
    }

    issues
}

/// Tracks the active issue set across polls
#[derive(Debug, Default)]
pub struct QualityEvaluator {
    active: BTreeSet<String>,
}

impl QualityEvaluator {
    /// Create an evaluator with no active issues
    pub fn new() -> Self {
        Self::default()
    }

    /// Currently active issues, order-insensitive
    pub fn issues(&self) -> &BTreeSet<String> {
        &self.active
    }

    /// Drop all active issues without reporting a recovery transition
    ///
    /// Used when a reconnect resets the session; the recovered event
    /// belongs to quality evaluation edges only.
    pub fn clear(&mut self) {
        self.active.clear();
    }

    /// Fold one sample into the active set and report the transition delta
    pub fn observe(
        &mut self,
        metrics: &ConnectionMetrics,
        thresholds: &QualityThresholds,
        now: Instant,
    ) -> QualityDelta {
        let issues = evaluate(metrics, thresholds, now);
        let current: BTreeSet<String> = issues.iter().cloned().collect();

        let new_issues: Vec<String> = issues
            .into_iter()
            .filter(|issue| !self.active.contains(issue))
            .collect();
        let recovered = current.is_empty() && !self.active.is_empty();
        let active = current.len();

        self.active = current;

        QualityDelta {
            new_issues,
            recovered,
            active,
        }
    }
}
