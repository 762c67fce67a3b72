//! Recovery state machine
//!
//! The transition core is pure: every input takes `now` explicitly and
//! returns a [`Decision`] describing what the driver should do, so the
//! whole recovery policy is testable without a peer connection, timers, or
//! a network stack.

use std::time::{Duration, Instant};

/// Recovery phase of a monitored connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryState {
    /// Healthy connection, no active quality issues
    Stable,
    /// At least one quality issue active, no restart started yet
    Degraded,
    /// An ICE restart or reconnect attempt is in flight
    Recovering,
    /// Recovery gave up; terminal until an explicit manual reconnect
    Failed,
}

/// Why a recovery attempt is being started
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryTrigger {
    /// Native peer-connection state reported failed or disconnected
    ConnectionDown,
    /// ICE connection state reported failed or disconnected
    IceDown,
    /// Two or more quality issues were active at once
    QualityEscalation,
    /// Explicit caller request out of the failed state
    Manual,
}

/// What the driver should do after feeding an input to the machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Nothing to do
    None,
    /// Begin a recovery attempt: emit `Reconnecting`, run an ICE restart
    StartRecovery(RecoveryTrigger),
    /// Recovery completed; attempts were reset. Emit `Reconnected`.
    Reconnected,
    /// Schedule another restart after the backoff delay. The attempt is
    /// already counted.
    Retry { attempt: u32, delay: Duration },
    /// Recovery is exhausted. Emit `ReconnectFailed`; fires at most once
    /// per failure episode.
    GiveUp,
}

/// Exponential backoff: `base * 2^(attempt - 1)` for `attempt >= 1`
pub fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    let shift = attempt.saturating_sub(1).min(20);
    base.saturating_mul(1u32 << shift)
}

/// Pure recovery state machine
///
/// Owns the attempt counter and the restart-storm guard; everything with a
/// side effect (timers, HTTP, events) lives in the driver.
#[derive(Debug)]
pub struct StateMachine {
    state: RecoveryState,
    reconnect_attempts: u32,
    max_reconnect_attempts: u32,
    backoff_base: Duration,
    ice_restart_threshold: Duration,
    last_restart_at: Option<Instant>,
    failed_reported: bool,
}

impl StateMachine {
    /// Create a machine in the stable state
    pub fn new(
        max_reconnect_attempts: u32,
        backoff_base: Duration,
        ice_restart_threshold: Duration,
    ) -> Self {
        Self {
            state: RecoveryState::Stable,
            reconnect_attempts: 0,
            max_reconnect_attempts,
            backoff_base,
            ice_restart_threshold,
            last_restart_at: None,
            failed_reported: false,
        }
    }

    /// Current recovery phase
    pub fn state(&self) -> RecoveryState {
        self.state
    }

    /// Attempts consumed in the current failure episode
    pub fn reconnect_attempts(&self) -> u32 {
        self.reconnect_attempts
    }

    /// Whether a recovery attempt is currently in flight
    pub fn is_recovering(&self) -> bool {
        self.state == RecoveryState::Recovering
    }

    /// When the last restart attempt started
    pub fn last_restart_at(&self) -> Option<Instant> {
        self.last_restart_at
    }

    /// Native peer-connection state dropped to failed or disconnected
    pub fn on_connection_down(&mut self, now: Instant) -> Decision {
        match self.state {
            RecoveryState::Recovering | RecoveryState::Failed => Decision::None,
            RecoveryState::Stable | RecoveryState::Degraded => {
                self.begin_recovery(now);
                Decision::StartRecovery(RecoveryTrigger::ConnectionDown)
            }
        }
    }

    /// ICE connection state dropped to failed or disconnected
    ///
    /// Unlike a full connection drop, ICE flaps are rate-limited: a new
    /// restart only starts once the threshold has passed since the last
    /// one.
    pub fn on_ice_down(&mut self, now: Instant) -> Decision {
        if matches!(self.state, RecoveryState::Recovering | RecoveryState::Failed) {
            return Decision::None;
        }
        if let Some(last) = self.last_restart_at {
            if now.saturating_duration_since(last) < self.ice_restart_threshold {
                return Decision::None;
            }
        }
        self.begin_recovery(now);
        Decision::StartRecovery(RecoveryTrigger::IceDown)
    }

    /// Native peer-connection state reports connected
    pub fn on_connected(&mut self) -> Decision {
        if self.state == RecoveryState::Recovering {
            self.state = RecoveryState::Stable;
            self.reconnect_attempts = 0;
            self.failed_reported = false;
            Decision::Reconnected
        } else {
            Decision::None
        }
    }

    /// Quality evaluation tick with the number of concurrently active
    /// issues
    ///
    /// One issue marks the connection degraded but is tolerated; two or
    /// more concurrent issues escalate to an ICE restart.
    pub fn on_quality(&mut self, active_issues: usize, now: Instant) -> Decision {
        match self.state {
            RecoveryState::Recovering | RecoveryState::Failed => Decision::None,
            RecoveryState::Stable | RecoveryState::Degraded => {
                if active_issues >= 2 {
                    self.begin_recovery(now);
                    Decision::StartRecovery(RecoveryTrigger::QualityEscalation)
                } else if active_issues == 1 {
                    self.state = RecoveryState::Degraded;
                    Decision::None
                } else {
                    self.state = RecoveryState::Stable;
                    Decision::None
                }
            }
        }
    }

    /// An ICE restart attempt finished with an error
    ///
    /// Retryable failures consume one attempt and schedule a backoff
    /// retry; a non-retryable failure or an exhausted budget is terminal.
    pub fn on_restart_failed(&mut self, retryable: bool) -> Decision {
        if self.state != RecoveryState::Recovering {
            return Decision::None;
        }

        self.reconnect_attempts += 1;

        if !retryable || self.reconnect_attempts >= self.max_reconnect_attempts {
            self.state = RecoveryState::Failed;
            if self.failed_reported {
                Decision::None
            } else {
                self.failed_reported = true;
                Decision::GiveUp
            }
        } else {
            Decision::Retry {
                attempt: self.reconnect_attempts,
                delay: backoff_delay(self.backoff_base, self.reconnect_attempts),
            }
        }
    }

    /// A scheduled retry is about to run; stamps the restart time
    pub fn on_retry_started(&mut self, now: Instant) {
        if self.state == RecoveryState::Recovering {
            self.last_restart_at = Some(now);
        }
    }

    /// Explicit caller request to leave the failed state and try again
    ///
    /// A no-op while a recovery attempt is already in flight.
    pub fn force_reconnect(&mut self, now: Instant) -> Decision {
        if self.state == RecoveryState::Recovering {
            return Decision::None;
        }
        self.reconnect_attempts = 0;
        self.failed_reported = false;
        self.begin_recovery(now);
        Decision::StartRecovery(RecoveryTrigger::Manual)
    }

    fn begin_recovery(&mut self, now: Instant) {
        self.state = RecoveryState::Recovering;
        self.last_restart_at = Some(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn machine() -> StateMachine {
        StateMachine::new(5, Duration::from_millis(2000), Duration::from_secs(10))
    }

    #[test]
    fn test_backoff_sequence() {
        let base = Duration::from_millis(2000);
        assert_eq!(backoff_delay(base, 1), Duration::from_millis(2000));
        assert_eq!(backoff_delay(base, 2), Duration::from_millis(4000));
        assert_eq!(backoff_delay(base, 3), Duration::from_millis(8000));
        assert_eq!(backoff_delay(base, 4), Duration::from_millis(16000));
    }

    #[test]
    fn test_connection_down_starts_recovery() {
        let mut sm = machine();
        let now = Instant::now();

        let decision = sm.on_connection_down(now);
        assert_eq!(
            decision,
            Decision::StartRecovery(RecoveryTrigger::ConnectionDown)
        );
        assert_eq!(sm.state(), RecoveryState::Recovering);
        assert!(sm.is_recovering());
    }

    #[test]
    fn test_no_double_recovery_while_recovering() {
        let mut sm = machine();
        let now = Instant::now();

        sm.on_connection_down(now);
        assert_eq!(sm.on_connection_down(now), Decision::None);
        assert_eq!(sm.on_ice_down(now), Decision::None);
        assert_eq!(sm.on_quality(3, now), Decision::None);
    }

    #[test]
    fn test_connected_resets_attempts() {
        let mut sm = machine();
        let now = Instant::now();

        sm.on_connection_down(now);
        sm.on_restart_failed(true);
        sm.on_restart_failed(true);
        assert_eq!(sm.reconnect_attempts(), 2);

        let decision = sm.on_connected();
        assert_eq!(decision, Decision::Reconnected);
        assert_eq!(sm.state(), RecoveryState::Stable);
        assert_eq!(sm.reconnect_attempts(), 0);
    }

    #[test]
    fn test_connected_while_stable_is_noop() {
        let mut sm = machine();
        assert_eq!(sm.on_connected(), Decision::None);
    }

    #[test]
    fn test_attempts_increase_by_one_per_failure() {
        let mut sm = machine();
        sm.on_connection_down(Instant::now());

        for expected in 1..5u32 {
            let decision = sm.on_restart_failed(true);
            assert_eq!(sm.reconnect_attempts(), expected);
            if expected < 5 {
                assert_eq!(
                    decision,
                    Decision::Retry {
                        attempt: expected,
                        delay: backoff_delay(Duration::from_millis(2000), expected),
                    }
                );
            }
        }
    }

    #[test]
    fn test_exhausted_attempts_give_up_once() {
        let mut sm = StateMachine::new(2, Duration::from_millis(2000), Duration::from_secs(10));
        sm.on_connection_down(Instant::now());

        assert!(matches!(sm.on_restart_failed(true), Decision::Retry { .. }));
        assert_eq!(sm.on_restart_failed(true), Decision::GiveUp);
        assert_eq!(sm.state(), RecoveryState::Failed);

        // Terminal: further failures report nothing and schedule nothing.
        assert_eq!(sm.on_restart_failed(true), Decision::None);
        assert_eq!(sm.on_connection_down(Instant::now()), Decision::None);
    }

    #[test]
    fn test_non_retryable_failure_is_terminal() {
        let mut sm = machine();
        sm.on_connection_down(Instant::now());

        assert_eq!(sm.on_restart_failed(false), Decision::GiveUp);
        assert_eq!(sm.state(), RecoveryState::Failed);
        assert_eq!(sm.reconnect_attempts(), 1);
    }

    #[test]
    fn test_single_issue_degrades_without_restart() {
        let mut sm = machine();
        let now = Instant::now();

        for _ in 0..5 {
            assert_eq!(sm.on_quality(1, now), Decision::None);
            assert_eq!(sm.state(), RecoveryState::Degraded);
        }
    }

    #[test]
    fn test_two_issues_escalate_to_restart() {
        let mut sm = machine();
        let now = Instant::now();

        sm.on_quality(1, now);
        let decision = sm.on_quality(2, now);
        assert_eq!(
            decision,
            Decision::StartRecovery(RecoveryTrigger::QualityEscalation)
        );
        assert_eq!(sm.state(), RecoveryState::Recovering);
    }

    #[test]
    fn test_quality_clearing_restores_stable() {
        let mut sm = machine();
        let now = Instant::now();

        sm.on_quality(1, now);
        assert_eq!(sm.state(), RecoveryState::Degraded);
        sm.on_quality(0, now);
        assert_eq!(sm.state(), RecoveryState::Stable);
    }

    #[test]
    fn test_ice_down_honors_restart_threshold() {
        let mut sm = machine();
        let t0 = Instant::now();

        // First ICE drop starts a restart.
        assert_eq!(sm.on_ice_down(t0), Decision::StartRecovery(RecoveryTrigger::IceDown));
        sm.on_connected();

        // A flap right after is suppressed.
        assert_eq!(sm.on_ice_down(t0 + Duration::from_secs(2)), Decision::None);

        // Past the threshold the restart goes through again.
        assert_eq!(
            sm.on_ice_down(t0 + Duration::from_secs(11)),
            Decision::StartRecovery(RecoveryTrigger::IceDown)
        );
    }

    #[test]
    fn test_force_reconnect_leaves_failed() {
        let mut sm = StateMachine::new(1, Duration::from_millis(2000), Duration::from_secs(10));
        sm.on_connection_down(Instant::now());
        sm.on_restart_failed(true);
        assert_eq!(sm.state(), RecoveryState::Failed);

        let decision = sm.force_reconnect(Instant::now());
        assert_eq!(decision, Decision::StartRecovery(RecoveryTrigger::Manual));
        assert_eq!(sm.state(), RecoveryState::Recovering);
        assert_eq!(sm.reconnect_attempts(), 0);
    }

    #[test]
    fn test_force_reconnect_is_noop_while_recovering() {
        let mut sm = machine();
        sm.on_connection_down(Instant::now());
        assert_eq!(sm.force_reconnect(Instant::now()), Decision::None);
    }

    #[test]
    fn test_give_up_not_repeated_after_manual_cycle() {
        let mut sm = StateMachine::new(1, Duration::from_millis(2000), Duration::from_secs(10));
        sm.on_connection_down(Instant::now());
        assert_eq!(sm.on_restart_failed(true), Decision::GiveUp);

        // A new manual episode may report failure again.
        sm.force_reconnect(Instant::now());
        assert_eq!(sm.on_restart_failed(true), Decision::GiveUp);
    }
}
