//! Recovery monitor: the async driver around the state machine
//!
//! One `RecoveryMonitor` owns one peer connection's resilience state. It
//! registers the native state-change handlers, polls statistics on the
//! quality-check interval, feeds everything into the pure state machine,
//! and turns its decisions into side effects: ICE restarts, backoff
//! timers, and recovery events toward the owning session.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │ RecoveryMonitor                                             │
//! │  ├─ quality interval ──> MetricsCollector ─> QualityEvaluator│
//! │  ├─ pc state handlers ──┐                                   │
//! │  │                      ├─> StateMachine ─> decisions       │
//! │  │  quality escalation ─┘        │                          │
//! │  ├─ IceRestartClient  <──────────┤ (StartRecovery/Retry)    │
//! │  ├─ ReconnectScheduler <─────────┤ (backoff timers)         │
//! │  └─ EventSink          <─────────┘ (recovery events)        │
//! └─────────────────────────────────────────────────────────────┘
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use webrtc::ice_transport::ice_connection_state::RTCIceConnectionState;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::RTCPeerConnection;

use crate::config::ResilienceConfig;
use crate::events::{EventSink, RecoveryEvent};
use crate::metrics::{extract_snapshot, ConnectionMetrics, MetricsCollector};
use crate::quality::QualityEvaluator;
use crate::recovery::restart::IceRestartClient;
use crate::recovery::scheduler::ReconnectScheduler;
use crate::recovery::state_machine::{Decision, RecoveryState, RecoveryTrigger, StateMachine};
use crate::Result;

/// Point-in-time view of a monitored connection
#[derive(Debug, Clone)]
pub struct ResilienceState {
    /// Current recovery phase
    pub recovery_state: RecoveryState,
    /// Attempts consumed in the current failure episode
    pub reconnect_attempts: u32,
    /// When the last restart attempt started
    pub last_reconnect_at: Option<Instant>,
    /// Last observed native peer-connection state
    pub connection_state: RTCPeerConnectionState,
    /// Last observed native ICE connection state
    pub ice_connection_state: RTCIceConnectionState,
    /// Whether a recovery attempt is in flight
    pub is_recovering: bool,
    /// Currently active quality issues
    pub quality_issues: Vec<String>,
    /// Most recent metrics sample
    pub last_metrics: ConnectionMetrics,
}

/// Everything the monitor mutates, behind one lock
///
/// Quality evaluation runs against this as a unit, so one poll's
/// evaluation can never interleave with another.
struct MonitorState {
    machine: StateMachine,
    collector: MetricsCollector,
    evaluator: QualityEvaluator,
    connection_state: RTCPeerConnectionState,
    ice_connection_state: RTCIceConnectionState,
    last_metrics: ConnectionMetrics,
}

struct MonitorInner {
    pc: Arc<RTCPeerConnection>,
    config: ResilienceConfig,
    sink: Arc<dyn EventSink>,
    restart: IceRestartClient,
    state: Mutex<MonitorState>,
    timers: Mutex<ReconnectScheduler>,
    /// Once set, no timer fires, no event is emitted, and any in-flight
    /// restart's resolution is ignored.
    closed: AtomicBool,
}

impl MonitorInner {
    fn emit(&self, event: RecoveryEvent) {
        if self.closed.load(Ordering::SeqCst) {
            return;
        }
        if let Err(e) = self.sink.emit(event) {
            debug!(error = %e, "recovery event not delivered");
        }
    }

    /// Native peer-connection state change
    async fn handle_peer_state(self: &Arc<Self>, new_state: RTCPeerConnectionState) {
        if self.closed.load(Ordering::SeqCst) {
            return;
        }

        let decision = {
            let mut state = self.state.lock().await;
            if state.connection_state != new_state {
                debug!(from = ?state.connection_state, to = ?new_state, "peer connection state");
            }
            state.connection_state = new_state;

            match new_state {
                RTCPeerConnectionState::Connected => {
                    let decision = state.machine.on_connected();
                    if decision == Decision::Reconnected {
                        // Counters from before the restart are stale; the
                        // next poll re-establishes a baseline.
                        state.collector.reset();
                        state.evaluator.clear();
                    }
                    decision
                }
                RTCPeerConnectionState::Failed | RTCPeerConnectionState::Disconnected => {
                    state.machine.on_connection_down(Instant::now())
                }
                _ => Decision::None,
            }
        };

        match decision {
            Decision::Reconnected => {
                info!("connection re-established");
                self.timers.lock().await.clear_reconnect_timer();
                self.emit(RecoveryEvent::Reconnected);
            }
            Decision::StartRecovery(trigger) => self.start_recovery(trigger).await,
            _ => {}
        }
    }

    /// Native ICE connection state change
    async fn handle_ice_state(self: &Arc<Self>, new_state: RTCIceConnectionState) {
        if self.closed.load(Ordering::SeqCst) {
            return;
        }

        let decision = {
            let mut state = self.state.lock().await;
            if state.ice_connection_state != new_state {
                debug!(from = ?state.ice_connection_state, to = ?new_state, "ICE connection state");
            }
            state.ice_connection_state = new_state;

            match new_state {
                RTCIceConnectionState::Failed | RTCIceConnectionState::Disconnected => {
                    state.machine.on_ice_down(Instant::now())
                }
                _ => Decision::None,
            }
        };

        if let Decision::StartRecovery(trigger) = decision {
            self.start_recovery(trigger).await;
        }
    }

    /// One quality-check tick: poll stats, evaluate, act
    async fn quality_tick(self: &Arc<Self>) {
        let report = self.pc.get_stats().await;
        if self.closed.load(Ordering::SeqCst) {
            return;
        }

        let now = Instant::now();
        let (delta, decision) = {
            let mut state = self.state.lock().await;
            let snapshot = extract_snapshot(&report);
            let metrics = state.collector.update(snapshot, now);
            state.last_metrics = metrics;

            let delta = state
                .evaluator
                .observe(&metrics, &self.config.thresholds, now);
            let decision = state.machine.on_quality(delta.active, now);
            (delta, decision)
        };

        for issue in &delta.new_issues {
            warn!(issue = %issue, "quality issue detected");
            self.emit(RecoveryEvent::QualityIssue {
                issue: issue.clone(),
            });
        }
        if delta.recovered {
            info!("quality recovered");
            self.emit(RecoveryEvent::QualityRecovered);
        }

        if let Decision::StartRecovery(trigger) = decision {
            self.start_recovery(trigger).await;
        }
    }

    /// Begin a recovery attempt: emit once, then restart on its own task
    async fn start_recovery(self: &Arc<Self>, trigger: RecoveryTrigger) {
        warn!(?trigger, "connection degraded; starting recovery");
        self.emit(RecoveryEvent::Reconnecting);

        let inner = Arc::clone(self);
        tokio::spawn(async move {
            inner.run_restart().await;
        });
    }

    /// One ICE restart attempt, feeding the outcome back into the machine
    async fn run_restart(self: &Arc<Self>) {
        if self.closed.load(Ordering::SeqCst) {
            return;
        }

        let result = self.restart.restart(&self.pc, &self.config).await;

        // Torn down while the request was in flight: ignore its resolution.
        if self.closed.load(Ordering::SeqCst) {
            return;
        }

        match result {
            Ok(outcome) => {
                // Stay in the recovering state; the native connected event
                // completes the episode.
                debug!(?outcome, "ICE restart offer installed");
            }
            Err(e) => {
                warn!(error = %e, "ICE restart attempt failed");
                let decision = {
                    let mut state = self.state.lock().await;
                    state.machine.on_restart_failed(e.is_retryable())
                };

                match decision {
                    Decision::Retry { attempt, delay } => {
                        info!(
                            attempt,
                            max_attempts = self.config.max_reconnect_attempts,
                            delay_ms = delay.as_millis() as u64,
                            "scheduling reconnect attempt"
                        );
                        let handle = self.schedule_retry(delay);
                        self.timers.lock().await.set_reconnect_timer(handle);
                    }
                    Decision::GiveUp => {
                        warn!("recovery exhausted or unrecoverable; giving up");
                        self.emit(RecoveryEvent::ReconnectFailed);
                    }
                    _ => {}
                }
            }
        }
    }

    /// Backoff timer for the next restart attempt
    ///
    /// The timer task only sleeps and hands the attempt to its own task,
    /// so the reconnect-timer slot is already free when that attempt needs
    /// to schedule a further retry.
    fn schedule_retry(self: &Arc<Self>, delay: Duration) -> JoinHandle<()> {
        let inner = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if inner.closed.load(Ordering::SeqCst) {
                return;
            }
            {
                let mut state = inner.state.lock().await;
                state.machine.on_retry_started(Instant::now());
            }
            let restart = Arc::clone(&inner);
            tokio::spawn(async move {
                restart.run_restart().await;
            });
        })
    }
}

/// Monitors one peer connection and drives its recovery
///
/// Created per session, started once, torn down with [`cleanup`]
/// (idempotent). Dropping the monitor without cleanup aborts the timers
/// through the scheduler's `Drop`.
///
/// [`cleanup`]: RecoveryMonitor::cleanup
pub struct RecoveryMonitor {
    inner: Arc<MonitorInner>,
}

impl RecoveryMonitor {
    /// Create a monitor for the given peer connection
    ///
    /// Validates the configuration; does not register anything until
    /// [`start`](RecoveryMonitor::start) is called.
    pub fn new(
        pc: Arc<RTCPeerConnection>,
        config: ResilienceConfig,
        sink: Arc<dyn EventSink>,
    ) -> Result<Self> {
        config.validate()?;

        let machine = StateMachine::new(
            config.max_reconnect_attempts,
            Duration::from_millis(config.reconnect_backoff_ms),
            Duration::from_millis(config.ice_restart_threshold_ms),
        );

        let state = MonitorState {
            machine,
            collector: MetricsCollector::new(config.connection_type),
            evaluator: QualityEvaluator::new(),
            connection_state: pc.connection_state(),
            ice_connection_state: pc.ice_connection_state(),
            last_metrics: ConnectionMetrics::zeroed(),
        };

        Ok(Self {
            inner: Arc::new(MonitorInner {
                pc,
                config,
                sink,
                restart: IceRestartClient::new(),
                state: Mutex::new(state),
                timers: Mutex::new(ReconnectScheduler::new()),
                closed: AtomicBool::new(false),
            }),
        })
    }

    /// Register the native state handlers and start the quality interval
    pub async fn start(&self) {
        // Handlers hold the monitor weakly: the peer connection must not
        // keep a torn-down monitor alive.
        let weak = Arc::downgrade(&self.inner);
        self.inner
            .pc
            .on_peer_connection_state_change(Box::new(move |s: RTCPeerConnectionState| {
                let weak = weak.clone();
                Box::pin(async move {
                    if let Some(inner) = weak.upgrade() {
                        inner.handle_peer_state(s).await;
                    }
                })
            }));

        let weak = Arc::downgrade(&self.inner);
        self.inner
            .pc
            .on_ice_connection_state_change(Box::new(move |s: RTCIceConnectionState| {
                let weak = weak.clone();
                Box::pin(async move {
                    if let Some(inner) = weak.upgrade() {
                        inner.handle_ice_state(s).await;
                    }
                })
            }));

        let weak = Arc::downgrade(&self.inner);
        let period = Duration::from_millis(self.inner.config.quality_check_interval_ms);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            // The first tick of a tokio interval fires immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(inner) = weak.upgrade() else { break };
                if inner.closed.load(Ordering::SeqCst) {
                    break;
                }
                inner.quality_tick().await;
            }
        });
        self.inner.timers.lock().await.set_quality_interval(handle);

        info!(
            interval_ms = self.inner.config.quality_check_interval_ms,
            connection_type = ?self.inner.config.connection_type,
            "resilience monitor started"
        );
    }

    /// Snapshot the current resilience state
    pub async fn state(&self) -> ResilienceState {
        let state = self.inner.state.lock().await;
        ResilienceState {
            recovery_state: state.machine.state(),
            reconnect_attempts: state.machine.reconnect_attempts(),
            last_reconnect_at: state.machine.last_restart_at(),
            connection_state: state.connection_state,
            ice_connection_state: state.ice_connection_state,
            is_recovering: state.machine.is_recovering(),
            quality_issues: state.evaluator.issues().iter().cloned().collect(),
            last_metrics: state.last_metrics,
        }
    }

    /// Most recent metrics sample
    pub async fn metrics(&self) -> ConnectionMetrics {
        self.inner.state.lock().await.last_metrics
    }

    /// Explicit manual reconnect, the only exit from the failed state
    pub async fn force_reconnect(&self) {
        if self.inner.closed.load(Ordering::SeqCst) {
            return;
        }
        let decision = {
            let mut state = self.inner.state.lock().await;
            state.machine.force_reconnect(Instant::now())
        };
        if let Decision::StartRecovery(trigger) = decision {
            self.inner.start_recovery(trigger).await;
        }
    }

    /// Tear the monitor down: cancel timers and silence all callbacks
    ///
    /// Safe to call any number of times. After the first call the monitor
    /// is inert: no timer fires, no event is emitted, and an in-flight
    /// restart's resolution is discarded.
    pub async fn cleanup(&self) {
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            debug!("cleanup called on an already-closed monitor");
            return;
        }
        self.inner.timers.lock().await.cleanup();
        info!("resilience monitor torn down");
    }

    /// Whether the monitor has been torn down
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }
}
