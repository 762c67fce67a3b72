//! Recovery controller: state machine, timers, ICE restart, driver

pub mod monitor;
pub mod restart;
pub mod scheduler;
pub mod state_machine;

pub use monitor::{RecoveryMonitor, ResilienceState};
pub use restart::{IceRestartClient, RestartOutcome};
pub use scheduler::ReconnectScheduler;
pub use state_machine::{backoff_delay, Decision, RecoveryState, RecoveryTrigger, StateMachine};
