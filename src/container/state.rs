//! Container lifecycle states and recovery decisions

use std::time::Duration;
use tracing::{info, warn};

/// Lifecycle state of a listener container
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContainerState {
    /// Configured but never started
    Created,
    /// Establishing the broker session and issuing subscriptions
    Starting,
    /// Session up, subscriptions active, frames being dispatched
    Running,
    /// Session lost; waiting out the recovery interval (attempt count)
    Recovering(u32),
    /// Explicit stop in progress
    Stopping,
    /// Terminal; only an explicit stop ends up here
    Stopped,
}

impl ContainerState {
    /// Connection loss never terminates a container on its own; only an
    /// explicit stop reaches the terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ContainerState::Stopped)
    }

    /// Started and not shutting down
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            ContainerState::Starting | ContainerState::Running | ContainerState::Recovering(_)
        )
    }
}

/// Decision for the session supervisor after a connect or subscribe failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum RecoveryDecision {
    /// Wait out the delay, then retry the whole connect and subscribe
    /// sequence
    Retry { attempt: u32, delay: Duration },
    /// Shutdown was requested; leave the supervisor loop
    Abort,
}

/// Pure recovery decision logic for the session supervisor
pub(crate) struct Recovery;

impl Recovery {
    /// Retries are unbounded; only a shutdown request stops them.
    pub(crate) fn next_attempt(
        current_attempt: u32,
        interval: Duration,
        shutdown_requested: bool,
    ) -> RecoveryDecision {
        if shutdown_requested {
            return RecoveryDecision::Abort;
        }
        RecoveryDecision::Retry {
            attempt: current_attempt.saturating_add(1),
            delay: interval,
        }
    }

    /// Log a state transition at a severity matching its meaning
    pub(crate) fn log_transition(from: &ContainerState, to: &ContainerState) {
        match (from, to) {
            (ContainerState::Starting, ContainerState::Running) => {
                info!("listener container running");
            }
            (ContainerState::Running, ContainerState::Recovering(attempt)) => {
                warn!(attempt, "broker session lost, recovering");
            }
            (_, ContainerState::Recovering(attempt)) => {
                info!(attempt, "retrying broker session");
            }
            (_, ContainerState::Stopped) => {
                info!("listener container stopped");
            }
            (from, to) => {
                info!(?from, ?to, "listener container state change");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_stopped_is_terminal() {
        assert!(ContainerState::Stopped.is_terminal());
        for state in [
            ContainerState::Created,
            ContainerState::Starting,
            ContainerState::Running,
            ContainerState::Recovering(3),
            ContainerState::Stopping,
        ] {
            assert!(!state.is_terminal(), "{state:?} must not be terminal");
        }
    }

    #[test]
    fn test_active_states() {
        assert!(ContainerState::Starting.is_active());
        assert!(ContainerState::Running.is_active());
        assert!(ContainerState::Recovering(1).is_active());
        assert!(!ContainerState::Created.is_active());
        assert!(!ContainerState::Stopping.is_active());
        assert!(!ContainerState::Stopped.is_active());
    }

    #[test]
    fn test_recovery_retries_are_unbounded() {
        let interval = Duration::from_millis(5000);
        for attempt in [0u32, 1, 100, 1_000_000] {
            let decision = Recovery::next_attempt(attempt, interval, false);
            assert_eq!(
                decision,
                RecoveryDecision::Retry {
                    attempt: attempt + 1,
                    delay: interval,
                }
            );
        }
    }

    #[test]
    fn test_shutdown_aborts_recovery() {
        let decision = Recovery::next_attempt(4, Duration::from_millis(10), true);
        assert_eq!(decision, RecoveryDecision::Abort);
    }
}
