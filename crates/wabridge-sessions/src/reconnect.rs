//! Reconnect policy.
//!
//! A session moves `CONNECTING -> OPEN -> (CLOSED_RECOVERABLE |
//! CLOSED_TERMINAL)`. The policy decides, from the close reason and the
//! attempts so far, whether the registry schedules another connect or
//! deletes the session. Attempts reset to zero when a connection reaches
//! `OPEN`.

use std::time::Duration;

use wabridge_models::DisconnectReason;

/// `MAX_RETRIES` sentinel selecting unlimited reconnect attempts.
pub const UNLIMITED_RETRIES: i32 = -1;

/// Outcome of a close event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectDecision {
    /// Terminal: delete the session, never reschedule.
    Drop,
    /// Recoverable: schedule a reconnect after the delay.
    Retry { delay: Duration },
}

/// Per-session reconnect rules.
#[derive(Debug, Clone, Copy)]
pub struct ReconnectPolicy {
    max_attempts: i32,
    interval: Duration,
}

impl ReconnectPolicy {
    pub fn new(max_attempts: i32, interval: Duration) -> Self {
        Self {
            max_attempts,
            interval,
        }
    }

    /// Decides what to do after a transport close.
    ///
    /// A logged-out close is terminal regardless of the retry budget.
    /// Otherwise the session retries while `attempts` is below the
    /// maximum (always, when unlimited); a restart-required close skips
    /// the delay.
    pub fn decide(&self, reason: Option<DisconnectReason>, attempts: u32) -> ReconnectDecision {
        if reason.is_some_and(DisconnectReason::is_logged_out) {
            return ReconnectDecision::Drop;
        }

        let within_budget = self.max_attempts == UNLIMITED_RETRIES
            || i64::from(attempts) < i64::from(self.max_attempts);
        if !within_budget {
            return ReconnectDecision::Drop;
        }

        let delay = if reason.is_some_and(DisconnectReason::wants_immediate_restart) {
            Duration::ZERO
        } else {
            self.interval
        };
        ReconnectDecision::Retry { delay }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(max: i32) -> ReconnectPolicy {
        ReconnectPolicy::new(max, Duration::from_millis(500))
    }

    #[test]
    fn test_logged_out_is_terminal_despite_budget() {
        let p = policy(UNLIMITED_RETRIES);
        assert_eq!(
            p.decide(Some(DisconnectReason::LoggedOut), 0),
            ReconnectDecision::Drop
        );
    }

    #[test]
    fn test_retry_within_budget() {
        let p = policy(2);
        assert_eq!(
            p.decide(Some(DisconnectReason::ConnectionLost), 0),
            ReconnectDecision::Retry {
                delay: Duration::from_millis(500)
            }
        );
        assert_eq!(
            p.decide(Some(DisconnectReason::ConnectionLost), 1),
            ReconnectDecision::Retry {
                delay: Duration::from_millis(500)
            }
        );
    }

    #[test]
    fn test_budget_exhausted() {
        let p = policy(2);
        assert_eq!(
            p.decide(Some(DisconnectReason::ConnectionLost), 2),
            ReconnectDecision::Drop
        );
    }

    #[test]
    fn test_zero_budget_never_retries() {
        let p = policy(0);
        assert_eq!(
            p.decide(Some(DisconnectReason::ConnectionLost), 0),
            ReconnectDecision::Drop
        );
    }

    #[test]
    fn test_unlimited_always_retries() {
        let p = policy(UNLIMITED_RETRIES);
        assert!(matches!(
            p.decide(Some(DisconnectReason::ConnectionLost), 10_000),
            ReconnectDecision::Retry { .. }
        ));
    }

    #[test]
    fn test_restart_required_is_immediate() {
        let p = policy(UNLIMITED_RETRIES);
        assert_eq!(
            p.decide(Some(DisconnectReason::RestartRequired), 0),
            ReconnectDecision::Retry {
                delay: Duration::ZERO
            }
        );
    }

    #[test]
    fn test_close_without_reason_uses_interval() {
        let p = policy(1);
        assert_eq!(
            p.decide(None, 0),
            ReconnectDecision::Retry {
                delay: Duration::from_millis(500)
            }
        );
    }
}
