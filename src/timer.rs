//! One-shot, cancellable timer (component D).
//!
//! The state machine never sleeps itself (see SPEC_FULL §5): a [`Timer`]
//! only tracks a deadline and what it's for. The owning application's
//! event loop is responsible for noticing the deadline has passed and
//! calling back into the connection — mirroring how the session timer in
//! this codebase's SIP layer tracks a reset-able deadline, but driven by
//! an explicit poll instead of a `tokio::time::Sleep`.

use std::time::{Duration, Instant};

/// What a scheduled timer will do when it fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    /// Bounds how long we wait for a SETUP/UPDATE response.
    Setup,
    /// Bounds how long we wait for the peer's HANGUP response.
    Termination,
    /// Gives an outgoing CANCEL a tick to flush before closing.
    Cancel,
}

/// A single scheduled deadline. At most one is ever live per connection.
#[derive(Debug, Clone, Copy)]
pub struct Timer {
    kind: TimerKind,
    deadline: Instant,
}

impl Timer {
    pub fn start(kind: TimerKind, now: Instant, after: Duration) -> Self {
        Self {
            kind,
            deadline: now + after,
        }
    }

    pub fn kind(&self) -> TimerKind {
        self.kind
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        now >= self.deadline
    }

    /// Time left until expiry, or `None` if already past due.
    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        self.deadline.checked_duration_since(now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expires_once_deadline_passes() {
        let now = Instant::now();
        let timer = Timer::start(TimerKind::Setup, now, Duration::from_millis(50));

        assert!(!timer.is_expired(now));
        assert!(timer.is_expired(now + Duration::from_millis(51)));
    }

    #[test]
    fn remaining_is_none_past_due() {
        let now = Instant::now();
        let timer = Timer::start(TimerKind::Cancel, now, Duration::from_millis(1));

        assert!(timer.remaining(now + Duration::from_millis(10)).is_none());
        assert!(timer.remaining(now).is_some());
    }
}
