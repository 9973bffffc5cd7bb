/// Progressive lockout policy
///
/// Pure and deterministic over `(state, now)`: no I/O, no side effects. The
/// authentication service persists whatever state these functions return.
use chrono::{DateTime, Duration, Utc};

/// The three lockout fields of a principal, treated as one unit. Invariant:
/// `failed_attempts > 0` implies `window_started_at` is set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LockoutState {
    pub failed_attempts: i32,
    pub window_started_at: Option<DateTime<Utc>>,
    pub locked_until: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockStatus {
    Clear,
    Locked { retry_after: Duration },
}

#[derive(Debug, Clone)]
pub struct LockoutPolicy {
    threshold: u32,
    window: Duration,
    lock_duration: Duration,
}

impl LockoutPolicy {
    pub fn new(threshold: u32, window: Duration, lock_duration: Duration) -> Self {
        Self {
            threshold,
            window,
            lock_duration,
        }
    }

    /// Locked iff `locked_until >= now`. The interval is closed on the locked
    /// side: an attempt arriving exactly at `locked_until` is still locked,
    /// so a client retrying at the boundary cannot race the unlock.
    pub fn evaluate(&self, state: &LockoutState, now: DateTime<Utc>) -> LockStatus {
        match state.locked_until {
            Some(until) if until >= now => LockStatus::Locked {
                retry_after: until - now,
            },
            _ => LockStatus::Clear,
        }
    }

    /// Account a failed attempt. Attempts outside the sliding window restart
    /// the count at one; reaching the threshold sets `locked_until`.
    pub fn on_failure(&self, state: &LockoutState, now: DateTime<Utc>) -> LockoutState {
        let (failed_attempts, window_started_at) = match state.window_started_at {
            Some(start) if now - start <= self.window => (state.failed_attempts + 1, start),
            _ => (1, now),
        };

        let locked_until = if failed_attempts >= self.threshold as i32 {
            Some(now + self.lock_duration)
        } else {
            state.locked_until
        };

        LockoutState {
            failed_attempts,
            window_started_at: Some(window_started_at),
            locked_until,
        }
    }

    /// Any successful authentication clears the counter, the window, and the
    /// lock, regardless of prior values.
    pub fn on_success(&self) -> LockoutState {
        LockoutState::default()
    }
}
