//! Brute-force lockout policy.
//!
//! State lives on the [`UserRecord`] and is evaluated lazily against the
//! clock on each attempt; nothing runs in the background.

use std::time::Duration;

use crate::config::SecurityConfig;
use crate::user::{LockoutState, UserRecord};

/// Thresholds K, W and L.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockoutPolicy {
    /// Failures inside the window that lock the account
    pub max_failed_attempts: u32,
    pub failure_window: Duration,
    pub lockout_duration: Duration,
}

/// Result of checking a record before verifying a password.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockCheck {
    /// Not locked.
    Open,
    /// Was locked, the duration has elapsed and the record was reset.
    Released,
    /// Still locked for this long.
    Locked { remaining: Duration },
}

impl LockoutPolicy {
    pub fn from_config(config: &SecurityConfig) -> Self {
        Self {
            max_failed_attempts: config.max_failed_attempts,
            failure_window: config.failure_window(),
            lockout_duration: config.lockout_duration(),
        }
    }

    /// Release an elapsed lock, or report how long it still holds.
    pub fn check(&self, user: &mut UserRecord, now: u64) -> LockCheck {
        let LockoutState::Locked { since } = user.lockout else {
            return LockCheck::Open;
        };
        let elapsed = Duration::from_millis(now.saturating_sub(since));
        if elapsed >= self.lockout_duration {
            user.lockout = LockoutState::Active;
            user.recent_failures.clear();
            LockCheck::Released
        } else {
            LockCheck::Locked {
                remaining: self.lockout_duration - elapsed,
            }
        }
    }

    /// Record a failed attempt. Returns true when this failure locks the account.
    pub fn record_failure(&self, user: &mut UserRecord, now: u64) -> bool {
        let window = u64::try_from(self.failure_window.as_millis()).unwrap_or(u64::MAX);
        user.recent_failures
            .retain(|&at| now.saturating_sub(at) < window);
        user.recent_failures.push(now);

        let threshold = usize::try_from(self.max_failed_attempts).unwrap_or(usize::MAX);
        if !user.is_locked() && user.recent_failures.len() >= threshold {
            user.lockout = LockoutState::Locked { since: now };
            return true;
        }
        false
    }

    /// Reset the counter after a successful login.
    pub fn record_success(&self, user: &mut UserRecord, now: u64) {
        user.recent_failures.clear();
        user.lockout = LockoutState::Active;
        user.last_success_at = Some(now);
    }

    /// Clear lockout state on an explicit admin unlock.
    pub fn unlock(user: &mut UserRecord) {
        user.recent_failures.clear();
        user.lockout = LockoutState::Active;
    }
}

/// Whole minutes until `remaining` elapses, rounded up and at least one.
pub fn retry_after_minutes(remaining: Duration) -> u64 {
    remaining.as_secs().div_ceil(60).max(1)
}
