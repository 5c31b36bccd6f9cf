use anyhow::Result;
use tracing::warn;

use crate::config::AuthThrottleConfig;
use crate::db::Store;

/// Sliding-window failure counter backed by the `login_attempts` table.
///
/// Attempts are keyed on the username exactly as it was typed.
pub struct LoginThrottle {
    store: Store,
    config: AuthThrottleConfig,
}

impl LoginThrottle {
    #[must_use]
    pub const fn new(store: Store, config: AuthThrottleConfig) -> Self {
        Self { store, config }
    }

    pub async fn record(&self, username: &str, ip_address: &str, now: i64, success: bool) -> Result<()> {
        self.store
            .record_login_attempt(username, ip_address, now, success)
            .await
    }

    pub async fn failures_in_window(&self, username: &str, now: i64) -> Result<u64> {
        self.store
            .count_login_failures_since(username, self.window_start(now))
            .await
    }

    /// Applies the lock when the failure count has reached the threshold.
    /// Returns whether the account was locked by this call.
    pub async fn lock_if_exceeded(&self, username: &str, now: i64) -> Result<bool> {
        let locked_until = now.saturating_add(seconds(self.config.lockout_seconds));

        let locked = self
            .store
            .lock_if_threshold_reached(
                username,
                now,
                self.window_start(now),
                self.config.max_attempts,
                locked_until,
            )
            .await?;

        if locked {
            warn!(
                event = "account_locked",
                username = %username,
                locked_until,
                "Too many failed logins, account locked"
            );
        }

        Ok(locked)
    }

    fn window_start(&self, now: i64) -> i64 {
        now.saturating_sub(seconds(self.config.window_seconds))
    }
}

fn seconds(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}
