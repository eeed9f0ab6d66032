//! Posting throttle: free-tier posters wait a fixed cooldown between jobs.

use std::time::Duration;

use crate::core::ledger::Account;

/// Default cooldown between two job posts by a free-tier account.
pub const DEFAULT_POST_COOLDOWN: Duration = Duration::from_secs(24 * 60 * 60);

/// Decides whether an account may post a new job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PostingThrottle {
    cooldown: Duration,
}

impl Default for PostingThrottle {
    fn default() -> Self {
        Self::new(DEFAULT_POST_COOLDOWN)
    }
}

impl PostingThrottle {
    /// Throttle with the given free-tier cooldown.
    #[must_use]
    pub const fn new(cooldown: Duration) -> Self {
        Self { cooldown }
    }

    /// Configured cooldown.
    #[must_use]
    pub const fn cooldown(&self) -> Duration {
        self.cooldown
    }

    /// Earliest time the account may post again, or `None` when it is not
    /// subject to the cooldown (paid and active, or never posted).
    #[must_use]
    pub fn next_allowed_post_time(&self, account: &Account) -> Option<u128> {
        if account.is_paid_active() {
            return None;
        }
        account
            .last_job_posted_at
            .map(|last| last.saturating_add(self.cooldown.as_millis()))
    }

    /// Whether the account may post at `now_ms`.
    #[must_use]
    pub fn can_post_job(&self, account: &Account, now_ms: u128) -> bool {
        self.next_allowed_post_time(account)
            .is_none_or(|next| now_ms >= next)
    }
}
