//! Marketplace configuration structures.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::coordinator::DEFAULT_REJECTION_MESSAGE;
use crate::core::ledger::{LedgerPolicy, DEFAULT_FREE_CREDIT_QUOTA};
use crate::core::retry::RetryPolicy;
use crate::core::throttle::PostingThrottle;

/// Prefix of every environment variable read by [`MarketplaceConfig::from_env`].
pub const ENV_PREFIX: &str = "JOB_AWARD_";

/// Credit ledger settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Awards allowed for free-tier accounts.
    pub free_credit_quota: u32,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            free_credit_quota: DEFAULT_FREE_CREDIT_QUOTA,
        }
    }
}

/// Assignment coordinator settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssignmentConfig {
    /// Total commit attempts before surfacing a transient error.
    pub max_commit_attempts: u32,
    /// First backoff delay in milliseconds.
    pub backoff_base_ms: u64,
    /// Backoff cap in milliseconds.
    pub backoff_max_ms: u64,
    /// Message stored on bids closed by an award.
    pub rejection_message: String,
}

impl Default for AssignmentConfig {
    fn default() -> Self {
        let retry = RetryPolicy::default();
        Self {
            max_commit_attempts: retry.max_attempts,
            backoff_base_ms: u64::try_from(retry.base_delay.as_millis()).unwrap_or(u64::MAX),
            backoff_max_ms: u64::try_from(retry.max_delay.as_millis()).unwrap_or(u64::MAX),
            rejection_message: DEFAULT_REJECTION_MESSAGE.to_owned(),
        }
    }
}

/// Posting throttle settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThrottleConfig {
    /// Cooldown between two posts by a free-tier account, in seconds.
    pub free_post_cooldown_secs: u64,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            free_post_cooldown_secs: 24 * 60 * 60,
        }
    }
}

/// Lifecycle sweeper settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SweeperConfig {
    /// Seconds between sweeps.
    pub interval_secs: u64,
    /// Maximum jobs examined per sweep.
    pub batch_limit: usize,
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            interval_secs: 60,
            batch_limit: 500,
        }
    }
}

/// Root marketplace configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketplaceConfig {
    /// Credit ledger.
    pub ledger: LedgerConfig,
    /// Assignment retries and messages.
    pub assignment: AssignmentConfig,
    /// Posting throttle.
    pub throttle: ThrottleConfig,
    /// Lifecycle sweeper.
    pub sweeper: SweeperConfig,
    /// Reject bids from exhausted accounts at submission time.
    pub enforce_capacity_on_submit: bool,
}

impl Default for MarketplaceConfig {
    fn default() -> Self {
        Self {
            ledger: LedgerConfig::default(),
            assignment: AssignmentConfig::default(),
            throttle: ThrottleConfig::default(),
            sweeper: SweeperConfig::default(),
            enforce_capacity_on_submit: true,
        }
    }
}

impl MarketplaceConfig {
    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// A description of the first invalid value.
    pub fn validate(&self) -> Result<(), String> {
        if self.assignment.max_commit_attempts == 0 {
            return Err("assignment.max_commit_attempts must be greater than 0".into());
        }
        if self.assignment.backoff_base_ms > self.assignment.backoff_max_ms {
            return Err("assignment.backoff_base_ms must not exceed backoff_max_ms".into());
        }
        if self.assignment.rejection_message.trim().is_empty() {
            return Err("assignment.rejection_message must not be blank".into());
        }
        if self.sweeper.interval_secs == 0 {
            return Err("sweeper.interval_secs must be greater than 0".into());
        }
        if self.sweeper.batch_limit == 0 {
            return Err("sweeper.batch_limit must be greater than 0".into());
        }
        Ok(())
    }

    /// Parse configuration from a JSON string and validate.
    ///
    /// # Errors
    ///
    /// Parse or validation failure.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load a `.env` file if present, then build configuration from
    /// `JOB_AWARD_*` environment variables over the defaults.
    ///
    /// # Errors
    ///
    /// An unparsable variable or a validation failure.
    pub fn from_env() -> Result<Self, String> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup (keys carry the
    /// `JOB_AWARD_` prefix) over the defaults, then validate.
    ///
    /// # Errors
    ///
    /// An unparsable value or a validation failure.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, String> {
        fn parse<T: std::str::FromStr>(
            lookup: &impl Fn(&str) -> Option<String>,
            name: &str,
            target: &mut T,
        ) -> Result<(), String> {
            let key = format!("{ENV_PREFIX}{name}");
            if let Some(raw) = lookup(&key) {
                *target = raw
                    .trim()
                    .parse()
                    .map_err(|_| format!("{key}: cannot parse `{raw}`"))?;
            }
            Ok(())
        }

        let mut cfg = Self::default();
        parse(&lookup, "FREE_CREDIT_QUOTA", &mut cfg.ledger.free_credit_quota)?;
        parse(&lookup, "MAX_COMMIT_ATTEMPTS", &mut cfg.assignment.max_commit_attempts)?;
        parse(&lookup, "BACKOFF_BASE_MS", &mut cfg.assignment.backoff_base_ms)?;
        parse(&lookup, "BACKOFF_MAX_MS", &mut cfg.assignment.backoff_max_ms)?;
        parse(&lookup, "FREE_POST_COOLDOWN_SECS", &mut cfg.throttle.free_post_cooldown_secs)?;
        parse(&lookup, "SWEEP_INTERVAL_SECS", &mut cfg.sweeper.interval_secs)?;
        parse(&lookup, "SWEEP_BATCH_LIMIT", &mut cfg.sweeper.batch_limit)?;
        parse(&lookup, "ENFORCE_CAPACITY_ON_SUBMIT", &mut cfg.enforce_capacity_on_submit)?;
        if let Some(message) = lookup(&format!("{ENV_PREFIX}REJECTION_MESSAGE")) {
            cfg.assignment.rejection_message = message;
        }
        cfg.validate()?;
        Ok(cfg)
    }

    /// Capacity rule.
    #[must_use]
    pub const fn ledger_policy(&self) -> LedgerPolicy {
        LedgerPolicy::new(self.ledger.free_credit_quota)
    }

    /// Retry policy for optimistic commits.
    #[must_use]
    pub const fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.assignment.max_commit_attempts,
            base_delay: Duration::from_millis(self.assignment.backoff_base_ms),
            max_delay: Duration::from_millis(self.assignment.backoff_max_ms),
        }
    }

    /// Posting throttle.
    #[must_use]
    pub const fn posting_throttle(&self) -> PostingThrottle {
        PostingThrottle::new(Duration::from_secs(self.throttle.free_post_cooldown_secs))
    }

    /// Interval between sweeps.
    #[must_use]
    pub const fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweeper.interval_secs)
    }
}
