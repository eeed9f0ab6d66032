//! Account ledger: subscription tier and the credits-used counter.
//!
//! Free-tier accounts may be awarded at most `free_credit_quota` jobs; paid
//! accounts with an active subscription are unlimited. The counter is only
//! ever moved through version-checked commits so two acceptances on different
//! jobs cannot both consume the last credit.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::core::retry::{AttemptError, RetryPolicy};
use crate::core::store::{MarketStore, WriteBatch};
use crate::core::{AwardError, StoreError};
use crate::util::ids::UserId;

/// Default number of awards a free-tier account may receive.
pub const DEFAULT_FREE_CREDIT_QUOTA: u32 = 3;

/// Subscription tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    /// Quota-limited tier.
    Free,
    /// Unlimited while the subscription is active.
    Paid,
}

/// A user account and its usage ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Account identifier.
    pub id: UserId,
    /// Subscription tier.
    pub tier: Tier,
    /// Whether a paid subscription is currently active.
    pub subscription_active: bool,
    /// Jobs awarded while quota-limited.
    pub credits_used: u32,
    /// Last time this account posted a job.
    pub last_job_posted_at: Option<u128>,
}

impl Account {
    /// New free-tier account with no credits used.
    #[must_use]
    pub fn free(id: UserId) -> Self {
        Self {
            id,
            tier: Tier::Free,
            subscription_active: false,
            credits_used: 0,
            last_job_posted_at: None,
        }
    }

    /// New paid account with an active subscription.
    #[must_use]
    pub fn paid(id: UserId) -> Self {
        Self {
            tier: Tier::Paid,
            subscription_active: true,
            ..Self::free(id)
        }
    }

    /// Set the credits already used.
    #[must_use]
    pub const fn with_credits_used(mut self, credits_used: u32) -> Self {
        self.credits_used = credits_used;
        self
    }

    /// Whether the account is on an active paid subscription.
    #[must_use]
    pub fn is_paid_active(&self) -> bool {
        self.tier == Tier::Paid && self.subscription_active
    }
}

/// The capacity rule applied to accounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerPolicy {
    /// Awards allowed for quota-limited accounts.
    pub free_credit_quota: u32,
}

impl Default for LedgerPolicy {
    fn default() -> Self {
        Self {
            free_credit_quota: DEFAULT_FREE_CREDIT_QUOTA,
        }
    }
}

impl LedgerPolicy {
    /// Create a policy with a custom free quota.
    #[must_use]
    pub const fn new(free_credit_quota: u32) -> Self {
        Self { free_credit_quota }
    }

    /// Whether the account may be awarded another job.
    #[must_use]
    pub fn has_capacity(&self, account: &Account) -> bool {
        account.is_paid_active() || account.credits_used < self.free_credit_quota
    }

    /// Credits left, or `None` when unlimited.
    #[must_use]
    pub fn remaining_credits(&self, account: &Account) -> Option<u32> {
        if account.is_paid_active() {
            None
        } else {
            Some(self.free_credit_quota.saturating_sub(account.credits_used))
        }
    }

    /// Re-check capacity and consume one credit. Unlimited accounts are not
    /// charged.
    ///
    /// # Errors
    ///
    /// `CapacityExceeded` when no credit is left; the account is unchanged.
    pub fn consume(&self, account: &mut Account) -> Result<(), AwardError> {
        if !self.has_capacity(account) {
            return Err(AwardError::CapacityExceeded);
        }
        if !account.is_paid_active() {
            account.credits_used += 1;
        }
        Ok(())
    }
}

/// Account registration and administrative ledger adjustments.
#[derive(Clone)]
pub struct LedgerService {
    store: Arc<dyn MarketStore>,
    policy: LedgerPolicy,
    retry: RetryPolicy,
}

impl LedgerService {
    /// Create a ledger service over a store.
    #[must_use]
    pub fn new(store: Arc<dyn MarketStore>, policy: LedgerPolicy, retry: RetryPolicy) -> Self {
        Self {
            store,
            policy,
            retry,
        }
    }

    /// The capacity rule in force.
    #[must_use]
    pub const fn policy(&self) -> LedgerPolicy {
        self.policy
    }

    /// Register a new account.
    ///
    /// # Errors
    ///
    /// `InvalidState` if the id is taken, `Transient` on storage failure.
    pub async fn open_account(&self, account: Account) -> Result<(), AwardError> {
        let id = account.id;
        let account = &account;
        self.retry
            .run("open_account", || async move {
                match self
                    .store
                    .commit(WriteBatch::new().insert_account(account.clone()))
                    .await
                {
                    Err(StoreError::Conflict) => Err(AttemptError::Fail(
                        AwardError::InvalidState(format!("account {id} already exists")),
                    )),
                    other => other.map_err(AttemptError::Store),
                }
            })
            .await?;
        tracing::info!(account = %id, "account opened");
        Ok(())
    }

    /// Fetch an account.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown id, `Transient` on storage failure.
    pub async fn account(&self, id: UserId) -> Result<Account, AwardError> {
        self.retry
            .run("load_account", || async move {
                let found = self.store.load_account(id).await?;
                let account =
                    found.ok_or_else(|| AwardError::NotFound(format!("account {id}")))?;
                Ok::<_, AttemptError>(account.value)
            })
            .await
    }

    /// Advisory capacity check.
    ///
    /// # Errors
    ///
    /// Same as [`LedgerService::account`].
    pub async fn has_capacity(&self, id: UserId) -> Result<bool, AwardError> {
        let account = self.account(id).await?;
        Ok(self.policy.has_capacity(&account))
    }

    /// Administrative adjustment of `credits_used` by `delta`, clamped at zero.
    /// Returns the new value.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown id, `Transient` when the commit keeps
    /// conflicting.
    pub async fn adjust_credits(&self, id: UserId, delta: i64) -> Result<u32, AwardError> {
        let updated = self
            .retry
            .run("adjust_credits", || async move {
                let current = self
                    .store
                    .load_account(id)
                    .await?
                    .ok_or_else(|| AwardError::NotFound(format!("account {id}")))?;
                let mut account = current.value;
                let next = i64::from(account.credits_used).saturating_add(delta);
                account.credits_used = u32::try_from(next.max(0)).unwrap_or(u32::MAX);
                let credits = account.credits_used;
                self.store
                    .commit(WriteBatch::new().update_account(account, current.version))
                    .await?;
                Ok::<_, AttemptError>(credits)
            })
            .await?;
        tracing::info!(account = %id, delta, credits_used = updated, "credits adjusted");
        Ok(updated)
    }

    /// Change an account's tier and subscription flag.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown id, `Transient` when the commit keeps
    /// conflicting.
    pub async fn set_tier(
        &self,
        id: UserId,
        tier: Tier,
        subscription_active: bool,
    ) -> Result<Account, AwardError> {
        let account = self
            .retry
            .run("set_tier", || async move {
                let current = self
                    .store
                    .load_account(id)
                    .await?
                    .ok_or_else(|| AwardError::NotFound(format!("account {id}")))?;
                let mut account = current.value;
                account.tier = tier;
                account.subscription_active = subscription_active;
                self.store
                    .commit(WriteBatch::new().update_account(account.clone(), current.version))
                    .await?;
                Ok::<_, AttemptError>(account)
            })
            .await?;
        tracing::info!(account = %id, ?tier, subscription_active, "tier changed");
        Ok(account)
    }
}
