//! Storage abstraction with optimistic versioning and multi-record commits.
//!
//! Every record is read together with its version stamp. Writes are grouped in
//! a [`WriteBatch`] and applied by [`MarketStore::commit`] all-or-nothing: if any
//! expected version no longer matches, nothing is written and the backend
//! returns [`StoreError::Conflict`].

use async_trait::async_trait;

use crate::core::ledger::Account;
use crate::core::model::Job;
use crate::core::StoreError;
use crate::util::ids::{JobId, UserId};

/// A record together with the version stamp it was read at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Versioned<T> {
    /// Version stamp; bumped on every committed write.
    pub version: u64,
    /// The record.
    pub value: T,
}

/// A single write inside a batch.
#[derive(Debug, Clone)]
pub enum Write {
    /// Insert or update a job.
    Job {
        /// New job state.
        job: Job,
        /// `None` to insert (must not exist), otherwise the version read.
        expected: Option<u64>,
    },
    /// Insert or update an account.
    Account {
        /// New account state.
        account: Account,
        /// `None` to insert (must not exist), otherwise the version read.
        expected: Option<u64>,
    },
}

/// Writes committed atomically.
#[derive(Debug, Clone, Default)]
pub struct WriteBatch {
    writes: Vec<Write>,
}

impl WriteBatch {
    /// Empty batch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a job that must not already exist.
    #[must_use]
    pub fn insert_job(mut self, job: Job) -> Self {
        self.writes.push(Write::Job {
            job,
            expected: None,
        });
        self
    }

    /// Replace a job read at `expected`.
    #[must_use]
    pub fn update_job(mut self, job: Job, expected: u64) -> Self {
        self.writes.push(Write::Job {
            job,
            expected: Some(expected),
        });
        self
    }

    /// Insert an account that must not already exist.
    #[must_use]
    pub fn insert_account(mut self, account: Account) -> Self {
        self.writes.push(Write::Account {
            account,
            expected: None,
        });
        self
    }

    /// Replace an account read at `expected`.
    #[must_use]
    pub fn update_account(mut self, account: Account, expected: u64) -> Self {
        self.writes.push(Write::Account {
            account,
            expected: Some(expected),
        });
        self
    }

    /// Number of writes in the batch.
    #[must_use]
    pub fn len(&self) -> usize {
        self.writes.len()
    }

    /// Whether the batch holds no writes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    /// Consume the batch.
    #[must_use]
    pub fn into_writes(self) -> Vec<Write> {
        self.writes
    }
}

/// Abstraction for storage backends holding jobs and accounts.
#[async_trait]
pub trait MarketStore: Send + Sync {
    /// Load a job and its version.
    async fn load_job(&self, id: JobId) -> Result<Option<Versioned<Job>>, StoreError>;

    /// Load an account and its version.
    async fn load_account(&self, id: UserId) -> Result<Option<Versioned<Account>>, StoreError>;

    /// Apply every write in the batch, or none of them.
    async fn commit(&self, batch: WriteBatch) -> Result<(), StoreError>;

    /// Ids of open jobs whose deadline is before `now_ms`, at most `limit`.
    async fn open_jobs_past_deadline(
        &self,
        now_ms: u128,
        limit: usize,
    ) -> Result<Vec<JobId>, StoreError>;
}
