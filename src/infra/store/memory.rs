//! In-memory store with version stamps and all-or-nothing batch commits.

use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::core::ledger::Account;
use crate::core::model::{Job, JobStatus};
use crate::core::store::{MarketStore, Versioned, Write, WriteBatch};
use crate::core::StoreError;
use crate::util::ids::{JobId, UserId};

#[derive(Default)]
struct Tables {
    jobs: HashMap<JobId, Versioned<Job>>,
    accounts: HashMap<UserId, Versioned<Account>>,
}

/// Simple in-memory store for development/testing.
///
/// All records live behind one mutex that is never held across an `.await`,
/// so a commit is applied atomically with respect to every other read and
/// commit.
#[derive(Default)]
pub struct InMemoryStore {
    tables: Mutex<Tables>,
    injected_failures: Mutex<VecDeque<StoreError>>,
    commits: Mutex<u64>,
}

impl InMemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next commits fail with the given errors, in order, before any
    /// version check. Used to exercise retry paths.
    pub fn fail_next_commits(&self, errors: impl IntoIterator<Item = StoreError>) {
        self.injected_failures.lock().extend(errors);
    }

    /// Number of successfully applied batches.
    #[must_use]
    pub fn commit_count(&self) -> u64 {
        *self.commits.lock()
    }

    /// Snapshot of every stored job.
    #[must_use]
    pub fn jobs(&self) -> Vec<Job> {
        self.tables
            .lock()
            .jobs
            .values()
            .map(|v| v.value.clone())
            .collect()
    }

    fn check(tables: &Tables, write: &Write) -> Result<(), StoreError> {
        let current = match write {
            Write::Job { job, .. } => tables.jobs.get(&job.id).map(|v| v.version),
            Write::Account { account, .. } => tables.accounts.get(&account.id).map(|v| v.version),
        };
        let expected = match write {
            Write::Job { expected, .. } | Write::Account { expected, .. } => *expected,
        };
        if current == expected {
            Ok(())
        } else {
            Err(StoreError::Conflict)
        }
    }
}

#[async_trait]
impl MarketStore for InMemoryStore {
    async fn load_job(&self, id: JobId) -> Result<Option<Versioned<Job>>, StoreError> {
        Ok(self.tables.lock().jobs.get(&id).cloned())
    }

    async fn load_account(&self, id: UserId) -> Result<Option<Versioned<Account>>, StoreError> {
        Ok(self.tables.lock().accounts.get(&id).cloned())
    }

    async fn commit(&self, batch: WriteBatch) -> Result<(), StoreError> {
        if let Some(err) = self.injected_failures.lock().pop_front() {
            return Err(err);
        }
        if batch.is_empty() {
            return Ok(());
        }
        tracing::trace!(writes = batch.len(), "applying batch");

        let writes = batch.into_writes();
        let mut tables = self.tables.lock();
        for write in &writes {
            Self::check(&tables, write)?;
        }
        for write in writes {
            match write {
                Write::Job { job, expected } => {
                    let version = expected.map_or(1, |v| v + 1);
                    tables.jobs.insert(job.id, Versioned { version, value: job });
                }
                Write::Account { account, expected } => {
                    let version = expected.map_or(1, |v| v + 1);
                    tables
                        .accounts
                        .insert(account.id, Versioned { version, value: account });
                }
            }
        }
        drop(tables);
        *self.commits.lock() += 1;
        Ok(())
    }

    async fn open_jobs_past_deadline(
        &self,
        now_ms: u128,
        limit: usize,
    ) -> Result<Vec<JobId>, StoreError> {
        let tables = self.tables.lock();
        let mut due: Vec<(u128, JobId)> = tables
            .jobs
            .values()
            .filter(|v| v.value.status == JobStatus::Open && v.value.is_past_deadline(now_ms))
            .map(|v| (v.value.deadline, v.value.id))
            .collect();
        drop(tables);
        due.sort_unstable();
        Ok(due.into_iter().take(limit).map(|(_, id)| id).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(deadline: u128) -> Job {
        Job::new(UserId::new(), "t", "d", None, deadline, 0)
    }

    #[tokio::test]
    async fn insert_then_update_bumps_version() {
        let store = InMemoryStore::new();
        let j = job(100);
        store.commit(WriteBatch::new().insert_job(j.clone())).await.unwrap();
        let loaded = store.load_job(j.id).await.unwrap().unwrap();
        assert_eq!(loaded.version, 1);

        store
            .commit(WriteBatch::new().update_job(loaded.value.clone(), 1))
            .await
            .unwrap();
        assert_eq!(store.load_job(j.id).await.unwrap().unwrap().version, 2);
    }

    #[tokio::test]
    async fn double_insert_conflicts() {
        let store = InMemoryStore::new();
        let account = Account::free(UserId::new());
        store
            .commit(WriteBatch::new().insert_account(account.clone()))
            .await
            .unwrap();
        let err = store
            .commit(WriteBatch::new().insert_account(account))
            .await
            .unwrap_err();
        assert_eq!(err, StoreError::Conflict);
    }

    #[tokio::test]
    async fn stale_write_in_batch_applies_nothing() {
        let store = InMemoryStore::new();
        let j = job(100);
        let account = Account::free(UserId::new());
        store
            .commit(WriteBatch::new().insert_job(j.clone()).insert_account(account.clone()))
            .await
            .unwrap();

        let mut changed_job = j.clone();
        changed_job.title = "changed".into();
        let changed_account = account.with_credits_used(3);
        let err = store
            .commit(
                WriteBatch::new()
                    .update_job(changed_job, 1)
                    .update_account(changed_account, 7),
            )
            .await
            .unwrap_err();
        assert_eq!(err, StoreError::Conflict);

        let stored = store.load_job(j.id).await.unwrap().unwrap();
        assert_eq!(stored.version, 1);
        assert_eq!(stored.value.title, "t");
        assert_eq!(store.commit_count(), 1);
    }

    #[tokio::test]
    async fn injected_failures_are_consumed_in_order() {
        let store = InMemoryStore::new();
        store.fail_next_commits([StoreError::Conflict, StoreError::Unavailable("down".into())]);
        let batch = || WriteBatch::new().insert_job(job(1));
        assert_eq!(store.commit(batch()).await, Err(StoreError::Conflict));
        assert_eq!(
            store.commit(batch()).await,
            Err(StoreError::Unavailable("down".into()))
        );
        assert!(store.commit(batch()).await.is_ok());
    }

    #[tokio::test]
    async fn empty_batch_is_a_no_op() {
        let store = InMemoryStore::new();
        let batch = WriteBatch::new();
        assert!(batch.is_empty());
        store.commit(batch).await.unwrap();
        assert_eq!(store.commit_count(), 0);

        let batch = WriteBatch::new()
            .insert_job(job(1))
            .insert_account(Account::free(UserId::new()));
        assert_eq!(batch.len(), 2);
        store.commit(batch).await.unwrap();
        assert_eq!(store.commit_count(), 1);
    }

    #[tokio::test]
    async fn lists_only_open_jobs_past_deadline_oldest_first() {
        let store = InMemoryStore::new();
        let late = job(50);
        let later = job(80);
        let future = job(500);
        let mut cancelled = job(10);
        cancelled.status = JobStatus::Cancelled;
        store
            .commit(
                WriteBatch::new()
                    .insert_job(later.clone())
                    .insert_job(late.clone())
                    .insert_job(future)
                    .insert_job(cancelled),
            )
            .await
            .unwrap();

        let due = store.open_jobs_past_deadline(100, 10).await.unwrap();
        assert_eq!(due, vec![late.id, later.id]);
        let limited = store.open_jobs_past_deadline(100, 1).await.unwrap();
        assert_eq!(limited, vec![late.id]);
    }
}
