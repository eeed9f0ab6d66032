//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use job_award::builders::{Marketplace, MarketplaceBuilder};
use job_award::config::MarketplaceConfig;
use job_award::core::{Account, Collaborators, InMemoryAuditSink, Job, NewJob};
use job_award::infra::{
    InMemoryStore, RecordingBroadcaster, RecordingConversations, RecordingNotifier,
};
use job_award::runtime::TokioSpawner;
use job_award::util::{ManualClock, UserId};

/// Fixed start time for the manual clock.
pub const T0: u128 = 1_700_000_000_000;

/// One hour in milliseconds.
pub const HOUR_MS: u128 = 60 * 60 * 1000;

/// Time allowed for detached side effects to land.
pub const EFFECT_TIMEOUT: Duration = Duration::from_secs(2);

pub struct Harness {
    pub market: Marketplace<TokioSpawner>,
    pub store: Arc<InMemoryStore>,
    pub clock: Arc<ManualClock>,
    pub notifier: RecordingNotifier,
    pub broadcaster: RecordingBroadcaster,
    pub conversations: RecordingConversations,
    pub audit: InMemoryAuditSink,
}

/// Config with fast retries and room for heavy contention.
pub fn test_config() -> MarketplaceConfig {
    let mut cfg = MarketplaceConfig::default();
    cfg.assignment.max_commit_attempts = 64;
    cfg.assignment.backoff_base_ms = 1;
    cfg.assignment.backoff_max_ms = 4;
    cfg
}

/// Build a harness. Must be called inside a tokio runtime.
pub fn harness() -> Harness {
    harness_with(test_config())
}

pub fn harness_with(cfg: MarketplaceConfig) -> Harness {
    job_award::util::init_tracing();
    let store = Arc::new(InMemoryStore::new());
    let clock = Arc::new(ManualClock::new(T0));
    let notifier = RecordingNotifier::new();
    let broadcaster = RecordingBroadcaster::new();
    let conversations = RecordingConversations::new();
    let audit = InMemoryAuditSink::new(1024);

    let market = MarketplaceBuilder::new(cfg)
        .with_store(store.clone())
        .with_clock(clock.clone())
        .with_collaborators(Collaborators::new(
            Arc::new(notifier.clone()),
            Arc::new(broadcaster.clone()),
            Arc::new(conversations.clone()),
        ))
        .with_audit(audit.shared())
        .build(TokioSpawner::current().expect("inside tokio runtime"))
        .expect("valid config");

    Harness {
        market,
        store,
        clock,
        notifier,
        broadcaster,
        conversations,
        audit,
    }
}

impl Harness {
    pub async fn free_user(&self, credits_used: u32) -> UserId {
        let id = UserId::new();
        self.market
            .ledger()
            .open_account(Account::free(id).with_credits_used(credits_used))
            .await
            .expect("open free account");
        id
    }

    pub async fn paid_user(&self) -> UserId {
        let id = UserId::new();
        self.market
            .ledger()
            .open_account(Account::paid(id))
            .await
            .expect("open paid account");
        id
    }

    /// Post a job due in one day.
    pub async fn post_job(&self, poster_id: UserId, title: &str) -> Job {
        self.post_job_due(poster_id, title, self.now() + 24 * HOUR_MS).await
    }

    pub async fn post_job_due(&self, poster_id: UserId, title: &str, deadline: u128) -> Job {
        self.market
            .post_job(
                poster_id,
                NewJob {
                    title: title.to_owned(),
                    description: format!("{title} description"),
                    budget: Some(10_000),
                    deadline,
                },
            )
            .await
            .expect("post job")
    }

    pub async fn job(&self, job: &Job) -> Job {
        self.market.board().job(job.id).await.expect("load job")
    }

    pub async fn credits_used(&self, user_id: UserId) -> u32 {
        self.market
            .ledger()
            .account(user_id)
            .await
            .expect("load account")
            .credits_used
    }

    pub fn now(&self) -> u128 {
        use job_award::util::Clock;
        self.clock.now_ms()
    }
}
