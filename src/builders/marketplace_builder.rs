//! Builder wiring the job board, coordinator, ledger and sweeper from
//! configuration.

use std::sync::Arc;

use anyhow::{anyhow, Context};

use crate::config::MarketplaceConfig;
use crate::core::{
    AppResult, AssignmentCoordinator, AssignmentOutcome, AwardError, Bid, Collaborators,
    EffectDispatcher, Job, JobBoard, LedgerService, LifecycleSweeper, MarketContext, MarketStore,
    NewJob, PostingThrottle, SharedAuditSink, Spawn, SweepReport, SweeperHandle,
};
use crate::infra::{InMemoryStore, TracingBroadcaster, TracingConversations, TracingNotifier};
use crate::util::clock::{Clock, SystemClock};
use crate::util::ids::{BidId, JobId, UserId};

/// All marketplace services sharing one store, clock and collaborator set.
#[derive(Clone)]
pub struct Marketplace<S> {
    board: JobBoard<S>,
    coordinator: AssignmentCoordinator<S>,
    ledger: LedgerService,
    sweeper: LifecycleSweeper<S>,
    throttle: PostingThrottle,
    config: MarketplaceConfig,
}

impl<S> Marketplace<S>
where
    S: Spawn + Clone + Send + Sync + 'static,
{
    /// Job posting, bidding and guarded transitions.
    pub const fn board(&self) -> &JobBoard<S> {
        &self.board
    }

    /// The assignment coordinator.
    pub const fn coordinator(&self) -> &AssignmentCoordinator<S> {
        &self.coordinator
    }

    /// Account registration and ledger administration.
    pub const fn ledger(&self) -> &LedgerService {
        &self.ledger
    }

    /// The lifecycle sweeper.
    pub const fn sweeper(&self) -> &LifecycleSweeper<S> {
        &self.sweeper
    }

    /// The posting throttle.
    pub const fn throttle(&self) -> PostingThrottle {
        self.throttle
    }

    /// Configuration the marketplace was built from.
    pub const fn config(&self) -> &MarketplaceConfig {
        &self.config
    }

    /// See [`JobBoard::post_job`].
    ///
    /// # Errors
    ///
    /// As [`JobBoard::post_job`].
    pub async fn post_job(&self, poster_id: UserId, request: NewJob) -> Result<Job, AwardError> {
        self.board.post_job(poster_id, request).await
    }

    /// See [`JobBoard::submit_bid`].
    ///
    /// # Errors
    ///
    /// As [`JobBoard::submit_bid`].
    pub async fn submit_bid(
        &self,
        job_id: JobId,
        bidder_id: UserId,
        proposed_amount: u64,
        message: Option<String>,
    ) -> Result<Bid, AwardError> {
        self.board
            .submit_bid(job_id, bidder_id, proposed_amount, message)
            .await
    }

    /// See [`JobBoard::withdraw_bid`].
    ///
    /// # Errors
    ///
    /// As [`JobBoard::withdraw_bid`].
    pub async fn withdraw_bid(
        &self,
        job_id: JobId,
        bid_id: BidId,
        bidder_id: UserId,
    ) -> Result<Bid, AwardError> {
        self.board.withdraw_bid(job_id, bid_id, bidder_id).await
    }

    /// See [`AssignmentCoordinator::accept_bid`].
    ///
    /// # Errors
    ///
    /// As [`AssignmentCoordinator::accept_bid`].
    pub async fn accept_bid(
        &self,
        job_id: JobId,
        bid_id: BidId,
        poster_id: UserId,
        response_message: Option<String>,
    ) -> Result<AssignmentOutcome, AwardError> {
        self.coordinator
            .accept_bid(job_id, bid_id, poster_id, response_message)
            .await
    }

    /// Run one sweep at `now_ms`.
    ///
    /// # Errors
    ///
    /// As [`LifecycleSweeper::sweep_once`].
    pub async fn sweep_once(&self, now_ms: u128) -> Result<SweepReport, AwardError> {
        self.sweeper.sweep_once(now_ms).await
    }

    /// Start the periodic sweeper at the configured interval.
    pub fn spawn_sweeper(&self) -> SweeperHandle {
        self.sweeper.clone().spawn(self.config.sweep_interval())
    }
}

/// Step-by-step construction of a [`Marketplace`]. Unset parts default to an
/// in-memory store, the system clock and tracing-only collaborators.
#[derive(Default)]
pub struct MarketplaceBuilder {
    config: MarketplaceConfig,
    store: Option<Arc<dyn MarketStore>>,
    clock: Option<Arc<dyn Clock>>,
    collaborators: Option<Collaborators>,
    audit: Option<SharedAuditSink>,
}

impl MarketplaceBuilder {
    /// Start from a configuration.
    #[must_use]
    pub fn new(config: MarketplaceConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Use a specific store.
    #[must_use]
    pub fn with_store(mut self, store: Arc<dyn MarketStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Use a specific clock.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Use specific collaborators.
    #[must_use]
    pub fn with_collaborators(mut self, collaborators: Collaborators) -> Self {
        self.collaborators = Some(collaborators);
        self
    }

    /// Record transitions into an audit sink.
    #[must_use]
    pub fn with_audit(mut self, audit: SharedAuditSink) -> Self {
        self.audit = Some(audit);
        self
    }

    /// Validate the configuration and wire every service.
    ///
    /// # Errors
    ///
    /// The configuration is invalid.
    pub fn build<S>(self, spawner: S) -> AppResult<Marketplace<S>>
    where
        S: Spawn + Clone + Send + Sync + 'static,
    {
        self.config
            .validate()
            .map_err(|e| anyhow!(e))
            .context("marketplace config invalid")?;

        let store = self
            .store
            .unwrap_or_else(|| Arc::new(InMemoryStore::new()));
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let collaborators = self.collaborators.unwrap_or_else(|| {
            Collaborators::new(
                Arc::new(TracingNotifier),
                Arc::new(TracingBroadcaster),
                Arc::new(TracingConversations),
            )
        });

        let retry = self.config.retry_policy();
        let policy = self.config.ledger_policy();
        let throttle = self.config.posting_throttle();

        let mut ctx = MarketContext::new(
            Arc::clone(&store),
            clock,
            retry,
            EffectDispatcher::new(spawner, collaborators),
        );
        if let Some(audit) = self.audit {
            ctx = ctx.with_audit(audit);
        }

        tracing::debug!(
            free_credit_quota = policy.free_credit_quota,
            max_commit_attempts = retry.max_attempts,
            "marketplace built"
        );

        Ok(Marketplace {
            board: JobBoard::new(
                ctx.clone(),
                policy,
                throttle,
                self.config.enforce_capacity_on_submit,
            ),
            coordinator: AssignmentCoordinator::new(
                ctx.clone(),
                policy,
                self.config.assignment.rejection_message.clone(),
            ),
            ledger: LedgerService::new(store, policy, retry),
            sweeper: LifecycleSweeper::new(ctx, self.config.sweeper.batch_limit),
            throttle,
            config: self.config,
        })
    }
}

/// Build a marketplace from configuration, a store and collaborators.
///
/// # Errors
///
/// The configuration is invalid.
pub fn build_marketplace<S>(
    cfg: &MarketplaceConfig,
    store: Arc<dyn MarketStore>,
    collaborators: Collaborators,
    spawner: S,
) -> AppResult<Marketplace<S>>
where
    S: Spawn + Clone + Send + Sync + 'static,
{
    MarketplaceBuilder::new(cfg.clone())
        .with_store(store)
        .with_collaborators(collaborators)
        .build(spawner)
}
