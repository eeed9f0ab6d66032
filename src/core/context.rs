//! Dependencies shared by the job board, the coordinator and the sweeper.

use std::sync::Arc;

use crate::core::audit::{self, SharedAuditSink};
use crate::core::dispatch::{EffectDispatcher, Spawn};
use crate::core::retry::RetryPolicy;
use crate::core::store::MarketStore;
use crate::util::clock::Clock;

/// Store, clock, retry policy, side-effect dispatcher and audit sink.
#[derive(Clone)]
pub struct MarketContext<S> {
    /// Backing store.
    pub store: Arc<dyn MarketStore>,
    /// Time source.
    pub clock: Arc<dyn Clock>,
    /// Retry policy for optimistic commits.
    pub retry: RetryPolicy,
    /// Post-commit side effects.
    pub effects: EffectDispatcher<S>,
    /// Optional audit trail.
    pub audit: Option<SharedAuditSink>,
}

impl<S: Spawn> MarketContext<S> {
    /// Create a context without an audit sink.
    pub fn new(
        store: Arc<dyn MarketStore>,
        clock: Arc<dyn Clock>,
        retry: RetryPolicy,
        effects: EffectDispatcher<S>,
    ) -> Self {
        Self {
            store,
            clock,
            retry,
            effects,
            audit: None,
        }
    }

    /// Attach an audit sink.
    #[must_use]
    pub fn with_audit(mut self, audit: SharedAuditSink) -> Self {
        self.audit = Some(audit);
        self
    }

    /// Current time from the injected clock.
    pub fn now_ms(&self) -> u128 {
        self.clock.now_ms()
    }

    pub(crate) fn audit(
        &self,
        job_id: impl std::fmt::Display,
        actor: impl std::fmt::Display,
        action: &str,
        payload: Option<String>,
    ) {
        audit::record(self.audit.as_ref(), self.now_ms(), job_id, actor, action, payload);
    }
}
