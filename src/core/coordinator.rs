//! Assignment coordinator: the atomic award of a job to one bidder.
//!
//! One attempt reads the job and the winning bidder's account with their
//! version stamps, applies every change to private copies and commits both
//! records in a single [`WriteBatch`]. A concurrent writer on either record
//! moves its version, the batch fails as a whole and the attempt is replayed
//! from a fresh read. Of two racing acceptances on the same job exactly one
//! commits; the replayed loser finds the job in progress and fails with
//! `InvalidState`.
//!
//! Notifications, realtime events and the poster/bidder conversation are
//! dispatched only after the commit, on a detached task.

use futures::future::join_all;
use serde::{Deserialize, Serialize};

use crate::core::context::MarketContext;
use crate::core::dispatch::Spawn;
use crate::core::events::{job_channel, user_channel, Notification, RealtimeEvent};
use crate::core::ledger::LedgerPolicy;
use crate::core::model::{ClosedBid, Job};
use crate::core::retry::AttemptError;
use crate::core::store::WriteBatch;
use crate::core::AwardError;
use crate::util::ids::{BidId, JobId, UserId};

/// Message stored on bids closed because another bid won.
pub const DEFAULT_REJECTION_MESSAGE: &str = "Another bid was accepted for this job.";

/// Result of a committed assignment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentOutcome {
    /// The job as committed.
    pub job: Job,
    /// Winning bid.
    pub bid_id: BidId,
    /// Awarded bidder.
    pub bidder_id: UserId,
    /// Bids closed by the award.
    pub rejected: Vec<ClosedBid>,
    /// The bidder's credits used after the award.
    pub credits_used: u32,
    /// Credits left for the bidder, `None` when unlimited.
    pub remaining_credits: Option<u32>,
}

/// Performs the open → in progress transition.
#[derive(Clone)]
pub struct AssignmentCoordinator<S> {
    ctx: MarketContext<S>,
    ledger: LedgerPolicy,
    rejection_message: String,
}

impl<S> AssignmentCoordinator<S>
where
    S: Spawn + Clone + Send + Sync + 'static,
{
    /// Create a coordinator.
    pub fn new(
        ctx: MarketContext<S>,
        ledger: LedgerPolicy,
        rejection_message: impl Into<String>,
    ) -> Self {
        Self {
            ctx,
            ledger,
            rejection_message: rejection_message.into(),
        }
    }

    /// Accept `bid_id` on `job_id` on behalf of `poster_id`.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the job or the bidder's account is missing.
    /// - `Forbidden` if `poster_id` is not the job's poster.
    /// - `InvalidState` if the job is not open or the bid is not pending,
    ///   including when a racing acceptance won.
    /// - `CapacityExceeded` if the bidder has no credit left.
    /// - `Transient` if the commit kept conflicting.
    ///
    /// Every error leaves all records untouched.
    pub async fn accept_bid(
        &self,
        job_id: JobId,
        bid_id: BidId,
        poster_id: UserId,
        response_message: Option<String>,
    ) -> Result<AssignmentOutcome, AwardError> {
        let ctx = &self.ctx;
        let ledger = self.ledger;
        let rejection_message = self.rejection_message.as_str();
        let response_message = &response_message;

        let outcome = ctx
            .retry
            .run("accept_bid", || async move {
                let now = ctx.now_ms();
                let current = ctx
                    .store
                    .load_job(job_id)
                    .await?
                    .ok_or_else(|| AwardError::NotFound(format!("job {job_id}")))?;
                if current.value.poster_id != poster_id {
                    return Err(AwardError::Forbidden(format!(
                        "only the poster may accept bids on job {job_id}"
                    ))
                    .into());
                }
                let bidder_id = current.value.acceptable_bidder(bid_id)?;

                let stored_account = ctx
                    .store
                    .load_account(bidder_id)
                    .await?
                    .ok_or_else(|| AwardError::NotFound(format!("account {bidder_id}")))?;
                let mut account = stored_account.value;
                if let Err(err) = ledger.consume(&mut account) {
                    tracing::warn!(
                        job = %job_id,
                        bid = %bid_id,
                        bidder = %bidder_id,
                        credits_used = account.credits_used,
                        "bidder has no credit left"
                    );
                    return Err(err.into());
                }

                let mut job = current.value;
                let rejected = job.award(bid_id, response_message.clone(), rejection_message, now)?;
                debug_assert!(job.check_invariants().is_ok());

                ctx.store
                    .commit(
                        WriteBatch::new()
                            .update_job(job.clone(), current.version)
                            .update_account(account.clone(), stored_account.version),
                    )
                    .await?;

                Ok::<_, AttemptError>(AssignmentOutcome {
                    job,
                    bid_id,
                    bidder_id,
                    rejected,
                    credits_used: account.credits_used,
                    remaining_credits: ledger.remaining_credits(&account),
                })
            })
            .await?;

        tracing::info!(
            job = %job_id,
            bid = %bid_id,
            bidder = %outcome.bidder_id,
            rejected = outcome.rejected.len(),
            credits_used = outcome.credits_used,
            "bid accepted"
        );
        ctx.audit(job_id, poster_id, "accept", Some(bid_id.to_string()));
        for closed in &outcome.rejected {
            ctx.audit(job_id, "system", "reject", Some(closed.bid_id.to_string()));
        }

        self.dispatch_assignment_effects(&outcome, poster_id);
        Ok(outcome)
    }

    fn dispatch_assignment_effects(&self, outcome: &AssignmentOutcome, poster_id: UserId) {
        let job_id = outcome.job.id;
        let job_title = outcome.job.title.clone();
        let bid_id = outcome.bid_id;
        let bidder_id = outcome.bidder_id;
        let rejected = outcome.rejected.clone();
        let rejection_message = self.rejection_message.clone();

        self.ctx
            .effects
            .after_commit("job_assigned", move |c| async move {
                let conversation_id = c.open_conversation(job_id, poster_id, bidder_id).await;
                c.notify(
                    bidder_id,
                    Notification::BidAccepted {
                        job_id,
                        bid_id,
                        job_title: job_title.clone(),
                        conversation_id,
                    },
                )
                .await;

                let assigned = RealtimeEvent::JobAssigned {
                    job_id,
                    bid_id,
                    bidder_id,
                };
                c.publish(&job_channel(job_id), assigned.clone()).await;
                c.publish(&user_channel(bidder_id), assigned).await;

                join_all(rejected.into_iter().map(|closed| {
                    let c = c.clone();
                    let job_title = job_title.clone();
                    let message = rejection_message.clone();
                    async move {
                        c.notify(
                            closed.bidder_id,
                            Notification::BidRejected {
                                job_id,
                                bid_id: closed.bid_id,
                                job_title,
                                message,
                            },
                        )
                        .await;
                        c.publish(
                            &user_channel(closed.bidder_id),
                            RealtimeEvent::BidRejected {
                                job_id,
                                bid_id: closed.bid_id,
                            },
                        )
                        .await;
                    }
                }))
                .await;
            });
    }
}
