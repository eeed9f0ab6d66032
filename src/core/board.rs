//! Job board: posting jobs, submitting and withdrawing bids, and the guarded
//! single-document status transitions.
//!
//! Every operation here is a read-modify-commit of one job (plus the poster's
//! account when posting) under optimistic versioning. None of them wait on an
//! acceptance in flight; a concurrent commit only forces a re-read.

use serde::{Deserialize, Serialize};

use crate::core::context::MarketContext;
use crate::core::dispatch::Spawn;
use crate::core::events::{job_channel, user_channel, Notification, RealtimeEvent};
use crate::core::ledger::LedgerPolicy;
use crate::core::model::{Bid, Dispute, Job, JobStatus};
use crate::core::retry::AttemptError;
use crate::core::store::WriteBatch;
use crate::core::throttle::PostingThrottle;
use crate::core::AwardError;
use crate::util::ids::{BidId, JobId, UserId};

/// Message stored on pending bids when the poster cancels the job.
pub const CANCELLED_MESSAGE: &str = "The job was cancelled by the poster.";

/// Request to post a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewJob {
    /// Short title; must not be blank.
    pub title: String,
    /// Full description.
    pub description: String,
    /// Optional budget in minor currency units.
    pub budget: Option<u64>,
    /// Bidding deadline (ms since epoch); must be in the future.
    pub deadline: u128,
}

/// Posting, bidding and non-assignment transitions.
#[derive(Clone)]
pub struct JobBoard<S> {
    ctx: MarketContext<S>,
    ledger: LedgerPolicy,
    throttle: PostingThrottle,
    enforce_capacity_on_submit: bool,
}

impl<S> JobBoard<S>
where
    S: Spawn + Clone + Send + Sync + 'static,
{
    /// Create a job board.
    pub fn new(
        ctx: MarketContext<S>,
        ledger: LedgerPolicy,
        throttle: PostingThrottle,
        enforce_capacity_on_submit: bool,
    ) -> Self {
        Self {
            ctx,
            ledger,
            throttle,
            enforce_capacity_on_submit,
        }
    }

    /// Fetch a job.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown id, `Transient` on storage failure.
    pub async fn job(&self, job_id: JobId) -> Result<Job, AwardError> {
        let store = &self.ctx.store;
        self.ctx
            .retry
            .run("load_job", || async move {
                let found = store.load_job(job_id).await?;
                let job = found.ok_or_else(|| AwardError::NotFound(format!("job {job_id}")))?;
                Ok::<_, AttemptError>(job.value)
            })
            .await
    }

    /// Post a new open job and stamp the poster's last post time.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown poster, `InvalidInput` for a blank title or a
    /// deadline not in the future, `PostingThrottled` while the poster is in
    /// cooldown, `Transient` on storage failure.
    pub async fn post_job(&self, poster_id: UserId, request: NewJob) -> Result<Job, AwardError> {
        if request.title.trim().is_empty() {
            return Err(AwardError::InvalidInput("title must not be blank".into()));
        }
        let ctx = &self.ctx;
        let throttle = self.throttle;
        let request = &request;

        let job = ctx
            .retry
            .run("post_job", || async move {
                let now = ctx.now_ms();
                if request.deadline <= now {
                    return Err(AwardError::InvalidInput(
                        "deadline must be in the future".into(),
                    )
                    .into());
                }
                let poster = ctx
                    .store
                    .load_account(poster_id)
                    .await?
                    .ok_or_else(|| AwardError::NotFound(format!("account {poster_id}")))?;
                if !throttle.can_post_job(&poster.value, now) {
                    let next_allowed_ms = throttle
                        .next_allowed_post_time(&poster.value)
                        .unwrap_or(now);
                    return Err(AwardError::PostingThrottled { next_allowed_ms }.into());
                }

                let job = Job::new(
                    poster_id,
                    request.title.trim(),
                    request.description.clone(),
                    request.budget,
                    request.deadline,
                    now,
                );
                let mut account = poster.value;
                account.last_job_posted_at = Some(now);
                ctx.store
                    .commit(
                        WriteBatch::new()
                            .insert_job(job.clone())
                            .update_account(account, poster.version),
                    )
                    .await?;
                Ok::<_, AttemptError>(job)
            })
            .await?;

        tracing::info!(job = %job.id, poster = %poster_id, "job posted");
        ctx.audit(job.id, poster_id, "post", Some(job.title.clone()));
        Ok(job)
    }

    /// Submit a pending bid.
    ///
    /// The capacity check here is advisory: it gives early feedback, while
    /// the assignment coordinator re-checks authoritatively.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown job or bidder, `Forbidden` when the poster
    /// bids on their own job, `InvalidInput` for a zero amount, `InvalidState`
    /// unless the job is open and before its deadline, `DuplicateBid`,
    /// `CapacityExceeded`, `Transient`.
    pub async fn submit_bid(
        &self,
        job_id: JobId,
        bidder_id: UserId,
        proposed_amount: u64,
        message: Option<String>,
    ) -> Result<Bid, AwardError> {
        if proposed_amount == 0 {
            return Err(AwardError::InvalidInput("bid amount must be positive".into()));
        }
        let ctx = &self.ctx;
        let ledger = self.ledger;
        let enforce_capacity = self.enforce_capacity_on_submit;
        let message = &message;

        let (job, bid) = ctx
            .retry
            .run("submit_bid", || async move {
                let now = ctx.now_ms();
                let current = ctx
                    .store
                    .load_job(job_id)
                    .await?
                    .ok_or_else(|| AwardError::NotFound(format!("job {job_id}")))?;
                if current.value.poster_id == bidder_id {
                    return Err(AwardError::Forbidden("posters cannot bid on their own job".into()).into());
                }
                let mut job = current.value;
                let bid_id = job.append_bid(bidder_id, proposed_amount, message.clone(), now)?;

                let bidder = ctx
                    .store
                    .load_account(bidder_id)
                    .await?
                    .ok_or_else(|| AwardError::NotFound(format!("account {bidder_id}")))?;
                if enforce_capacity && !ledger.has_capacity(&bidder.value) {
                    return Err(AwardError::CapacityExceeded.into());
                }

                let bid = job
                    .bid(bid_id)
                    .cloned()
                    .ok_or_else(|| AwardError::InvalidState(format!("bid {bid_id} vanished")))?;
                ctx.store
                    .commit(WriteBatch::new().update_job(job.clone(), current.version))
                    .await?;
                Ok::<_, AttemptError>((job, bid))
            })
            .await?;

        tracing::info!(job = %job_id, bid = %bid.id, bidder = %bidder_id, "bid submitted");
        ctx.audit(job_id, bidder_id, "bid", Some(bid.id.to_string()));

        let poster_id = job.poster_id;
        let bid_id = bid.id;
        ctx.effects.after_commit("bid_submitted", move |c| async move {
            c.notify(
                poster_id,
                Notification::NewBid {
                    job_id,
                    bid_id,
                    bidder_id,
                    proposed_amount,
                },
            )
            .await;
            c.publish(
                &job_channel(job_id),
                RealtimeEvent::BidSubmitted {
                    job_id,
                    bid_id,
                    bidder_id,
                    proposed_amount,
                },
            )
            .await;
        });
        Ok(bid)
    }

    /// Withdraw a pending bid. Credits are untouched.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown job, `Forbidden` if the caller does not own
    /// the bid, `InvalidState` if it is unknown or no longer pending,
    /// `Transient`.
    pub async fn withdraw_bid(
        &self,
        job_id: JobId,
        bid_id: BidId,
        bidder_id: UserId,
    ) -> Result<Bid, AwardError> {
        let (_, bid) = self
            .update_job("withdraw_bid", job_id, |job, now| {
                job.withdraw_bid(bid_id, bidder_id, now)?;
                job.bid(bid_id)
                    .cloned()
                    .ok_or_else(|| AwardError::InvalidState(format!("bid {bid_id} vanished")))
            })
            .await?;

        tracing::info!(job = %job_id, bid = %bid_id, "bid withdrawn");
        self.ctx.audit(job_id, bidder_id, "withdraw", Some(bid_id.to_string()));
        self.ctx
            .effects
            .after_commit("bid_withdrawn", move |c| async move {
                c.publish(
                    &job_channel(job_id),
                    RealtimeEvent::BidWithdrawn { job_id, bid_id },
                )
                .await;
            });
        Ok(bid)
    }

    /// Mark an in-progress job completed.
    ///
    /// # Errors
    ///
    /// `NotFound`, `Forbidden` unless called by the poster, `InvalidState`
    /// unless the job is in progress, `Transient`.
    pub async fn complete_job(&self, job_id: JobId, poster_id: UserId) -> Result<Job, AwardError> {
        let (job, ()) = self
            .update_job("complete_job", job_id, |job, now| {
                ensure_poster(job, poster_id)?;
                job.transition(JobStatus::Completed, now)
            })
            .await?;
        tracing::info!(job = %job_id, "job completed");
        self.ctx.audit(job_id, poster_id, "complete", None);
        Ok(job)
    }

    /// Cancel an open job, rejecting its pending bids.
    ///
    /// # Errors
    ///
    /// `NotFound`, `Forbidden` unless called by the poster, `InvalidState`
    /// unless the job is open, `Transient`.
    pub async fn cancel_job(&self, job_id: JobId, poster_id: UserId) -> Result<Job, AwardError> {
        let (job, closed) = self
            .update_job("cancel_job", job_id, |job, now| {
                ensure_poster(job, poster_id)?;
                job.transition(JobStatus::Cancelled, now)?;
                Ok(job.reject_pending(CANCELLED_MESSAGE, now))
            })
            .await?;

        tracing::info!(job = %job_id, rejected = closed.len(), "job cancelled");
        self.ctx.audit(job_id, poster_id, "cancel", None);
        let job_title = job.title.clone();
        self.ctx
            .effects
            .after_commit("job_cancelled", move |c| async move {
                for closed_bid in closed {
                    c.notify(
                        closed_bid.bidder_id,
                        Notification::BidRejected {
                            job_id,
                            bid_id: closed_bid.bid_id,
                            job_title: job_title.clone(),
                            message: CANCELLED_MESSAGE.to_owned(),
                        },
                    )
                    .await;
                    c.publish(
                        &user_channel(closed_bid.bidder_id),
                        RealtimeEvent::BidRejected {
                            job_id,
                            bid_id: closed_bid.bid_id,
                        },
                    )
                    .await;
                }
            });
        Ok(job)
    }

    /// Raise a dispute on an in-progress job.
    ///
    /// # Errors
    ///
    /// `NotFound`, `Forbidden` unless called by the poster or the assigned
    /// bidder, `InvalidState` unless the job is in progress, `InvalidInput`
    /// for a blank reason, `Transient`.
    pub async fn raise_dispute(
        &self,
        job_id: JobId,
        caller_id: UserId,
        reason: &str,
    ) -> Result<Job, AwardError> {
        if reason.trim().is_empty() {
            return Err(AwardError::InvalidInput("dispute reason must not be blank".into()));
        }
        let (job, ()) = self
            .update_job("raise_dispute", job_id, |job, now| {
                if caller_id != job.poster_id && Some(caller_id) != job.assigned_bidder_id {
                    return Err(AwardError::Forbidden(
                        "only the poster or the assigned bidder may dispute".into(),
                    ));
                }
                job.transition(JobStatus::Disputed, now)?;
                job.dispute = Some(Dispute {
                    raised_by: caller_id,
                    reason: reason.trim().to_owned(),
                    raised_at: now,
                    resolved_at: None,
                    resolution: None,
                });
                Ok(())
            })
            .await?;
        tracing::warn!(job = %job_id, raised_by = %caller_id, "dispute raised");
        self.ctx.audit(job_id, caller_id, "dispute", Some(reason.to_owned()));
        Ok(job)
    }

    /// Resolve an open dispute. Administrative; the job stays disputed and
    /// becomes terminal.
    ///
    /// # Errors
    ///
    /// `NotFound`, `InvalidState` unless the job has an unresolved dispute,
    /// `Transient`.
    pub async fn resolve_dispute(&self, job_id: JobId, resolution: &str) -> Result<Job, AwardError> {
        let (job, ()) = self
            .update_job("resolve_dispute", job_id, |job, now| {
                if job.status != JobStatus::Disputed {
                    return Err(AwardError::InvalidState(format!(
                        "job {job_id} is {}",
                        job.status.as_str()
                    )));
                }
                let dispute = job
                    .dispute
                    .as_mut()
                    .filter(|d| d.resolved_at.is_none())
                    .ok_or_else(|| {
                        AwardError::InvalidState(format!("job {job_id} has no open dispute"))
                    })?;
                dispute.resolved_at = Some(now);
                dispute.resolution = Some(resolution.to_owned());
                job.updated_at = now;
                Ok(())
            })
            .await?;
        tracing::info!(job = %job_id, "dispute resolved");
        self.ctx.audit(job_id, "system", "resolve", Some(resolution.to_owned()));
        Ok(job)
    }

    /// Load, mutate and commit one job under the retry policy.
    async fn update_job<R, F>(
        &self,
        op_name: &'static str,
        job_id: JobId,
        mutate: F,
    ) -> Result<(Job, R), AwardError>
    where
        F: Fn(&mut Job, u128) -> Result<R, AwardError>,
    {
        let ctx = &self.ctx;
        let mutate = &mutate;
        ctx.retry
            .run(op_name, || async move {
                let current = ctx
                    .store
                    .load_job(job_id)
                    .await?
                    .ok_or_else(|| AwardError::NotFound(format!("job {job_id}")))?;
                let mut job = current.value;
                let out = mutate(&mut job, ctx.now_ms())?;
                ctx.store
                    .commit(WriteBatch::new().update_job(job.clone(), current.version))
                    .await?;
                Ok::<_, AttemptError>((job, out))
            })
            .await
    }
}

fn ensure_poster(job: &Job, caller_id: UserId) -> Result<(), AwardError> {
    if job.poster_id == caller_id {
        Ok(())
    } else {
        Err(AwardError::Forbidden(format!(
            "only the poster may change job {}",
            job.id
        )))
    }
}
