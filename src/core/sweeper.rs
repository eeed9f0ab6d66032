//! Lifecycle sweeper: expires open jobs whose deadline has passed.
//!
//! Each job is expired with its own version-checked commit. A job that changed
//! since it was listed (a bid arrived, or it was awarded) is re-evaluated on the
//! next pass rather than retried here, so a sweep never contends with
//! acceptances. Running the sweep twice, or concurrently, is harmless: only
//! jobs still open and past deadline at commit time are touched.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

use crate::core::context::MarketContext;
use crate::core::dispatch::Spawn;
use crate::core::events::{job_channel, user_channel, Notification, RealtimeEvent};
use crate::core::model::{ClosedBid, Job, JobStatus};
use crate::core::store::WriteBatch;
use crate::core::{AwardError, StoreError};
use crate::util::ids::JobId;

/// Message stored on pending bids of an expired job.
pub const EXPIRED_MESSAGE: &str = "The job expired before a bid was accepted.";

/// Counters for one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepReport {
    /// Candidates returned by the store.
    pub examined: usize,
    /// Jobs moved to expired.
    pub expired: usize,
    /// Candidates that changed concurrently and were left for the next pass.
    pub conflicts: usize,
    /// Candidates no longer eligible when re-read.
    pub skipped: usize,
    /// Candidates whose commit failed for another reason.
    pub failed: usize,
}

enum Expiry {
    Expired(Job, Vec<ClosedBid>),
    Skipped,
}

/// Expires stale open jobs.
#[derive(Clone)]
pub struct LifecycleSweeper<S> {
    ctx: MarketContext<S>,
    batch_limit: usize,
}

impl<S> LifecycleSweeper<S>
where
    S: Spawn + Clone + Send + Sync + 'static,
{
    /// Create a sweeper examining at most `batch_limit` jobs per pass.
    pub fn new(ctx: MarketContext<S>, batch_limit: usize) -> Self {
        Self {
            ctx,
            batch_limit: batch_limit.max(1),
        }
    }

    /// Run one pass at `now_ms`.
    ///
    /// # Errors
    ///
    /// `Transient` if the candidate listing fails. Failures on individual jobs
    /// are counted in the report instead.
    pub async fn sweep_once(&self, now_ms: u128) -> Result<SweepReport, AwardError> {
        let candidates = self
            .ctx
            .store
            .open_jobs_past_deadline(now_ms, self.batch_limit)
            .await
            .map_err(|err| {
                tracing::warn!(error = %err, "sweeper could not list candidates");
                AwardError::Transient
            })?;

        let mut report = SweepReport {
            examined: candidates.len(),
            ..SweepReport::default()
        };
        for job_id in candidates {
            match self.expire(job_id, now_ms).await {
                Ok(Expiry::Expired(job, closed)) => {
                    report.expired += 1;
                    self.after_expiry(&job, closed);
                }
                Ok(Expiry::Skipped) => report.skipped += 1,
                Err(StoreError::Conflict) => {
                    tracing::debug!(job = %job_id, "job changed during sweep, deferring");
                    report.conflicts += 1;
                }
                Err(err) => {
                    tracing::warn!(job = %job_id, error = %err, "failed to expire job");
                    report.failed += 1;
                }
            }
        }

        if report.expired > 0 || report.conflicts > 0 || report.failed > 0 {
            tracing::info!(
                examined = report.examined,
                expired = report.expired,
                conflicts = report.conflicts,
                failed = report.failed,
                "sweep finished"
            );
        }
        Ok(report)
    }

    async fn expire(&self, job_id: JobId, now_ms: u128) -> Result<Expiry, StoreError> {
        let Some(current) = self.ctx.store.load_job(job_id).await? else {
            return Ok(Expiry::Skipped);
        };
        let mut job = current.value;
        if job.status != JobStatus::Open || !job.is_past_deadline(now_ms) {
            return Ok(Expiry::Skipped);
        }
        if job.transition(JobStatus::Expired, now_ms).is_err() {
            return Ok(Expiry::Skipped);
        }
        let closed = job.reject_pending(EXPIRED_MESSAGE, now_ms);
        self.ctx
            .store
            .commit(WriteBatch::new().update_job(job.clone(), current.version))
            .await?;
        Ok(Expiry::Expired(job, closed))
    }

    fn after_expiry(&self, job: &Job, closed: Vec<ClosedBid>) {
        let job_id = job.id;
        let poster_id = job.poster_id;
        let job_title = job.title.clone();
        tracing::info!(job = %job_id, rejected = closed.len(), "job expired");
        self.ctx.audit(job_id, "system", "expire", None);

        self.ctx
            .effects
            .after_commit("job_expired", move |c| async move {
                c.notify(
                    poster_id,
                    Notification::JobExpired {
                        job_id,
                        job_title: job_title.clone(),
                    },
                )
                .await;
                c.publish(&job_channel(job_id), RealtimeEvent::JobExpired { job_id })
                    .await;
                for bid in closed {
                    c.notify(
                        bid.bidder_id,
                        Notification::BidRejected {
                            job_id,
                            bid_id: bid.bid_id,
                            job_title: job_title.clone(),
                            message: EXPIRED_MESSAGE.to_owned(),
                        },
                    )
                    .await;
                    c.publish(
                        &user_channel(bid.bidder_id),
                        RealtimeEvent::BidRejected {
                            job_id,
                            bid_id: bid.bid_id,
                        },
                    )
                    .await;
                }
            });
    }

    /// Run sweeps every `interval` on the runtime until the returned handle is
    /// shut down or dropped.
    pub fn spawn(self, interval: Duration) -> SweeperHandle {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let spawner = self.ctx.effects.spawner().clone();

        spawner.spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            tracing::info!(?interval, "sweeper started");
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let now = self.ctx.now_ms();
                        if let Err(err) = self.sweep_once(now).await {
                            tracing::warn!(error = %err, "sweep failed");
                        }
                    }
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                }
            }
            tracing::info!("sweeper stopped");
        });

        SweeperHandle { shutdown_tx }
    }
}

/// Handle to a running sweeper loop. Dropping it stops the loop.
#[derive(Debug)]
pub struct SweeperHandle {
    shutdown_tx: watch::Sender<bool>,
}

impl SweeperHandle {
    /// Ask the loop to stop after the current pass.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    /// Whether the loop has exited.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.shutdown_tx.is_closed()
    }
}
