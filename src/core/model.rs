//! Job aggregate and its embedded bids.
//!
//! A [`Job`] exclusively owns its [`Bid`]s. All mutations go through methods on
//! the aggregate so the per-job invariants hold on every committed version:
//!
//! - at most one bid is [`BidStatus::Accepted`];
//! - once a bid is accepted the job is [`JobStatus::InProgress`] or later, its
//!   `accepted_bid_id` points at that bid and no other bid is still pending;
//! - a bidder holds at most one non-withdrawn bid per job.

use serde::{Deserialize, Serialize};

use crate::core::AwardError;
use crate::util::ids::{BidId, JobId, UserId};

/// Lifecycle status of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Accepting bids.
    Open,
    /// Awarded to a bidder.
    InProgress,
    /// Work finished.
    Completed,
    /// Withdrawn by the poster before assignment.
    Cancelled,
    /// Poster or bidder raised a dispute on assigned work.
    Disputed,
    /// Deadline passed without an assignment.
    Expired,
}

impl JobStatus {
    /// Legal edges of the job status machine.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Open, Self::InProgress | Self::Cancelled | Self::Expired)
                | (Self::InProgress, Self::Completed | Self::Disputed)
        )
    }

    /// Stable lowercase name, as stored and published.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Disputed => "disputed",
            Self::Expired => "expired",
        }
    }
}

/// Status of a single bid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BidStatus {
    /// Awaiting the poster's decision.
    Pending,
    /// Won the job.
    Accepted,
    /// Lost the job, or the job closed without an award.
    Rejected,
    /// Pulled back by the bidder before a decision.
    Withdrawn,
}

/// An offer to perform a job, embedded within the job record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bid {
    /// Bid identifier, unique within the job.
    pub id: BidId,
    /// Account that placed the bid.
    pub bidder_id: UserId,
    /// Proposed price in minor currency units.
    pub proposed_amount: u64,
    /// Cover note supplied with the bid.
    pub message: Option<String>,
    /// Current status.
    pub status: BidStatus,
    /// Submission time (ms since epoch).
    pub applied_at: u128,
    /// Time of the poster decision or withdrawal.
    pub responded_at: Option<u128>,
    /// Message attached to the decision.
    pub response_message: Option<String>,
}

impl Bid {
    /// Whether this bid still counts toward the one-bid-per-bidder rule.
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.status != BidStatus::Withdrawn
    }
}

/// Dispute raised against assigned work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dispute {
    /// Poster or assigned bidder that raised it.
    pub raised_by: UserId,
    /// Free-form reason.
    pub reason: String,
    /// When it was raised.
    pub raised_at: u128,
    /// When an administrator resolved it.
    pub resolved_at: Option<u128>,
    /// Resolution note.
    pub resolution: Option<String>,
}

/// A pending bid closed out as a side effect of another transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClosedBid {
    /// The bid that moved to rejected.
    pub bid_id: BidId,
    /// Its owner.
    pub bidder_id: UserId,
}

/// Job posting with its embedded bids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    /// Job identifier.
    pub id: JobId,
    /// Account that created the job. Never changes.
    pub poster_id: UserId,
    /// Short title.
    pub title: String,
    /// Full description.
    pub description: String,
    /// Optional budget in minor currency units.
    pub budget: Option<u64>,
    /// Current status.
    pub status: JobStatus,
    /// Bidding deadline (ms since epoch).
    pub deadline: u128,
    /// Set on the transition to in progress.
    pub assigned_bidder_id: Option<UserId>,
    /// Set on the transition to in progress.
    pub accepted_bid_id: Option<BidId>,
    /// Bids in submission order.
    pub bids: Vec<Bid>,
    /// Open dispute, if any.
    pub dispute: Option<Dispute>,
    /// Creation time.
    pub created_at: u128,
    /// Last modification time.
    pub updated_at: u128,
    /// Completion time.
    pub completed_at: Option<u128>,
    /// Cancellation time.
    pub cancelled_at: Option<u128>,
}

impl Job {
    /// Create a new open job.
    #[must_use]
    pub fn new(
        poster_id: UserId,
        title: impl Into<String>,
        description: impl Into<String>,
        budget: Option<u64>,
        deadline: u128,
        now_ms: u128,
    ) -> Self {
        Self {
            id: JobId::new(),
            poster_id,
            title: title.into(),
            description: description.into(),
            budget,
            status: JobStatus::Open,
            deadline,
            assigned_bidder_id: None,
            accepted_bid_id: None,
            bids: Vec::new(),
            dispute: None,
            created_at: now_ms,
            updated_at: now_ms,
            completed_at: None,
            cancelled_at: None,
        }
    }

    /// Look up an embedded bid.
    #[must_use]
    pub fn bid(&self, bid_id: BidId) -> Option<&Bid> {
        self.bids.iter().find(|b| b.id == bid_id)
    }

    fn bid_mut(&mut self, bid_id: BidId) -> Option<&mut Bid> {
        self.bids.iter_mut().find(|b| b.id == bid_id)
    }

    /// The bidder's non-withdrawn bid, if any.
    #[must_use]
    pub fn live_bid_for(&self, bidder_id: UserId) -> Option<&Bid> {
        self.bids
            .iter()
            .find(|b| b.bidder_id == bidder_id && b.is_live())
    }

    /// The accepted bid, if the job has been awarded.
    #[must_use]
    pub fn accepted_bid(&self) -> Option<&Bid> {
        self.bids.iter().find(|b| b.status == BidStatus::Accepted)
    }

    /// Bids still awaiting a decision.
    pub fn pending_bids(&self) -> impl Iterator<Item = &Bid> {
        self.bids.iter().filter(|b| b.status == BidStatus::Pending)
    }

    /// Whether the bidding deadline has passed at `now_ms`.
    #[must_use]
    pub const fn is_past_deadline(&self, now_ms: u128) -> bool {
        self.deadline < now_ms
    }

    /// Whether no further transition is possible.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        match self.status {
            JobStatus::Completed | JobStatus::Cancelled | JobStatus::Expired => true,
            JobStatus::Disputed => self
                .dispute
                .as_ref()
                .is_some_and(|d| d.resolved_at.is_some()),
            JobStatus::Open | JobStatus::InProgress => false,
        }
    }

    fn ensure_open(&self) -> Result<(), AwardError> {
        if self.status == JobStatus::Open {
            Ok(())
        } else {
            Err(AwardError::InvalidState(format!(
                "job {} is {}",
                self.id,
                self.status.as_str()
            )))
        }
    }

    /// Append a pending bid.
    ///
    /// # Errors
    ///
    /// `InvalidState` unless the job is open and before its deadline,
    /// `DuplicateBid` if the bidder already holds a live bid.
    pub fn append_bid(
        &mut self,
        bidder_id: UserId,
        proposed_amount: u64,
        message: Option<String>,
        now_ms: u128,
    ) -> Result<BidId, AwardError> {
        self.ensure_open()?;
        if self.is_past_deadline(now_ms) {
            return Err(AwardError::InvalidState(format!(
                "job {} is past its deadline",
                self.id
            )));
        }
        if self.live_bid_for(bidder_id).is_some() {
            return Err(AwardError::DuplicateBid);
        }
        let id = BidId::new();
        self.bids.push(Bid {
            id,
            bidder_id,
            proposed_amount,
            message,
            status: BidStatus::Pending,
            applied_at: now_ms,
            responded_at: None,
            response_message: None,
        });
        self.updated_at = now_ms;
        Ok(id)
    }

    /// Withdraw a pending bid on behalf of its owner.
    ///
    /// # Errors
    ///
    /// `InvalidState` if the bid is unknown or no longer pending, `Forbidden`
    /// if `bidder_id` does not own it.
    pub fn withdraw_bid(
        &mut self,
        bid_id: BidId,
        bidder_id: UserId,
        now_ms: u128,
    ) -> Result<(), AwardError> {
        let job_id = self.id;
        let bid = self.bid_mut(bid_id).ok_or_else(|| {
            AwardError::InvalidState(format!("bid {bid_id} does not exist on job {job_id}"))
        })?;
        if bid.bidder_id != bidder_id {
            return Err(AwardError::Forbidden(format!(
                "bid {bid_id} belongs to another bidder"
            )));
        }
        if bid.status != BidStatus::Pending {
            return Err(AwardError::InvalidState(format!(
                "bid {bid_id} is no longer pending"
            )));
        }
        bid.status = BidStatus::Withdrawn;
        bid.responded_at = Some(now_ms);
        self.updated_at = now_ms;
        Ok(())
    }

    /// Check that `bid_id` can be accepted right now and return its bidder.
    ///
    /// # Errors
    ///
    /// `InvalidState` unless the job is open and the bid exists and is pending.
    pub fn acceptable_bidder(&self, bid_id: BidId) -> Result<UserId, AwardError> {
        self.ensure_open()?;
        let bid = self.bid(bid_id).ok_or_else(|| {
            AwardError::InvalidState(format!("bid {bid_id} does not exist on job {}", self.id))
        })?;
        if bid.status != BidStatus::Pending {
            return Err(AwardError::InvalidState(format!(
                "bid {bid_id} is not pending"
            )));
        }
        Ok(bid.bidder_id)
    }

    /// Award the job: accept `bid_id`, reject every other pending bid and move
    /// the job to in progress. Returns the bids closed as a side effect.
    ///
    /// # Errors
    ///
    /// Same as [`Job::acceptable_bidder`]. On error the job is unchanged.
    pub fn award(
        &mut self,
        bid_id: BidId,
        response_message: Option<String>,
        rejection_message: &str,
        now_ms: u128,
    ) -> Result<Vec<ClosedBid>, AwardError> {
        let bidder_id = self.acceptable_bidder(bid_id)?;

        let mut rejected = Vec::new();
        for bid in &mut self.bids {
            if bid.id == bid_id {
                bid.status = BidStatus::Accepted;
                bid.responded_at = Some(now_ms);
                bid.response_message = response_message.clone();
            } else if bid.status == BidStatus::Pending {
                bid.status = BidStatus::Rejected;
                bid.responded_at = Some(now_ms);
                bid.response_message = Some(rejection_message.to_owned());
                rejected.push(ClosedBid {
                    bid_id: bid.id,
                    bidder_id: bid.bidder_id,
                });
            }
        }

        self.status = JobStatus::InProgress;
        self.assigned_bidder_id = Some(bidder_id);
        self.accepted_bid_id = Some(bid_id);
        self.updated_at = now_ms;
        Ok(rejected)
    }

    /// Reject every pending bid with `message`.
    pub fn reject_pending(&mut self, message: &str, now_ms: u128) -> Vec<ClosedBid> {
        let mut closed = Vec::new();
        for bid in self
            .bids
            .iter_mut()
            .filter(|b| b.status == BidStatus::Pending)
        {
            bid.status = BidStatus::Rejected;
            bid.responded_at = Some(now_ms);
            bid.response_message = Some(message.to_owned());
            closed.push(ClosedBid {
                bid_id: bid.id,
                bidder_id: bid.bidder_id,
            });
        }
        closed
    }

    /// Apply a guarded single-document transition. Assignment goes through
    /// [`Job::award`] instead.
    ///
    /// # Errors
    ///
    /// `InvalidState` if the edge is not legal from the current status.
    pub fn transition(&mut self, next: JobStatus, now_ms: u128) -> Result<(), AwardError> {
        if next == JobStatus::InProgress || !self.status.can_transition_to(next) {
            return Err(AwardError::InvalidState(format!(
                "job {} cannot move from {} to {}",
                self.id,
                self.status.as_str(),
                next.as_str()
            )));
        }
        self.status = next;
        self.updated_at = now_ms;
        match next {
            JobStatus::Completed => self.completed_at = Some(now_ms),
            JobStatus::Cancelled => self.cancelled_at = Some(now_ms),
            _ => {}
        }
        Ok(())
    }

    /// Verify the aggregate invariants. Used by tests and debug assertions.
    ///
    /// # Errors
    ///
    /// A description of the first violated invariant.
    pub fn check_invariants(&self) -> Result<(), String> {
        let accepted = self
            .bids
            .iter()
            .filter(|b| b.status == BidStatus::Accepted)
            .count();
        if accepted > 1 {
            return Err(format!("job {} has {accepted} accepted bids", self.id));
        }
        if let Some(bid) = self.accepted_bid() {
            if matches!(
                self.status,
                JobStatus::Open | JobStatus::Cancelled | JobStatus::Expired
            ) {
                return Err(format!(
                    "job {} is {} with an accepted bid",
                    self.id,
                    self.status.as_str()
                ));
            }
            if self.accepted_bid_id != Some(bid.id) {
                return Err(format!("job {} accepted_bid_id does not match", self.id));
            }
            if self.pending_bids().next().is_some() {
                return Err(format!("job {} still has pending bids after award", self.id));
            }
        }
        let mut live: Vec<UserId> = self
            .bids
            .iter()
            .filter(|b| b.is_live())
            .map(|b| b.bidder_id)
            .collect();
        let total = live.len();
        live.sort_unstable();
        live.dedup();
        if live.len() != total {
            return Err(format!("job {} has duplicate live bids", self.id));
        }
        Ok(())
    }
}
