//! API-facing request/response models and handlers over a [`Marketplace`].
//!
//! Handlers translate [`AwardError`] into an [`ApiError`] with a stable code.
//! Internal details (store errors, retry counts) never reach the message.

use serde::{Deserialize, Serialize};

use crate::builders::Marketplace;
use crate::core::{AssignmentOutcome, AwardError, Bid, Job, NewJob, Spawn};
use crate::util::ids::{BidId, JobId, UserId};

/// Stable error codes returned to API callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Unknown job, bid or account.
    NotFound,
    /// Caller lacks permission.
    Forbidden,
    /// Operation not allowed in the current state.
    InvalidState,
    /// Bidder already holds a live bid.
    DuplicateBid,
    /// Free-tier credits exhausted.
    CapacityExceeded,
    /// Poster is in the posting cooldown.
    PostingThrottled,
    /// Malformed request.
    InvalidInput,
    /// Temporary failure.
    Unavailable,
}

/// Error payload returned by handlers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{code:?}: {message}")]
pub struct ApiError {
    /// Stable code.
    pub code: ErrorCode,
    /// User-facing message.
    pub message: String,
    /// Whether the same request may succeed later.
    pub retryable: bool,
}

impl From<AwardError> for ApiError {
    fn from(err: AwardError) -> Self {
        let retryable = err.is_retryable();
        let (code, message) = match err {
            AwardError::NotFound(what) => (ErrorCode::NotFound, format!("{what} not found")),
            AwardError::Forbidden(why) => (ErrorCode::Forbidden, why),
            AwardError::InvalidState(why) => (ErrorCode::InvalidState, why),
            AwardError::DuplicateBid => (
                ErrorCode::DuplicateBid,
                "You already have an active bid on this job.".to_owned(),
            ),
            AwardError::CapacityExceeded => (
                ErrorCode::CapacityExceeded,
                "The bidder has used all free job credits. Upgrade to a paid plan to take on more jobs."
                    .to_owned(),
            ),
            AwardError::PostingThrottled { next_allowed_ms } => (
                ErrorCode::PostingThrottled,
                format!("Free accounts can post one job per cooldown period; next post allowed at {next_allowed_ms}."),
            ),
            AwardError::InvalidInput(why) => (ErrorCode::InvalidInput, why),
            AwardError::Transient => (
                ErrorCode::Unavailable,
                "The service is busy, please retry later.".to_owned(),
            ),
        };
        Self {
            code,
            message,
            retryable,
        }
    }
}

/// Job posting payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostJobRequest {
    /// Posting user.
    pub poster_id: UserId,
    /// Title.
    pub title: String,
    /// Description.
    #[serde(default)]
    pub description: String,
    /// Optional budget.
    #[serde(default)]
    pub budget: Option<u64>,
    /// Bidding deadline (ms since epoch).
    pub deadline_ms: u128,
}

/// Bid submission payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitBidRequest {
    /// Target job.
    pub job_id: JobId,
    /// Bidding user.
    pub bidder_id: UserId,
    /// Proposed amount.
    pub proposed_amount: u64,
    /// Cover message.
    #[serde(default)]
    pub message: Option<String>,
}

/// Bid withdrawal payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WithdrawBidRequest {
    /// Job holding the bid.
    pub job_id: JobId,
    /// Bid to withdraw.
    pub bid_id: BidId,
    /// Caller; must own the bid.
    pub bidder_id: UserId,
}

/// Bid acceptance payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcceptBidRequest {
    /// Job to award.
    pub job_id: JobId,
    /// Winning bid.
    pub bid_id: BidId,
    /// Caller; must be the job's poster.
    pub poster_id: UserId,
    /// Optional note stored on the winning bid.
    #[serde(default)]
    pub response_message: Option<String>,
}

/// Health response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Health {
    /// Healthy flag.
    pub ok: bool,
}

/// Post a job.
///
/// # Errors
///
/// The mapped [`AwardError`].
pub async fn post_job<S>(market: &Marketplace<S>, req: PostJobRequest) -> Result<Job, ApiError>
where
    S: Spawn + Clone + Send + Sync + 'static,
{
    let request = NewJob {
        title: req.title,
        description: req.description,
        budget: req.budget,
        deadline: req.deadline_ms,
    };
    Ok(market.post_job(req.poster_id, request).await?)
}

/// Submit a bid.
///
/// # Errors
///
/// The mapped [`AwardError`].
pub async fn submit_bid<S>(market: &Marketplace<S>, req: SubmitBidRequest) -> Result<Bid, ApiError>
where
    S: Spawn + Clone + Send + Sync + 'static,
{
    Ok(market
        .submit_bid(req.job_id, req.bidder_id, req.proposed_amount, req.message)
        .await?)
}

/// Withdraw a bid.
///
/// # Errors
///
/// The mapped [`AwardError`].
pub async fn withdraw_bid<S>(
    market: &Marketplace<S>,
    req: WithdrawBidRequest,
) -> Result<Bid, ApiError>
where
    S: Spawn + Clone + Send + Sync + 'static,
{
    Ok(market
        .withdraw_bid(req.job_id, req.bid_id, req.bidder_id)
        .await?)
}

/// Accept a bid.
///
/// # Errors
///
/// The mapped [`AwardError`].
pub async fn accept_bid<S>(
    market: &Marketplace<S>,
    req: AcceptBidRequest,
) -> Result<AssignmentOutcome, ApiError>
where
    S: Spawn + Clone + Send + Sync + 'static,
{
    Ok(market
        .accept_bid(req.job_id, req.bid_id, req.poster_id, req.response_message)
        .await?)
}

/// Return a health payload.
#[must_use]
pub const fn health() -> Health {
    Health { ok: true }
}
