//! Error types for marketplace operations.

use thiserror::Error;

/// Errors returned by job, bid and assignment operations.
///
/// Every variant except [`AwardError::Transient`] is terminal: retrying the
/// same request cannot succeed without a change in state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AwardError {
    /// The referenced job or account does not exist.
    #[error("not found: {0}")]
    NotFound(String),
    /// The caller is not allowed to perform the operation.
    #[error("forbidden: {0}")]
    Forbidden(String),
    /// The record is not in a state that allows the operation (stale data,
    /// double submit, lost race).
    #[error("invalid state: {0}")]
    InvalidState(String),
    /// The bidder already holds a live bid on the job.
    #[error("bidder already has an active bid on this job")]
    DuplicateBid,
    /// The bidder's free-tier credits are exhausted.
    #[error("credit capacity exceeded")]
    CapacityExceeded,
    /// The poster must wait before posting another job.
    #[error("posting throttled until {next_allowed_ms}")]
    PostingThrottled {
        /// Earliest time (ms since epoch) the poster may post again.
        next_allowed_ms: u128,
    },
    /// Request arguments failed validation.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Storage stayed contended or unavailable after bounded retries.
    #[error("temporarily unavailable, retry later")]
    Transient,
}

impl AwardError {
    /// Whether the caller may retry the same request.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient)
    }
}

/// Errors produced by storage backends.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// A version stamp changed between read and commit.
    #[error("version conflict")]
    Conflict,
    /// The backend is temporarily unreachable.
    #[error("store unavailable: {0}")]
    Unavailable(String),
    /// Backend-specific failure with context.
    #[error("backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Whether the failed operation may be retried as a whole.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Conflict | Self::Unavailable(_))
    }
}

/// Errors reported by external collaborators (notifications, realtime,
/// conversations). These never reach callers of the core operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CollaboratorError {
    /// The collaborator could not be reached.
    #[error("collaborator unavailable: {0}")]
    Unavailable(String),
    /// The collaborator refused the request.
    #[error("collaborator rejected request: {0}")]
    Rejected(String),
}

/// Application-facing result using anyhow for higher-level contexts.
pub type AppResult<T> = Result<T, anyhow::Error>;
