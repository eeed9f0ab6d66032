//! Core marketplace rules: the job aggregate, the credit ledger, the
//! assignment coordinator and the lifecycle sweeper.

pub mod audit;
pub mod board;
pub mod context;
pub mod coordinator;
pub mod dispatch;
pub mod error;
pub mod events;
pub mod ledger;
pub mod model;
pub mod retry;
pub mod store;
pub mod sweeper;
pub mod throttle;

pub use audit::{build_audit_event, AuditEvent, AuditSink, InMemoryAuditSink, SharedAuditSink, TracingAuditSink};
pub use board::{JobBoard, NewJob, CANCELLED_MESSAGE};
pub use context::MarketContext;
pub use coordinator::{AssignmentCoordinator, AssignmentOutcome, DEFAULT_REJECTION_MESSAGE};
pub use dispatch::{EffectDispatcher, Spawn};
pub use error::{AppResult, AwardError, CollaboratorError, StoreError};
pub use events::{
    job_channel, user_channel, Broadcaster, Collaborators, ConversationService, Notification,
    NotificationKind, Notifier, RealtimeEvent,
};
pub use ledger::{Account, LedgerPolicy, LedgerService, Tier, DEFAULT_FREE_CREDIT_QUOTA};
pub use model::{Bid, BidStatus, ClosedBid, Dispute, Job, JobStatus};
pub use retry::{AttemptError, RetryPolicy};
pub use store::{MarketStore, Versioned, Write, WriteBatch};
pub use sweeper::{LifecycleSweeper, SweepReport, SweeperHandle, EXPIRED_MESSAGE};
pub use throttle::{PostingThrottle, DEFAULT_POST_COOLDOWN};
