//! Payloads and traits for the external collaborators invoked after commit.
//!
//! Each notification and realtime event has one fixed shape. Collaborator
//! failures are logged and swallowed by [`Collaborators`]; they never reach the
//! caller of a core operation.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::CollaboratorError;
use crate::util::ids::{BidId, ConversationId, JobId, UserId};

/// Kind of a user notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// The recipient's bid won.
    BidAccepted,
    /// The recipient's bid lost or the job closed.
    BidRejected,
    /// A bid arrived on the recipient's job.
    NewBid,
    /// The recipient's job expired unassigned.
    JobExpired,
}

/// Notification payload, one variant per kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notification {
    /// Sent to the winning bidder.
    BidAccepted {
        /// Awarded job.
        job_id: JobId,
        /// Winning bid.
        bid_id: BidId,
        /// Job title for display.
        job_title: String,
        /// Conversation opened with the poster, when creation succeeded.
        conversation_id: Option<ConversationId>,
    },
    /// Sent to each bidder whose pending bid was closed.
    BidRejected {
        /// Job the bid was on.
        job_id: JobId,
        /// Closed bid.
        bid_id: BidId,
        /// Job title for display.
        job_title: String,
        /// Standard rejection message.
        message: String,
    },
    /// Sent to the poster when a bid arrives.
    NewBid {
        /// Job that received the bid.
        job_id: JobId,
        /// New bid.
        bid_id: BidId,
        /// Bidder account.
        bidder_id: UserId,
        /// Proposed amount in minor units.
        proposed_amount: u64,
    },
    /// Sent to the poster when the sweeper expires the job.
    JobExpired {
        /// Expired job.
        job_id: JobId,
        /// Job title for display.
        job_title: String,
    },
}

impl Notification {
    /// The kind discriminant.
    #[must_use]
    pub const fn kind(&self) -> NotificationKind {
        match self {
            Self::BidAccepted { .. } => NotificationKind::BidAccepted,
            Self::BidRejected { .. } => NotificationKind::BidRejected,
            Self::NewBid { .. } => NotificationKind::NewBid,
            Self::JobExpired { .. } => NotificationKind::JobExpired,
        }
    }
}

/// Realtime event payload, one variant per event name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RealtimeEvent {
    /// The job was awarded.
    JobAssigned {
        /// Job.
        job_id: JobId,
        /// Winning bid.
        bid_id: BidId,
        /// Assigned bidder.
        bidder_id: UserId,
    },
    /// A pending bid was closed.
    BidRejected {
        /// Job.
        job_id: JobId,
        /// Closed bid.
        bid_id: BidId,
    },
    /// A bid was placed.
    BidSubmitted {
        /// Job.
        job_id: JobId,
        /// New bid.
        bid_id: BidId,
        /// Bidder.
        bidder_id: UserId,
        /// Proposed amount in minor units.
        proposed_amount: u64,
    },
    /// A bid was withdrawn.
    BidWithdrawn {
        /// Job.
        job_id: JobId,
        /// Withdrawn bid.
        bid_id: BidId,
    },
    /// The job expired unassigned.
    JobExpired {
        /// Job.
        job_id: JobId,
    },
}

impl RealtimeEvent {
    /// Event name used on the wire.
    #[must_use]
    pub const fn event_name(&self) -> &'static str {
        match self {
            Self::JobAssigned { .. } => "job_assigned",
            Self::BidRejected { .. } => "bid_rejected",
            Self::BidSubmitted { .. } => "bid_submitted",
            Self::BidWithdrawn { .. } => "bid_withdrawn",
            Self::JobExpired { .. } => "job_expired",
        }
    }
}

/// Channel carrying events about one job.
#[must_use]
pub fn job_channel(job_id: JobId) -> String {
    format!("job:{job_id}")
}

/// Channel carrying events for one user.
#[must_use]
pub fn user_channel(user_id: UserId) -> String {
    format!("user:{user_id}")
}

/// Notification dispatcher.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver a notification to a user.
    async fn notify(&self, user_id: UserId, notification: Notification)
        -> Result<(), CollaboratorError>;
}

/// Realtime broadcaster.
#[async_trait]
pub trait Broadcaster: Send + Sync {
    /// Publish an event on a channel.
    async fn publish(&self, channel: &str, event: &RealtimeEvent) -> Result<(), CollaboratorError>;
}

/// Conversation service.
#[async_trait]
pub trait ConversationService: Send + Sync {
    /// Open a private conversation between poster and awarded bidder.
    async fn create_job_conversation(
        &self,
        job_id: JobId,
        poster_id: UserId,
        bidder_id: UserId,
    ) -> Result<ConversationId, CollaboratorError>;
}

/// The set of collaborators used after commit.
#[derive(Clone)]
pub struct Collaborators {
    /// Notification dispatcher.
    pub notifier: Arc<dyn Notifier>,
    /// Realtime broadcaster.
    pub broadcaster: Arc<dyn Broadcaster>,
    /// Conversation service.
    pub conversations: Arc<dyn ConversationService>,
}

impl Collaborators {
    /// Bundle collaborators.
    #[must_use]
    pub fn new(
        notifier: Arc<dyn Notifier>,
        broadcaster: Arc<dyn Broadcaster>,
        conversations: Arc<dyn ConversationService>,
    ) -> Self {
        Self {
            notifier,
            broadcaster,
            conversations,
        }
    }

    /// Notify, logging failure.
    pub async fn notify(&self, user_id: UserId, notification: Notification) {
        let kind = notification.kind();
        if let Err(err) = self.notifier.notify(user_id, notification).await {
            tracing::warn!(user = %user_id, ?kind, error = %err, "notification failed");
        }
    }

    /// Publish, logging failure.
    pub async fn publish(&self, channel: &str, event: RealtimeEvent) {
        if let Err(err) = self.broadcaster.publish(channel, &event).await {
            tracing::warn!(
                channel,
                event = event.event_name(),
                error = %err,
                "realtime publish failed"
            );
        }
    }

    /// Open the job conversation, logging failure.
    pub async fn open_conversation(
        &self,
        job_id: JobId,
        poster_id: UserId,
        bidder_id: UserId,
    ) -> Option<ConversationId> {
        match self
            .conversations
            .create_job_conversation(job_id, poster_id, bidder_id)
            .await
        {
            Ok(id) => Some(id),
            Err(err) => {
                tracing::warn!(job = %job_id, error = %err, "conversation creation failed");
                None
            }
        }
    }
}
