//! Collaborators that only log. Default wiring when the embedding
//! application has not supplied real delivery channels.

use async_trait::async_trait;

use crate::core::events::{Broadcaster, ConversationService, Notification, Notifier, RealtimeEvent};
use crate::core::CollaboratorError;
use crate::util::ids::{ConversationId, JobId, UserId};

/// Logs notifications.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

#[async_trait]
impl Notifier for TracingNotifier {
    async fn notify(
        &self,
        user_id: UserId,
        notification: Notification,
    ) -> Result<(), CollaboratorError> {
        tracing::info!(user = %user_id, kind = ?notification.kind(), ?notification, "notify");
        Ok(())
    }
}

/// Logs realtime events.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingBroadcaster;

#[async_trait]
impl Broadcaster for TracingBroadcaster {
    async fn publish(&self, channel: &str, event: &RealtimeEvent) -> Result<(), CollaboratorError> {
        tracing::info!(channel, event = event.event_name(), "publish");
        Ok(())
    }
}

/// Hands out fresh conversation ids without persisting anything.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingConversations;

#[async_trait]
impl ConversationService for TracingConversations {
    async fn create_job_conversation(
        &self,
        job_id: JobId,
        poster_id: UserId,
        bidder_id: UserId,
    ) -> Result<ConversationId, CollaboratorError> {
        let id = ConversationId::new();
        tracing::info!(
            conversation = %id,
            job = %job_id,
            poster = %poster_id,
            bidder = %bidder_id,
            "conversation opened"
        );
        Ok(id)
    }
}
