//! Recording collaborators for tests and embedding.
//!
//! Each keeps what it received in memory and can be switched into a failing
//! mode to exercise the "side effects never fail the caller" path. Clones share
//! state, so a test can keep one clone and wire another into the marketplace.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::core::events::{Broadcaster, ConversationService, Notification, Notifier, RealtimeEvent};
use crate::core::CollaboratorError;
use crate::util::ids::{ConversationId, JobId, UserId};

/// Poll `done` every few milliseconds until it holds or `timeout` elapses.
async fn wait_until(timeout: Duration, mut done: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if done() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// Records notifications.
#[derive(Debug, Default, Clone)]
pub struct RecordingNotifier {
    sent: Arc<Mutex<Vec<(UserId, Notification)>>>,
    failing: Arc<AtomicBool>,
}

impl RecordingNotifier {
    /// Create an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent deliveries fail (after recording the attempt).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Everything delivered so far.
    #[must_use]
    pub fn sent(&self) -> Vec<(UserId, Notification)> {
        self.sent.lock().clone()
    }

    /// Notifications delivered to one user.
    #[must_use]
    pub fn sent_to(&self, user_id: UserId) -> Vec<Notification> {
        self.sent
            .lock()
            .iter()
            .filter(|(u, _)| *u == user_id)
            .map(|(_, n)| n.clone())
            .collect()
    }

    /// Wait until at least `count` notifications were recorded.
    pub async fn wait_for(&self, count: usize, timeout: Duration) -> bool {
        wait_until(timeout, || self.sent.lock().len() >= count).await
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(
        &self,
        user_id: UserId,
        notification: Notification,
    ) -> Result<(), CollaboratorError> {
        self.sent.lock().push((user_id, notification));
        if self.failing.load(Ordering::SeqCst) {
            return Err(CollaboratorError::Unavailable("notifier offline".into()));
        }
        Ok(())
    }
}

/// Records realtime events.
#[derive(Debug, Default, Clone)]
pub struct RecordingBroadcaster {
    published: Arc<Mutex<Vec<(String, RealtimeEvent)>>>,
    failing: Arc<AtomicBool>,
}

impl RecordingBroadcaster {
    /// Create an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent publishes fail (after recording the attempt).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Everything published so far.
    #[must_use]
    pub fn published(&self) -> Vec<(String, RealtimeEvent)> {
        self.published.lock().clone()
    }

    /// Names of events published on `channel`, in order.
    #[must_use]
    pub fn event_names(&self, channel: &str) -> Vec<&'static str> {
        self.published
            .lock()
            .iter()
            .filter(|(c, _)| c == channel)
            .map(|(_, e)| e.event_name())
            .collect()
    }

    /// Wait until at least `count` events were recorded.
    pub async fn wait_for(&self, count: usize, timeout: Duration) -> bool {
        wait_until(timeout, || self.published.lock().len() >= count).await
    }
}

#[async_trait]
impl Broadcaster for RecordingBroadcaster {
    async fn publish(&self, channel: &str, event: &RealtimeEvent) -> Result<(), CollaboratorError> {
        self.published
            .lock()
            .push((channel.to_owned(), event.clone()));
        if self.failing.load(Ordering::SeqCst) {
            return Err(CollaboratorError::Unavailable("broadcaster offline".into()));
        }
        Ok(())
    }
}

/// Records created conversations.
#[derive(Debug, Default, Clone)]
pub struct RecordingConversations {
    created: Arc<Mutex<Vec<(ConversationId, JobId, UserId, UserId)>>>,
    failing: Arc<AtomicBool>,
}

impl RecordingConversations {
    /// Create an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent creations fail.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Conversations created so far as `(id, job, poster, bidder)`.
    #[must_use]
    pub fn created(&self) -> Vec<(ConversationId, JobId, UserId, UserId)> {
        self.created.lock().clone()
    }
}

#[async_trait]
impl ConversationService for RecordingConversations {
    async fn create_job_conversation(
        &self,
        job_id: JobId,
        poster_id: UserId,
        bidder_id: UserId,
    ) -> Result<ConversationId, CollaboratorError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(CollaboratorError::Rejected("conversation service refused".into()));
        }
        let id = ConversationId::new();
        self.created.lock().push((id, job_id, poster_id, bidder_id));
        Ok(id)
    }
}
