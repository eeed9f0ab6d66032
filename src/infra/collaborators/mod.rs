//! Collaborator backends.

pub mod memory;
pub mod tracing_only;

pub use memory::{RecordingBroadcaster, RecordingConversations, RecordingNotifier};
pub use tracing_only::{TracingBroadcaster, TracingConversations, TracingNotifier};
