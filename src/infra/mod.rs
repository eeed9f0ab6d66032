//! Infrastructure adapters for storage backends and external collaborators.

pub mod collaborators;
pub mod store;

pub use collaborators::{
    RecordingBroadcaster, RecordingConversations, RecordingNotifier, TracingBroadcaster,
    TracingConversations, TracingNotifier,
};
pub use store::InMemoryStore;
