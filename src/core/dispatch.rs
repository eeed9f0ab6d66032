//! Detached execution of post-commit side effects.
//!
//! Side effects run on the runtime, not on the caller's future: once a commit
//! succeeds, dropping the caller cannot cancel the notifications that follow.

use std::future::Future;

use crate::core::events::Collaborators;

/// Abstraction for spawning task execution on a runtime.
pub trait Spawn {
    /// Spawn an async task that returns a future.
    fn spawn<F>(&self, fut: F)
    where
        F: Future<Output = ()> + Send + 'static;
}

/// Runs best-effort side effects after a successful commit.
#[derive(Clone)]
pub struct EffectDispatcher<S> {
    spawner: S,
    collaborators: Collaborators,
}

impl<S: Spawn> EffectDispatcher<S> {
    /// Create a dispatcher.
    pub fn new(spawner: S, collaborators: Collaborators) -> Self {
        Self {
            spawner,
            collaborators,
        }
    }

    /// The collaborators effects run against.
    pub fn collaborators(&self) -> &Collaborators {
        &self.collaborators
    }

    /// The runtime spawner.
    pub fn spawner(&self) -> &S {
        &self.spawner
    }

    /// Spawn the effects built by `effects`. Must only be called after the
    /// commit they describe succeeded.
    pub fn after_commit<F, Fut>(&self, label: &'static str, effects: F)
    where
        F: FnOnce(Collaborators) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let fut = effects(self.collaborators.clone());
        self.spawner.spawn(async move {
            fut.await;
            tracing::debug!(effects = label, "post-commit effects finished");
        });
    }
}
