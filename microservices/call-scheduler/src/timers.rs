//! Timer registry: at most one pending, cancelable delayed action per session
//!
//! Entries exist only between scheduling and firing. Nothing here is
//! persisted; after a restart the registry is empty and the recovery sweep
//! picks the sessions back up.

use consultline_core::SessionId;
use dashmap::DashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

struct TimerEntry {
    token: u64,
    handle: JoinHandle<()>,
}

#[derive(Clone, Default)]
pub struct TimerRegistry {
    timers: Arc<DashMap<SessionId, TimerEntry>>,
    next_token: Arc<AtomicU64>,
}

impl TimerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `on_fire` to run after `delay`, replacing any timer already
    /// registered for the session. The entry is removed when the timer fires,
    /// before `on_fire` starts; a timer whose entry was replaced never runs.
    pub fn schedule<F>(&self, session_id: SessionId, delay: Duration, on_fire: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let token = self.next_token.fetch_add(1, Ordering::Relaxed);
        let (armed_tx, armed_rx) = oneshot::channel::<()>();
        let timers = self.timers.clone();
        let id = session_id.clone();

        let handle = tokio::spawn(async move {
            // Wait until the entry is in the map so the removal below cannot race the insert
            if armed_rx.await.is_err() {
                return;
            }
            tokio::time::sleep(delay).await;
            // A replacement may have been inserted while this task was waking up
            if timers.remove_if(&id, |_, entry| entry.token == token).is_some() {
                on_fire.await;
            }
        });

        if let Some(previous) = self.timers.insert(session_id.clone(), TimerEntry { token, handle }) {
            previous.handle.abort();
            tracing::debug!(session_id = %session_id, "Replaced existing timer");
        }
        let _ = armed_tx.send(());
    }

    /// Cancel the session's timer; returns whether one was registered
    pub fn cancel(&self, session_id: &SessionId) -> bool {
        match self.timers.remove(session_id) {
            Some((_, entry)) => {
                entry.handle.abort();
                true
            }
            None => false,
        }
    }

    /// Cancel every registered timer without running it
    pub fn cancel_all(&self) -> usize {
        let ids = self.session_ids();
        ids.iter().filter(|id| self.cancel(id)).count()
    }

    pub fn contains(&self, session_id: &SessionId) -> bool {
        self.timers.contains_key(session_id)
    }

    pub fn session_ids(&self) -> Vec<SessionId> {
        self.timers.iter().map(|e| e.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.timers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }
}
