//! Stream registry
//!
//! The authoritative table of in-flight and active streams. An entry is
//! either a reservation (creation in progress) or a committed context.
//! The reservation is installed under the write lock before the creating
//! call performs any collaborator I/O, so two near-simultaneous requests
//! for the same URL observe one entry instead of racing to create
//! duplicate resources.
//!
//! Callers that lose the reservation race receive a `watch` receiver for
//! the winner's eventual result; they never read a half-built entry.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{watch, RwLock};

use super::context::StreamContext;
use super::id::StreamId;
use crate::error::CreateError;

/// Outcome of a stream creation attempt, fanned out to waiting callers
pub type PendingResult = Result<String, CreateError>;

/// Sender half of a reservation's pending-result channel
pub type PendingSender = watch::Sender<Option<PendingResult>>;

/// Receiver half of a reservation's pending-result channel
pub type PendingReceiver = watch::Receiver<Option<PendingResult>>;

enum RegistryEntry {
    /// Creation in progress; receivers resolve when the winner publishes
    Pending(PendingReceiver),
    /// Committed, active stream
    Active(Arc<StreamContext>),
}

/// Result of a `reserve` call
pub enum Reservation {
    /// This caller won the reservation and must drive creation; the sender
    /// publishes the outcome to every losing caller
    Won(PendingSender),
    /// Another caller is creating this stream; await its result
    Pending(PendingReceiver),
    /// The stream already exists
    Active(Arc<StreamContext>),
}

/// Table of in-flight and active streams
///
/// At most one entry per id at any time.
pub struct StreamRegistry {
    streams: RwLock<HashMap<StreamId, RegistryEntry>>,
}

impl StreamRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            streams: RwLock::new(HashMap::new()),
        }
    }

    /// Reserve an id, or join whatever already holds it
    ///
    /// The reservation is installed before this function returns, so the
    /// winner may suspend freely afterwards without opening a race window.
    pub async fn reserve(&self, id: &StreamId) -> Reservation {
        let mut streams = self.streams.write().await;

        match streams.get(id) {
            Some(RegistryEntry::Pending(rx)) => Reservation::Pending(rx.clone()),
            Some(RegistryEntry::Active(ctx)) => Reservation::Active(Arc::clone(ctx)),
            None => {
                let (tx, rx) = watch::channel(None);
                streams.insert(id.clone(), RegistryEntry::Pending(rx));
                tracing::debug!(stream = %id, "reservation installed");
                Reservation::Won(tx)
            }
        }
    }

    /// Replace a reservation with its finished context
    ///
    /// Only the winner of `reserve` calls this.
    pub async fn commit(&self, id: &StreamId, context: Arc<StreamContext>) {
        let mut streams = self.streams.write().await;
        streams.insert(id.clone(), RegistryEntry::Active(context));
        tracing::info!(stream = %id, "stream committed");
    }

    /// Delete any entry for an id
    ///
    /// Idempotent: removing an absent id is a no-op. Two independent failure
    /// paths may both attempt removal for the same context.
    pub async fn remove(&self, id: &StreamId) {
        let mut streams = self.streams.write().await;
        if streams.remove(id).is_some() {
            tracing::info!(stream = %id, "stream removed from registry");
        }
    }

    /// Delete the entry for an id only if it still holds this exact context
    ///
    /// A late exit handler from a torn-down context must not delete a
    /// successor context that reuses the same id.
    pub async fn remove_context(&self, id: &StreamId, context: &Arc<StreamContext>) {
        let mut streams = self.streams.write().await;
        let matches = matches!(
            streams.get(id),
            Some(RegistryEntry::Active(current)) if Arc::ptr_eq(current, context)
        );
        if matches {
            streams.remove(id);
            tracing::info!(stream = %id, "stream removed from registry");
        }
    }

    /// Read-only enumeration of committed contexts
    ///
    /// Reservations are excluded: streams still initializing are never
    /// targeted by the sweeper or the shutdown drain.
    pub async fn snapshot(&self) -> Vec<Arc<StreamContext>> {
        let streams = self.streams.read().await;
        streams
            .values()
            .filter_map(|entry| match entry {
                RegistryEntry::Active(ctx) => Some(Arc::clone(ctx)),
                RegistryEntry::Pending(_) => None,
            })
            .collect()
    }

    /// Number of entries, reservations included
    pub async fn len(&self) -> usize {
        self.streams.read().await.len()
    }

    /// Whether the registry holds no entries
    pub async fn is_empty(&self) -> bool {
        self.streams.read().await.is_empty()
    }
}

impl Default for StreamRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_context(id: &StreamId) -> Arc<StreamContext> {
        Arc::new(StreamContext::new(
            id.clone(),
            "https://example.com/live".to_string(),
            None,
            None,
        ))
    }

    #[tokio::test]
    async fn test_reserve_single_winner() {
        let registry = StreamRegistry::new();
        let id = StreamId::derive("https://example.com/live");

        let first = registry.reserve(&id).await;
        assert!(matches!(first, Reservation::Won(_)));

        let second = registry.reserve(&id).await;
        assert!(matches!(second, Reservation::Pending(_)));
    }

    #[tokio::test]
    async fn test_loser_receives_winner_result() {
        let registry = StreamRegistry::new();
        let id = StreamId::derive("https://example.com/live");

        let tx = match registry.reserve(&id).await {
            Reservation::Won(tx) => tx,
            _ => panic!("expected to win the reservation"),
        };
        let mut rx = match registry.reserve(&id).await {
            Reservation::Pending(rx) => rx,
            _ => panic!("expected a pending entry"),
        };

        tx.send_replace(Some(Ok("rtsp://127.0.0.1:8554/stream_x".to_string())));

        let guard = rx.wait_for(|v| v.is_some()).await.unwrap();
        let value = (*guard).clone();
        assert_eq!(value.unwrap().unwrap(), "rtsp://127.0.0.1:8554/stream_x");
    }

    #[tokio::test]
    async fn test_commit_makes_entry_active() {
        let registry = StreamRegistry::new();
        let id = StreamId::derive("https://example.com/live");

        let _tx = match registry.reserve(&id).await {
            Reservation::Won(tx) => tx,
            _ => panic!("expected to win the reservation"),
        };
        registry.commit(&id, test_context(&id)).await;

        assert!(matches!(
            registry.reserve(&id).await,
            Reservation::Active(_)
        ));
        assert_eq!(registry.snapshot().await.len(), 1);
    }

    #[tokio::test]
    async fn test_remove_is_idempotent() {
        let registry = StreamRegistry::new();
        let id = StreamId::derive("https://example.com/live");

        registry.commit(&id, test_context(&id)).await;
        registry.remove(&id).await;
        registry.remove(&id).await;

        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_remove_context_spares_successor() {
        let registry = StreamRegistry::new();
        let id = StreamId::derive("https://example.com/live");

        let old = test_context(&id);
        let new = test_context(&id);
        registry.commit(&id, Arc::clone(&new)).await;

        // A stale handler from the old context must not delete the new one
        registry.remove_context(&id, &old).await;
        assert_eq!(registry.len().await, 1);

        registry.remove_context(&id, &new).await;
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_snapshot_excludes_reservations() {
        let registry = StreamRegistry::new();
        let pending = StreamId::derive("https://example.com/pending");
        let active = StreamId::derive("https://example.com/active");

        let _tx = registry.reserve(&pending).await;
        registry.commit(&active, test_context(&active)).await;

        let snapshot = registry.snapshot().await;
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].id(), &active);
    }
}
