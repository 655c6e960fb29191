//! Stream context
//!
//! One context binds one capture session to one encoder process and tracks
//! their combined lifecycle. Ownership of both resources stays with the
//! context from creation to removal; teardown runs exactly once no matter
//! how many paths request it.

use tokio::sync::Mutex;

use super::id::StreamId;
use crate::capture::CaptureSession;
use crate::encode::EncoderHandle;

/// Lifecycle phase of a stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamPhase {
    /// Resources are being set up, handshake pending
    Initializing,
    /// Both readiness signals observed; stream is usable
    Active,
    /// Teardown in progress
    Closing,
    /// Torn down; the context is never reused
    Removed,
}

struct ContextInner {
    phase: StreamPhase,
    session: Option<Box<dyn CaptureSession>>,
    encoder: Option<Box<dyn EncoderHandle>>,
}

/// One active or initializing stream
pub struct StreamContext {
    id: StreamId,
    url: String,
    inner: Mutex<ContextInner>,
}

impl StreamContext {
    /// Create a context in the Initializing phase, taking ownership of both
    /// resources
    pub fn new(
        id: StreamId,
        url: String,
        session: Option<Box<dyn CaptureSession>>,
        encoder: Option<Box<dyn EncoderHandle>>,
    ) -> Self {
        Self {
            id,
            url,
            inner: Mutex::new(ContextInner {
                phase: StreamPhase::Initializing,
                session,
                encoder,
            }),
        }
    }

    /// The stream's id
    pub fn id(&self) -> &StreamId {
        &self.id
    }

    /// The target page URL
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Current lifecycle phase
    pub async fn phase(&self) -> StreamPhase {
        self.inner.lock().await.phase
    }

    /// Mark the handshake complete
    ///
    /// Only meaningful while Initializing; a context already closing stays
    /// closing.
    pub async fn activate(&self) {
        let mut inner = self.inner.lock().await;
        if inner.phase == StreamPhase::Initializing {
            inner.phase = StreamPhase::Active;
        }
    }

    /// Drive the context to Removed, tearing down whichever owned resource
    /// is still alive
    ///
    /// Returns whether this call performed the teardown. Concurrent callers
    /// observe Closing or Removed and return false, so the sequence runs
    /// exactly once even when both owned resources signal exit at nearly the
    /// same time. Individual teardown failures are logged, never propagated.
    pub async fn close(&self) -> bool {
        let (session, encoder) = {
            let mut inner = self.inner.lock().await;
            match inner.phase {
                StreamPhase::Closing | StreamPhase::Removed => return false,
                StreamPhase::Initializing | StreamPhase::Active => {}
            }
            inner.phase = StreamPhase::Closing;
            (inner.session.take(), inner.encoder.take())
        };

        if let Some(encoder) = encoder {
            if let Err(e) = encoder.terminate().await {
                tracing::warn!(stream = %self.id, error = %e, "encoder terminate failed");
            }
        }
        if let Some(session) = session {
            if let Err(e) = session.close().await {
                tracing::warn!(stream = %self.id, error = %e, "capture session close failed");
            }
        }

        self.inner.lock().await.phase = StreamPhase::Removed;
        tracing::debug!(stream = %self.id, "stream context removed");
        true
    }
}
