//! Stream lifecycle manager
//!
//! Orchestrates get-or-create requests: derives the id, wins or joins the
//! registry reservation, sets up the capture session and encoder, runs the
//! readiness handshake, and arms the exit watchers that tear a stream down
//! when either owned resource dies. Also hosts the reclamation cycle and
//! the shutdown drain.

use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::{mpsc, watch};
use url::Url;

use super::context::{StreamContext, StreamPhase};
use super::handshake::{self, HandshakeConfig};
use super::id::StreamId;
use super::registry::{PendingReceiver, Reservation, StreamRegistry};
use crate::capture::{BlockList, CaptureEngine};
use crate::config::AppConfig;
use crate::encode::EncoderLauncher;
use crate::error::{CreateError, RequestError};
use crate::relay::RelayService;

/// Capture-to-encoder chunk queue depth
const CHUNK_QUEUE_DEPTH: usize = 64;

/// Owns the registry and the collaborator handles
pub struct StreamManager {
    config: AppConfig,
    block_list: BlockList,
    capture_script: String,
    registry: StreamRegistry,
    relay: Arc<dyn RelayService>,
    engine: Arc<dyn CaptureEngine>,
    launcher: Arc<dyn EncoderLauncher>,
}

impl StreamManager {
    /// Create a manager over the given collaborators
    pub fn new(
        config: AppConfig,
        block_list: BlockList,
        capture_script: String,
        relay: Arc<dyn RelayService>,
        engine: Arc<dyn CaptureEngine>,
        launcher: Arc<dyn EncoderLauncher>,
    ) -> Self {
        Self {
            config,
            block_list,
            capture_script,
            registry: StreamRegistry::new(),
            relay,
            engine,
            launcher,
        }
    }

    /// The registry, for enumeration by the control surface
    pub fn registry(&self) -> &StreamRegistry {
        &self.registry
    }

    /// The relay address for a stream id
    ///
    /// Deterministic: id and configuration fully determine the address, so
    /// registry hits answer without touching the context.
    pub fn relay_address(&self, id: &StreamId) -> String {
        format!(
            "rtsp://{}:{}/{}",
            self.config.relay.rtsp_host,
            self.config.relay.rtsp_port,
            id.relay_name()
        )
    }

    /// Resolve a target URL to a relay address, creating the stream on a
    /// registry miss
    ///
    /// Concurrent calls for the same URL share one creation: the reservation
    /// is installed before the first suspending collaborator call, and every
    /// caller awaits the published result. Creation itself runs on a
    /// detached task, so an abandoned request cannot strand the reservation
    /// or the half-built resources.
    pub async fn get_or_create(self: &Arc<Self>, url: &str) -> Result<String, RequestError> {
        let url = url.trim();
        if url.is_empty() {
            return Err(RequestError::MissingParameter(
                "url parameter is empty".to_string(),
            ));
        }
        let parsed = Url::parse(url)
            .map_err(|e| RequestError::MissingParameter(format!("not a valid URL: {}", e)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(RequestError::MissingParameter(format!(
                "unsupported scheme: {}",
                parsed.scheme()
            )));
        }

        let id = StreamId::derive(url);

        let pending_tx = match self.registry.reserve(&id).await {
            Reservation::Active(_) => return Ok(self.relay_address(&id)),
            Reservation::Pending(rx) => return Self::await_pending(rx).await,
            Reservation::Won(tx) => tx,
        };

        let pending_rx = pending_tx.subscribe();
        let manager = Arc::clone(self);
        let id = id.clone();
        let url = url.to_string();
        tokio::spawn(async move {
            match manager.create_stream(&id, &url).await {
                Ok(address) => {
                    pending_tx.send_replace(Some(Ok(address)));
                }
                Err(e) => {
                    manager.registry.remove(&id).await;
                    pending_tx.send_replace(Some(Err(e)));
                }
            }
        });

        Self::await_pending(pending_rx).await
    }

    /// Wait for an in-flight creation's published result
    async fn await_pending(mut rx: PendingReceiver) -> Result<String, RequestError> {
        match rx.wait_for(|result| result.is_some()).await {
            Ok(result) => match (*result).clone() {
                Some(Ok(address)) => Ok(address),
                Some(Err(e)) => Err(e.into()),
                None => Err(RequestError::Internal(
                    "pending result resolved empty".to_string(),
                )),
            },
            Err(_) => Err(RequestError::Internal(
                "stream creation task vanished".to_string(),
            )),
        }
    }

    /// Winner path: set up resources, run the handshake, commit
    async fn create_stream(
        self: &Arc<Self>,
        id: &StreamId,
        url: &str,
    ) -> Result<String, CreateError> {
        let name = id.relay_name();
        let address = self.relay_address(id);

        tracing::info!(stream = %id, url, "creating stream");

        self.relay
            .create(&name, &address)
            .await
            .map_err(|e| CreateError::Failed(format!("relay create failed: {}", e)))?;

        let (chunk_tx, chunk_rx) = mpsc::channel(CHUNK_QUEUE_DEPTH);
        let session = self
            .engine
            .open(url, &self.block_list, &self.capture_script, chunk_tx)
            .await
            .map_err(|e| CreateError::Failed(format!("capture open failed: {}", e)))?;
        let capture_ready = session.chunks_started();
        let mut closed = session.closed();

        let encoder = match self.launcher.launch(&address, chunk_rx).await {
            Ok(handle) => handle,
            Err(e) => {
                if let Err(close_err) = session.close().await {
                    tracing::warn!(stream = %id, error = %close_err, "capture session close failed");
                }
                return Err(CreateError::Failed(format!("encoder launch failed: {}", e)));
            }
        };
        let mut exited = encoder.exited();

        let context = Arc::new(StreamContext::new(
            id.clone(),
            url.to_string(),
            Some(session),
            Some(encoder),
        ));

        let handshake_config = self.handshake_config();
        let handshake = handshake::await_ready(
            capture_ready,
            Arc::clone(&self.relay),
            &name,
            &handshake_config,
        );

        // Either owned resource dying before readiness takes the failure edge
        let outcome = tokio::select! {
            result = handshake => result,
            _ = closed.wait_for(|c| *c) => Err(CreateError::Failed(
                "capture session closed during startup".to_string(),
            )),
            exit = exited.wait_for(|code| code.is_some()) => {
                let code = exit.ok().and_then(|c| *c);
                Err(CreateError::Failed(format!(
                    "encoder exited during startup (code {:?})",
                    code
                )))
            }
        };

        match outcome {
            Ok(()) => {
                context.activate().await;
                self.registry.commit(id, Arc::clone(&context)).await;
                self.arm_exit_watchers(context, closed, exited);
                tracing::info!(stream = %id, address = %address, "stream active");
                Ok(address)
            }
            Err(e) => {
                tracing::warn!(stream = %id, error = %e, "stream creation failed");
                context.close().await;
                Err(e)
            }
        }
    }

    /// Watch both owned resources; either exit drives the shared teardown
    fn arm_exit_watchers(
        self: &Arc<Self>,
        context: Arc<StreamContext>,
        mut closed: watch::Receiver<bool>,
        mut exited: watch::Receiver<Option<i32>>,
    ) {
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            let reason = tokio::select! {
                _ = closed.wait_for(|c| *c) => "capture session closed",
                _ = exited.wait_for(|code| code.is_some()) => "encoder process exited",
            };
            manager.remove_stream(&context, reason).await;
        });
    }

    /// Drive a context to Removed and drop its registry entry
    ///
    /// Safe to call from any number of paths; only the first performs the
    /// teardown.
    pub async fn remove_stream(&self, context: &Arc<StreamContext>, reason: &str) {
        if context.close().await {
            self.registry.remove_context(context.id(), context).await;
            tracing::info!(stream = %context.id(), reason, "stream torn down");
        }
    }

    /// One reclamation cycle
    ///
    /// Removes every Active stream the relay reports without consumers. A
    /// failed relay query skips the whole cycle; absence of a name from the
    /// listing is not evidence of idleness.
    pub async fn sweep_idle(&self) {
        let stats = match self.relay.list_all().await {
            Ok(stats) => stats,
            Err(e) => {
                tracing::warn!(error = %e, "relay unreachable, skipping sweep cycle");
                return;
            }
        };

        for context in self.registry.snapshot().await {
            let name = context.id().relay_name();
            let Some(stream_stats) = stats.get(&name) else {
                continue;
            };
            if stream_stats.consumer_count <= self.config.relay.idle_consumer_threshold
                && context.phase().await == StreamPhase::Active
            {
                tracing::info!(stream = %context.id(), "no consumers, reclaiming stream");
                self.remove_stream(&context, "no consumers").await;
            }
        }
    }

    /// Drain every stream, then release the shared capture engine
    ///
    /// Best-effort: individual teardown failures are logged inside the
    /// contexts and never abort the drain.
    pub async fn shutdown(&self) {
        let contexts = self.registry.snapshot().await;
        tracing::info!(streams = contexts.len(), "draining all streams");

        join_all(
            contexts
                .iter()
                .map(|context| self.remove_stream(context, "shutdown")),
        )
        .await;

        if let Err(e) = self.engine.shutdown().await {
            tracing::warn!(error = %e, "capture engine shutdown failed");
        }
    }

    fn handshake_config(&self) -> HandshakeConfig {
        HandshakeConfig {
            capture_timeout: self.config.lifecycle.capture_ready_timeout(),
            relay_timeout: self.config.lifecycle.relay_ready_timeout(),
            poll_interval: self.config.lifecycle.relay_poll_interval(),
            producer_threshold: self.config.relay.producer_ready_threshold,
        }
    }
}
