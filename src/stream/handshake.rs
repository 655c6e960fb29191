//! Readiness handshake
//!
//! A new stream becomes usable only after two independent signals, each
//! inside its own window: the capture session must report its first media
//! chunk, and the relay must report that it is receiving the published
//! stream. Timeouts are attributed to the side that did not respond.
//!
//! Relay readiness is detected by polling; a failed poll is retried until
//! the window elapses and is never escalated on its own.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time;

use crate::error::CreateError;
use crate::relay::RelayService;

/// Handshake timing and thresholds
#[derive(Debug, Clone)]
pub struct HandshakeConfig {
    /// Window for the capture-ready signal
    pub capture_timeout: Duration,
    /// Window for the relay-producer-ready signal
    pub relay_timeout: Duration,
    /// Relay poll interval
    pub poll_interval: Duration,
    /// Ready once the producer count exceeds this value
    pub producer_threshold: u32,
}

/// Wait for both readiness signals
///
/// Fails with the error of whichever side misses its window first; the
/// other wait is dropped.
pub async fn await_ready(
    capture_ready: watch::Receiver<bool>,
    relay: Arc<dyn RelayService>,
    name: &str,
    config: &HandshakeConfig,
) -> Result<(), CreateError> {
    tokio::try_join!(
        capture_side(capture_ready, config.capture_timeout),
        relay_side(relay.as_ref(), name, config),
    )?;
    Ok(())
}

async fn capture_side(
    mut ready: watch::Receiver<bool>,
    window: Duration,
) -> Result<(), CreateError> {
    match time::timeout(window, ready.wait_for(|started| *started)).await {
        Ok(Ok(_)) => Ok(()),
        Ok(Err(_)) => Err(CreateError::Failed(
            "capture session ended before its first chunk".to_string(),
        )),
        Err(_) => Err(CreateError::CaptureTimeout(window)),
    }
}

async fn relay_side(
    relay: &dyn RelayService,
    name: &str,
    config: &HandshakeConfig,
) -> Result<(), CreateError> {
    let poll = async {
        let mut ticker = time::interval(config.poll_interval);
        loop {
            ticker.tick().await;
            match relay.list_all().await {
                Ok(streams) => {
                    let ready = streams
                        .get(name)
                        .is_some_and(|s| s.producer_count > config.producer_threshold);
                    if ready {
                        return;
                    }
                }
                Err(e) => {
                    tracing::debug!(stream = name, error = %e, "relay poll failed, retrying");
                }
            }
        }
    };

    time::timeout(config.relay_timeout, poll)
        .await
        .map_err(|_| CreateError::RelayTimeout(config.relay_timeout))
}
