//! Encoder process
//!
//! The encoder consumes the capture session's media chunks on stdin and
//! publishes the encoded result to the relay's ingest address. The manager
//! only sees the trait pair here; the ffmpeg implementation lives in
//! [`ffmpeg`].

pub mod ffmpeg;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::{mpsc, watch};

use crate::error::Result;

pub use ffmpeg::FfmpegLauncher;

/// Handle to one running encoder process
#[async_trait]
pub trait EncoderHandle: Send + Sync {
    /// Holds `Some(exit_code)` once the process has exited
    fn exited(&self) -> watch::Receiver<Option<i32>>;

    /// Terminate the process and wait for it to exit; idempotent
    async fn terminate(&self) -> Result<()>;
}

/// Spawns encoder processes
#[async_trait]
pub trait EncoderLauncher: Send + Sync {
    /// Launch an encoder publishing to `publish_url`, fed from `input`
    async fn launch(
        &self,
        publish_url: &str,
        input: mpsc::Receiver<Bytes>,
    ) -> Result<Box<dyn EncoderHandle>>;
}
