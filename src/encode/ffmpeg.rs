//! ffmpeg encoder
//!
//! Spawns one ffmpeg process per stream: media chunks arrive on stdin and
//! the encoded result is published to the relay over RTSP. A pump task
//! drains the chunk channel into stdin; a wait task observes the exit and
//! handles kill requests so terminate never leaves an orphan.

use std::process::Stdio;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::sync::{mpsc, oneshot, watch, Mutex};

use super::{EncoderHandle, EncoderLauncher};
use crate::config::EncoderConfig;
use crate::error::{Error, Result};

/// Launches ffmpeg processes from the configured template
pub struct FfmpegLauncher {
    config: EncoderConfig,
}

impl FfmpegLauncher {
    pub fn new(config: EncoderConfig) -> Self {
        Self { config }
    }

    fn build_args(&self, publish_url: &str) -> Vec<String> {
        let mut args: Vec<String> = vec![
            "-hide_banner".into(),
            "-loglevel".into(),
            "error".into(),
            "-i".into(),
            "pipe:0".into(),
            "-c:v".into(),
            "libx264".into(),
            "-preset".into(),
            "veryfast".into(),
            "-tune".into(),
            "zerolatency".into(),
            "-b:v".into(),
            self.config.video_bitrate.clone(),
            "-c:a".into(),
            "aac".into(),
        ];
        args.extend(self.config.extra_args.iter().cloned());
        args.extend([
            "-f".into(),
            "rtsp".into(),
            "-rtsp_transport".into(),
            "tcp".into(),
            publish_url.to_string(),
        ]);
        args
    }
}

#[async_trait]
impl EncoderLauncher for FfmpegLauncher {
    async fn launch(
        &self,
        publish_url: &str,
        mut input: mpsc::Receiver<Bytes>,
    ) -> Result<Box<dyn EncoderHandle>> {
        let mut child = Command::new(&self.config.ffmpeg_path)
            .args(self.build_args(publish_url))
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::Encoder(format!("spawn {}: {}", self.config.ffmpeg_path, e)))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| Error::Encoder("ffmpeg stdin was not piped".to_string()))?;

        // Chunk pump; dropping stdin on channel close signals EOF
        tokio::spawn(async move {
            while let Some(chunk) = input.recv().await {
                if stdin.write_all(&chunk).await.is_err() {
                    break;
                }
            }
            let _ = stdin.shutdown().await;
        });

        let (exit_tx, exit_rx) = watch::channel(None);
        let (kill_tx, kill_rx) = oneshot::channel::<()>();

        tokio::spawn(async move {
            let status = tokio::select! {
                status = child.wait() => status,
                _ = kill_rx => {
                    if let Err(e) = child.start_kill() {
                        tracing::warn!(error = %e, "ffmpeg kill failed");
                    }
                    child.wait().await
                }
            };
            let code = match status {
                Ok(status) => status.code().unwrap_or(-1),
                Err(_) => -1,
            };
            tracing::debug!(code, "ffmpeg exited");
            exit_tx.send_replace(Some(code));
        });

        Ok(Box::new(FfmpegHandle {
            kill: Mutex::new(Some(kill_tx)),
            exit: exit_rx,
        }))
    }
}

struct FfmpegHandle {
    kill: Mutex<Option<oneshot::Sender<()>>>,
    exit: watch::Receiver<Option<i32>>,
}

#[async_trait]
impl EncoderHandle for FfmpegHandle {
    fn exited(&self) -> watch::Receiver<Option<i32>> {
        self.exit.clone()
    }

    async fn terminate(&self) -> Result<()> {
        if let Some(kill) = self.kill.lock().await.take() {
            let _ = kill.send(());
        }
        // Wait for the wait task to reap the process
        let mut exit = self.exit.clone();
        exit.wait_for(|code| code.is_some())
            .await
            .map_err(|_| Error::Encoder("encoder wait task vanished".to_string()))?;
        Ok(())
    }
}
