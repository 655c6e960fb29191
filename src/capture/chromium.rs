//! Chromium capture engine
//!
//! One headless browser process is shared by every stream; each stream gets
//! its own page. The capture script is injected before any page code runs
//! and hands media chunks to the host through a CDP binding
//! (`__pagecastChunk`) as base64. Custom scripts must call the same
//! binding. Block-list patterns are applied with the browser's native URL
//! blocking.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use bytes::Bytes;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::{
    EnableParams as NetworkEnableParams, SetBlockedUrLsParams,
};
use chromiumoxide::cdp::browser_protocol::page::{
    AddScriptToEvaluateOnNewDocumentParams, CloseParams,
};
use chromiumoxide::cdp::js_protocol::runtime::{AddBindingParams, EventBindingCalled};
use chromiumoxide::Page;
use futures::StreamExt;
use tokio::sync::{mpsc, watch, Mutex};

use super::{BlockList, CaptureEngine, CaptureSession};
use crate::config::CaptureConfig;
use crate::error::{Error, Result};

/// Name of the binding the capture script pushes chunks through
const CHUNK_BINDING: &str = "__pagecastChunk";

/// Shared browser instance
///
/// Launched once at startup and released once at shutdown, after all
/// sessions are gone.
pub struct ChromiumEngine {
    browser: Mutex<Option<Browser>>,
    handler_task: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl ChromiumEngine {
    /// Launch the shared browser
    pub async fn launch(config: &CaptureConfig) -> Result<Self> {
        let mut builder = BrowserConfig::builder()
            .arg("--autoplay-policy=no-user-gesture-required")
            .arg("--disable-gpu");
        for arg in &config.chromium_args {
            builder = builder.arg(arg);
        }
        if !config.headless {
            builder = builder.with_head();
        }
        let browser_config = builder.build().map_err(Error::Capture)?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| Error::Capture(format!("browser launch failed: {}", e)))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    tracing::debug!(error = %e, "browser handler event error");
                }
            }
            tracing::debug!("browser handler loop ended");
        });

        tracing::info!("capture engine launched");
        Ok(Self {
            browser: Mutex::new(Some(browser)),
            handler_task: Mutex::new(Some(handler_task)),
        })
    }
}

#[async_trait]
impl CaptureEngine for ChromiumEngine {
    async fn open(
        &self,
        url: &str,
        block_list: &BlockList,
        script: &str,
        sink: mpsc::Sender<Bytes>,
    ) -> Result<Box<dyn CaptureSession>> {
        let browser = self.browser.lock().await;
        let browser = browser
            .as_ref()
            .ok_or_else(|| Error::Capture("capture engine is shut down".to_string()))?;

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| Error::Capture(format!("new page: {}", e)))?;

        page.execute(AddBindingParams::new(CHUNK_BINDING))
            .await
            .map_err(|e| Error::Capture(format!("add binding: {}", e)))?;
        page.execute(AddScriptToEvaluateOnNewDocumentParams::new(script))
            .await
            .map_err(|e| Error::Capture(format!("inject script: {}", e)))?;

        if !block_list.is_empty() {
            page.execute(NetworkEnableParams::default())
                .await
                .map_err(|e| Error::Capture(format!("network enable: {}", e)))?;
            page.execute(SetBlockedUrLsParams::new(block_list.patterns().to_vec()))
                .await
                .map_err(|e| Error::Capture(format!("set blocked urls: {}", e)))?;
        }

        let mut bindings = page
            .event_listener::<EventBindingCalled>()
            .await
            .map_err(|e| Error::Capture(format!("binding listener: {}", e)))?;

        let (ready_tx, ready_rx) = watch::channel(false);
        let (closed_tx, closed_rx) = watch::channel(false);

        // Chunk forwarding runs on its own task; when the event stream ends
        // the page is gone and the session is reported closed.
        tokio::spawn(async move {
            while let Some(event) = bindings.next().await {
                if event.name != CHUNK_BINDING {
                    continue;
                }
                let chunk = match BASE64.decode(event.payload.as_bytes()) {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        tracing::warn!(error = %e, "discarding undecodable media chunk");
                        continue;
                    }
                };
                ready_tx.send_replace(true);
                if sink.send(Bytes::from(chunk)).await.is_err() {
                    // Encoder side went away; stop forwarding
                    break;
                }
            }
            closed_tx.send_replace(true);
        });

        page.goto(url)
            .await
            .map_err(|e| Error::Capture(format!("navigate {}: {}", url, e)))?;

        tracing::debug!(url, "capture session opened");
        Ok(Box::new(ChromiumSession {
            page,
            ready: ready_rx,
            closed: closed_rx,
        }))
    }

    async fn shutdown(&self) -> Result<()> {
        let mut browser = match self.browser.lock().await.take() {
            Some(browser) => browser,
            None => return Ok(()),
        };
        if let Err(e) = browser.close().await {
            tracing::warn!(error = %e, "browser close failed");
        }
        if let Err(e) = browser.wait().await {
            tracing::warn!(error = %e, "browser wait failed");
        }
        if let Some(task) = self.handler_task.lock().await.take() {
            let _ = task.await;
        }
        tracing::info!("capture engine released");
        Ok(())
    }
}

struct ChromiumSession {
    page: Page,
    ready: watch::Receiver<bool>,
    closed: watch::Receiver<bool>,
}

#[async_trait]
impl CaptureSession for ChromiumSession {
    fn chunks_started(&self) -> watch::Receiver<bool> {
        self.ready.clone()
    }

    fn closed(&self) -> watch::Receiver<bool> {
        self.closed.clone()
    }

    async fn close(&self) -> Result<()> {
        if *self.closed.borrow() {
            return Ok(());
        }
        self.page
            .execute(CloseParams::default())
            .await
            .map_err(|e| Error::Capture(format!("page close: {}", e)))?;
        Ok(())
    }
}
