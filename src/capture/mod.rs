//! Capture engine
//!
//! The capture side renders a target page and emits chunks of its played
//! media. One engine (the shared browser instance) serves all streams; each
//! stream operates an isolated session within it. The manager talks to both
//! through traits so the lifecycle logic can be exercised against mocks.

pub mod chromium;

use async_trait::async_trait;
use bytes::Bytes;
use regex::Regex;
use tokio::sync::{mpsc, watch};

use crate::error::{Error, Result};

pub use chromium::ChromiumEngine;

/// Network block list applied inside capture sessions
///
/// Patterns use `*` wildcards. They are compiled to anchored regexes at
/// startup; a pattern that does not compile is a fatal configuration error.
#[derive(Debug, Clone)]
pub struct BlockList {
    patterns: Vec<String>,
    matchers: Vec<Regex>,
}

impl BlockList {
    /// Compile a set of wildcard patterns
    pub fn compile(patterns: &[String]) -> Result<Self> {
        let mut matchers = Vec::with_capacity(patterns.len());
        for pattern in patterns {
            let escaped = regex::escape(pattern).replace(r"\*", ".*");
            let anchored = format!("^{}$", escaped);
            let matcher = Regex::new(&anchored).map_err(|e| {
                Error::Config(format!("invalid block-list pattern {:?}: {}", pattern, e))
            })?;
            matchers.push(matcher);
        }
        Ok(Self {
            patterns: patterns.to_vec(),
            matchers,
        })
    }

    /// An empty block list
    pub fn empty() -> Self {
        Self {
            patterns: Vec::new(),
            matchers: Vec::new(),
        }
    }

    /// Whether a request URL matches any pattern
    ///
    /// Reference predicate for the wildcard semantics. The chromium engine
    /// filters with the browser's native URL blocking and passes the raw
    /// patterns through; compilation here exists to reject bad patterns at
    /// startup.
    pub fn is_blocked(&self, url: &str) -> bool {
        self.matchers.iter().any(|m| m.is_match(url))
    }

    /// The raw patterns, for engines with native URL blocking
    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    /// Whether the list has no patterns
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

/// One isolated capture session
///
/// Delivers media chunks into the sink it was opened with; the two watch
/// channels expose the capture-ready and closed signals.
#[async_trait]
pub trait CaptureSession: Send + Sync {
    /// Flips to true when the injected script delivers its first chunk
    fn chunks_started(&self) -> watch::Receiver<bool>;

    /// Flips to true when the session ends for any reason
    fn closed(&self) -> watch::Receiver<bool>;

    /// Close the session; idempotent
    async fn close(&self) -> Result<()>;
}

/// The shared capture engine
#[async_trait]
pub trait CaptureEngine: Send + Sync {
    /// Open a session for a target URL
    ///
    /// The block list filters page network requests, the script is injected
    /// before any page code runs, and media chunks are pushed into `sink`.
    async fn open(
        &self,
        url: &str,
        block_list: &BlockList,
        script: &str,
        sink: mpsc::Sender<Bytes>,
    ) -> Result<Box<dyn CaptureSession>>;

    /// Release the engine
    ///
    /// Called once at process shutdown, after every session is gone.
    async fn shutdown(&self) -> Result<()>;
}

/// Built-in capture script
///
/// Records the page's `<video>` element (or, when none exists, a canvas
/// repaint of the page) with `MediaRecorder` and forwards each chunk to the
/// host through the chunk binding as base64.
pub const DEFAULT_CAPTURE_SCRIPT: &str = r#"
(() => {
  const CHUNK_MS = 250;

  const pickStream = () => {
    const video = document.querySelector('video');
    if (video && video.captureStream) {
      return video.captureStream();
    }
    const canvas = document.createElement('canvas');
    canvas.width = window.innerWidth || 1280;
    canvas.height = window.innerHeight || 720;
    return canvas.captureStream(30);
  };

  const start = () => {
    let stream;
    try {
      stream = pickStream();
    } catch (err) {
      setTimeout(start, 500);
      return;
    }
    if (!stream || stream.getTracks().length === 0) {
      setTimeout(start, 500);
      return;
    }
    const recorder = new MediaRecorder(stream, { mimeType: 'video/webm' });
    recorder.ondataavailable = async (event) => {
      if (!event.data || event.data.size === 0) return;
      const buffer = await event.data.arrayBuffer();
      let binary = '';
      const bytes = new Uint8Array(buffer);
      for (let i = 0; i < bytes.length; i++) {
        binary += String.fromCharCode(bytes[i]);
      }
      window.__pagecastChunk(btoa(binary));
    };
    recorder.start(CHUNK_MS);
  };

  if (document.readyState === 'complete') {
    start();
  } else {
    window.addEventListener('load', start);
  }
})();
"#;
