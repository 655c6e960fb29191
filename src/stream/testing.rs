//! Mock collaborators for lifecycle tests
//!
//! In-memory stand-ins for the relay service, the capture engine, and the
//! encoder launcher, with hooks to trigger the signals the manager reacts
//! to and counters to assert resource handling.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::{mpsc, watch};

use crate::capture::{BlockList, CaptureEngine, CaptureSession};
use crate::encode::{EncoderHandle, EncoderLauncher};
use crate::error::{Error, Result};
use crate::relay::{RelayService, RelayStreamStats};

/// Mock relay with scriptable stats and failure injection
pub struct MockRelay {
    stats: Mutex<HashMap<String, RelayStreamStats>>,
    created: Mutex<Vec<(String, String)>>,
    auto_ready: AtomicBool,
    fail_remaining: AtomicUsize,
    fail_all: AtomicBool,
}

impl MockRelay {
    /// A relay that reports every created stream as immediately ready
    pub fn new() -> Self {
        Self {
            stats: Mutex::new(HashMap::new()),
            created: Mutex::new(Vec::new()),
            auto_ready: AtomicBool::new(true),
            fail_remaining: AtomicUsize::new(0),
            fail_all: AtomicBool::new(false),
        }
    }

    pub fn set_auto_ready(&self, auto: bool) {
        self.auto_ready.store(auto, Ordering::SeqCst);
    }

    pub fn set_stats(&self, name: &str, stats: RelayStreamStats) {
        self.stats.lock().unwrap().insert(name.to_string(), stats);
    }

    pub fn set_consumers(&self, name: &str, consumers: u32) {
        let mut stats = self.stats.lock().unwrap();
        let entry = stats.entry(name.to_string()).or_default();
        entry.consumer_count = consumers;
    }

    pub fn forget(&self, name: &str) {
        self.stats.lock().unwrap().remove(name);
    }

    /// Fail the next `n` listing calls
    pub fn fail_next_listings(&self, n: usize) {
        self.fail_remaining.store(n, Ordering::SeqCst);
    }

    /// Fail every listing call until cleared
    pub fn fail_all_listings(&self, fail: bool) {
        self.fail_all.store(fail, Ordering::SeqCst);
    }

    pub fn created(&self) -> Vec<(String, String)> {
        self.created.lock().unwrap().clone()
    }
}

impl Default for MockRelay {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RelayService for MockRelay {
    async fn create(&self, name: &str, source: &str) -> Result<()> {
        self.created
            .lock()
            .unwrap()
            .push((name.to_string(), source.to_string()));
        if self.auto_ready.load(Ordering::SeqCst) {
            self.stats.lock().unwrap().insert(
                name.to_string(),
                RelayStreamStats {
                    producer_count: 2,
                    consumer_count: 1,
                },
            );
        }
        Ok(())
    }

    async fn list_all(&self) -> Result<HashMap<String, RelayStreamStats>> {
        if self.fail_all.load(Ordering::SeqCst) {
            return Err(Error::Relay("relay unreachable".to_string()));
        }
        let remaining = self.fail_remaining.load(Ordering::SeqCst);
        if remaining > 0 {
            self.fail_remaining.store(remaining - 1, Ordering::SeqCst);
            return Err(Error::Relay("relay unreachable".to_string()));
        }
        Ok(self.stats.lock().unwrap().clone())
    }
}

/// Shared state behind one mock capture session
pub struct MockSessionState {
    ready: watch::Sender<bool>,
    closed: watch::Sender<bool>,
    close_count: AtomicUsize,
}

impl MockSessionState {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            ready: watch::channel(false).0,
            closed: watch::channel(false).0,
            close_count: AtomicUsize::new(0),
        })
    }

    /// Simulate the first media chunk arriving
    pub fn mark_ready(&self) {
        self.ready.send_replace(true);
    }

    /// Simulate the session closing on its own
    pub fn mark_closed(&self) {
        self.closed.send_replace(true);
    }

    pub fn close_called(&self) -> bool {
        self.close_count.load(Ordering::SeqCst) > 0
    }

    pub fn close_count(&self) -> usize {
        self.close_count.load(Ordering::SeqCst)
    }

    /// A session handle backed by this state
    pub fn handle(self: &Arc<Self>) -> Box<dyn CaptureSession> {
        Box::new(MockSession {
            state: Arc::clone(self),
        })
    }
}

struct MockSession {
    state: Arc<MockSessionState>,
}

#[async_trait]
impl CaptureSession for MockSession {
    fn chunks_started(&self) -> watch::Receiver<bool> {
        self.state.ready.subscribe()
    }

    fn closed(&self) -> watch::Receiver<bool> {
        self.state.closed.subscribe()
    }

    async fn close(&self) -> Result<()> {
        self.state.close_count.fetch_add(1, Ordering::SeqCst);
        self.state.closed.send_replace(true);
        Ok(())
    }
}

/// Mock capture engine producing `MockSessionState`-backed sessions
pub struct MockEngine {
    sessions: Mutex<Vec<Arc<MockSessionState>>>,
    opened_urls: Mutex<Vec<String>>,
    ready_on_open: AtomicBool,
    fail_open: AtomicBool,
    shutdown_called: AtomicBool,
}

impl MockEngine {
    /// An engine whose sessions report chunks immediately
    pub fn new() -> Self {
        Self {
            sessions: Mutex::new(Vec::new()),
            opened_urls: Mutex::new(Vec::new()),
            ready_on_open: AtomicBool::new(true),
            fail_open: AtomicBool::new(false),
            shutdown_called: AtomicBool::new(false),
        }
    }

    /// Sessions stay silent until `mark_ready` is called on them
    pub fn set_ready_on_open(&self, ready: bool) {
        self.ready_on_open.store(ready, Ordering::SeqCst);
    }

    pub fn fail_next_open(&self, fail: bool) {
        self.fail_open.store(fail, Ordering::SeqCst);
    }

    pub fn open_count(&self) -> usize {
        self.opened_urls.lock().unwrap().len()
    }

    pub fn session(&self, index: usize) -> Arc<MockSessionState> {
        Arc::clone(&self.sessions.lock().unwrap()[index])
    }

    pub fn shutdown_called(&self) -> bool {
        self.shutdown_called.load(Ordering::SeqCst)
    }
}

impl Default for MockEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CaptureEngine for MockEngine {
    async fn open(
        &self,
        url: &str,
        _block_list: &BlockList,
        _script: &str,
        _sink: mpsc::Sender<Bytes>,
    ) -> Result<Box<dyn CaptureSession>> {
        if self.fail_open.swap(false, Ordering::SeqCst) {
            return Err(Error::Capture("browser refused to open page".to_string()));
        }
        self.opened_urls.lock().unwrap().push(url.to_string());
        let state = MockSessionState::new();
        if self.ready_on_open.load(Ordering::SeqCst) {
            state.mark_ready();
        }
        let handle = state.handle();
        self.sessions.lock().unwrap().push(state);
        Ok(handle)
    }

    async fn shutdown(&self) -> Result<()> {
        self.shutdown_called.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Shared state behind one mock encoder handle
pub struct MockEncoderState {
    exited: watch::Sender<Option<i32>>,
    terminate_count: AtomicUsize,
}

impl MockEncoderState {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            exited: watch::channel(None).0,
            terminate_count: AtomicUsize::new(0),
        })
    }

    /// Simulate an independent process exit
    pub fn signal_exit(&self, code: i32) {
        self.exited.send_replace(Some(code));
    }

    pub fn terminate_called(&self) -> bool {
        self.terminate_count.load(Ordering::SeqCst) > 0
    }

    pub fn terminate_count(&self) -> usize {
        self.terminate_count.load(Ordering::SeqCst)
    }

    /// Whether the process is gone, by exit or termination
    pub fn released(&self) -> bool {
        self.terminate_called() || self.exited.borrow().is_some()
    }

    /// An encoder handle backed by this state
    pub fn handle(self: &Arc<Self>) -> Box<dyn EncoderHandle> {
        Box::new(MockEncoder {
            state: Arc::clone(self),
        })
    }
}

struct MockEncoder {
    state: Arc<MockEncoderState>,
}

#[async_trait]
impl EncoderHandle for MockEncoder {
    fn exited(&self) -> watch::Receiver<Option<i32>> {
        self.state.exited.subscribe()
    }

    async fn terminate(&self) -> Result<()> {
        self.state.terminate_count.fetch_add(1, Ordering::SeqCst);
        self.state.exited.send_replace(Some(-1));
        Ok(())
    }
}

/// Mock encoder launcher producing `MockEncoderState`-backed handles
pub struct MockLauncher {
    encoders: Mutex<Vec<Arc<MockEncoderState>>>,
    publish_urls: Mutex<Vec<String>>,
    fail_launch: AtomicBool,
}

impl MockLauncher {
    pub fn new() -> Self {
        Self {
            encoders: Mutex::new(Vec::new()),
            publish_urls: Mutex::new(Vec::new()),
            fail_launch: AtomicBool::new(false),
        }
    }

    pub fn fail_next_launch(&self, fail: bool) {
        self.fail_launch.store(fail, Ordering::SeqCst);
    }

    pub fn launch_count(&self) -> usize {
        self.publish_urls.lock().unwrap().len()
    }

    pub fn encoder(&self, index: usize) -> Arc<MockEncoderState> {
        Arc::clone(&self.encoders.lock().unwrap()[index])
    }
}

impl Default for MockLauncher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EncoderLauncher for MockLauncher {
    async fn launch(
        &self,
        publish_url: &str,
        _input: mpsc::Receiver<Bytes>,
    ) -> Result<Box<dyn EncoderHandle>> {
        if self.fail_launch.swap(false, Ordering::SeqCst) {
            return Err(Error::Encoder("spawn failed".to_string()));
        }
        self.publish_urls.lock().unwrap().push(publish_url.to_string());
        let state = MockEncoderState::new();
        let handle = state.handle();
        self.encoders.lock().unwrap().push(state);
        Ok(handle)
    }
}
