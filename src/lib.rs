//! pagecast: browser pages as RTSP streams
//!
//! Given a page URL, pagecast renders it in a shared headless browser,
//! pipes the captured media through ffmpeg, publishes the result to an
//! RTSP relay, and hands back a stable relay address that any RTSP client
//! can consume.
//!
//! # Architecture
//!
//! ```text
//!  GET /stream?url=...          Arc<StreamManager>
//!        │                ┌──────────────────────────┐
//!        ▼                │ StreamRegistry           │
//!  [control surface] ───► │   id -> reservation      │
//!                         │       | StreamContext    │
//!                         └───────────┬──────────────┘
//!                                     │ miss: create
//!              ┌──────────────────────┼──────────────────────┐
//!              ▼                      ▼                      ▼
//!       [capture session] ──chunks─► [ffmpeg] ──publish─► [RTSP relay]
//!       (chromium page)                                      │
//!              ▲                                             ▼
//!       readiness: first chunk             readiness: producer reported
//! ```
//!
//! One URL maps deterministically to one stream id; concurrent requests
//! for the same URL share a single creation through a registry
//! reservation. A stream becomes usable only after both readiness signals
//! (capture emitting, relay receiving) arrive inside their windows. A
//! background sweeper reclaims streams with no consumers, and either owned
//! resource dying tears the whole stream down.
//!
//! The collaborators (relay, capture engine, encoder) sit behind traits;
//! the lifecycle core is exercised against mocks in the test suite.

pub mod capture;
pub mod config;
pub mod encode;
pub mod error;
pub mod relay;
pub mod server;
pub mod stream;

pub use capture::{BlockList, CaptureEngine, CaptureSession, ChromiumEngine};
pub use config::AppConfig;
pub use encode::{EncoderHandle, EncoderLauncher, FfmpegLauncher};
pub use error::{CreateError, Error, RequestError, Result};
pub use relay::{HttpRelay, RelayService, RelayStreamStats};
pub use stream::{StreamContext, StreamId, StreamManager, StreamPhase, StreamRegistry};
