//! Service configuration
//!
//! Loaded once at startup from a TOML file and immutable afterward. Every
//! section has working defaults so the binary can run without a config file.
//! Validation that can fail (block-list compilation, script loading) happens
//! at startup, never at request time.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{Error, Result};

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    /// Control surface settings
    pub server: ServerConfig,
    /// Relay service settings
    pub relay: RelayConfig,
    /// Encoder process settings
    pub encoder: EncoderConfig,
    /// Capture engine settings
    pub capture: CaptureConfig,
    /// Handshake and reclamation timing
    pub lifecycle: LifecycleConfig,
}

/// Control surface settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    /// Address the HTTP control surface binds to
    pub bind_addr: SocketAddr,
}

/// Relay service settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RelayConfig {
    /// Base URL of the relay control API
    pub api_url: String,

    /// Host advertised in relay addresses and used for encoder publishing
    pub rtsp_host: String,

    /// RTSP port of the relay
    pub rtsp_port: u16,

    /// A stream is ready once its producer count exceeds this value
    pub producer_ready_threshold: u32,

    /// A stream is idle once its consumer count is at or below this value
    pub idle_consumer_threshold: u32,
}

/// Encoder process settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EncoderConfig {
    /// ffmpeg executable
    pub ffmpeg_path: String,

    /// Target video bitrate, passed to `-b:v`
    pub video_bitrate: String,

    /// Extra arguments inserted before the output specification
    pub extra_args: Vec<String>,
}

/// Capture engine settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CaptureConfig {
    /// URL patterns blocked inside capture sessions (`*` wildcards)
    pub block_list: Vec<String>,

    /// Path to the injected capture script; the built-in recorder is used
    /// when absent
    pub script_path: Option<PathBuf>,

    /// Run the browser headless
    pub headless: bool,

    /// Additional chromium command-line flags
    pub chromium_args: Vec<String>,
}

/// Handshake and reclamation timing
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LifecycleConfig {
    /// Window for the capture-ready signal, in seconds
    pub capture_ready_timeout_secs: u64,

    /// Window for the relay-producer-ready signal, in seconds
    pub relay_ready_timeout_secs: u64,

    /// Relay readiness poll interval, in milliseconds
    pub relay_poll_interval_ms: u64,

    /// Reclamation sweep period, in seconds
    pub sweep_interval_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
        }
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            api_url: "http://127.0.0.1:9997".to_string(),
            rtsp_host: "127.0.0.1".to_string(),
            rtsp_port: 8554,
            producer_ready_threshold: 1,
            idle_consumer_threshold: 0,
        }
    }
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: "ffmpeg".to_string(),
            video_bitrate: "2500k".to_string(),
            extra_args: Vec::new(),
        }
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            block_list: Vec::new(),
            script_path: None,
            headless: true,
            chromium_args: Vec::new(),
        }
    }
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            capture_ready_timeout_secs: 30,
            relay_ready_timeout_secs: 30,
            relay_poll_interval_ms: 200,
            sweep_interval_secs: 10,
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {}", path.display(), e)))?;
        toml::from_str(&raw)
            .map_err(|e| Error::Config(format!("cannot parse {}: {}", path.display(), e)))
    }

    /// Set the control surface bind address
    pub fn bind(mut self, addr: SocketAddr) -> Self {
        self.server.bind_addr = addr;
        self
    }
}

impl CaptureConfig {
    /// Resolve the injected capture script text
    ///
    /// Reads `script_path` when set, otherwise falls back to the built-in
    /// recorder script. An unreadable path is a startup error.
    pub fn load_script(&self) -> Result<String> {
        match &self.script_path {
            Some(path) => std::fs::read_to_string(path).map_err(|e| {
                Error::Config(format!("cannot read capture script {}: {}", path.display(), e))
            }),
            None => Ok(crate::capture::DEFAULT_CAPTURE_SCRIPT.to_string()),
        }
    }
}

impl LifecycleConfig {
    /// Capture-ready window
    pub fn capture_ready_timeout(&self) -> Duration {
        Duration::from_secs(self.capture_ready_timeout_secs)
    }

    /// Relay-producer-ready window
    pub fn relay_ready_timeout(&self) -> Duration {
        Duration::from_secs(self.relay_ready_timeout_secs)
    }

    /// Relay readiness poll interval
    pub fn relay_poll_interval(&self) -> Duration {
        Duration::from_millis(self.relay_poll_interval_ms)
    }

    /// Reclamation sweep period
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}
