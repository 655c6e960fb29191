//! Relay service client
//!
//! The relay is the protocol-serving intermediary: the encoder publishes to
//! it, downstream clients consume from it, and it reports producer and
//! consumer counts per stream name. The manager reads those counts for the
//! readiness handshake and the reclamation sweep.

pub mod http;

use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::Result;

pub use http::HttpRelay;

/// Producer and consumer counts for one relay stream
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayStreamStats {
    /// Publishers the relay is receiving for this name
    pub producer_count: u32,
    /// Downstream clients currently consuming this name
    pub consumer_count: u32,
}

/// Control interface of the relay service
#[async_trait]
pub trait RelayService: Send + Sync {
    /// Register a stream path before publishing to it
    async fn create(&self, name: &str, source: &str) -> Result<()>;

    /// All stream names known to the relay with their counts
    async fn list_all(&self) -> Result<HashMap<String, RelayStreamStats>>;
}
