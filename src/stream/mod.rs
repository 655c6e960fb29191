//! Stream lifecycle
//!
//! Everything with state or timing concerns lives here: the id deriver, the
//! registry that deduplicates requests, the per-stream context and its
//! state machine, the readiness handshake, the orchestrating manager, and
//! the reclamation sweeper.

pub mod context;
pub mod handshake;
pub mod id;
pub mod manager;
pub mod registry;
pub mod sweeper;

#[cfg(test)]
pub(crate) mod testing;

pub use context::{StreamContext, StreamPhase};
pub use handshake::HandshakeConfig;
pub use id::StreamId;
pub use manager::StreamManager;
pub use registry::{Reservation, StreamRegistry};
