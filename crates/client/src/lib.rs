//! WhatsApp bridge client.
//!
//! Drives the external engine that performs the actual platform handshake.
//! The engine is a Node.js bridge process (one per session) spoken to over a
//! length-prefixed JSON stdio protocol; this crate owns process discovery and
//! spawning, message framing, request/response correlation, and the
//! conversion of the bridge's callback-style events into a typed event
//! stream.
//!
//! Consumers depend on the [`ChatClient`] and [`ClientFactory`] traits, not
//! on the bridge implementation, so the orchestration core can be tested
//! without a running engine.

pub mod bridge;
pub mod connection;
pub mod driver;
pub mod error;
pub mod transport;
pub mod types;

pub use bridge::{BridgeClient, BridgeFactory};
pub use error::{Error, Result};
pub use types::{ChatClient, ClientEvent, ClientFactory, ContactId, ContactRecord};
