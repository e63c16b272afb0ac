//! Session orchestration layer.
//!
//! Supervises independent chat-platform sessions: creates, tracks,
//! authenticates, and tears them down; bridges the engine's asynchronous
//! events into request/response semantics for QR retrieval; and dispatches
//! outbound operations against the correct session.
//!
//! The engine itself lives behind the `wa_client::ChatClient` trait. One
//! spawned task per session pumps engine events into the registry, so a
//! session's events apply in emission order and no session's events can
//! corrupt another's state.

pub mod error;
pub mod lifecycle;
pub mod ops;
pub mod qr;
pub mod registry;
pub mod session;

pub use error::{Error, Result};
pub use lifecycle::{DEFAULT_QR_TIMEOUT, SessionManager};
pub use ops::{Contact, chat_id, normalize_number};
pub use registry::SessionRegistry;
pub use session::{SessionState, SessionSummary};
