//! Boundary types shared between the bridge client and the orchestration core.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::Result;

/// Asynchronous event emitted by the chat-platform client during the
/// handshake and connection lifetime.
///
/// Events for a single session arrive in the order the platform emits them:
/// `Qr` (possibly repeated on refresh), `Authenticated`, `Ready`, with
/// `Disconnected` possible at any point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
	/// A QR code was produced and must be scanned to authenticate.
	Qr { payload: String },
	/// The scanned QR code was accepted; credentials are persisted.
	Authenticated,
	/// The session is fully connected and ready for outbound operations.
	Ready { number: String },
	/// The session was torn down, by the remote side or by logout.
	Disconnected { reason: String },
}

/// Platform address of a contact: `user@server`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContactId {
	pub user: String,
	pub server: String,
}

/// Raw contact record as returned by the platform client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactRecord {
	#[serde(default)]
	pub name: Option<String>,
	pub id: ContactId,
	#[serde(default)]
	pub pushname: Option<String>,
	#[serde(default)]
	pub is_me: bool,
	#[serde(default)]
	pub is_group: bool,
}

/// Opaque capability handle bound to one session.
///
/// The orchestration core never touches the underlying engine directly; every
/// provider operation goes through this trait, and every handshake event
/// comes back through the [`ClientEvent`] stream handed out at creation.
#[async_trait]
pub trait ChatClient: Send + Sync {
	/// Starts the handshake. Returns once the engine has accepted the
	/// request; connection progress is reported via events.
	async fn initialize(&self) -> Result<()>;

	/// Sends a text message to `chat_id` and returns the provider-issued
	/// message identifier.
	async fn send_message(&self, chat_id: &str, text: &str) -> Result<String>;

	/// Returns whether `chat_id` belongs to a registered platform user.
	async fn is_registered_user(&self, chat_id: &str) -> Result<bool>;

	/// Retrieves the full remote contact set.
	async fn get_contacts(&self) -> Result<Vec<ContactRecord>>;

	/// Gracefully logs the session out, invalidating stored credentials.
	async fn logout(&self) -> Result<()>;

	/// Tears the client down and releases engine resources.
	async fn destroy(&self) -> Result<()>;
}

impl std::fmt::Debug for dyn ChatClient {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str("ChatClient")
	}
}

/// Factory producing one client handle plus its event stream per session.
///
/// This is the seam the orchestration core is generic over; production code
/// wires in [`crate::bridge::BridgeFactory`], tests substitute an in-process
/// double.
pub trait ClientFactory: Send + Sync {
	/// Allocates a fresh client for `session_name`.
	fn create(
		&self,
		session_name: &str,
	) -> Result<(Arc<dyn ChatClient>, mpsc::UnboundedReceiver<ClientEvent>)>;
}
