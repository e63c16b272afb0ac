//! [`ChatClient`] implementation backed by a spawned bridge process.
//!
//! One bridge process serves exactly one session. The factory spawns it with
//! the session's credential directory, wires its stdio into a
//! [`Connection`], and returns the client handle plus the session's event
//! stream.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::process::{Child, Command};
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, warn};

use crate::connection::Connection;
use crate::driver::resolve_bridge;
use crate::error::{Error, Result};
use crate::transport::PipeTransport;
use crate::types::{ChatClient, ClientEvent, ClientFactory, ContactRecord};

/// Client handle driving one bridge process.
pub struct BridgeClient {
	session_name: String,
	connection: Arc<Connection>,
	child: Mutex<Option<Child>>,
}

#[async_trait]
impl ChatClient for BridgeClient {
	async fn initialize(&self) -> Result<()> {
		self.connection.call("initialize", json!({})).await?;
		Ok(())
	}

	async fn send_message(&self, chat_id: &str, text: &str) -> Result<String> {
		let result = self
			.connection
			.call("sendMessage", json!({"chatId": chat_id, "text": text}))
			.await?;
		result["id"]
			.as_str()
			.map(str::to_string)
			.ok_or_else(|| Error::ProtocolError("sendMessage response missing 'id'".to_string()))
	}

	async fn is_registered_user(&self, chat_id: &str) -> Result<bool> {
		let result = self
			.connection
			.call("isRegisteredUser", json!({"chatId": chat_id}))
			.await?;
		result["registered"].as_bool().ok_or_else(|| {
			Error::ProtocolError("isRegisteredUser response missing 'registered'".to_string())
		})
	}

	async fn get_contacts(&self) -> Result<Vec<ContactRecord>> {
		let result = self.connection.call("getContacts", json!({})).await?;
		let contacts = result
			.get("contacts")
			.cloned()
			.unwrap_or(Value::Array(Vec::new()));
		Ok(serde_json::from_value(contacts)?)
	}

	async fn logout(&self) -> Result<()> {
		self.connection.call("logout", json!({})).await?;
		Ok(())
	}

	async fn destroy(&self) -> Result<()> {
		// The bridge exits after acknowledging destroy; a dead bridge counts
		// as already destroyed.
		match self.connection.call("destroy", json!({})).await {
			Ok(_) | Err(Error::ChannelClosed) => {}
			Err(e) => return Err(e),
		}

		if let Some(mut child) = self.child.lock().await.take() {
			match child.wait().await {
				Ok(status) => {
					debug!(
						target = "wa.bridge",
						session = %self.session_name,
						%status,
						"bridge process exited"
					);
				}
				Err(e) => {
					warn!(
						target = "wa.bridge",
						session = %self.session_name,
						error = %e,
						"failed to reap bridge process"
					);
				}
			}
		}
		Ok(())
	}
}

/// Spawns one bridge process per session.
pub struct BridgeFactory {
	node: PathBuf,
	bridge_js: PathBuf,
	session_dir: PathBuf,
}

impl BridgeFactory {
	/// Resolves the bridge installation; `session_dir` is the root under
	/// which each session's credential directory is created.
	pub fn new(session_dir: impl Into<PathBuf>) -> Result<Self> {
		let (node, bridge_js) = resolve_bridge()?;
		Ok(Self {
			node,
			bridge_js,
			session_dir: session_dir.into(),
		})
	}
}

impl ClientFactory for BridgeFactory {
	fn create(
		&self,
		session_name: &str,
	) -> Result<(Arc<dyn ChatClient>, mpsc::UnboundedReceiver<ClientEvent>)> {
		// Credential storage is keyed by session name; the bridge owns the
		// directory's contents, we only guarantee it exists.
		let data_dir = self.session_dir.join(session_name);
		std::fs::create_dir_all(&data_dir)?;

		let mut child = Command::new(&self.node)
			.arg(&self.bridge_js)
			.arg("--session")
			.arg(session_name)
			.arg("--data-dir")
			.arg(&data_dir)
			.stdin(Stdio::piped())
			.stdout(Stdio::piped())
			.stderr(Stdio::null())
			.kill_on_drop(true)
			.spawn()
			.map_err(|e| Error::LaunchFailed(e.to_string()))?;

		let stdin = child
			.stdin
			.take()
			.ok_or_else(|| Error::LaunchFailed("bridge stdin unavailable".to_string()))?;
		let stdout = child
			.stdout
			.take()
			.ok_or_else(|| Error::LaunchFailed("bridge stdout unavailable".to_string()))?;

		let (transport, inbound_rx) = PipeTransport::new(stdin, stdout);
		let (sender, receiver) = transport.into_parts();
		let (connection, parts, events_rx) = Connection::new();

		tokio::spawn(Arc::clone(&connection).run(parts, sender, receiver, inbound_rx));

		debug!(
			target = "wa.bridge",
			session = session_name,
			data_dir = %data_dir.display(),
			"spawned bridge process"
		);

		let client = BridgeClient {
			session_name: session_name.to_string(),
			connection,
			child: Mutex::new(Some(child)),
		};
		Ok((Arc::new(client), events_rx))
	}
}
