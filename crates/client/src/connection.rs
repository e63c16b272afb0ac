//! Request/response correlation layer over the bridge transport.
//!
//! The bridge speaks a small JSON protocol: requests carry a sequential `id`
//! and are answered by a response with the same `id`; everything without an
//! `id` is an asynchronous event (`qr`, `authenticated`, `ready`,
//! `disconnected`) that belongs to the session this bridge process serves.
//!
//! Outbound calls park a oneshot sender in a callback map keyed by request
//! id; the dispatch loop completes it when the matching response arrives.
//! Events are converted to [`ClientEvent`] and forwarded to the session's
//! event channel.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, oneshot};

use crate::error::{Error, Result};
use crate::transport::{TransportReceiver, TransportSender};
use crate::types::ClientEvent;

/// Request message sent to the bridge.
#[derive(Debug, Serialize)]
struct Request<'a> {
	id: u32,
	method: &'a str,
	params: Value,
}

/// Response message from the bridge.
#[derive(Debug, Deserialize)]
struct Response {
	id: u32,
	#[serde(default)]
	result: Option<Value>,
	#[serde(default)]
	error: Option<ErrorPayload>,
}

/// Error details attached to a failed response.
#[derive(Debug, Deserialize)]
struct ErrorPayload {
	message: String,
	#[serde(default)]
	name: Option<String>,
}

/// Event message from the bridge.
#[derive(Debug, Deserialize)]
struct Event {
	event: String,
	#[serde(default)]
	params: Value,
}

/// Discriminated union of inbound bridge messages.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Message {
	/// Response (has `id`).
	Response(Response),
	/// Event (has `event`, no `id`).
	Event(Event),
	/// Forward-compatible catch-all.
	Unknown(Value),
}

type CallbackMap = Arc<Mutex<HashMap<u32, oneshot::Sender<Result<Value>>>>>;

/// Removes the parked callback if the request future is dropped before the
/// response arrives, so abandoned calls do not pin map entries forever.
struct CallbackGuard {
	id: u32,
	callbacks: CallbackMap,
	armed: bool,
}

impl Drop for CallbackGuard {
	fn drop(&mut self) {
		if self.armed && self.callbacks.lock().remove(&self.id).is_some() {
			tracing::debug!(target = "wa.bridge", id = self.id, "removed orphaned callback");
		}
	}
}

/// Connection to one bridge process.
pub struct Connection {
	last_id: AtomicU32,
	callbacks: CallbackMap,
	outbound_tx: mpsc::UnboundedSender<Value>,
	events_tx: mpsc::UnboundedSender<ClientEvent>,
}

impl Connection {
	/// Creates a connection and returns the event stream it will feed.
	///
	/// The caller must spawn [`Connection::run`] with the transport halves
	/// for any message to flow.
	pub fn new() -> (Arc<Self>, ConnectionParts, mpsc::UnboundedReceiver<ClientEvent>) {
		let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
		let (events_tx, events_rx) = mpsc::unbounded_channel();
		let connection = Arc::new(Self {
			last_id: AtomicU32::new(0),
			callbacks: Arc::new(Mutex::new(HashMap::new())),
			outbound_tx,
			events_tx,
		});
		(connection, ConnectionParts { outbound_rx }, events_rx)
	}

	/// Sends `method` with `params` to the bridge and awaits the response.
	pub async fn call(&self, method: &str, params: Value) -> Result<Value> {
		let id = self.last_id.fetch_add(1, Ordering::SeqCst);
		tracing::debug!(target = "wa.bridge", id, method, "sending request");

		let (tx, rx) = oneshot::channel();
		self.callbacks.lock().insert(id, tx);
		let mut guard = CallbackGuard {
			id,
			callbacks: Arc::clone(&self.callbacks),
			armed: true,
		};

		let request = serde_json::to_value(Request { id, method, params })?;
		if self.outbound_tx.send(request).is_err() {
			return Err(Error::ChannelClosed);
		}

		let result = rx.await.map_err(|_| Error::ChannelClosed).and_then(|r| r);
		guard.armed = false;
		result
	}

	/// Runs the dispatch loop until the bridge closes its end.
	///
	/// Spawns the writer and reader tasks, then routes every decoded inbound
	/// message. On exit all pending callbacks are failed with
	/// [`Error::ChannelClosed`] and a synthetic `Disconnected` event is
	/// emitted so the session observes an unexpected bridge death.
	pub async fn run<W, R>(
		self: Arc<Self>,
		parts: ConnectionParts,
		mut sender: TransportSender<W>,
		receiver: TransportReceiver<R>,
		mut inbound_rx: mpsc::UnboundedReceiver<Value>,
	) where
		W: AsyncWrite + Unpin + Send + 'static,
		R: AsyncRead + Unpin + Send + 'static,
	{
		let ConnectionParts { mut outbound_rx } = parts;

		let writer_handle = tokio::spawn(async move {
			while let Some(message) = outbound_rx.recv().await {
				if let Err(e) = sender.send(message).await {
					tracing::error!(target = "wa.bridge", error = %e, "transport write failed");
					break;
				}
			}
		});

		let reader_handle = tokio::spawn(async move {
			if let Err(e) = receiver.run().await {
				tracing::error!(target = "wa.bridge", error = %e, "transport read failed");
			}
		});

		while let Some(message) = inbound_rx.recv().await {
			match serde_json::from_value::<Message>(message) {
				Ok(message) => self.dispatch(message),
				Err(e) => tracing::warn!(target = "wa.bridge", error = %e, "unparseable message"),
			}
		}

		self.close();
		let _ = reader_handle.await;
		let _ = writer_handle.await;
	}

	fn dispatch(&self, message: Message) {
		match message {
			Message::Response(response) => {
				let callback = self.callbacks.lock().remove(&response.id);
				let Some(callback) = callback else {
					tracing::warn!(
						target = "wa.bridge",
						id = response.id,
						"response for unknown request"
					);
					return;
				};

				let result = match response.error {
					Some(payload) => Err(Error::Remote {
						name: payload.name.unwrap_or_else(|| "Error".to_string()),
						message: payload.message,
					}),
					None => Ok(response.result.unwrap_or(Value::Null)),
				};
				let _ = callback.send(result);
			}
			Message::Event(event) => match parse_event(&event) {
				Ok(event) => {
					let _ = self.events_tx.send(event);
				}
				Err(e) => {
					tracing::warn!(
						target = "wa.bridge",
						event = %event.event,
						error = %e,
						"dropping malformed event"
					);
				}
			},
			Message::Unknown(value) => {
				tracing::debug!(target = "wa.bridge", message = %value, "ignoring unknown message");
			}
		}
	}

	/// Fails all pending requests and signals disconnection.
	fn close(&self) {
		let callbacks: Vec<_> = self.callbacks.lock().drain().collect();
		for (_, callback) in callbacks {
			let _ = callback.send(Err(Error::ChannelClosed));
		}
		let _ = self.events_tx.send(ClientEvent::Disconnected {
			reason: "bridge process exited".to_string(),
		});
	}

	#[cfg(test)]
	fn dispatch_value(&self, value: Value) {
		match serde_json::from_value::<Message>(value) {
			Ok(message) => self.dispatch(message),
			Err(e) => panic!("unparseable test message: {e}"),
		}
	}
}

/// Receiver half handed to [`Connection::run`] exactly once.
pub struct ConnectionParts {
	outbound_rx: mpsc::UnboundedReceiver<Value>,
}

fn parse_event(event: &Event) -> Result<ClientEvent> {
	let parsed = match event.event.as_str() {
		"qr" => ClientEvent::Qr {
			payload: require_str(&event.params, "payload")?,
		},
		"authenticated" => ClientEvent::Authenticated,
		"ready" => ClientEvent::Ready {
			number: require_str(&event.params, "number")?,
		},
		"disconnected" => ClientEvent::Disconnected {
			reason: event.params["reason"]
				.as_str()
				.unwrap_or("unknown")
				.to_string(),
		},
		other => {
			return Err(Error::ProtocolError(format!("unknown event '{other}'")));
		}
	};
	Ok(parsed)
}

fn require_str(params: &Value, field: &str) -> Result<String> {
	params[field]
		.as_str()
		.map(str::to_string)
		.ok_or_else(|| Error::ProtocolError(format!("event missing '{field}'")))
}

#[cfg(test)]
mod tests {
	use super::*;

	fn test_connection() -> (Arc<Connection>, mpsc::UnboundedReceiver<ClientEvent>) {
		let (connection, _parts, events_rx) = Connection::new();
		(connection, events_rx)
	}

	#[test]
	fn request_ids_increment() {
		let (connection, _events) = test_connection();
		assert_eq!(connection.last_id.fetch_add(1, Ordering::SeqCst), 0);
		assert_eq!(connection.last_id.fetch_add(1, Ordering::SeqCst), 1);
	}

	#[tokio::test]
	async fn response_completes_pending_call() {
		let (connection, _events) = test_connection();

		let (tx, rx) = oneshot::channel();
		connection.callbacks.lock().insert(7, tx);

		connection.dispatch_value(serde_json::json!({
			"id": 7,
			"result": {"id": "true_5511999@c.us_ABC"}
		}));

		let result = rx.await.unwrap().unwrap();
		assert_eq!(result["id"], "true_5511999@c.us_ABC");
	}

	#[tokio::test]
	async fn error_response_surfaces_remote_error() {
		let (connection, _events) = test_connection();

		let (tx, rx) = oneshot::channel();
		connection.callbacks.lock().insert(3, tx);

		connection.dispatch_value(serde_json::json!({
			"id": 3,
			"error": {"message": "number not on whatsapp", "name": "SendError"}
		}));

		let err = rx.await.unwrap().unwrap_err();
		match err {
			Error::Remote { name, message } => {
				assert_eq!(name, "SendError");
				assert_eq!(message, "number not on whatsapp");
			}
			other => panic!("expected Remote error, got {other:?}"),
		}
	}

	#[tokio::test]
	async fn events_are_forwarded_in_order() {
		let (connection, mut events) = test_connection();

		connection.dispatch_value(serde_json::json!({
			"event": "qr",
			"params": {"payload": "2@abc"}
		}));
		connection.dispatch_value(serde_json::json!({"event": "authenticated"}));
		connection.dispatch_value(serde_json::json!({
			"event": "ready",
			"params": {"number": "5511999990000"}
		}));

		assert_eq!(
			events.recv().await.unwrap(),
			ClientEvent::Qr {
				payload: "2@abc".to_string()
			}
		);
		assert_eq!(events.recv().await.unwrap(), ClientEvent::Authenticated);
		assert_eq!(
			events.recv().await.unwrap(),
			ClientEvent::Ready {
				number: "5511999990000".to_string()
			}
		);
	}

	#[tokio::test]
	async fn unknown_messages_are_ignored() {
		let (connection, mut events) = test_connection();
		connection.dispatch_value(serde_json::json!({"something": "else"}));
		connection.dispatch_value(serde_json::json!({"event": "presence", "params": {}}));
		assert!(events.try_recv().is_err());
	}

	#[tokio::test]
	async fn close_drains_callbacks_and_signals_disconnect() {
		let (connection, mut events) = test_connection();

		let (tx, rx) = oneshot::channel();
		connection.callbacks.lock().insert(1, tx);

		connection.close();

		assert!(matches!(rx.await.unwrap(), Err(Error::ChannelClosed)));
		assert!(matches!(
			events.recv().await.unwrap(),
			ClientEvent::Disconnected { .. }
		));
	}
}
