//! Per-session state: the connection state machine and the QR slot.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::Notify;
use tracing::{debug, warn};

use wa_client::{ChatClient, ClientEvent};

/// Connection state of one session.
///
/// Transitions are monotonic along `New → AwaitingQr → Authenticated →
/// Connected`; `AwaitingQr` re-enters itself on QR refresh. The terminal
/// disconnect is modeled by removing the session from the registry rather
/// than by a stored state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
	New,
	AwaitingQr,
	Authenticated,
	Connected,
}

impl std::fmt::Display for SessionState {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let s = match self {
			SessionState::New => "new",
			SessionState::AwaitingQr => "awaiting_qr",
			SessionState::Authenticated => "authenticated",
			SessionState::Connected => "connected",
		};
		f.write_str(s)
	}
}

/// Outcome of feeding one engine event into a session.
#[derive(Debug, PartialEq, Eq)]
pub enum EventOutcome {
	/// The event was valid from the current state and was applied.
	Applied,
	/// The event arrived out of order and was dropped.
	Ignored,
	/// The session disconnected and must be removed from the registry.
	Disconnect,
}

/// Single-value notification slot holding a session's latest QR payload.
///
/// Each session owns its own slot, so concurrent QR waits on different
/// sessions can never observe each other's payloads. Publication overwrites
/// the previous value (QR refresh) and wakes all waiters.
pub struct QrSlot {
	value: Mutex<Option<String>>,
	notify: Notify,
}

impl QrSlot {
	pub fn new() -> Self {
		Self {
			value: Mutex::new(None),
			notify: Notify::new(),
		}
	}

	/// Stores a fresh payload and wakes waiters.
	pub fn publish(&self, payload: String) {
		*self.value.lock() = Some(payload);
		self.notify.notify_waiters();
	}

	/// Clears the slot once the code has been consumed by authentication.
	pub fn clear(&self) {
		*self.value.lock() = None;
	}

	/// Waits until a payload is available or `timeout` elapses.
	pub async fn wait(&self, timeout: Duration) -> Option<String> {
		let deadline = tokio::time::Instant::now() + timeout;

		loop {
			// Register with the notifier before checking the slot, so a
			// publish landing between the check and the await still wakes
			// this waiter instead of being lost until the deadline.
			let notified = self.notify.notified();
			tokio::pin!(notified);
			notified.as_mut().enable();

			if let Some(payload) = self.value.lock().clone() {
				return Some(payload);
			}

			let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
			if remaining.is_zero() {
				return None;
			}

			tokio::select! {
				_ = notified.as_mut() => {}
				_ = tokio::time::sleep(remaining) => {}
			}
		}
	}
}

impl Default for QrSlot {
	fn default() -> Self {
		Self::new()
	}
}

/// One registered session: identity, state, and the bound client handle.
///
/// Owned exclusively by the registry; the client handle only leaves as a
/// short-lived `Arc` clone for the duration of a single engine call.
pub struct Session {
	pub(crate) name: String,
	pub(crate) state: SessionState,
	pub(crate) created_at: u64,
	pub(crate) connected_at: Option<u64>,
	pub(crate) number: Option<String>,
	pub(crate) client: Arc<dyn ChatClient>,
	pub(crate) qr: Arc<QrSlot>,
}

impl Session {
	pub fn new(name: String, client: Arc<dyn ChatClient>) -> Self {
		Self {
			name,
			state: SessionState::New,
			created_at: now_ts(),
			connected_at: None,
			number: None,
			client,
			qr: Arc::new(QrSlot::new()),
		}
	}

	pub fn state(&self) -> SessionState {
		self.state
	}

	/// Applies one engine event to the state machine.
	///
	/// Events arriving out of their valid source state are logged and
	/// dropped; the engine is the sole event source and a misbehaving engine
	/// must not corrupt recorded state.
	pub fn apply(&mut self, event: &ClientEvent) -> EventOutcome {
		match (self.state, event) {
			(SessionState::New | SessionState::AwaitingQr, ClientEvent::Qr { payload }) => {
				self.state = SessionState::AwaitingQr;
				self.qr.publish(payload.clone());
				debug!(target = "wa.session", session = %self.name, "qr code published");
				EventOutcome::Applied
			}
			(SessionState::AwaitingQr, ClientEvent::Authenticated) => {
				self.state = SessionState::Authenticated;
				self.qr.clear();
				debug!(target = "wa.session", session = %self.name, "authenticated");
				EventOutcome::Applied
			}
			(SessionState::Authenticated, ClientEvent::Ready { number }) => {
				self.state = SessionState::Connected;
				self.number = Some(number.clone());
				self.connected_at = Some(now_ts());
				debug!(target = "wa.session", session = %self.name, number = %number, "connected");
				EventOutcome::Applied
			}
			(_, ClientEvent::Disconnected { reason }) => {
				debug!(target = "wa.session", session = %self.name, reason = %reason, "disconnected");
				EventOutcome::Disconnect
			}
			(state, event) => {
				warn!(
					target = "wa.session",
					session = %self.name,
					state = %state,
					event = ?event,
					"ignoring out-of-order event"
				);
				EventOutcome::Ignored
			}
		}
	}

	pub fn summary(&self) -> SessionSummary {
		SessionSummary {
			name: self.name.clone(),
			state: self.state,
			number: self.number.clone(),
			connected_at: self.connected_at,
		}
	}
}

/// Snapshot of one session for listing APIs.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
	pub name: String,
	pub state: SessionState,
	pub number: Option<String>,
	pub connected_at: Option<u64>,
}

/// Current unix timestamp in seconds.
pub(crate) fn now_ts() -> u64 {
	std::time::SystemTime::now()
		.duration_since(std::time::UNIX_EPOCH)
		.map(|d| d.as_secs())
		.unwrap_or(0)
}
