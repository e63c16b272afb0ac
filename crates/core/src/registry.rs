//! Authoritative session registry.
//!
//! Process-wide mapping from session name to session state and client
//! handle, encapsulated behind explicit construction rather than ambient
//! globals. All client-handle access passes through here; lock scopes are
//! short and never held across an await.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use wa_client::{ChatClient, ClientEvent};

use crate::error::{Error, Result};
use crate::session::{EventOutcome, QrSlot, Session, SessionState, SessionSummary};

/// Result of routing an engine event through the registry.
pub enum Routed {
	/// Applied (or ignored as out-of-order); the session remains live.
	Kept,
	/// The session disconnected; its entry was removed and the released
	/// client handle is returned for best-effort teardown.
	Removed(Arc<dyn ChatClient>),
	/// No session is registered under the event's name.
	Unknown,
}

/// Registry of live sessions.
#[derive(Default)]
pub struct SessionRegistry {
	sessions: Mutex<HashMap<String, Session>>,
}

impl SessionRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	/// Registers a fresh session in state `New`.
	///
	/// Idempotent-rejecting: a second create for the same name fails with
	/// `AlreadyExists` instead of replacing the live handle.
	pub fn create(&self, name: &str, client: Arc<dyn ChatClient>) -> Result<()> {
		let mut sessions = self.sessions.lock();
		if sessions.contains_key(name) {
			return Err(Error::AlreadyExists(name.to_string()));
		}
		sessions.insert(name.to_string(), Session::new(name.to_string(), client));
		Ok(())
	}

	pub fn contains(&self, name: &str) -> bool {
		self.sessions.lock().contains_key(name)
	}

	pub fn len(&self) -> usize {
		self.sessions.lock().len()
	}

	pub fn is_empty(&self) -> bool {
		self.sessions.lock().is_empty()
	}

	/// Registered session names, for status reporting.
	pub fn names(&self) -> Vec<String> {
		self.sessions.lock().keys().cloned().collect()
	}

	/// Snapshot of all sessions. Ordering is not meaningful.
	pub fn summaries(&self) -> Vec<SessionSummary> {
		self.sessions.lock().values().map(Session::summary).collect()
	}

	/// Deregisters and returns the session. Idempotent no-op when absent
	/// (disconnect may already have cleared it).
	pub fn remove(&self, name: &str) -> Option<Session> {
		self.sessions.lock().remove(name)
	}

	/// Drains every session, for shutdown.
	pub fn drain(&self) -> Vec<Session> {
		self.sessions.lock().drain().map(|(_, s)| s).collect()
	}

	/// The session's QR slot, cloned out so waiting never holds the lock.
	pub fn qr_slot(&self, name: &str) -> Option<Arc<QrSlot>> {
		self.sessions.lock().get(name).map(|s| Arc::clone(&s.qr))
	}

	/// Client handle of a session that has reached `Connected`.
	///
	/// Outbound operations go through here so a not-yet-ready session fails
	/// with `SessionNotReady` instead of silently no-opping.
	pub fn connected_client(&self, name: &str) -> Result<Arc<dyn ChatClient>> {
		let sessions = self.sessions.lock();
		let session = sessions
			.get(name)
			.ok_or_else(|| Error::SessionNotFound(name.to_string()))?;
		if session.state() != SessionState::Connected {
			return Err(Error::SessionNotReady(name.to_string()));
		}
		Ok(Arc::clone(&session.client))
	}

	/// The session's own platform identity, once connected.
	pub fn own_number(&self, name: &str) -> Option<String> {
		self.sessions.lock().get(name).and_then(|s| s.number.clone())
	}

	/// Routes one engine event to its session's state machine.
	///
	/// A disconnect removes the entry inside the same lock scope, so no
	/// operation can observe a terminal session.
	pub fn route_event(&self, name: &str, event: &ClientEvent) -> Routed {
		let mut sessions = self.sessions.lock();
		let Some(session) = sessions.get_mut(name) else {
			return Routed::Unknown;
		};

		match session.apply(event) {
			EventOutcome::Applied | EventOutcome::Ignored => Routed::Kept,
			EventOutcome::Disconnect => {
				let session = sessions.remove(name).expect("session present");
				Routed::Removed(session.client)
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::testing::NullClient;

	fn registry_with(name: &str) -> SessionRegistry {
		let registry = SessionRegistry::new();
		registry.create(name, Arc::new(NullClient)).unwrap();
		registry
	}

	#[test]
	fn duplicate_create_is_rejected() {
		let registry = registry_with("alpha");
		let err = registry.create("alpha", Arc::new(NullClient)).unwrap_err();
		assert!(matches!(err, Error::AlreadyExists(name) if name == "alpha"));
		assert_eq!(registry.len(), 1);
	}

	#[test]
	fn names_are_case_sensitive() {
		let registry = registry_with("alpha");
		registry.create("Alpha", Arc::new(NullClient)).unwrap();
		assert_eq!(registry.len(), 2);
	}

	#[test]
	fn remove_is_idempotent() {
		let registry = registry_with("alpha");
		assert!(registry.remove("alpha").is_some());
		assert!(registry.remove("alpha").is_none());
		assert!(registry.is_empty());
	}

	#[test]
	fn connected_client_enforces_state() {
		let registry = registry_with("alpha");

		assert!(matches!(
			registry.connected_client("missing").unwrap_err(),
			Error::SessionNotFound(_)
		));
		assert!(matches!(
			registry.connected_client("alpha").unwrap_err(),
			Error::SessionNotReady(_)
		));

		registry.route_event(
			"alpha",
			&ClientEvent::Qr {
				payload: "2@a".to_string(),
			},
		);
		registry.route_event("alpha", &ClientEvent::Authenticated);
		registry.route_event(
			"alpha",
			&ClientEvent::Ready {
				number: "551".to_string(),
			},
		);

		assert!(registry.connected_client("alpha").is_ok());
		assert_eq!(registry.own_number("alpha").as_deref(), Some("551"));
	}

	#[test]
	fn disconnect_removes_entry() {
		let registry = registry_with("alpha");
		let routed = registry.route_event(
			"alpha",
			&ClientEvent::Disconnected {
				reason: "logout".to_string(),
			},
		);
		assert!(matches!(routed, Routed::Removed(_)));
		assert!(!registry.contains("alpha"));

		let routed = registry.route_event("alpha", &ClientEvent::Authenticated);
		assert!(matches!(routed, Routed::Unknown));
	}
}
