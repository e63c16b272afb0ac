//! QR handshake bridge: awaitable QR retrieval.

use std::time::Duration;

use tracing::debug;

use crate::error::{Error, Result};
use crate::lifecycle::SessionManager;

impl SessionManager {
	/// Waits for the session's next QR payload, with the default deadline.
	///
	/// Requesting a QR code for an unregistered session bootstraps it first
	/// through the normal creation path: "fetch QR for session X" has always
	/// meant "connect session X". The waiter then parks on the session's own
	/// QR slot, so concurrent waits on different sessions cannot observe
	/// each other's payloads.
	pub async fn await_qr(&self, name: &str) -> Result<String> {
		self.await_qr_with_timeout(name, self.qr_timeout()).await
	}

	/// Waits for the session's next QR payload with an explicit deadline.
	pub async fn await_qr_with_timeout(&self, name: &str, timeout: Duration) -> Result<String> {
		let name = name.trim();
		if !self.registry().contains(name) {
			debug!(
				target = "wa.session",
				session = name,
				"qr requested for unknown session; bootstrapping"
			);
			// A concurrent request may bootstrap the same name first; losing
			// that race still leaves a live session to wait on.
			match self.create_session(name) {
				Ok(()) | Err(Error::AlreadyExists(_)) => {}
				Err(err) => return Err(err),
			}
		}

		// Clone the slot out of the registry so the wait holds no lock. The
		// session may disconnect while we wait; the slot then never fires
		// and the deadline resolves the call.
		let slot = self
			.registry()
			.qr_slot(name)
			.ok_or_else(|| Error::SessionNotFound(name.to_string()))?;

		slot.wait(timeout).await.ok_or_else(|| Error::QrTimeout {
			session: name.to_string(),
			timeout_ms: timeout.as_millis() as u64,
		})
	}
}
