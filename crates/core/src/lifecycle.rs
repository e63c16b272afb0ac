//! Session lifecycle orchestration: creation, event pumping, destruction.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use wa_client::{ChatClient, ClientEvent, ClientFactory};

use crate::error::{Error, Result};
use crate::registry::{Routed, SessionRegistry};

/// Default deadline for a QR wait.
pub const DEFAULT_QR_TIMEOUT: Duration = Duration::from_secs(30);

/// Facade over the orchestration layer.
///
/// Owns the registry and the client factory; cheap to clone, every clone
/// shares the same process-wide state. The daemon holds one and hands clones
/// to the HTTP layer and to spawned per-session tasks.
#[derive(Clone)]
pub struct SessionManager {
	registry: Arc<SessionRegistry>,
	factory: Arc<dyn ClientFactory>,
	qr_timeout: Duration,
}

impl SessionManager {
	pub fn new(factory: Arc<dyn ClientFactory>) -> Self {
		Self {
			registry: Arc::new(SessionRegistry::new()),
			factory,
			qr_timeout: DEFAULT_QR_TIMEOUT,
		}
	}

	/// Overrides the QR wait deadline (tests shorten it).
	pub fn with_qr_timeout(mut self, timeout: Duration) -> Self {
		self.qr_timeout = timeout;
		self
	}

	pub fn registry(&self) -> &SessionRegistry {
		&self.registry
	}

	pub(crate) fn qr_timeout(&self) -> Duration {
		self.qr_timeout
	}

	/// Creates and starts a new session.
	///
	/// Validates the name, allocates a client handle, registers it in state
	/// `New`, spawns the event pump, and kicks off the engine handshake in
	/// the background. Returns as soon as the session is registered; reaching
	/// `Connected` is observed through events, not awaited here.
	pub fn create_session(&self, name: &str) -> Result<()> {
		let name = name.trim();
		if name.is_empty() {
			return Err(Error::Validation("session name is required".to_string()));
		}

		// Reject duplicates before paying for a client allocation.
		if self.registry.contains(name) {
			return Err(Error::AlreadyExists(name.to_string()));
		}

		let (client, events) = self.factory.create(name)?;
		self.registry.create(name, Arc::clone(&client))?;
		info!(target = "wa.session", session = name, "session created");

		self.spawn_event_pump(name.to_string(), events);

		let init_name = name.to_string();
		tokio::spawn(async move {
			if let Err(e) = client.initialize().await {
				// The handshake never started; the engine will not emit a
				// disconnect on its own, so log loudly. The entry stays
				// visible in state New until destroyed.
				error!(
					target = "wa.session",
					session = %init_name,
					error = %e,
					"client initialization failed"
				);
			}
		});

		Ok(())
	}

	/// Drives engine events for one session into the registry until the
	/// session disconnects or its event stream ends.
	fn spawn_event_pump(&self, name: String, mut events: mpsc::UnboundedReceiver<ClientEvent>) {
		let registry = Arc::clone(&self.registry);
		tokio::spawn(async move {
			while let Some(event) = events.recv().await {
				match registry.route_event(&name, &event) {
					Routed::Kept => {}
					Routed::Removed(client) => {
						release_client(&name, client).await;
						break;
					}
					Routed::Unknown => {
						debug!(
							target = "wa.session",
							session = %name,
							"event for deregistered session; stopping pump"
						);
						break;
					}
				}
			}
			debug!(target = "wa.session", session = %name, "event pump finished");
		});
	}

	/// Destroys a session: graceful logout, engine teardown, deregistration.
	///
	/// The registry entry is removed up front, so even a failing engine
	/// leaves no stale session behind; the failure is still surfaced as
	/// `DestroyFailed`.
	pub async fn destroy_session(&self, name: &str) -> Result<()> {
		let session = self
			.registry
			.remove(name)
			.ok_or_else(|| Error::SessionNotFound(name.to_string()))?;

		let result = shutdown_client(session.client.as_ref()).await;
		match result {
			Ok(()) => {
				info!(target = "wa.session", session = name, "session destroyed");
				Ok(())
			}
			Err(source) => Err(Error::DestroyFailed {
				session: name.to_string(),
				source,
			}),
		}
	}

	/// Destroys every registered session, best-effort and independently.
	///
	/// One session's failure neither blocks nor aborts the others; errors
	/// are logged and not retried. Invoked on process shutdown.
	pub async fn shutdown_all(&self) {
		let sessions = self.registry.drain();
		if sessions.is_empty() {
			return;
		}
		info!(
			target = "wa.session",
			count = sessions.len(),
			"draining sessions"
		);

		let teardowns = sessions.into_iter().map(|session| async move {
			if let Err(e) = shutdown_client(session.client.as_ref()).await {
				warn!(
					target = "wa.session",
					session = %session.name,
					error = %e,
					"session teardown failed during drain"
				);
			}
		});
		join_all(teardowns).await;
	}
}

/// Logout then destroy. Logout failure does not skip destroy; the first
/// error is reported.
async fn shutdown_client(client: &dyn ChatClient) -> wa_client::Result<()> {
	let logout_result = client.logout().await;
	let destroy_result = client.destroy().await;
	logout_result.and(destroy_result)
}

/// Best-effort release of a handle whose session already disconnected.
/// Failure is logged, not propagated: the session is gone from the caller's
/// perspective either way.
async fn release_client(name: &str, client: Arc<dyn ChatClient>) {
	if let Err(e) = client.destroy().await {
		warn!(
			target = "wa.session",
			session = name,
			error = %e,
			"failed to release disconnected client"
		);
	}
}
