//! Error taxonomy for the orchestration layer.

use thiserror::Error;

/// Result type alias for orchestration operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by session orchestration.
///
/// Validation and existence errors are detected locally and returned without
/// side effects; engine failures are wrapped, never silently swallowed and
/// never retried.
#[derive(Debug, Error)]
pub enum Error {
	/// Bad or missing caller input.
	#[error("invalid input: {0}")]
	Validation(String),

	/// No session registered under this name.
	#[error("session '{0}' not found")]
	SessionNotFound(String),

	/// A session with this name already exists.
	#[error("session '{0}' already exists")]
	AlreadyExists(String),

	/// Operation attempted before the session reached the connected state.
	#[error("session '{0}' is not connected")]
	SessionNotReady(String),

	/// The QR wait deadline elapsed before the engine produced a code.
	#[error("timed out after {timeout_ms}ms waiting for QR code for session '{session}'")]
	QrTimeout { session: String, timeout_ms: u64 },

	/// Graceful logout/destroy against the engine failed. The session is
	/// removed from the registry regardless.
	#[error("failed to destroy session '{session}': {source}")]
	DestroyFailed {
		session: String,
		#[source]
		source: wa_client::Error,
	},

	/// Unclassified failure surfaced by the engine.
	#[error(transparent)]
	Upstream(#[from] wa_client::Error),
}
