//! Error types for the bridge client.

use thiserror::Error;

/// Result type alias for bridge client operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while driving the WhatsApp bridge.
#[derive(Debug, Error)]
pub enum Error {
	/// Bridge script was not found anywhere in the search path.
	#[error("WhatsApp bridge not found. Install with: npm install -g wa-bridge")]
	BridgeNotFound,

	/// Failed to spawn the bridge process.
	#[error("Failed to launch WhatsApp bridge: {0}. Check that Node.js is installed.")]
	LaunchFailed(String),

	/// Transport-level error (stdio framing).
	#[error("Transport error: {0}")]
	TransportError(String),

	/// Protocol-level error (malformed bridge messages).
	#[error("Protocol error: {0}")]
	ProtocolError(String),

	/// Error reported by the bridge for a specific request.
	#[error("{name}: {message}")]
	Remote {
		/// Error type name reported by the bridge (e.g., "TimeoutError").
		name: String,
		/// Human-readable error message.
		message: String,
	},

	/// Connection to the bridge process closed before the request resolved.
	#[error("Bridge connection closed unexpectedly")]
	ChannelClosed,

	/// I/O error.
	#[error("I/O error: {0}")]
	Io(#[from] std::io::Error),

	/// JSON serialization/deserialization error.
	#[error("JSON error: {0}")]
	Json(#[from] serde_json::Error),
}
