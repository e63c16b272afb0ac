//! Stdio transport for the bridge process.
//!
//! Messages are framed as a 4-byte little-endian length prefix followed by a
//! JSON payload, over the child process's stdin/stdout. The transport is
//! generic over `AsyncRead`/`AsyncWrite` so tests can run it against
//! in-memory duplex pipes.

use serde_json::Value;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;

use crate::error::{Error, Result};

/// Frames larger than this are treated as a protocol violation.
const MAX_FRAME_BYTES: u32 = 64 * 1024 * 1024;

/// Writer half: frames and sends outbound JSON messages.
pub struct TransportSender<W> {
	writer: W,
}

impl<W: AsyncWrite + Unpin + Send> TransportSender<W> {
	/// Sends one framed message.
	pub async fn send(&mut self, message: Value) -> Result<()> {
		let payload = serde_json::to_vec(&message)?;
		let length = u32::try_from(payload.len())
			.map_err(|_| Error::TransportError("outbound frame too large".to_string()))?;
		self.writer.write_all(&length.to_le_bytes()).await?;
		self.writer.write_all(&payload).await?;
		self.writer.flush().await?;
		Ok(())
	}
}

/// Reader half: decodes inbound frames and forwards them to a channel.
pub struct TransportReceiver<R> {
	reader: R,
	inbound_tx: mpsc::UnboundedSender<Value>,
}

impl<R: AsyncRead + Unpin + Send> TransportReceiver<R> {
	/// Reads frames until EOF or an unrecoverable error.
	///
	/// A frame that fails to parse as JSON is logged and skipped; the bridge
	/// may interleave diagnostics we do not understand.
	pub async fn run(mut self) -> Result<()> {
		loop {
			let mut len_buf = [0u8; 4];
			match self.reader.read_exact(&mut len_buf).await {
				Ok(_) => {}
				Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(()),
				Err(e) => return Err(e.into()),
			}

			let length = u32::from_le_bytes(len_buf);
			if length > MAX_FRAME_BYTES {
				return Err(Error::TransportError(format!(
					"inbound frame of {length} bytes exceeds limit"
				)));
			}

			let mut payload = vec![0u8; length as usize];
			self.reader.read_exact(&mut payload).await?;

			match serde_json::from_slice::<Value>(&payload) {
				Ok(message) => {
					if self.inbound_tx.send(message).is_err() {
						// Receiver side is gone; nothing left to deliver to.
						return Ok(());
					}
				}
				Err(e) => {
					tracing::warn!(target = "wa.transport", error = %e, "skipping unparseable frame");
				}
			}
		}
	}
}

/// Paired transport halves over a spawned process's stdio.
pub struct PipeTransport<W, R> {
	sender: TransportSender<W>,
	receiver: TransportReceiver<R>,
}

impl<W, R> PipeTransport<W, R>
where
	W: AsyncWrite + Unpin + Send,
	R: AsyncRead + Unpin + Send,
{
	/// Builds a transport over `writer`/`reader` and returns the channel on
	/// which decoded inbound messages are delivered.
	pub fn new(writer: W, reader: R) -> (Self, mpsc::UnboundedReceiver<Value>) {
		let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
		(
			Self {
				sender: TransportSender { writer },
				receiver: TransportReceiver { reader, inbound_tx },
			},
			inbound_rx,
		)
	}

	/// Splits into independently-owned sender and receiver halves.
	pub fn into_parts(self) -> (TransportSender<W>, TransportReceiver<R>) {
		(self.sender, self.receiver)
	}
}
