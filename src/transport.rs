//! Transport stream pairs bound to an authenticated MCP endpoint.
//!
//! A [`TransportSession`] owns a background worker that forwards every message written to
//! its [`MessageWriter`] through a [`StreamableHttpClient`] and pushes the responses into its
//! [`MessageReader`]. Dropping the session (or its [`SessionGuard`]) stops the worker.

pub mod streamable_http;

pub use streamable_http::*;

// crates.io
use tokio::{runtime::Handle, sync::mpsc, task::JoinHandle};
// self
use crate::{_prelude::*, error::TransportError};

const CHANNEL_CAPACITY: usize = 32;

/// Receiving half: responses and server-initiated messages, in arrival order.
#[derive(Debug)]
pub struct MessageReader(mpsc::Receiver<Result<JsonValue>>);
impl MessageReader {
	/// Next inbound message; `None` once the session has shut down.
	pub async fn recv(&mut self) -> Option<Result<JsonValue>> {
		self.0.recv().await
	}
}

/// Sending half: queues JSON-RPC messages for delivery.
#[derive(Clone, Debug)]
pub struct MessageWriter(mpsc::Sender<JsonValue>);
impl MessageWriter {
	/// Queues `message`; fails once the session has shut down.
	pub async fn send(&self, message: JsonValue) -> Result<()> {
		self.0.send(message).await.map_err(|_| TransportError::Closed)?;

		Ok(())
	}
}

/// Read/write channels plus the session id accessor.
#[derive(Debug)]
pub struct StreamPair {
	/// Inbound messages.
	pub reader: MessageReader,
	/// Outbound messages.
	pub writer: MessageWriter,
	session_id: SessionId,
}
impl StreamPair {
	/// Session id assigned by the server, once known.
	pub fn session_id(&self) -> Option<String> {
		self.session_id.get()
	}
}

/// Tears the session down when closed or dropped.
#[derive(Debug)]
pub struct SessionGuard {
	client: Arc<StreamableHttpClient>,
	worker: Option<JoinHandle<()>>,
}
impl SessionGuard {
	/// Stops the worker and ends the server-side session.
	pub async fn close(mut self) {
		if let Some(worker) = self.worker.take() {
			worker.abort();
		}
		if let Err(e) = self.client.terminate().await {
			tracing::warn!(error = %e, "Failed to terminate the MCP session.");
		}
	}
}
impl Drop for SessionGuard {
	fn drop(&mut self) {
		let Some(worker) = self.worker.take() else {
			return;
		};

		worker.abort();

		if self.client.session_id().get().is_none() {
			return;
		}

		// Best-effort teardown when dropped without `close`, e.g. on cancellation.
		if let Ok(handle) = Handle::try_current() {
			let client = self.client.clone();

			handle.spawn(async move {
				if let Err(e) = client.terminate().await {
					tracing::debug!(error = %e, "Deferred MCP session teardown failed.");
				}
			});
		}
	}
}

/// Live connection to an MCP endpoint.
#[derive(Debug)]
pub struct TransportSession {
	streams: StreamPair,
	guard: SessionGuard,
}
impl TransportSession {
	/// Starts the forwarding worker for `client` on the current tokio runtime.
	pub fn open(client: StreamableHttpClient) -> Self {
		let client = Arc::new(client);
		let (writer_tx, writer_rx) = mpsc::channel(CHANNEL_CAPACITY);
		let (reader_tx, reader_rx) = mpsc::channel(CHANNEL_CAPACITY);
		let worker = tokio::spawn(forward(client.clone(), writer_rx, reader_tx));
		let streams = StreamPair {
			reader: MessageReader(reader_rx),
			writer: MessageWriter(writer_tx),
			session_id: client.session_id(),
		};

		Self { streams, guard: SessionGuard { client, worker: Some(worker) } }
	}

	/// Mutable access to the stream pair.
	pub fn streams(&mut self) -> &mut StreamPair {
		&mut self.streams
	}

	/// Session id assigned by the server, once known.
	pub fn session_id(&self) -> Option<String> {
		self.streams.session_id()
	}

	/// Splits into the stream pair and the guard that owns teardown.
	pub fn into_parts(self) -> (StreamPair, SessionGuard) {
		(self.streams, self.guard)
	}

	/// Closes the session, ending it on the server.
	pub async fn close(self) {
		self.guard.close().await;
	}
}

async fn forward(
	client: Arc<StreamableHttpClient>,
	mut outbound: mpsc::Receiver<JsonValue>,
	inbound: mpsc::Sender<Result<JsonValue>>,
) {
	while let Some(message) = outbound.recv().await {
		match client.send(&message).await {
			Ok(replies) =>
				for reply in replies {
					if inbound.send(Ok(reply)).await.is_err() {
						return;
					}
				},
			Err(e) =>
				if inbound.send(Err(e)).await.is_err() {
					return;
				},
		}
	}
}
