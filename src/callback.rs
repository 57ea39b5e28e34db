//! Loopback listener that captures the authorization redirect.
//!
//! The listener binds `127.0.0.1`, serves `GET /callback` from its own OS thread, and records
//! the first redirect that carries either a `code` or an `error`. Waiters observe the outcome
//! through a watch channel, so the caller's runtime is free while the user agent completes
//! consent.

pub mod server;
pub mod state;

pub use state::AuthorizationRequestState;

// std
use std::{io::ErrorKind, net::TcpListener as StdTcpListener};
// crates.io
use tokio::sync::watch;
// self
use crate::{_prelude::*, callback::server::Worker, config::PortSelection, error::ConfigError};

/// Path served by the listener.
pub const CALLBACK_PATH: &str = "/callback";

const STOP_TIMEOUT: StdDuration = StdDuration::from_secs(2);

/// Short-lived HTTP server that receives the authorization redirect.
#[derive(Debug)]
pub struct CallbackListener {
	port_selection: PortSelection,
	state: Arc<watch::Sender<AuthorizationRequestState>>,
	worker: Mutex<Option<Worker>>,
}
impl CallbackListener {
	/// Creates a stopped listener.
	pub fn new(port_selection: PortSelection) -> Self {
		Self {
			port_selection,
			state: Arc::new(watch::Sender::new(AuthorizationRequestState::default())),
			worker: Mutex::new(None),
		}
	}

	/// Binds a port and starts serving. Returns the bound port.
	///
	/// Starting a running listener is a no-op that returns the current port.
	pub fn start(&self) -> Result<u16> {
		let mut worker = self.worker.lock();

		if let Some(running) = worker.as_ref() {
			tracing::warn!(port = running.port, "Callback listener is already running.");

			return Ok(running.port);
		}

		let listener = self.bind()?;
		let running = Worker::spawn(listener, self.state.clone())?;
		let port = running.port;

		tracing::info!(port, "Callback listener started.");

		*worker = Some(running);

		Ok(port)
	}

	fn bind(&self) -> Result<StdTcpListener> {
		let (base, attempts) = match self.port_selection {
			PortSelection::Fixed(port) => (port, 1),
			PortSelection::Probe { base, attempts } => (base, attempts.max(1)),
		};

		for offset in 0..attempts {
			let Some(port) = base.checked_add(offset) else { break };

			match StdTcpListener::bind(("127.0.0.1", port)) {
				Ok(listener) => return Ok(listener),
				Err(e) if e.kind() == ErrorKind::AddrInUse => {
					tracing::debug!(port, "Callback port is in use; probing the next one.");
				},
				Err(source) => return Err(Error::Bind { addr: format!("127.0.0.1:{port}"), source }),
			}
		}

		Err(Error::PortInUse { base, attempts })
	}

	/// Waits for the redirect and returns the authorization code.
	///
	/// A redirect carrying `error` resolves to [`Error::AuthorizationDenied`]. When `timeout`
	/// elapses first the listener is stopped and [`Error::CallbackTimeout`] is returned.
	pub async fn wait_for_callback(&self, timeout: StdDuration) -> Result<String> {
		if !self.is_running() {
			return Err(ConfigError::ListenerNotRunning.into());
		}

		let mut receiver = self.state.subscribe();
		let outcome = tokio::time::timeout(timeout, async {
			receiver.wait_for(AuthorizationRequestState::is_terminal).await.map(|state| state.clone())
		})
		.await;

		match outcome {
			Ok(Ok(AuthorizationRequestState { authorization_code: Some(code), .. })) => Ok(code),
			Ok(Ok(AuthorizationRequestState { error, .. })) =>
				Err(Error::AuthorizationDenied { error: error.unwrap_or_default() }),
			Ok(Err(_)) => Err(ConfigError::ListenerNotRunning.into()),
			Err(_) => {
				self.shutdown().await;

				Err(Error::CallbackTimeout { timeout })
			},
		}
	}

	/// Returns the `state` parameter captured with the code, if any.
	pub fn state(&self) -> Option<String> {
		self.state.borrow().state.clone()
	}

	/// Snapshot of everything captured so far.
	pub fn snapshot(&self) -> AuthorizationRequestState {
		self.state.borrow().clone()
	}

	/// Stops serving and releases the port. Safe to call repeatedly.
	pub fn stop(&self) {
		let Some(worker) = self.worker.lock().take() else { return };
		let port = worker.port;

		worker.stop(STOP_TIMEOUT);

		tracing::info!(port, "Callback listener stopped.");
	}

	/// Async form of [`stop`](Self::stop); the thread join runs on the blocking pool.
	pub async fn shutdown(&self) {
		let Some(worker) = self.worker.lock().take() else { return };
		let port = worker.port;

		if let Err(e) = tokio::task::spawn_blocking(move || worker.stop(STOP_TIMEOUT)).await {
			tracing::warn!(port, error = %e, "Callback listener shutdown task failed.");
		}

		tracing::info!(port, "Callback listener stopped.");
	}

	/// Returns `true` while the listener is serving.
	pub fn is_running(&self) -> bool {
		self.worker.lock().is_some()
	}

	/// Port the listener is bound to, while running.
	pub fn local_port(&self) -> Option<u16> {
		self.worker.lock().as_ref().map(|worker| worker.port)
	}

	/// Redirect URI pointing at this listener, while running.
	pub fn redirect_uri(&self) -> Option<Url> {
		self.local_port().and_then(|port| redirect_uri_for(port).ok())
	}
}
impl Drop for CallbackListener {
	fn drop(&mut self) {
		self.stop();
	}
}

/// Builds `http://localhost:<port>/callback`.
pub fn redirect_uri_for(port: u16) -> Result<Url, ConfigError> {
	Url::parse(&format!("http://localhost:{port}{CALLBACK_PATH}"))
		.map_err(|source| ConfigError::InvalidRedirect { source })
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn redirect_uri_uses_localhost() {
		assert_eq!(
			redirect_uri_for(3030).expect("Redirect URI should build.").as_str(),
			"http://localhost:3030/callback"
		);
	}

	#[tokio::test]
	async fn waiting_on_a_stopped_listener_fails() {
		let listener = CallbackListener::new(PortSelection::Fixed(0));
		let err = listener
			.wait_for_callback(StdDuration::from_millis(10))
			.await
			.expect_err("A stopped listener should not accept waiters.");

		assert!(matches!(err, Error::Config(ConfigError::ListenerNotRunning)));
	}
}
