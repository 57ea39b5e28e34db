//! Loopback HTTP server hosted on a dedicated OS thread.

// std
use std::{
	io,
	net::TcpListener as StdTcpListener,
	sync::mpsc::{self, RecvTimeoutError},
	thread::{self, JoinHandle},
};
// crates.io
use axum::{
	Json, Router,
	extract::{RawQuery, State},
	http::StatusCode,
	response::{IntoResponse, Response},
	routing::get,
};
use tokio::{
	net::TcpListener,
	runtime::Builder,
	sync::{oneshot, watch},
};
// self
use crate::{
	_prelude::*,
	callback::{
		CALLBACK_PATH,
		state::{AuthorizationRequestState, CallbackParams},
	},
	error::TransportError,
};

type SharedState = Arc<watch::Sender<AuthorizationRequestState>>;

/// Running server thread plus the handles needed to stop it.
#[derive(Debug)]
pub(crate) struct Worker {
	pub(crate) port: u16,
	shutdown: Option<oneshot::Sender<()>>,
	exited: mpsc::Receiver<()>,
	handle: Option<JoinHandle<()>>,
}
impl Worker {
	/// Moves `listener` onto a new thread and serves the callback route until shutdown.
	///
	/// The thread owns its runtime, so a failed startup never drops a runtime on the
	/// caller's thread.
	pub(crate) fn spawn(listener: StdTcpListener, state: SharedState) -> Result<Self> {
		let port = listener.local_addr().map_err(TransportError::Io)?.port();

		listener.set_nonblocking(true).map_err(TransportError::Io)?;

		let (shutdown_tx, shutdown_rx) = oneshot::channel();
		let (exit_tx, exited) = mpsc::channel();
		let (ready_tx, ready_rx) = mpsc::sync_channel(1);
		let handle = thread::Builder::new()
			.name(format!("oauth-callback-{port}"))
			.spawn(move || {
				let _exit = exit_tx;

				serve(port, listener, state, shutdown_rx, ready_tx);
			})
			.map_err(TransportError::Io)?;

		match ready_rx.recv() {
			Ok(Ok(())) => Ok(Self { port, shutdown: Some(shutdown_tx), exited, handle: Some(handle) }),
			Ok(Err(e)) => {
				let _ = handle.join();

				Err(TransportError::Io(e).into())
			},
			Err(_) => {
				let _ = handle.join();

				Err(TransportError::Io(io::Error::other("callback listener thread exited during startup"))
					.into())
			},
		}
	}

	/// Signals shutdown and joins the thread, giving up after `timeout`.
	pub(crate) fn stop(mut self, timeout: StdDuration) {
		if let Some(shutdown) = self.shutdown.take() {
			let _ = shutdown.send(());
		}

		match self.exited.recv_timeout(timeout) {
			Ok(()) | Err(RecvTimeoutError::Disconnected) => {
				if let Some(handle) = self.handle.take()
					&& handle.join().is_err()
				{
					tracing::warn!(port = self.port, "Callback listener thread panicked.");
				}
			},
			Err(RecvTimeoutError::Timeout) => {
				tracing::warn!(
					port = self.port,
					?timeout,
					"Callback listener did not stop in time; detaching its thread."
				);
			},
		}
	}
}

fn serve(
	port: u16,
	listener: StdTcpListener,
	state: SharedState,
	shutdown: oneshot::Receiver<()>,
	ready: mpsc::SyncSender<io::Result<()>>,
) {
	let runtime = match Builder::new_current_thread().enable_all().build() {
		Ok(runtime) => runtime,
		Err(e) => {
			let _ = ready.send(Err(e));

			return;
		},
	};

	runtime.block_on(async move {
		let listener = match TcpListener::from_std(listener) {
			Ok(listener) => listener,
			Err(e) => {
				let _ = ready.send(Err(e));

				return;
			},
		};
		let _ = ready.send(Ok(()));
		let serve = axum::serve(listener, router(state)).with_graceful_shutdown(async {
			let _ = shutdown.await;
		});

		if let Err(e) = serve.await {
			tracing::error!(port, error = %e, "Callback listener stopped with an error.");
		}
	});
}

fn router(state: SharedState) -> Router {
	Router::new()
		.route(CALLBACK_PATH, get(handle_callback))
		.fallback(|| async { StatusCode::NOT_FOUND })
		.with_state(state)
}

async fn handle_callback(State(state): State<SharedState>, RawQuery(query): RawQuery) -> Response {
	let params = CallbackParams::parse(query.as_deref().unwrap_or_default());
	let status = if let Some(code) = params.code {
		let recorded = state.send_if_modified(|current| current.record_code(code, params.state));

		tracing::info!(recorded, "Authorization code received on the callback listener.");

		StatusCode::OK
	} else if let Some(error) = params.error {
		tracing::warn!(
			error = %error,
			description = params.error_description.as_deref().unwrap_or_default(),
			"Authorization server redirected with an error."
		);

		state.send_if_modified(|current| current.record_error(error));

		StatusCode::BAD_REQUEST
	} else {
		return StatusCode::NOT_FOUND.into_response();
	};
	let echo = state.borrow().clone();

	(status, Json(echo)).into_response()
}
