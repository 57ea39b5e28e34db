//! Dynamic client registration (RFC 7591).

// crates.io
use reqwest::header::{ACCEPT, CONTENT_TYPE};
// self
use crate::{
	_prelude::*,
	auth::ClientInformation,
	error::{TransportError, body_preview},
	flows::{AuthState, OAuthProvider},
	http::decode_json,
	obs::{self, FlowKind},
	provider::Discovery,
};

impl OAuthProvider {
	/// Returns the cached client registration or registers `redirect_uri` with the server.
	///
	/// A cached registration whose echoed redirect URIs do not cover `redirect_uri` (the
	/// callback port moved) is replaced.
	pub(crate) async fn ensure_client(
		&self,
		discovery: &Discovery,
		redirect_uri: &Url,
	) -> Result<ClientInformation> {
		if let Some(cached) = self.store.get_client_info().await? {
			if cached.redirect_uris.is_empty() || cached.redirect_uris.contains(redirect_uri) {
				self.transition(AuthState::Registered);

				return Ok(cached);
			}

			tracing::info!(
				client_id = %cached.client_id,
				redirect_uri = %redirect_uri,
				"Cached registration does not cover the callback URI; registering again."
			);
		}

		self.transition(AuthState::Registering);

		let info =
			obs::observe(FlowKind::Registration, "register", self.register(discovery, redirect_uri))
				.await?;

		self.store.set_client_info(info.clone()).await?;
		self.transition(AuthState::Registered);

		Ok(info)
	}

	async fn register(&self, discovery: &Discovery, redirect_uri: &Url) -> Result<ClientInformation> {
		let endpoint = &discovery.endpoints.registration;
		let metadata = self.config.client_metadata(redirect_uri.clone());
		let document = self.registration.build_registration_request(&metadata);
		let response = self
			.http_client
			.post(endpoint.clone())
			.header(CONTENT_TYPE, "application/json")
			.header(ACCEPT, "application/json")
			.body(JsonValue::Object(document).to_string())
			.send()
			.await
			.map_err(|e| TransportError::network("registration endpoint", e))?;
		let status = response.status();
		let body =
			response.bytes().await.map_err(|e| TransportError::network("registration endpoint", e))?;

		if !status.is_success() {
			return Err(Error::Registration {
				status: Some(status.as_u16()),
				message: body_preview(&String::from_utf8_lossy(&body)),
			});
		}

		let info: ClientInformation = decode_json("registration response", &body)?;

		if info.client_id.trim().is_empty() {
			return Err(Error::Registration {
				status: Some(status.as_u16()),
				message: "response carried an empty client_id".into(),
			});
		}

		tracing::info!(client_id = %info.client_id, "Client registered.");

		Ok(info)
	}
}
