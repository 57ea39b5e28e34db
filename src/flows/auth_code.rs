//! Authorization Code + PKCE acquisition through the loopback callback listener.

// self
use crate::{
	_prelude::*,
	auth::TokenRecord,
	callback::{CallbackListener, redirect_uri_for},
	flows::{AuthState, AuthorizationParams, AuthorizationSession, OAuthProvider},
	oauth::TokenEndpoint,
	obs::{self, FlowKind},
};

impl OAuthProvider {
	/// Acquires tokens, running the full authorization flow only when no stored tokens apply.
	///
	/// Usable stored tokens return immediately. Stale tokens with a refresh token are refreshed
	/// instead of re-authorizing; a failed refresh moves the provider to [`AuthState::Failed`]
	/// and is returned as is. Only one authorization attempt runs at a time, and a concurrent
	/// call fails with [`Error::FlowInProgress`]. Any failure releases the callback port
	/// before returning.
	pub async fn initialize(&self) -> Result<()> {
		if self.authenticated_from_store().await? {
			return Ok(());
		}

		let Some(_flow) = self.flow_guard.try_lock() else {
			return Err(Error::FlowInProgress);
		};

		// A concurrent attempt may have finished between the check and the guard.
		if self.authenticated_from_store().await? {
			return Ok(());
		}
		if let Some(tokens) = self.store.get_tokens().await?
			&& tokens.refresh_token.is_some()
		{
			tracing::debug!("Stored tokens are stale; refreshing instead of re-authorizing.");

			self.refresh_stale(&tokens.access_token).await?;

			return Ok(());
		}

		match self.authorize().await {
			Ok(()) => Ok(()),
			Err(e) => {
				self.transition(AuthState::Failed);

				Err(e)
			},
		}
	}

	async fn authenticated_from_store(&self) -> Result<bool> {
		let Some(tokens) = self.store.get_tokens().await? else { return Ok(false) };
		let now = OffsetDateTime::now_utc();

		if tokens.is_expired_at(now) || tokens.expires_within(self.config.refresh_window, now) {
			return Ok(false);
		}

		tracing::debug!("Stored tokens are usable; skipping authorization.");

		self.transition(AuthState::Authenticated);

		Ok(true)
	}

	async fn authorize(&self) -> Result<()> {
		let listener = CallbackListener::new(self.config.port_selection);
		let port = listener.start()?;
		let acquired = self.acquire_tokens(&listener, port).await;

		listener.shutdown().await;

		self.store.set_tokens(acquired?).await?;
		self.transition(AuthState::Authenticated);

		tracing::info!("Authorization completed.");

		Ok(())
	}

	async fn acquire_tokens(&self, listener: &CallbackListener, port: u16) -> Result<TokenRecord> {
		let redirect_uri = redirect_uri_for(port)?;
		let discovery = self.discovery().await?;
		let client = self.ensure_client(&discovery, &redirect_uri).await?;
		let resource = self.resource(&discovery);
		let session = AuthorizationSession::build(
			&discovery.endpoints,
			&client.client_id,
			redirect_uri,
			AuthorizationParams {
				scope: self.config.scope.as_deref(),
				resource: resource.as_ref(),
			},
		);

		self.transition(AuthState::Authorizing);

		let code = obs::observe(
			FlowKind::Authorization,
			"await_callback",
			self.await_code(listener, &session),
		)
		.await?;

		session.validate_state(listener.state().as_deref())?;
		self.transition(AuthState::CodeReceived);

		let endpoint = TokenEndpoint::new(
			&discovery.endpoints,
			&client,
			self.config.token_endpoint_auth_method,
			resource,
			self.http_client.clone(),
		);

		self.transition(AuthState::Exchanging);

		obs::observe(
			FlowKind::Exchange,
			"exchange_code",
			endpoint.exchange_code(&code, session.pkce_verifier(), &session.redirect_uri),
		)
		.await
	}

	async fn await_code(
		&self,
		listener: &CallbackListener,
		session: &AuthorizationSession,
	) -> Result<String> {
		if let Err(e) = self.redirect.dispatch(&session.authorize_url).await {
			if let Some(error) = listener.snapshot().error {
				return Err(Error::AuthorizationDenied { error });
			}

			return Err(e);
		}

		listener.wait_for_callback(self.config.callback_timeout).await
	}
}
