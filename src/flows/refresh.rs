//! Refresh token rotation and bearer token access.
//!
//! Refreshes are serialized behind one guard. A caller that waited on the guard re-reads the
//! store first and reuses the token another caller already rotated, so concurrent `401`s
//! cost one refresh request.

// self
use crate::{
	_prelude::*,
	auth::{TokenRecord, TokenSecret},
	error::ConfigError,
	flows::{AuthState, OAuthProvider},
	oauth::TokenEndpoint,
	obs::{self, FlowKind},
};

impl OAuthProvider {
	/// Returns a usable access token.
	///
	/// Tokens expiring within the configured refresh window are refreshed first when a refresh
	/// token is available. An expired token without a refresh token fails with
	/// [`Error::NotAuthenticated`].
	pub async fn access_token(&self) -> Result<TokenSecret> {
		let tokens = self.store.get_tokens().await?.ok_or(Error::NotAuthenticated)?;
		let now = OffsetDateTime::now_utc();
		let stale = tokens.is_expired_at(now) || tokens.expires_within(self.config.refresh_window, now);

		if !stale {
			return Ok(tokens.access_token);
		}
		if tokens.refresh_token.is_some() {
			return Ok(self.refresh_stale(&tokens.access_token).await?.access_token);
		}
		if tokens.is_expired_at(now) {
			return Err(Error::NotAuthenticated);
		}

		Ok(tokens.access_token)
	}

	/// Handles a `401` from the resource server by refreshing the token it rejected.
	pub async fn handle_unauthorized(&self) -> Result<TokenSecret> {
		let tokens = self.store.get_tokens().await?.ok_or(Error::NotAuthenticated)?;

		tracing::info!("Resource server rejected the access token; refreshing.");

		Ok(self.refresh_stale(&tokens.access_token).await?.access_token)
	}

	/// Exchanges the stored refresh token for new tokens.
	///
	/// When the server does not rotate the refresh token the previous one is kept. Failure
	/// moves the provider to [`AuthState::Failed`]; no new authorization is attempted.
	pub async fn refresh(&self) -> Result<TokenRecord> {
		let _rotation = self.refresh_guard.lock().await;

		self.refresh_locked().await
	}

	pub(crate) async fn refresh_stale(&self, stale: &TokenSecret) -> Result<TokenRecord> {
		let _rotation = self.refresh_guard.lock().await;

		if let Some(current) = self.store.get_tokens().await?
			&& current.access_token != *stale
		{
			tracing::debug!("Token already rotated by a concurrent caller.");

			return Ok(current);
		}

		self.refresh_locked().await
	}

	async fn refresh_locked(&self) -> Result<TokenRecord> {
		match obs::observe(FlowKind::Refresh, "refresh_token", self.rotate()).await {
			Ok(record) => {
				self.transition(AuthState::Authenticated);

				Ok(record)
			},
			Err(e) => {
				self.transition(AuthState::Failed);

				Err(e)
			},
		}
	}

	async fn rotate(&self) -> Result<TokenRecord> {
		let current = self.store.get_tokens().await?.ok_or(Error::NotAuthenticated)?;
		let refresh_token = current.refresh_token.clone().ok_or(ConfigError::MissingRefreshToken)?;
		let client =
			self.store.get_client_info().await?.ok_or(ConfigError::MissingClientInformation)?;
		let discovery = self.discovery().await?;
		let endpoint = TokenEndpoint::new(
			&discovery.endpoints,
			&client,
			self.config.token_endpoint_auth_method,
			self.resource(&discovery),
			self.http_client.clone(),
		);
		let mut record = endpoint.refresh(refresh_token.expose()).await?;

		if record.refresh_token.is_none() {
			record.refresh_token = Some(refresh_token);
		}
		if record.scope.is_none() {
			record.scope = current.scope;
		}

		self.store.set_tokens(record.clone()).await?;

		Ok(record)
	}
}
