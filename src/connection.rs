//! Connection setup: turns a [`BaseConfig`] into an authenticated transport.
//!
//! [`ConnectionSetup::with_connection`] is the scoped entry point. The stream pair it hands
//! out is torn down when the body returns, and dropping the returned future tears it down too.

// self
use crate::{
	_prelude::*,
	config::{BaseConfig, ProviderConfig},
	flows::{CredentialProvider, OAuthProvider},
	http::ReqwestHttpClient,
	provider::{HeadlessRedirect, RedirectStrategy, SoftwareStatementStrategy},
	transport::{StreamPair, StreamableHttpClient, TransportSession},
};

/// Pairs a resource server with the credential provider that authorizes it.
pub struct ConnectionSetup {
	config: BaseConfig,
	provider: Arc<dyn CredentialProvider>,
	http_client: ReqwestHttpClient,
}
impl ConnectionSetup {
	/// Uses an existing credential provider.
	pub fn new(config: BaseConfig, provider: Arc<dyn CredentialProvider>) -> Self {
		Self { config, provider, http_client: ReqwestHttpClient::default() }
	}

	/// Builds the default [`OAuthProvider`] for `config`.
	///
	/// The provider registers with the configured software statement and completes the
	/// authorization redirect headlessly.
	pub fn from_base_config(config: BaseConfig) -> Result<Self> {
		let http_client = ReqwestHttpClient::default();
		let redirect = Arc::new(HeadlessRedirect::new(http_client.clone()));

		Self::build_default(config, redirect, http_client)
	}

	/// Same as [`from_base_config`](Self::from_base_config) with a caller-chosen redirect.
	pub fn from_base_config_with_redirect(
		config: BaseConfig,
		redirect: Arc<dyn RedirectStrategy>,
	) -> Result<Self> {
		Self::build_default(config, redirect, ReqwestHttpClient::default())
	}

	fn build_default(
		config: BaseConfig,
		redirect: Arc<dyn RedirectStrategy>,
		http_client: ReqwestHttpClient,
	) -> Result<Self> {
		let statement = config.software_statement()?;
		let provider_config = ProviderConfig::from_base(&config)?.build()?;
		let provider = OAuthProvider::builder(provider_config)
			.registration_strategy(Arc::new(SoftwareStatementStrategy::from_statement(statement)))
			.redirect_strategy(redirect)
			.http_client(http_client.clone())
			.build();

		Ok(Self { config, provider: Arc::new(provider), http_client })
	}

	/// Overrides the HTTP client used by the transport.
	pub fn with_http_client(mut self, http_client: ReqwestHttpClient) -> Self {
		self.http_client = http_client;

		self
	}

	/// Connection inputs.
	pub fn config(&self) -> &BaseConfig {
		&self.config
	}

	/// Credential provider shared with every transport opened here.
	pub fn provider(&self) -> &Arc<dyn CredentialProvider> {
		&self.provider
	}

	/// Runs the authorization flow if needed and returns the ready credential provider.
	pub async fn create_auth_layer(&self) -> Result<Arc<dyn CredentialProvider>> {
		self.provider.initialize().await?;

		Ok(self.provider.clone())
	}

	/// Opens an authenticated transport to `<server_url>:<server_port>/mcp`.
	///
	/// Authorization failures surface unchanged; problems building the transport itself
	/// surface as [`Error::TransportSetup`].
	pub async fn connect(&self) -> Result<TransportSession> {
		let endpoint = self.config.mcp_url().map_err(|e| Error::TransportSetup {
			message: "MCP endpoint URL is invalid".into(),
			source: Some(Box::new(e)),
		})?;
		let credentials = self.create_auth_layer().await?;

		credentials.access_token().await.map_err(|e| Error::TransportSetup {
			message: "no usable access token".into(),
			source: Some(Box::new(e)),
		})?;

		tracing::info!(endpoint = %endpoint, "Opening MCP transport.");

		Ok(TransportSession::open(StreamableHttpClient::new(
			self.http_client.clone(),
			endpoint,
			credentials,
		)))
	}

	/// Runs `f` with a live stream pair and tears the transport down afterwards.
	pub async fn with_connection<F, Fut, T>(&self, f: F) -> Result<T>
	where
		F: FnOnce(StreamPair) -> Fut,
		Fut: Future<Output = T>,
	{
		let (streams, guard) = self.connect().await?.into_parts();
		let output = f(streams).await;

		guard.close().await;

		Ok(output)
	}
}
impl Debug for ConnectionSetup {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ConnectionSetup").field("config", &self.config).finish()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn default_provider_requires_a_well_formed_statement() {
		let err = ConnectionSetup::from_base_config(BaseConfig::new(
			"https://mcp.example.com",
			"not-a-jwt",
		))
		.expect_err("Malformed statements should be rejected.");

		assert!(matches!(err, Error::Config(_)));

		ConnectionSetup::from_base_config(BaseConfig::new("https://mcp.example.com", "a.b.c"))
			.expect("Well-formed inputs should produce a connection setup.");
	}
}
