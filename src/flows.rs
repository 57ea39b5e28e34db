//! The OAuth client provider: discovery, registration, authorization, and refresh behind one
//! state machine.

pub mod auth_code;
pub mod refresh;
pub mod registration;
pub mod session;

pub use session::*;

// crates.io
use reqwest::RequestBuilder;
// self
use crate::{
	_prelude::*,
	auth::TokenSecret,
	config::ProviderConfig,
	http::ReqwestHttpClient,
	obs::{self, FlowKind},
	provider::{Discovery, HeadlessRedirect, PlainRegistration, RedirectStrategy, RegistrationStrategy},
	store::{MemoryStore, TokenStore},
};

/// Boxed future returned by [`CredentialProvider`] operations.
pub type CredentialFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + 'a + Send>>;

/// Credential source consumed by the transport layer.
pub trait CredentialProvider
where
	Self: Send + Sync,
{
	/// Acquires tokens, running the authorization flow when needed.
	fn initialize(&self) -> CredentialFuture<'_, ()>;

	/// Returns a usable access token, refreshing it when close to expiry.
	fn access_token(&self) -> CredentialFuture<'_, TokenSecret>;

	/// Reacts to a `401` from the resource server and returns the replacement token.
	fn handle_unauthorized(&self) -> CredentialFuture<'_, TokenSecret>;

	/// Adds the bearer `Authorization` header to `request`.
	fn authorize_request(&self, request: RequestBuilder) -> CredentialFuture<'_, RequestBuilder> {
		Box::pin(async move {
			let token = self.access_token().await?;

			Ok(request.bearer_auth(token.expose()))
		})
	}
}

/// Lifecycle of an [`OAuthProvider`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AuthState {
	/// No client registration is known.
	Unregistered,
	/// Registration request in flight.
	Registering,
	/// Client registration cached; no tokens yet.
	Registered,
	/// Authorization URL dispatched; waiting for the redirect.
	Authorizing,
	/// Redirect delivered a code with a matching state.
	CodeReceived,
	/// Code exchange in flight.
	Exchanging,
	/// Tokens stored and usable.
	Authenticated,
	/// The last flow or refresh failed; `initialize` starts over.
	Failed,
}
impl AuthState {
	/// Returns a stable label suitable for logs.
	pub const fn as_str(self) -> &'static str {
		match self {
			AuthState::Unregistered => "unregistered",
			AuthState::Registering => "registering",
			AuthState::Registered => "registered",
			AuthState::Authorizing => "authorizing",
			AuthState::CodeReceived => "code_received",
			AuthState::Exchanging => "exchanging",
			AuthState::Authenticated => "authenticated",
			AuthState::Failed => "failed",
		}
	}
}
impl Display for AuthState {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// OAuth 2.1 client for one resource server.
///
/// The provider owns its token store, registration and redirect strategies, and HTTP client.
/// At most one authorization attempt runs at a time; refreshes are serialized so concurrent
/// callers share a single rotation.
pub struct OAuthProvider {
	config: ProviderConfig,
	store: Arc<dyn TokenStore>,
	registration: Arc<dyn RegistrationStrategy>,
	redirect: Arc<dyn RedirectStrategy>,
	http_client: ReqwestHttpClient,
	state: RwLock<AuthState>,
	discovery: RwLock<Option<Discovery>>,
	flow_guard: AsyncMutex<()>,
	refresh_guard: AsyncMutex<()>,
}
impl OAuthProvider {
	/// Starts a builder for `config`.
	pub fn builder(config: ProviderConfig) -> OAuthProviderBuilder {
		OAuthProviderBuilder::new(config)
	}

	/// Current lifecycle state.
	pub fn auth_state(&self) -> AuthState {
		*self.state.read()
	}

	/// Validated configuration.
	pub fn config(&self) -> &ProviderConfig {
		&self.config
	}

	/// Token store backing this provider.
	pub fn store(&self) -> &Arc<dyn TokenStore> {
		&self.store
	}

	pub(crate) fn transition(&self, next: AuthState) {
		let previous = std::mem::replace(&mut *self.state.write(), next);

		if previous != next {
			tracing::debug!(from = previous.as_str(), to = next.as_str(), "Auth state changed.");
		}
	}

	/// Returns cached discovery results, running discovery on first use.
	pub(crate) async fn discovery(&self) -> Result<Discovery> {
		let cached = self.discovery.read().clone();

		if let Some(discovery) = cached {
			return Ok(discovery);
		}

		let discovery = obs::observe(
			FlowKind::Discovery,
			"discover",
			Discovery::run(&self.http_client, &self.config.server_url),
		)
		.await?;

		*self.discovery.write() = Some(discovery.clone());

		Ok(discovery)
	}

	/// Resource indicator sent with authorization and token requests.
	pub(crate) fn resource(&self, discovery: &Discovery) -> Option<Url> {
		self.config.resource.clone().or_else(|| discovery.resource().cloned())
	}
}
impl CredentialProvider for OAuthProvider {
	fn initialize(&self) -> CredentialFuture<'_, ()> {
		Box::pin(OAuthProvider::initialize(self))
	}

	fn access_token(&self) -> CredentialFuture<'_, TokenSecret> {
		Box::pin(OAuthProvider::access_token(self))
	}

	fn handle_unauthorized(&self) -> CredentialFuture<'_, TokenSecret> {
		Box::pin(OAuthProvider::handle_unauthorized(self))
	}
}
impl Debug for OAuthProvider {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("OAuthProvider")
			.field("server_url", &self.config.server_url.as_str())
			.field("state", &self.auth_state())
			.finish()
	}
}

/// Builder for [`OAuthProvider`].
pub struct OAuthProviderBuilder {
	config: ProviderConfig,
	store: Option<Arc<dyn TokenStore>>,
	registration: Option<Arc<dyn RegistrationStrategy>>,
	redirect: Option<Arc<dyn RedirectStrategy>>,
	http_client: Option<ReqwestHttpClient>,
}
impl OAuthProviderBuilder {
	fn new(config: ProviderConfig) -> Self {
		Self { config, store: None, registration: None, redirect: None, http_client: None }
	}

	/// Uses `store` instead of a private [`MemoryStore`].
	pub fn store(mut self, store: Arc<dyn TokenStore>) -> Self {
		self.store = Some(store);

		self
	}

	/// Sets the registration strategy (defaults to [`PlainRegistration`]).
	pub fn registration_strategy(mut self, strategy: Arc<dyn RegistrationStrategy>) -> Self {
		self.registration = Some(strategy);

		self
	}

	/// Sets the redirect strategy (defaults to [`HeadlessRedirect`] over the HTTP client).
	pub fn redirect_strategy(mut self, strategy: Arc<dyn RedirectStrategy>) -> Self {
		self.redirect = Some(strategy);

		self
	}

	/// Overrides the HTTP client used for discovery, registration, and token calls.
	pub fn http_client(mut self, client: ReqwestHttpClient) -> Self {
		self.http_client = Some(client);

		self
	}

	/// Assembles the provider.
	pub fn build(self) -> OAuthProvider {
		let http_client = self.http_client.unwrap_or_default();
		let redirect = self
			.redirect
			.unwrap_or_else(|| Arc::new(HeadlessRedirect::new(http_client.clone())));

		OAuthProvider {
			config: self.config,
			store: self.store.unwrap_or_else(|| Arc::new(MemoryStore::default())),
			registration: self.registration.unwrap_or_else(|| Arc::new(PlainRegistration)),
			redirect,
			http_client,
			state: RwLock::new(AuthState::Unregistered),
			discovery: RwLock::new(None),
			flow_guard: AsyncMutex::new(()),
			refresh_guard: AsyncMutex::new(()),
		}
	}
}
impl Debug for OAuthProviderBuilder {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("OAuthProviderBuilder")
			.field("config", &self.config)
			.field("store_set", &self.store.is_some())
			.field("registration_set", &self.registration.is_some())
			.field("redirect_set", &self.redirect.is_some())
			.finish()
	}
}
