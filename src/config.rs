//! Configuration inputs: the collaborator-facing [`BaseConfig`] and the validated
//! [`ProviderConfig`] that drives an [`OAuthProvider`](crate::flows::OAuthProvider).

// crates.io
use serde::Deserializer;
// self
use crate::{
	_prelude::*,
	auth::{ClientMetadata, SoftwareStatement, TokenEndpointAuthMethod},
	error::ConfigError,
};

/// First port probed for the callback listener.
pub const DEFAULT_CALLBACK_PORT: u16 = 3030;
/// Ports probed before giving up.
pub const DEFAULT_PORT_ATTEMPTS: u16 = 10;
/// Resource server port used when none is configured.
pub const DEFAULT_SERVER_PORT: u16 = 443;
/// Default wait for the authorization redirect.
pub const DEFAULT_CALLBACK_TIMEOUT: StdDuration = StdDuration::from_secs(300);
/// Tokens expiring within this window are refreshed before use.
pub const DEFAULT_REFRESH_WINDOW: Duration = Duration::seconds(60);

/// How the callback listener picks its port.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PortSelection {
	/// Bind exactly this port (`0` asks the OS for an ephemeral one).
	Fixed(u16),
	/// Probe ascending ports starting at `base`.
	Probe {
		/// First port tried.
		base: u16,
		/// Number of ports tried.
		attempts: u16,
	},
}
impl Default for PortSelection {
	fn default() -> Self {
		Self::Probe { base: DEFAULT_CALLBACK_PORT, attempts: DEFAULT_PORT_ATTEMPTS }
	}
}

/// Connection inputs supplied by the embedding application.
#[derive(Clone, Serialize, Deserialize)]
pub struct BaseConfig {
	/// Resource server URL without a port, e.g. `https://mcp.example.com`.
	pub server_url: String,
	/// Resource server port; accepts a number or a numeric string.
	#[serde(default = "default_server_port", deserialize_with = "deserialize_port")]
	pub server_port: u16,
	/// Signed software statement presented during client registration.
	pub software_statement: String,
}
impl BaseConfig {
	/// Creates a configuration using the default port.
	pub fn new(server_url: impl Into<String>, software_statement: impl Into<String>) -> Self {
		Self {
			server_url: server_url.into(),
			server_port: DEFAULT_SERVER_PORT,
			software_statement: software_statement.into(),
		}
	}

	/// Overrides the resource server port.
	pub fn with_port(mut self, port: u16) -> Self {
		self.server_port = port;

		self
	}

	/// `<server_url>:<server_port>` as a URL.
	pub fn server_base(&self) -> Result<Url, ConfigError> {
		let mut url = Url::parse(self.server_url.trim())
			.map_err(|source| ConfigError::InvalidEndpoint { endpoint: "server", source })?;

		if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
			return Err(ConfigError::invalid_field("server_url", "must be an http(s) URL"));
		}

		url.set_port(Some(self.server_port))
			.map_err(|_| ConfigError::invalid_field("server_port", "cannot be applied to URL"))?;

		Ok(url)
	}

	/// Streamable HTTP endpoint, `<server_url>:<server_port>/mcp`.
	pub fn mcp_url(&self) -> Result<Url, ConfigError> {
		let mut url = self.server_base()?;
		let path = format!("{}/mcp", url.path().trim_end_matches('/'));

		url.set_path(&path);

		Ok(url)
	}

	/// Validated software statement.
	pub fn software_statement(&self) -> Result<SoftwareStatement, ConfigError> {
		SoftwareStatement::new(self.software_statement.as_str())
	}
}
impl Debug for BaseConfig {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("BaseConfig")
			.field("server_url", &self.server_url)
			.field("server_port", &self.server_port)
			.field("software_statement", &"<redacted>")
			.finish()
	}
}

fn default_server_port() -> u16 {
	DEFAULT_SERVER_PORT
}

fn deserialize_port<'de, D>(deserializer: D) -> Result<u16, D::Error>
where
	D: Deserializer<'de>,
{
	#[derive(Deserialize)]
	#[serde(untagged)]
	enum NumberOrString {
		Number(u16),
		String(String),
	}

	match NumberOrString::deserialize(deserializer)? {
		NumberOrString::Number(port) => Ok(port),
		NumberOrString::String(raw) => raw.trim().parse().map_err(serde::de::Error::custom),
	}
}

/// Validated settings for one [`OAuthProvider`](crate::flows::OAuthProvider).
#[derive(Clone, Debug)]
pub struct ProviderConfig {
	/// Resource server the tokens are for; discovery starts here.
	pub server_url: Url,
	/// Client name announced during registration.
	pub client_name: String,
	/// Requested token endpoint auth method.
	pub token_endpoint_auth_method: TokenEndpointAuthMethod,
	/// Callback listener port strategy.
	pub port_selection: PortSelection,
	/// How long to wait for the authorization redirect.
	pub callback_timeout: StdDuration,
	/// Space-delimited scope requested during authorization.
	pub scope: Option<String>,
	/// RFC 8707 resource indicator; defaults to the one advertised by the server.
	pub resource: Option<Url>,
	/// Preemptive refresh window for [`OAuthProvider::access_token`](crate::flows::OAuthProvider::access_token).
	pub refresh_window: Duration,
}
impl ProviderConfig {
	/// Starts a builder for `server_url`.
	pub fn builder(server_url: Url) -> ProviderConfigBuilder {
		ProviderConfigBuilder::new(server_url)
	}

	/// Starts a builder from collaborator inputs.
	pub fn from_base(base: &BaseConfig) -> Result<ProviderConfigBuilder, ConfigError> {
		Ok(ProviderConfigBuilder::new(base.server_base()?))
	}

	/// Client metadata for registering `redirect_uri`.
	pub fn client_metadata(&self, redirect_uri: Url) -> ClientMetadata {
		ClientMetadata::new(redirect_uri)
			.with_client_name(self.client_name.clone())
			.with_auth_method(self.token_endpoint_auth_method)
			.with_scope(self.scope.clone())
	}
}

/// Builder for [`ProviderConfig`].
#[derive(Clone, Debug)]
pub struct ProviderConfigBuilder {
	server_url: Url,
	client_name: String,
	token_endpoint_auth_method: TokenEndpointAuthMethod,
	port_selection: PortSelection,
	callback_timeout: StdDuration,
	scope: Option<String>,
	resource: Option<Url>,
	refresh_window: Duration,
}
impl ProviderConfigBuilder {
	fn new(server_url: Url) -> Self {
		Self {
			server_url,
			client_name: ClientMetadata::DEFAULT_CLIENT_NAME.into(),
			token_endpoint_auth_method: TokenEndpointAuthMethod::default(),
			port_selection: PortSelection::default(),
			callback_timeout: DEFAULT_CALLBACK_TIMEOUT,
			scope: None,
			resource: None,
			refresh_window: DEFAULT_REFRESH_WINDOW,
		}
	}

	/// Overrides the client name.
	pub fn client_name(mut self, name: impl Into<String>) -> Self {
		self.client_name = name.into();

		self
	}

	/// Overrides the token endpoint auth method.
	pub fn token_endpoint_auth_method(mut self, method: TokenEndpointAuthMethod) -> Self {
		self.token_endpoint_auth_method = method;

		self
	}

	/// Overrides the callback port strategy.
	pub fn port_selection(mut self, selection: PortSelection) -> Self {
		self.port_selection = selection;

		self
	}

	/// Overrides the callback wait.
	pub fn callback_timeout(mut self, timeout: StdDuration) -> Self {
		self.callback_timeout = timeout;

		self
	}

	/// Requests a scope during authorization.
	pub fn scope(mut self, scope: impl Into<String>) -> Self {
		self.scope = Some(scope.into());

		self
	}

	/// Pins the RFC 8707 resource indicator.
	pub fn resource(mut self, resource: Url) -> Self {
		self.resource = Some(resource);

		self
	}

	/// Overrides the preemptive refresh window.
	pub fn refresh_window(mut self, window: Duration) -> Self {
		self.refresh_window = if window.is_negative() { Duration::ZERO } else { window };

		self
	}

	/// Validates and produces the configuration.
	pub fn build(self) -> Result<ProviderConfig, ConfigError> {
		if !matches!(self.server_url.scheme(), "http" | "https")
			|| self.server_url.host_str().is_none()
		{
			return Err(ConfigError::invalid_field("server_url", "must be an http(s) URL"));
		}
		if self.client_name.trim().is_empty() {
			return Err(ConfigError::invalid_field("client_name", "must not be empty"));
		}
		if self.callback_timeout.is_zero() {
			return Err(ConfigError::invalid_field("callback_timeout", "must be positive"));
		}
		if let PortSelection::Probe { attempts: 0, .. } = self.port_selection {
			return Err(ConfigError::invalid_field("port_selection", "must probe at least one port"));
		}

		let scope = self.scope.map(|scope| scope.split_whitespace().collect::<Vec<_>>().join(" "));

		if scope.as_deref().is_some_and(str::is_empty) {
			return Err(ConfigError::invalid_field("scope", "must contain at least one scope"));
		}

		Ok(ProviderConfig {
			server_url: self.server_url,
			client_name: self.client_name,
			token_endpoint_auth_method: self.token_endpoint_auth_method,
			port_selection: self.port_selection,
			callback_timeout: self.callback_timeout,
			scope,
			resource: self.resource,
			refresh_window: self.refresh_window,
		})
	}
}
