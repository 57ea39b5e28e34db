//! Dynamic client registration models (RFC 7591) and the software statement they carry.

// self
use crate::{_prelude::*, auth::TokenSecret, error::ConfigError};

/// OAuth 2.0 grant types this client registers for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantType {
	/// Authorization Code grant (PKCE always applied).
	AuthorizationCode,
	/// Refresh Token grant for long-lived sessions.
	RefreshToken,
}
impl GrantType {
	/// Returns the RFC 6749 identifier for the grant type.
	pub fn as_str(self) -> &'static str {
		match self {
			GrantType::AuthorizationCode => "authorization_code",
			GrantType::RefreshToken => "refresh_token",
		}
	}
}
impl Display for GrantType {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Client authentication modes for token endpoint calls.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenEndpointAuthMethod {
	/// Form POST body parameters for `client_id`/`client_secret`.
	#[default]
	ClientSecretPost,
	/// HTTP Basic with `client_id`/`client_secret`.
	ClientSecretBasic,
	/// Public client; possession is proven with PKCE only.
	None,
}
impl TokenEndpointAuthMethod {
	/// Returns the RFC 7591 identifier.
	pub fn as_str(self) -> &'static str {
		match self {
			Self::ClientSecretPost => "client_secret_post",
			Self::ClientSecretBasic => "client_secret_basic",
			Self::None => "none",
		}
	}
}
impl FromStr for TokenEndpointAuthMethod {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"client_secret_post" => Ok(Self::ClientSecretPost),
			"client_secret_basic" => Ok(Self::ClientSecretBasic),
			"none" => Ok(Self::None),
			other => Err(ConfigError::invalid_field(
				"token_endpoint_auth_method",
				format!("unsupported method `{other}`"),
			)),
		}
	}
}

/// Signed assertion (compact JWS) presented during registration to prove provenance.
///
/// The statement is opaque to this crate; only its compact shape is checked. It is attached
/// to registration payloads and never to token requests.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SoftwareStatement(String);
impl SoftwareStatement {
	/// Validates and wraps a compact JWS string.
	pub fn new(value: impl Into<String>) -> Result<Self, ConfigError> {
		let value = value.into();
		let trimmed = value.trim();

		if trimmed.is_empty() {
			return Err(ConfigError::invalid_field("software_statement", "must not be empty"));
		}
		if trimmed.split('.').count() != 3 || trimmed.split('.').any(str::is_empty) {
			return Err(ConfigError::invalid_field(
				"software_statement",
				"expected three dot-separated segments",
			));
		}

		Ok(Self(trimmed.to_owned()))
	}

	/// Returns the raw statement for embedding in a registration document.
	pub fn as_str(&self) -> &str {
		&self.0
	}
}
impl TryFrom<String> for SoftwareStatement {
	type Error = ConfigError;

	fn try_from(value: String) -> Result<Self, Self::Error> {
		Self::new(value)
	}
}
impl From<SoftwareStatement> for String {
	fn from(value: SoftwareStatement) -> Self {
		value.0
	}
}
impl Debug for SoftwareStatement {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "SoftwareStatement({} bytes)", self.0.len())
	}
}

/// Client metadata submitted once to the registration endpoint.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientMetadata {
	/// Human-readable client name.
	pub client_name: String,
	/// Redirect URIs in registration order.
	pub redirect_uris: Vec<Url>,
	/// Grants the client will use.
	pub grant_types: Vec<GrantType>,
	/// Response types the client will use.
	pub response_types: Vec<String>,
	/// Authentication method for the token endpoint.
	pub token_endpoint_auth_method: TokenEndpointAuthMethod,
	/// Space-delimited scope string, if any.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub scope: Option<String>,
}
impl ClientMetadata {
	/// Default client name announced during registration.
	pub const DEFAULT_CLIENT_NAME: &'static str = "MCP OAuth Client";

	/// Creates metadata for a single redirect URI using the crate defaults.
	pub fn new(redirect_uri: Url) -> Self {
		Self {
			client_name: Self::DEFAULT_CLIENT_NAME.into(),
			redirect_uris: vec![redirect_uri],
			grant_types: vec![GrantType::AuthorizationCode, GrantType::RefreshToken],
			response_types: vec!["code".into()],
			token_endpoint_auth_method: TokenEndpointAuthMethod::default(),
			scope: None,
		}
	}

	/// Overrides the client name.
	pub fn with_client_name(mut self, name: impl Into<String>) -> Self {
		self.client_name = name.into();

		self
	}

	/// Overrides the token endpoint auth method.
	pub fn with_auth_method(mut self, method: TokenEndpointAuthMethod) -> Self {
		self.token_endpoint_auth_method = method;

		self
	}

	/// Sets the requested scope string.
	pub fn with_scope(mut self, scope: Option<String>) -> Self {
		self.scope = scope;

		self
	}

	/// Serializes the metadata into a JSON object ready for augmentation.
	pub fn to_document(&self) -> JsonMap<String, JsonValue> {
		match serde_json::to_value(self) {
			Ok(JsonValue::Object(map)) => map,
			_ => JsonMap::new(),
		}
	}
}

/// Client identity returned by dynamic registration.
#[derive(Clone, Serialize, Deserialize)]
pub struct ClientInformation {
	/// Issued client identifier.
	pub client_id: String,
	/// Issued client secret for confidential clients.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub client_secret: Option<TokenSecret>,
	/// Issue instant (seconds since the epoch), if reported.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub client_id_issued_at: Option<i64>,
	/// Secret expiry (seconds since the epoch, `0` meaning never), if reported.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub client_secret_expires_at: Option<i64>,
	/// Redirect URIs echoed by the server.
	#[serde(default)]
	pub redirect_uris: Vec<Url>,
	/// Auth method echoed by the server.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub token_endpoint_auth_method: Option<String>,
}
impl ClientInformation {
	/// Creates client information for a pre-provisioned identifier.
	pub fn new(client_id: impl Into<String>) -> Self {
		Self {
			client_id: client_id.into(),
			client_secret: None,
			client_id_issued_at: None,
			client_secret_expires_at: None,
			redirect_uris: Vec::new(),
			token_endpoint_auth_method: None,
		}
	}

	/// Attaches a client secret.
	pub fn with_client_secret(mut self, secret: impl Into<String>) -> Self {
		self.client_secret = Some(TokenSecret::new(secret));

		self
	}

	/// Resolves the auth method echoed by the server, falling back to `requested`.
	pub fn auth_method(&self, requested: TokenEndpointAuthMethod) -> TokenEndpointAuthMethod {
		self.token_endpoint_auth_method
			.as_deref()
			.and_then(|raw| raw.parse().ok())
			.unwrap_or(requested)
	}
}
impl Debug for ClientInformation {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ClientInformation")
			.field("client_id", &self.client_id)
			.field("client_secret_set", &self.client_secret.is_some())
			.field("client_id_issued_at", &self.client_id_issued_at)
			.field("client_secret_expires_at", &self.client_secret_expires_at)
			.field("redirect_uris", &self.redirect_uris)
			.field("token_endpoint_auth_method", &self.token_endpoint_auth_method)
			.finish()
	}
}
