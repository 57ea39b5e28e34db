//! Authorization server discovery (RFC 9728 protected resource metadata, RFC 8414 server
//! metadata) with well-known fallbacks for servers that publish neither.

// crates.io
use serde::Deserializer;
// self
use crate::{
	_prelude::*,
	error::{ConfigError, TransportError},
	http::{ReqwestHttpClient, decode_json},
};

const PROTECTED_RESOURCE_PATH: &str = "/.well-known/oauth-protected-resource";
const AUTHORIZATION_SERVER_PATH: &str = "/.well-known/oauth-authorization-server";

/// OAuth 2.0 Authorization Server Metadata (RFC 8414).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AuthorizationServerMetadata {
	/// Issuer identifier.
	#[serde(default)]
	pub issuer: Option<String>,
	/// Authorization endpoint URL.
	pub authorization_endpoint: Url,
	/// Token endpoint URL.
	pub token_endpoint: Url,
	/// Dynamic client registration endpoint.
	#[serde(default)]
	pub registration_endpoint: Option<Url>,
	/// Token revocation endpoint.
	#[serde(default)]
	pub revocation_endpoint: Option<Url>,
	/// Supported scopes.
	#[serde(default, deserialize_with = "deserialize_scopes")]
	pub scopes_supported: Vec<String>,
	/// Supported response types.
	#[serde(default)]
	pub response_types_supported: Vec<String>,
	/// Supported grant types.
	#[serde(default)]
	pub grant_types_supported: Vec<String>,
	/// Supported PKCE challenge methods.
	#[serde(default)]
	pub code_challenge_methods_supported: Vec<String>,
	/// Supported token endpoint auth methods.
	#[serde(default)]
	pub token_endpoint_auth_methods_supported: Vec<String>,
}

/// OAuth 2.0 Protected Resource Metadata (RFC 9728).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProtectedResourceMetadata {
	/// Protected resource identifier.
	#[serde(default)]
	pub resource: Option<Url>,
	/// Authorization servers that issue tokens for this resource.
	#[serde(default)]
	pub authorization_servers: Vec<Url>,
	/// Supported scopes.
	#[serde(default, deserialize_with = "deserialize_scopes")]
	pub scopes_supported: Vec<String>,
	/// Supported bearer token presentation methods.
	#[serde(default)]
	pub bearer_methods_supported: Vec<String>,
}

/// Endpoints the provider talks to during authorization.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServerEndpoints {
	/// Authorization endpoint.
	pub authorization: Url,
	/// Token endpoint.
	pub token: Url,
	/// Registration endpoint.
	pub registration: Url,
}
impl ServerEndpoints {
	/// Default endpoints rooted at the authorization server origin.
	pub fn fallback(auth_base: &Url) -> Result<Self, ConfigError> {
		let join = |endpoint: &'static str, path: &str| {
			auth_base.join(path).map_err(|source| ConfigError::InvalidEndpoint { endpoint, source })
		};

		Ok(Self {
			authorization: join("authorization", "/authorize")?,
			token: join("token", "/token")?,
			registration: join("registration", "/register")?,
		})
	}

	fn from_metadata(metadata: &AuthorizationServerMetadata, auth_base: &Url) -> Result<Self> {
		let fallback = Self::fallback(auth_base)?;

		Ok(Self {
			authorization: metadata.authorization_endpoint.clone(),
			token: metadata.token_endpoint.clone(),
			registration: metadata.registration_endpoint.clone().unwrap_or(fallback.registration),
		})
	}
}

/// Result of running discovery against a resource server.
#[derive(Clone, Debug)]
pub struct Discovery {
	/// Authorization server base URL in effect.
	pub auth_base: Url,
	/// Resolved endpoints.
	pub endpoints: ServerEndpoints,
	/// Protected resource metadata, when the server publishes it.
	pub resource_metadata: Option<ProtectedResourceMetadata>,
	/// Authorization server metadata, when published.
	pub server_metadata: Option<AuthorizationServerMetadata>,
}
impl Discovery {
	/// Discovers the authorization server for `server_url`.
	///
	/// Absent documents (any non-success status) fall back to the defaults; malformed
	/// documents fail with [`Error::Discovery`].
	pub async fn run(http: &ReqwestHttpClient, server_url: &Url) -> Result<Self> {
		let origin = origin(server_url)?;
		let resource_metadata: Option<ProtectedResourceMetadata> = fetch_document(
			http,
			well_known(&origin, PROTECTED_RESOURCE_PATH)?,
			"protected resource metadata",
		)
		.await?;
		let auth_base = match resource_metadata
			.as_ref()
			.and_then(|metadata| metadata.authorization_servers.first())
		{
			Some(server) => server.clone(),
			None => origin,
		};
		let server_metadata: Option<AuthorizationServerMetadata> = fetch_document(
			http,
			well_known(&auth_base, AUTHORIZATION_SERVER_PATH)?,
			"authorization server metadata",
		)
		.await?;
		let endpoints = match &server_metadata {
			Some(metadata) => ServerEndpoints::from_metadata(metadata, &auth_base)?,
			None => ServerEndpoints::fallback(&auth_base)?,
		};

		tracing::debug!(
			auth_base = %auth_base,
			authorization = %endpoints.authorization,
			token = %endpoints.token,
			registration = %endpoints.registration,
			"Resolved authorization server endpoints."
		);

		Ok(Self { auth_base, endpoints, resource_metadata, server_metadata })
	}

	/// Resource indicator advertised by the protected resource, if any.
	pub fn resource(&self) -> Option<&Url> {
		self.resource_metadata.as_ref().and_then(|metadata| metadata.resource.as_ref())
	}
}

async fn fetch_document<T>(
	http: &ReqwestHttpClient,
	url: Url,
	what: &'static str,
) -> Result<Option<T>>
where
	T: for<'de> Deserialize<'de>,
{
	tracing::debug!(url = %url, "Fetching {what}.");

	let response = http
		.get(url.clone())
		.header(reqwest::header::ACCEPT, "application/json")
		.send()
		.await
		.map_err(|e| TransportError::network("metadata endpoint", e))?;
	let status = response.status();

	if !status.is_success() {
		tracing::debug!(url = %url, status = status.as_u16(), "No {what} published.");

		return Ok(None);
	}

	let body = response.bytes().await.map_err(|e| TransportError::network("metadata endpoint", e))?;

	decode_json(what, &body)
		.map(Some)
		.map_err(|e| Error::Discovery { url: url.to_string(), message: e.to_string() })
}

/// Reduces a URL to `scheme://host[:port]/`.
pub(crate) fn origin(url: &Url) -> Result<Url, ConfigError> {
	let mut origin = url.clone();

	origin.set_path("/");
	origin.set_query(None);
	origin.set_fragment(None);

	if origin.cannot_be_a_base() || origin.host_str().is_none() {
		return Err(ConfigError::invalid_field("server_url", "must be an absolute http(s) URL"));
	}

	Ok(origin)
}

/// Builds an RFC 8414 well-known URL, inserting the suffix between host and path.
fn well_known(base: &Url, suffix: &str) -> Result<Url, ConfigError> {
	let path = base.path().trim_end_matches('/');
	let mut url = origin(base)?;

	url.set_path(&format!("{suffix}{path}"));

	Ok(url)
}

fn deserialize_scopes<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
	D: Deserializer<'de>,
{
	#[derive(Deserialize)]
	#[serde(untagged)]
	enum StringOrVec {
		String(String),
		Vec(Vec<String>),
	}

	Ok(match StringOrVec::deserialize(deserializer)? {
		StringOrVec::String(s) => s.split_whitespace().map(String::from).collect(),
		StringOrVec::Vec(v) => v,
	})
}
