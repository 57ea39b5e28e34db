//! Token endpoint facade built on the `oauth2` crate.

pub use oauth2;

// std
use std::borrow::Cow;
// crates.io
use oauth2::{
	AuthType, AuthUrl, AuthorizationCode, ClientId, ClientSecret, EndpointNotSet, EndpointSet,
	HttpClientError, PkceCodeVerifier, RedirectUrl, RefreshToken, RequestTokenError,
	TokenResponse, TokenUrl,
	basic::{
		BasicClient, BasicErrorResponse, BasicRequestTokenError, BasicTokenResponse, BasicTokenType,
	},
};
// self
use crate::{
	_prelude::*,
	auth::{BEARER, ClientInformation, GrantType, TokenEndpointAuthMethod, TokenRecord},
	error::{ConfigError, TransportError, body_preview},
	http::{ReqwestHttpClient, ResponseMetadata, ResponseMetadataSlot},
	provider::ServerEndpoints,
};

type ConfiguredBasicClient =
	BasicClient<EndpointSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;

/// Token endpoint client bound to one registered client identity.
pub(crate) struct TokenEndpoint {
	oauth_client: ConfiguredBasicClient,
	http_client: ReqwestHttpClient,
	resource: Option<Url>,
}
impl TokenEndpoint {
	pub(crate) fn new(
		endpoints: &ServerEndpoints,
		client: &ClientInformation,
		requested_method: TokenEndpointAuthMethod,
		resource: Option<Url>,
		http_client: ReqwestHttpClient,
	) -> Self {
		let auth_url = AuthUrl::from_url(endpoints.authorization.clone());
		let token_url = TokenUrl::from_url(endpoints.token.clone());
		let method = client.auth_method(requested_method);
		let mut oauth_client = BasicClient::new(ClientId::new(client.client_id.clone()))
			.set_auth_uri(auth_url)
			.set_token_uri(token_url);

		if let Some(secret) = &client.client_secret
			&& !matches!(method, TokenEndpointAuthMethod::None)
		{
			oauth_client = oauth_client.set_client_secret(ClientSecret::new(secret.expose().into()));
		}
		if !matches!(method, TokenEndpointAuthMethod::ClientSecretBasic) {
			oauth_client = oauth_client.set_auth_type(AuthType::RequestBody);
		}

		Self { oauth_client, http_client, resource }
	}

	/// Redeems an authorization code together with its PKCE verifier.
	pub(crate) async fn exchange_code(
		&self,
		code: &str,
		pkce_verifier: &str,
		redirect_uri: &Url,
	) -> Result<TokenRecord> {
		let meta = ResponseMetadataSlot::default();
		let instrumented = self.http_client.instrumented(meta.clone());
		let redirect_url = RedirectUrl::from_url(redirect_uri.clone());
		let mut request = self
			.oauth_client
			.exchange_code(AuthorizationCode::new(code.to_owned()))
			.set_pkce_verifier(PkceCodeVerifier::new(pkce_verifier.to_owned()))
			.set_redirect_uri(Cow::Owned(redirect_url));

		if let Some(resource) = &self.resource {
			request = request.add_extra_param("resource", resource.to_string());
		}

		let response = request
			.request_async(&instrumented)
			.await
			.map_err(|e| map_request_error(GrantType::AuthorizationCode, meta.take(), e))?;

		map_token_response(response)
	}

	/// Redeems a refresh token. The returned record carries no refresh token when the server
	/// did not rotate it.
	pub(crate) async fn refresh(&self, refresh_token: &str) -> Result<TokenRecord> {
		let meta = ResponseMetadataSlot::default();
		let instrumented = self.http_client.instrumented(meta.clone());
		let refresh_secret = RefreshToken::new(refresh_token.to_owned());
		let mut request = self.oauth_client.exchange_refresh_token(&refresh_secret);

		if let Some(resource) = &self.resource {
			request = request.add_extra_param("resource", resource.to_string());
		}

		let response = request
			.request_async(&instrumented)
			.await
			.map_err(|e| map_request_error(GrantType::RefreshToken, meta.take(), e))?;

		map_token_response(response)
	}
}

fn map_token_response(response: BasicTokenResponse) -> Result<TokenRecord> {
	let mut builder = TokenRecord::builder()
		.access_token(response.access_token().secret().to_owned())
		.token_type(match response.token_type() {
			BasicTokenType::Bearer => BEARER.to_owned(),
			other => other.as_ref().to_owned(),
		})
		.issued_at(OffsetDateTime::now_utc());

	if let Some(expires_in) = response.expires_in() {
		let secs = i64::try_from(expires_in.as_secs()).map_err(|_| {
			ConfigError::invalid_field("expires_in", "value exceeds the supported range")
		})?;

		builder = builder.expires_in(Duration::seconds(secs));
	}
	if let Some(refresh) = response.refresh_token() {
		builder = builder.refresh_token(refresh.secret().to_owned());
	}
	if let Some(scopes) = response.scopes() {
		let joined = scopes.iter().map(|scope| scope.as_str()).collect::<Vec<_>>().join(" ");

		builder = builder.scope(joined);
	}

	builder.build().map_err(|e| ConfigError::from(e).into())
}

fn map_request_error(
	grant: GrantType,
	meta: Option<ResponseMetadata>,
	err: BasicRequestTokenError<HttpClientError<ReqwestError>>,
) -> Error {
	let status = meta.and_then(|value| value.status);

	match err {
		RequestTokenError::ServerResponse(response) =>
			map_server_response_error(grant, status, response),
		RequestTokenError::Request(error) => map_transport_error(grant, status, error),
		RequestTokenError::Parse(source, body) => match status {
			Some(code) if !(200..300).contains(&code) => Error::TokenExchange {
				grant: grant.as_str(),
				status,
				oauth_error: None,
				message: body_preview(&String::from_utf8_lossy(&body)),
			},
			_ => TransportError::Decode { what: "token response", source }.into(),
		},
		RequestTokenError::Other(message) => Error::TokenExchange {
			grant: grant.as_str(),
			status,
			oauth_error: None,
			message: format!("unexpected response: {message}"),
		},
	}
}

fn map_server_response_error(
	grant: GrantType,
	status: Option<u16>,
	response: BasicErrorResponse,
) -> Error {
	let code = response.error().as_ref().to_owned();
	let message = match response.error_description() {
		Some(description) => format!("{code}: {description}"),
		None => code.clone(),
	};

	Error::TokenExchange { grant: grant.as_str(), status, oauth_error: Some(code), message }
}

fn map_transport_error(
	grant: GrantType,
	status: Option<u16>,
	err: HttpClientError<ReqwestError>,
) -> Error {
	match err {
		HttpClientError::Reqwest(inner) => {
			let inner = *inner;

			if inner.is_builder() {
				return ConfigError::from(inner).into();
			}

			TransportError::network("token endpoint", inner).into()
		},
		HttpClientError::Http(inner) => ConfigError::from(inner).into(),
		HttpClientError::Io(inner) => TransportError::Io(inner).into(),
		HttpClientError::Other(message) => Error::TokenExchange {
			grant: grant.as_str(),
			status,
			oauth_error: None,
			message: format!("HTTP client error: {message}"),
		},
		_ => Error::TokenExchange {
			grant: grant.as_str(),
			status,
			oauth_error: None,
			message: "HTTP client error".into(),
		},
	}
}
