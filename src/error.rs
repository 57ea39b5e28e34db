//! Crate-level error types shared by the listener, flows, stores, and transport.

// self
use crate::_prelude::*;

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

pub(crate) type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Storage-layer failure.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		crate::store::StoreError,
	),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Transport failure (DNS, TCP, TLS, malformed payloads).
	#[error(transparent)]
	Transport(#[from] TransportError),

	/// Every probed callback port was already taken.
	#[error("No free callback port after {attempts} attempt(s) starting at {base}.")]
	PortInUse {
		/// First port that was probed.
		base: u16,
		/// Number of ports probed.
		attempts: u16,
	},
	/// The callback listener could not bind for a reason other than address reuse.
	#[error("Callback listener failed to bind {addr}.")]
	Bind {
		/// Socket address that failed to bind.
		addr: String,
		/// Underlying OS error.
		#[source]
		source: std::io::Error,
	},
	/// The authorization server (or the user) declined the request.
	#[error("Authorization was denied: {error}.")]
	AuthorizationDenied {
		/// Literal `error` query parameter from the redirect.
		error: String,
	},
	/// No redirect reached the callback listener within the window.
	#[error("Timed out after {timeout:?} waiting for the authorization callback.")]
	CallbackTimeout {
		/// Configured wait window.
		timeout: StdDuration,
	},
	/// The redirect carried a `state` that does not match the one sent.
	#[error("Authorization state mismatch.")]
	StateMismatch,
	/// Dynamic client registration returned a non-success response.
	#[error("Client registration failed: {message}.")]
	Registration {
		/// HTTP status code, when available.
		status: Option<u16>,
		/// Server- or crate-supplied reason string.
		message: String,
	},
	/// The token endpoint rejected an authorization-code or refresh exchange.
	#[error("Token endpoint rejected the {grant} grant: {message}.")]
	TokenExchange {
		/// Grant label (`authorization_code` or `refresh_token`).
		grant: &'static str,
		/// HTTP status code, when available.
		status: Option<u16>,
		/// OAuth `error` code returned by the provider, when available.
		oauth_error: Option<String>,
		/// Provider- or crate-supplied reason string.
		message: String,
	},
	/// The transport stream pair could not be established.
	#[error("Transport setup failed: {message}.")]
	TransportSetup {
		/// Reason string.
		message: String,
		/// Underlying failure, when one exists.
		#[source]
		source: Option<BoxError>,
	},
	/// Delivering the authorization URL failed.
	#[error("Authorization redirect could not be dispatched: {message}.")]
	RedirectDispatch {
		/// Reason string.
		message: String,
	},
	/// Metadata discovery failed for a reason other than the document being absent.
	#[error("Metadata discovery failed for {url}: {message}.")]
	Discovery {
		/// Metadata URL that was queried.
		url: String,
		/// Reason string.
		message: String,
	},
	/// Another authorization attempt is already running on this provider.
	#[error("An authorization flow is already in progress.")]
	FlowInProgress,
	/// An operation required tokens that the provider does not hold.
	#[error("Provider holds no tokens; run initialize first.")]
	NotAuthenticated,
}

/// Configuration and validation failures.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// HTTP request construction failed.
	#[error(transparent)]
	HttpRequest(#[from] oauth2::http::Error),
	/// An endpoint URL could not be parsed.
	#[error("The {endpoint} endpoint is not a valid URL.")]
	InvalidEndpoint {
		/// Which endpoint failed validation.
		endpoint: &'static str,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Redirect URI cannot be parsed.
	#[error("Redirect URI is invalid.")]
	InvalidRedirect {
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// A configuration field failed validation.
	#[error("Invalid `{field}`: {reason}.")]
	InvalidField {
		/// Field name.
		field: &'static str,
		/// Validation message.
		reason: String,
	},
	/// Cached token record is missing a refresh secret.
	#[error("Cached token record is missing a refresh token.")]
	MissingRefreshToken,
	/// Cached client registration is missing.
	#[error("No registered client information is available.")]
	MissingClientInformation,
	/// The callback listener is not accepting connections.
	#[error("Callback listener is not running.")]
	ListenerNotRunning,
	/// Token record builder validation failed.
	#[error("Unable to build token record.")]
	TokenBuild(#[from] crate::auth::TokenRecordBuilderError),
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}

	pub(crate) fn invalid_field(field: &'static str, reason: impl Into<String>) -> Self {
		Self::InvalidField { field, reason: reason.into() }
	}
}
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Transport-level failures (network, IO, payload decoding).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling {target}.")]
	Network {
		/// Logical target (`token endpoint`, `registration endpoint`, ...).
		target: &'static str,
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred during transport.")]
	Io(#[from] std::io::Error),
	/// A response body could not be decoded.
	#[error("Failed to decode the {what}.")]
	Decode {
		/// Payload being decoded.
		what: &'static str,
		/// Structured parsing failure including the JSON path.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
	/// The remote returned an unexpected HTTP status.
	#[error("{target} returned HTTP {status}: {body}.")]
	Status {
		/// Logical target.
		target: &'static str,
		/// HTTP status code.
		status: u16,
		/// Truncated response body.
		body: String,
	},
	/// The transport session has shut down.
	#[error("Transport session is closed.")]
	Closed,
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(
		target: &'static str,
		src: impl 'static + Send + Sync + std::error::Error,
	) -> Self {
		Self::Network { target, source: Box::new(src) }
	}
}

const BODY_PREVIEW_LIMIT: usize = 256;

/// Truncates response bodies embedded in error messages.
pub(crate) fn body_preview(body: &str) -> String {
	let trimmed = body.trim();

	if trimmed.chars().count() <= BODY_PREVIEW_LIMIT {
		return trimmed.to_owned();
	}

	let mut buf: String = trimmed.chars().take(BODY_PREVIEW_LIMIT).collect();

	buf.push('…');

	buf
}
