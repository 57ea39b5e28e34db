//! Per-attempt authorization request: state, PKCE pair, and the authorization URL.

// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::{Rng, distr::Alphanumeric};
use sha2::{Digest, Sha256};
// self
use crate::{_prelude::*, provider::ServerEndpoints};

const STATE_LEN: usize = 32;
const PKCE_VERIFIER_LEN: usize = 64;

/// Supported PKCE challenge methods surfaced via [`AuthorizationSession`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PkceCodeChallengeMethod {
	/// SHA-256 based PKCE (RFC 7636 S256).
	S256,
}
impl PkceCodeChallengeMethod {
	/// Returns the RFC 7636 identifier for the challenge method.
	pub fn as_str(self) -> &'static str {
		match self {
			PkceCodeChallengeMethod::S256 => "S256",
		}
	}
}

/// Parameters that shape the authorization URL beyond the mandatory ones.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct AuthorizationParams<'a> {
	pub(crate) scope: Option<&'a str>,
	pub(crate) resource: Option<&'a Url>,
}

/// Authorization Code + PKCE handshake metadata for one attempt.
#[derive(Clone)]
pub struct AuthorizationSession {
	/// Opaque state value that must round-trip via the redirect.
	pub state: String,
	/// Redirect URI pointing at the callback listener.
	pub redirect_uri: Url,
	/// Authorization URL handed to the redirect strategy.
	pub authorize_url: Url,
	pkce: PkcePair,
}
impl AuthorizationSession {
	pub(crate) fn build(
		endpoints: &ServerEndpoints,
		client_id: &str,
		redirect_uri: Url,
		params: AuthorizationParams<'_>,
	) -> Self {
		let state = random_string(STATE_LEN);
		let pkce = PkcePair::generate();
		let mut authorize_url = endpoints.authorization.clone();

		{
			let mut pairs = authorize_url.query_pairs_mut();

			pairs.append_pair("response_type", "code");
			pairs.append_pair("client_id", client_id);
			pairs.append_pair("redirect_uri", redirect_uri.as_str());
			pairs.append_pair("state", &state);
			pairs.append_pair("code_challenge", &pkce.challenge);
			pairs.append_pair("code_challenge_method", pkce.method.as_str());

			if let Some(scope) = params.scope {
				pairs.append_pair("scope", scope);
			}
			if let Some(resource) = params.resource {
				pairs.append_pair("resource", resource.as_str());
			}
		}

		Self { state, redirect_uri, authorize_url, pkce }
	}

	/// PKCE code challenge derived from the secret verifier.
	pub fn code_challenge(&self) -> &str {
		&self.pkce.challenge
	}

	/// PKCE challenge method (currently always `S256`).
	pub fn code_challenge_method(&self) -> PkceCodeChallengeMethod {
		self.pkce.method
	}

	/// Validates the `state` captured by the callback listener. Absent state fails.
	pub fn validate_state(&self, returned_state: Option<&str>) -> Result<()> {
		match returned_state {
			Some(returned) if returned == self.state => Ok(()),
			_ => Err(Error::StateMismatch),
		}
	}

	pub(crate) fn pkce_verifier(&self) -> &str {
		&self.pkce.verifier
	}
}
impl Debug for AuthorizationSession {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AuthorizationSession")
			.field("state", &self.state)
			.field("redirect_uri", &self.redirect_uri)
			.field("authorize_url", &self.authorize_url)
			.field("code_challenge", &self.pkce.challenge)
			.field("code_challenge_method", &self.pkce.method)
			.finish()
	}
}

#[derive(Clone)]
struct PkcePair {
	verifier: String,
	challenge: String,
	method: PkceCodeChallengeMethod,
}
impl PkcePair {
	fn generate() -> Self {
		let verifier = random_string(PKCE_VERIFIER_LEN);
		let challenge = compute_pkce_challenge(&verifier);

		Self { verifier, challenge, method: PkceCodeChallengeMethod::S256 }
	}
}

fn random_string(len: usize) -> String {
	rand::rng().sample_iter(Alphanumeric).take(len).map(char::from).collect()
}

fn compute_pkce_challenge(verifier: &str) -> String {
	let digest = Sha256::digest(verifier.as_bytes());

	URL_SAFE_NO_PAD.encode(digest)
}
