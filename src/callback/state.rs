//! Outcome captured by the callback listener.

// self
use crate::_prelude::*;

/// Result of the first terminal redirect, echoed back to the user agent as JSON.
///
/// At most one of `authorization_code` and `error` is ever set, and once either is set the
/// value never changes for the lifetime of the listener.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationRequestState {
	/// Authorization code delivered by the server.
	pub authorization_code: Option<String>,
	/// Opaque `state` value echoed by the server.
	pub state: Option<String>,
	/// OAuth `error` code delivered instead of a code.
	pub error: Option<String>,
}
impl AuthorizationRequestState {
	/// Returns `true` once a code or an error has been recorded.
	pub fn is_terminal(&self) -> bool {
		self.authorization_code.is_some() || self.error.is_some()
	}

	/// Records a successful redirect. Returns `false` when the state was already terminal.
	pub(crate) fn record_code(&mut self, code: String, state: Option<String>) -> bool {
		if self.is_terminal() {
			return false;
		}

		self.authorization_code = Some(code);
		self.state = state;

		true
	}

	/// Records a denied redirect. Returns `false` when the state was already terminal.
	pub(crate) fn record_error(&mut self, error: String) -> bool {
		if self.is_terminal() {
			return false;
		}

		self.error = Some(error);

		true
	}
}

/// Redirect query parameters; first occurrence wins and empty values count as absent.
#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct CallbackParams {
	pub(crate) code: Option<String>,
	pub(crate) state: Option<String>,
	pub(crate) error: Option<String>,
	pub(crate) error_description: Option<String>,
}
impl CallbackParams {
	pub(crate) fn parse(query: &str) -> Self {
		let mut params = Self::default();

		for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
			let slot = match key.as_ref() {
				"code" => &mut params.code,
				"state" => &mut params.state,
				"error" => &mut params.error,
				"error_description" => &mut params.error_description,
				_ => continue,
			};

			if slot.is_none() && !value.is_empty() {
				*slot = Some(value.into_owned());
			}
		}

		params
	}
}
