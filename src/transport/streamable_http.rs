//! Authenticated JSON-RPC over the MCP streamable HTTP binding.
//!
//! Each outgoing message is one POST. The server answers with a JSON body (a single message
//! or a batch), an SSE stream of `data:` events, or `202 Accepted` with no body. The session
//! id assigned on the first response is echoed on every later request.

// crates.io
use reqwest::{
	Response, StatusCode,
	header::{ACCEPT, CONTENT_TYPE, HeaderMap},
};
// self
use crate::{
	_prelude::*,
	error::{TransportError, body_preview},
	flows::CredentialProvider,
	http::{ReqwestHttpClient, decode_json},
};

/// Header carrying the server-assigned session id.
pub const SESSION_ID_HEADER: &str = "mcp-session-id";

const TARGET: &str = "MCP endpoint";
const ACCEPT_STREAMABLE: &str = "application/json, text/event-stream";

/// Shared, late-bound session id.
#[derive(Clone, Debug, Default)]
pub struct SessionId(Arc<RwLock<Option<String>>>);
impl SessionId {
	/// Current session id, once the server has assigned one.
	pub fn get(&self) -> Option<String> {
		self.0.read().clone()
	}

	fn capture(&self, headers: &HeaderMap) {
		let Some(value) = headers.get(SESSION_ID_HEADER).and_then(|value| value.to_str().ok())
		else {
			return;
		};
		let mut slot = self.0.write();

		if slot.as_deref() != Some(value) {
			tracing::debug!("MCP session established.");

			*slot = Some(value.to_owned());
		}
	}

	fn clear(&self) -> Option<String> {
		self.0.write().take()
	}
}

/// POST-per-message client bound to one MCP endpoint.
pub struct StreamableHttpClient {
	http_client: ReqwestHttpClient,
	endpoint: Url,
	credentials: Arc<dyn CredentialProvider>,
	session_id: SessionId,
}
impl StreamableHttpClient {
	/// Binds `endpoint`, authorizing every request through `credentials`.
	pub fn new(
		http_client: ReqwestHttpClient,
		endpoint: Url,
		credentials: Arc<dyn CredentialProvider>,
	) -> Self {
		Self { http_client, endpoint, credentials, session_id: SessionId::default() }
	}

	/// Target endpoint.
	pub fn endpoint(&self) -> &Url {
		&self.endpoint
	}

	/// Handle to the session id assigned by the server.
	pub fn session_id(&self) -> SessionId {
		self.session_id.clone()
	}

	/// Sends one JSON-RPC message and returns every message the server answered with.
	///
	/// A `401` triggers [`CredentialProvider::handle_unauthorized`] and exactly one retry.
	pub async fn send(&self, message: &JsonValue) -> Result<Vec<JsonValue>> {
		let body = message.to_string();
		let mut response = self.post(&body).await?;

		if response.status() == StatusCode::UNAUTHORIZED {
			tracing::debug!("MCP endpoint rejected the access token; refreshing once.");

			self.credentials.handle_unauthorized().await?;

			response = self.post(&body).await?;
		}

		self.session_id.capture(response.headers());

		let status = response.status();
		let is_event_stream = response
			.headers()
			.get(CONTENT_TYPE)
			.and_then(|value| value.to_str().ok())
			.is_some_and(|value| value.starts_with("text/event-stream"));
		let payload =
			response.bytes().await.map_err(|e| TransportError::network(TARGET, e))?;

		if !status.is_success() {
			return Err(TransportError::Status {
				target: TARGET,
				status: status.as_u16(),
				body: body_preview(&String::from_utf8_lossy(&payload)),
			}
			.into());
		}
		if status == StatusCode::ACCEPTED || payload.iter().all(u8::is_ascii_whitespace) {
			return Ok(Vec::new());
		}

		if is_event_stream {
			parse_event_stream(&String::from_utf8_lossy(&payload))
		} else {
			parse_messages(&payload)
		}
	}

	/// Ends the server-side session with a `DELETE`, if one was established.
	pub async fn terminate(&self) -> Result<()> {
		let Some(session_id) = self.session_id.clear() else {
			return Ok(());
		};
		let request = self
			.http_client
			.delete(self.endpoint.clone())
			.header(SESSION_ID_HEADER, session_id);
		let request = self.credentials.authorize_request(request).await?;
		let response = request.send().await.map_err(|e| TransportError::network(TARGET, e))?;
		let status = response.status();

		// Servers without explicit session teardown answer 405.
		if status.is_success() || status == StatusCode::METHOD_NOT_ALLOWED {
			tracing::debug!(status = status.as_u16(), "MCP session terminated.");

			return Ok(());
		}

		Err(TransportError::Status {
			target: TARGET,
			status: status.as_u16(),
			body: body_preview(&response.text().await.unwrap_or_default()),
		}
		.into())
	}

	async fn post(&self, body: &str) -> Result<Response> {
		let mut request = self
			.http_client
			.post(self.endpoint.clone())
			.header(CONTENT_TYPE, "application/json")
			.header(ACCEPT, ACCEPT_STREAMABLE)
			.body(body.to_owned());

		if let Some(session_id) = self.session_id.get() {
			request = request.header(SESSION_ID_HEADER, session_id);
		}

		let request = self.credentials.authorize_request(request).await?;

		Ok(request.send().await.map_err(|e| TransportError::network(TARGET, e))?)
	}
}
impl Debug for StreamableHttpClient {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("StreamableHttpClient")
			.field("endpoint", &self.endpoint.as_str())
			.field("session_established", &self.session_id.get().is_some())
			.finish()
	}
}

fn parse_messages(payload: &[u8]) -> Result<Vec<JsonValue>> {
	match decode_json::<JsonValue>("MCP response", payload)? {
		JsonValue::Array(batch) => Ok(batch),
		message => Ok(vec![message]),
	}
}

fn parse_event_stream(stream: &str) -> Result<Vec<JsonValue>> {
	let mut messages = Vec::new();
	let mut data = Vec::new();

	for line in stream.lines().chain(std::iter::once("")) {
		if line.is_empty() {
			if !data.is_empty() {
				messages.extend(parse_messages(data.join("\n").as_bytes())?);
				data.clear();
			}

			continue;
		}
		if let Some(value) = line.strip_prefix("data:") {
			data.push(value.strip_prefix(' ').unwrap_or(value));
		}
	}

	Ok(messages)
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn json_batches_are_flattened() {
		let messages = parse_messages(br#"[{"id":1},{"id":2}]"#).expect("Batch should parse.");

		assert_eq!(messages.len(), 2);
		assert_eq!(messages[1]["id"], 2);

		let single = parse_messages(br#"{"id":3}"#).expect("Single message should parse.");

		assert_eq!(single, vec![serde_json::json!({ "id": 3 })]);
	}

	#[test]
	fn event_stream_joins_data_lines_per_event() {
		let stream = "event: message\nid: 1\ndata: {\"id\":1,\ndata: \"result\":{}}\n\n: keep-alive\n\ndata: {\"id\":2}";
		let messages = parse_event_stream(stream).expect("Event stream should parse.");

		assert_eq!(messages.len(), 2);
		assert_eq!(messages[0]["id"], 1);
		assert!(messages[0]["result"].is_object());
		assert_eq!(messages[1]["id"], 2);
	}

	#[test]
	fn malformed_event_data_is_a_decode_error() {
		let err = parse_event_stream("data: not-json\n\n").expect_err("Bad data should fail.");

		assert!(matches!(err, Error::Transport(TransportError::Decode { .. })));
	}
}
