// crates.io
use httpmock::prelude::*;
use serde_json::json;
// self
use mcp_oauth_broker::{
	_preludet::*,
	auth::{ClientInformation, TokenRecord},
	config::BaseConfig,
	connection::ConnectionSetup,
	flows::OAuthProvider,
	provider::FnRedirect,
	store::TokenStore,
};

async fn authenticated_provider(server: &MockServer) -> OAuthProvider {
	let redirect = Arc::new(FnRedirect::new(|_: Url| async {
		Err::<(), Error>(Error::RedirectDispatch { message: "tokens are seeded".into() })
	}));
	let (provider, store) = build_test_provider(test_provider_config(&server.base_url()), redirect);
	let record = TokenRecord::builder()
		.access_token("access-0")
		.refresh_token("refresh-0")
		.expires_in(Duration::hours(1))
		.build()
		.expect("Token fixture should build.");

	store.set_tokens(record).await.expect("Seeding tokens should succeed.");
	store
		.set_client_info(ClientInformation::new("client-1").with_client_secret("secret-1"))
		.await
		.expect("Seeding client info should succeed.");

	provider
}

fn connection(server: &MockServer, provider: OAuthProvider) -> ConnectionSetup {
	let config = BaseConfig::new(format!("http://{}", server.host()), TEST_SOFTWARE_STATEMENT)
		.with_port(server.port());

	ConnectionSetup::new(config, Arc::new(provider)).with_http_client(test_reqwest_http_client())
}

#[tokio::test]
async fn session_id_is_captured_and_echoed() {
	let server = MockServer::start_async().await;
	let initialize = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/mcp")
				.header("authorization", "Bearer access-0")
				.header("accept", "application/json, text/event-stream")
				.body_includes("\"method\":\"initialize\"");
			then.status(200)
				.header("content-type", "application/json")
				.header("mcp-session-id", "session-1")
				.body("{\"jsonrpc\":\"2.0\",\"id\":1,\"result\":{\"protocolVersion\":\"2025-06-18\"}}");
		})
		.await;
	let list = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/mcp")
				.header("mcp-session-id", "session-1")
				.body_includes("\"method\":\"tools/list\"");
			then.status(200).header("content-type", "text/event-stream").body(
				"event: message\ndata: {\"jsonrpc\":\"2.0\",\"id\":2,\"result\":{\"tools\":[]}}\n\n",
			);
		})
		.await;
	let terminate = server
		.mock_async(|when, then| {
			when.method(DELETE).path("/mcp").header("mcp-session-id", "session-1");
			then.status(200);
		})
		.await;
	let setup = connection(&server, authenticated_provider(&server).await);
	let (replies, session_id) = setup
		.with_connection(|mut streams| async move {
			let mut replies = Vec::new();

			for (id, method) in [(1, "initialize"), (2, "tools/list")] {
				streams
					.writer
					.send(json!({ "jsonrpc": "2.0", "id": id, "method": method }))
					.await
					.expect("Writer should accept messages while connected.");
				replies.push(
					streams
						.reader
						.recv()
						.await
						.expect("Reader should yield a reply.")
						.expect("Reply should be a message."),
				);
			}

			(replies, streams.session_id())
		})
		.await
		.expect("Connection should open.");

	initialize.assert_async().await;
	list.assert_async().await;
	terminate.assert_async().await;

	assert_eq!(session_id.as_deref(), Some("session-1"));
	assert_eq!(replies[0]["result"]["protocolVersion"], "2025-06-18");
	assert_eq!(replies[1]["id"], 2);
}

#[tokio::test]
async fn unauthorized_responses_refresh_and_retry_once() {
	let server = MockServer::start_async().await;
	let rejected = server
		.mock_async(|when, then| {
			when.method(POST).path("/mcp").header("authorization", "Bearer access-0");
			then.status(401);
		})
		.await;
	let token = server
		.mock_async(|when, then| {
			when.method(POST).path("/token").body_includes("refresh_token=refresh-0");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"access_token\":\"access-1\",\"token_type\":\"bearer\",\"expires_in\":3600}");
		})
		.await;
	let notified = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/mcp")
				.header("authorization", "Bearer access-1")
				.body_includes("notifications/initialized");
			then.status(202);
		})
		.await;
	let ping = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/mcp")
				.header("authorization", "Bearer access-1")
				.body_includes("\"method\":\"ping\"");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"jsonrpc\":\"2.0\",\"id\":7,\"result\":{}}");
		})
		.await;
	let setup = connection(&server, authenticated_provider(&server).await);
	let mut session = setup.connect().await.expect("Connection should open.");
	let streams = session.streams();

	streams
		.writer
		.send(json!({ "jsonrpc": "2.0", "method": "notifications/initialized" }))
		.await
		.expect("Writer should accept the notification.");
	streams
		.writer
		.send(json!({ "jsonrpc": "2.0", "id": 7, "method": "ping" }))
		.await
		.expect("Writer should accept the ping.");

	// The notification's 202 carries no messages, so the first reply is the ping result.
	let reply = streams
		.reader
		.recv()
		.await
		.expect("Reader should yield a reply.")
		.expect("Reply should be a message.");

	assert_eq!(reply["id"], 7);

	rejected.assert_async().await;
	token.assert_async().await;
	notified.assert_async().await;
	ping.assert_async().await;

	session.close().await;
}

#[tokio::test]
async fn invalid_endpoint_is_a_setup_error() {
	let server = MockServer::start_async().await;
	let provider = authenticated_provider(&server).await;
	let setup = ConnectionSetup::new(
		BaseConfig::new("not a url", TEST_SOFTWARE_STATEMENT),
		Arc::new(provider),
	);
	let err = setup
		.with_connection(|_streams| async {})
		.await
		.expect_err("An unparseable server URL should fail before connecting.");

	assert!(matches!(err, Error::TransportSetup { .. }));
}
