// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
// self
use mcp_oauth_broker::{_preludet::*, provider::Discovery};

fn server_url(server: &MockServer, path: &str) -> Url {
	Url::parse(&server.url(path)).expect("Mock server URL should parse.")
}

#[tokio::test]
async fn published_metadata_drives_the_endpoints() -> Result<()> {
	let server = MockServer::start_async().await;
	let resource = server
		.mock_async(|when, then| {
			when.method(GET).path("/.well-known/oauth-protected-resource");
			then.status(200).header("content-type", "application/json").body(format!(
				"{{\"resource\":\"{}\",\"authorization_servers\":[\"{}\"],\"scopes_supported\":\"mcp:read mcp:write\"}}",
				server.url("/mcp"),
				server.url("/tenant"),
			));
		})
		.await;
	let metadata = server
		.mock_async(|when, then| {
			when.method(GET).path("/.well-known/oauth-authorization-server/tenant");
			then.status(200).header("content-type", "application/json").body(format!(
				"{{\"issuer\":\"{}\",\"authorization_endpoint\":\"{}\",\"token_endpoint\":\"{}\",\"code_challenge_methods_supported\":[\"S256\"]}}",
				server.url("/tenant"),
				server.url("/tenant/oauth/authorize"),
				server.url("/tenant/oauth/token"),
			));
		})
		.await;
	let discovery = Discovery::run(&test_reqwest_http_client(), &server_url(&server, "/mcp")).await?;

	resource.assert_async().await;
	metadata.assert_async().await;

	assert_eq!(discovery.auth_base, server_url(&server, "/tenant"));
	assert_eq!(discovery.endpoints.authorization, server_url(&server, "/tenant/oauth/authorize"));
	assert_eq!(discovery.endpoints.token, server_url(&server, "/tenant/oauth/token"));
	// No registration endpoint advertised, so the origin default applies.
	assert_eq!(discovery.endpoints.registration, server_url(&server, "/register"));
	assert_eq!(discovery.resource(), Some(&server_url(&server, "/mcp")));
	assert_eq!(
		discovery.resource_metadata.map(|metadata| metadata.scopes_supported),
		Some(vec!["mcp:read".to_owned(), "mcp:write".to_owned()])
	);

	Ok(())
}

#[tokio::test]
async fn missing_metadata_falls_back_to_origin_defaults() -> Result<()> {
	let server = MockServer::start_async().await;
	let discovery = Discovery::run(&test_reqwest_http_client(), &server_url(&server, "/mcp")).await?;

	assert_eq!(discovery.auth_base, server_url(&server, "/"));
	assert_eq!(discovery.endpoints.authorization, server_url(&server, "/authorize"));
	assert_eq!(discovery.endpoints.token, server_url(&server, "/token"));
	assert_eq!(discovery.endpoints.registration, server_url(&server, "/register"));
	assert!(discovery.resource().is_none());

	Ok(())
}

#[tokio::test]
async fn malformed_metadata_is_an_error() {
	let server = MockServer::start_async().await;
	let _resource = server
		.mock_async(|when, then| {
			when.method(GET).path("/.well-known/oauth-protected-resource");
			then.status(200).header("content-type", "application/json").body("{\"authorization_servers\":42}");
		})
		.await;
	let err = Discovery::run(&test_reqwest_http_client(), &server_url(&server, "/"))
		.await
		.expect_err("Malformed metadata should fail discovery.");

	match err {
		Error::Discovery { url, .. } => assert!(url.ends_with("/.well-known/oauth-protected-resource")),
		other => panic!("Unexpected error: {other:?}."),
	}
}
