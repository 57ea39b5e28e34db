// std
use std::sync::atomic::{AtomicUsize, Ordering};
// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
// self
use mcp_oauth_broker::{
	_preludet::*,
	config::BaseConfig,
	connection::ConnectionSetup,
	flows::CredentialProvider,
	provider::{FnRedirect, RedirectStrategy},
};

/// Follows the authorization URL to the loopback callback with `code`, counting dispatches.
fn counting_redirect(code: &'static str, dispatched: Arc<AtomicUsize>) -> Arc<dyn RedirectStrategy> {
	Arc::new(FnRedirect::new(move |authorize_url: Url| {
		let dispatched = dispatched.clone();

		async move {
			dispatched.fetch_add(1, Ordering::SeqCst);

			let pairs: HashMap<String, String> = authorize_url.query_pairs().into_owned().collect();
			let mut callback = Url::parse(&pairs["redirect_uri"])
				.expect("Authorization URL should carry a parseable redirect URI.");

			callback.set_host(Some("127.0.0.1")).expect("Loopback host should be accepted.");
			callback.set_query(Some(&format!("code={code}&state={}", pairs["state"])));

			ReqwestClient::new()
				.get(callback)
				.send()
				.await
				.map_err(|e| Error::RedirectDispatch { message: e.to_string() })?;

			Ok::<(), Error>(())
		}
	}))
}

fn base_config(server: &MockServer) -> BaseConfig {
	BaseConfig::new(format!("http://{}", server.host()), TEST_SOFTWARE_STATEMENT)
		.with_port(server.port())
}

#[tokio::test]
async fn base_config_drives_registration_and_code_exchange() -> Result<()> {
	let server = MockServer::start_async().await;
	let register = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/register")
				.body_includes("\"software_statement\":\"abc.def.ghi\"");
			then.status(201)
				.header("content-type", "application/json")
				.body("{\"client_id\":\"client-1\",\"client_secret\":\"secret-1\"}");
		})
		.await;
	let token = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/token")
				.body_includes("grant_type=authorization_code")
				.body_includes("code=XYZ");
			then.status(200).header("content-type", "application/json").body(
				"{\"access_token\":\"access-1\",\"refresh_token\":\"refresh-1\",\"token_type\":\"bearer\",\"expires_in\":3600}",
			);
		})
		.await;
	let dispatched = Arc::new(AtomicUsize::new(0));
	let setup = ConnectionSetup::from_base_config_with_redirect(
		base_config(&server),
		counting_redirect("XYZ", dispatched.clone()),
	)?;
	let credentials = setup.create_auth_layer().await?;

	register.assert_async().await;
	token.assert_async().await;

	assert_eq!(dispatched.load(Ordering::SeqCst), 1);
	assert_eq!(credentials.access_token().await?.expose(), "access-1");

	Ok(())
}

#[tokio::test]
async fn reconnecting_with_stale_tokens_refreshes_instead_of_redirecting() -> Result<()> {
	let server = MockServer::start_async().await;
	let _register = server
		.mock_async(|when, then| {
			when.method(POST).path("/register");
			then.status(201)
				.header("content-type", "application/json")
				.body("{\"client_id\":\"client-1\",\"client_secret\":\"secret-1\"}");
		})
		.await;
	// Expires inside the refresh window, so the next connect sees stale tokens.
	let exchange = server
		.mock_async(|when, then| {
			when.method(POST).path("/token").body_includes("grant_type=authorization_code");
			then.status(200).header("content-type", "application/json").body(
				"{\"access_token\":\"access-1\",\"refresh_token\":\"refresh-1\",\"token_type\":\"bearer\",\"expires_in\":5}",
			);
		})
		.await;
	let refresh = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/token")
				.body_includes("grant_type=refresh_token")
				.body_includes("refresh_token=refresh-1");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"access_token\":\"access-2\",\"token_type\":\"bearer\",\"expires_in\":3600}");
		})
		.await;
	let dispatched = Arc::new(AtomicUsize::new(0));
	let setup = ConnectionSetup::from_base_config_with_redirect(
		base_config(&server),
		counting_redirect("XYZ", dispatched.clone()),
	)?;

	setup.create_auth_layer().await?;
	exchange.assert_async().await;

	let credentials = setup.create_auth_layer().await?;

	refresh.assert_async().await;

	assert_eq!(dispatched.load(Ordering::SeqCst), 1);
	assert_eq!(credentials.access_token().await?.expose(), "access-2");

	Ok(())
}
