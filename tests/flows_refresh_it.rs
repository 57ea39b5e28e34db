// crates.io
use httpmock::prelude::*;
// self
use mcp_oauth_broker::{
	_preludet::*,
	auth::{ClientInformation, TokenRecord},
	error::ConfigError,
	flows::{AuthState, OAuthProvider},
	provider::FnRedirect,
	store::{MemoryStore, TokenStore},
};

async fn seeded_provider(
	server_url: &str,
	refresh_token: Option<&str>,
	expires_in: Duration,
) -> (OAuthProvider, Arc<MemoryStore>) {
	let redirect = Arc::new(FnRedirect::new(|_: Url| async {
		Err::<(), Error>(Error::RedirectDispatch { message: "no user agent in refresh tests".into() })
	}));
	let (provider, store) = build_test_provider(test_provider_config(server_url), redirect);
	let mut builder = TokenRecord::builder()
		.access_token("access-0")
		.scope("mcp:read")
		.expires_in(expires_in);

	if let Some(token) = refresh_token {
		builder = builder.refresh_token(token);
	}

	store
		.set_tokens(builder.build().expect("Token fixture should build."))
		.await
		.expect("Seeding tokens should succeed.");
	store
		.set_client_info(ClientInformation::new("client-1").with_client_secret("secret-1"))
		.await
		.expect("Seeding client info should succeed.");

	(provider, store)
}

#[tokio::test]
async fn refresh_keeps_the_previous_refresh_token_when_not_rotated() {
	let server = MockServer::start_async().await;
	let token = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/token")
				.body_includes("grant_type=refresh_token")
				.body_includes("refresh_token=refresh-0");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"access_token\":\"access-1\",\"token_type\":\"bearer\",\"expires_in\":3600}");
		})
		.await;
	let (provider, store) =
		seeded_provider(&server.base_url(), Some("refresh-0"), Duration::hours(1)).await;
	let record = provider.refresh().await.expect("Refresh should succeed.");

	token.assert_async().await;

	assert_eq!(record.access_token.expose(), "access-1");
	assert_eq!(record.refresh_token.as_ref().map(|secret| secret.expose()), Some("refresh-0"));
	assert_eq!(record.scope.as_deref(), Some("mcp:read"));
	assert_eq!(provider.auth_state(), AuthState::Authenticated);

	let stored = store.tokens().expect("Rotated tokens should be stored.");

	assert_eq!(stored.access_token.expose(), "access-1");
}

#[tokio::test]
async fn access_token_refreshes_inside_the_window() {
	let server = MockServer::start_async().await;
	let token = server
		.mock_async(|when, then| {
			when.method(POST).path("/token").body_includes("grant_type=refresh_token");
			then.status(200).header("content-type", "application/json").body(
				"{\"access_token\":\"access-1\",\"refresh_token\":\"refresh-1\",\"token_type\":\"bearer\",\"expires_in\":3600}",
			);
		})
		.await;
	let (provider, store) =
		seeded_provider(&server.base_url(), Some("refresh-0"), Duration::seconds(30)).await;
	let access = provider.access_token().await.expect("Near-expiry tokens should refresh.");

	token.assert_async().await;

	assert_eq!(access.expose(), "access-1");
	assert_eq!(
		store.tokens().and_then(|record| record.refresh_token).map(|secret| secret.expose().to_owned()),
		Some("refresh-1".to_owned())
	);
}

#[tokio::test]
async fn rejected_refresh_moves_to_failed() {
	let server = MockServer::start_async().await;
	let token = server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(400)
				.header("content-type", "application/json")
				.body("{\"error\":\"invalid_grant\",\"error_description\":\"refresh token revoked\"}");
		})
		.await;
	let (provider, store) =
		seeded_provider(&server.base_url(), Some("refresh-0"), Duration::hours(1)).await;
	let err = provider.refresh().await.expect_err("Rejected refresh should fail.");

	token.assert_async().await;

	match err {
		Error::TokenExchange { grant, status, oauth_error, .. } => {
			assert_eq!(grant, "refresh_token");
			assert_eq!(status, Some(400));
			assert_eq!(oauth_error.as_deref(), Some("invalid_grant"));
		},
		other => panic!("Unexpected error: {other:?}."),
	}

	assert_eq!(provider.auth_state(), AuthState::Failed);
	assert_eq!(
		store.tokens().map(|record| record.access_token.expose().to_owned()).as_deref(),
		Some("access-0")
	);
}

#[tokio::test]
async fn refresh_without_refresh_token_is_a_config_error() {
	let (provider, _store) =
		seeded_provider("http://127.0.0.1:9", None, Duration::hours(1)).await;
	let err = provider.refresh().await.expect_err("Refresh needs a refresh token.");

	assert!(matches!(err, Error::Config(ConfigError::MissingRefreshToken)));
}

#[tokio::test]
async fn expired_tokens_without_refresh_token_need_authorization() {
	let (provider, store) =
		seeded_provider("http://127.0.0.1:9", None, Duration::hours(1)).await;
	let issued = OffsetDateTime::now_utc() - Duration::hours(2);
	let expired = TokenRecord::builder()
		.access_token("access-old")
		.issued_at(issued)
		.expires_in(Duration::hours(1))
		.build()
		.expect("Expired token fixture should build.");

	store.set_tokens(expired).await.expect("Replacing tokens should succeed.");

	let err = provider.access_token().await.expect_err("Expired tokens should not be returned.");

	assert!(matches!(err, Error::NotAuthenticated));
}

#[tokio::test]
async fn initialize_refreshes_stale_tokens_without_redirecting() {
	let server = MockServer::start_async().await;
	let token = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/token")
				.body_includes("grant_type=refresh_token")
				.body_includes("refresh_token=refresh-0");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"access_token\":\"access-1\",\"token_type\":\"bearer\",\"expires_in\":3600}");
		})
		.await;
	// The redirect strategy fails, so reaching it would surface `RedirectDispatch`.
	let (provider, store) =
		seeded_provider(&server.base_url(), Some("refresh-0"), Duration::seconds(5)).await;

	provider.initialize().await.expect("Stale tokens should be refreshed in place.");

	token.assert_async().await;

	assert_eq!(provider.auth_state(), AuthState::Authenticated);

	let stored = store.tokens().expect("Refreshed tokens should be stored.");

	assert_eq!(stored.access_token.expose(), "access-1");
	assert_eq!(stored.refresh_token.as_ref().map(|secret| secret.expose()), Some("refresh-0"));
}

#[tokio::test]
async fn initialize_with_rejected_refresh_fails_without_redirecting() {
	let server = MockServer::start_async().await;
	let token = server
		.mock_async(|when, then| {
			when.method(POST).path("/token").body_includes("grant_type=refresh_token");
			then.status(400)
				.header("content-type", "application/json")
				.body("{\"error\":\"invalid_grant\"}");
		})
		.await;
	let (provider, store) =
		seeded_provider(&server.base_url(), Some("refresh-0"), Duration::seconds(5)).await;
	let err = provider.initialize().await.expect_err("A rejected refresh should fail initialize.");

	token.assert_async().await;

	assert!(
		matches!(err, Error::TokenExchange { status: Some(400), .. }),
		"Unexpected error: {err:?}."
	);
	assert_eq!(provider.auth_state(), AuthState::Failed);
	assert_eq!(
		store.tokens().map(|record| record.access_token.expose().to_owned()).as_deref(),
		Some("access-0")
	);
}
