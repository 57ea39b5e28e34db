//! Client-side OAuth 2.1 for MCP agents: a loopback callback listener, dynamic client
//! registration carrying a signed software statement, in-memory token storage, and an
//! authenticated streamable HTTP transport.

#![deny(clippy::all)]
#![warn(missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod callback;
pub mod config;
pub mod connection;
pub mod error;
pub mod flows;
pub mod http;
pub mod oauth;
pub mod obs;
pub mod provider;
pub mod store;
pub mod transport;
#[doc(hidden)]
pub mod _preludet {
	//! Convenience re-exports and helpers for integration tests.

	pub use crate::_prelude::*;

	// self
	use crate::{
		config::{PortSelection, ProviderConfig},
		flows::OAuthProvider,
		http::ReqwestHttpClient,
		provider::{RedirectStrategy, SoftwareStatementStrategy},
		store::{MemoryStore, TokenStore},
	};

	/// Software statement fixture shared by integration tests.
	pub const TEST_SOFTWARE_STATEMENT: &str = "abc.def.ghi";

	/// Builds a reqwest HTTP client with a request timeout so stalled mocks fail fast.
	pub fn test_reqwest_http_client() -> ReqwestHttpClient {
		let client = ReqwestClient::builder()
			.timeout(StdDuration::from_secs(10))
			.build()
			.expect("Failed to build reqwest client for tests.");

		ReqwestHttpClient::with_client(client)
	}

	/// Provider configuration pointing at `server_url` with an ephemeral callback port and a
	/// short callback timeout.
	pub fn test_provider_config(server_url: &str) -> ProviderConfig {
		ProviderConfig::builder(
			Url::parse(server_url).expect("Failed to parse mock server URL for tests."),
		)
		.port_selection(PortSelection::Fixed(0))
		.callback_timeout(StdDuration::from_secs(5))
		.build()
		.expect("Failed to build provider config for tests.")
	}

	/// Constructs an [`OAuthProvider`] backed by an in-memory store, the software statement
	/// registration strategy, and the supplied redirect strategy.
	pub fn build_test_provider(
		config: ProviderConfig,
		redirect: Arc<dyn RedirectStrategy>,
	) -> (OAuthProvider, Arc<MemoryStore>) {
		let store_backend = Arc::new(MemoryStore::default());
		let store: Arc<dyn TokenStore> = store_backend.clone();
		let provider = OAuthProvider::builder(config)
			.store(store)
			.registration_strategy(Arc::new(SoftwareStatementStrategy::new(
				TEST_SOFTWARE_STATEMENT,
			)))
			.redirect_strategy(redirect)
			.http_client(test_reqwest_http_client())
			.build();

		(provider, store_backend)
	}
}

mod _prelude {
	pub use std::{
		collections::{BTreeMap, HashMap},
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
		time::Duration as StdDuration,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::{Mutex, RwLock};
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use serde_json::{Map as JsonMap, Value as JsonValue};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

pub use reqwest;
pub use url;
#[cfg(test)] use {color_eyre as _, httpmock as _};
