//! Storage contract for issued tokens and registered client information.

pub mod memory;

pub use memory::MemoryStore;

// self
use crate::{
	_prelude::*,
	auth::{ClientInformation, TokenRecord},
};

/// Boxed future returned by [`TokenStore`] operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Storage backend contract for the provider's tokens and client registration.
///
/// A store holds at most one [`TokenRecord`] and one [`ClientInformation`]. Writes replace
/// the previous value wholesale; reads never observe a partially written record.
pub trait TokenStore
where
	Self: Send + Sync,
{
	/// Returns the current tokens, if any.
	fn get_tokens(&self) -> StoreFuture<'_, Option<TokenRecord>>;

	/// Replaces the stored tokens.
	fn set_tokens(&self, tokens: TokenRecord) -> StoreFuture<'_, ()>;

	/// Returns the registered client information, if any.
	fn get_client_info(&self) -> StoreFuture<'_, Option<ClientInformation>>;

	/// Replaces the stored client information.
	fn set_client_info(&self, info: ClientInformation) -> StoreFuture<'_, ()>;

	/// Drops the stored tokens while keeping the client registration.
	fn clear_tokens(&self) -> StoreFuture<'_, ()>;
}

/// Error type produced by [`TokenStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}
