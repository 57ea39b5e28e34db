//! Thread-safe in-memory [`TokenStore`] implementation.

// self
use crate::{
	_prelude::*,
	auth::{ClientInformation, TokenRecord},
	store::{StoreFuture, TokenStore},
};

#[derive(Debug, Default)]
struct Slots {
	tokens: Option<TokenRecord>,
	client_info: Option<ClientInformation>,
}

/// Process-local store; contents are lost when the last clone is dropped.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore(Arc<RwLock<Slots>>);
impl MemoryStore {
	/// Synchronous snapshot of the stored tokens.
	pub fn tokens(&self) -> Option<TokenRecord> {
		self.0.read().tokens.clone()
	}

	/// Synchronous snapshot of the stored client information.
	pub fn client_info(&self) -> Option<ClientInformation> {
		self.0.read().client_info.clone()
	}
}
impl TokenStore for MemoryStore {
	fn get_tokens(&self) -> StoreFuture<'_, Option<TokenRecord>> {
		let tokens = self.tokens();

		Box::pin(async move { Ok(tokens) })
	}

	fn set_tokens(&self, tokens: TokenRecord) -> StoreFuture<'_, ()> {
		let slots = self.0.clone();

		Box::pin(async move {
			slots.write().tokens = Some(tokens);

			Ok(())
		})
	}

	fn get_client_info(&self) -> StoreFuture<'_, Option<ClientInformation>> {
		let info = self.client_info();

		Box::pin(async move { Ok(info) })
	}

	fn set_client_info(&self, info: ClientInformation) -> StoreFuture<'_, ()> {
		let slots = self.0.clone();

		Box::pin(async move {
			slots.write().client_info = Some(info);

			Ok(())
		})
	}

	fn clear_tokens(&self) -> StoreFuture<'_, ()> {
		let slots = self.0.clone();

		Box::pin(async move {
			slots.write().tokens = None;

			Ok(())
		})
	}
}
