//! Registration strategy hooks that shape the dynamic client registration request.
//!
//! Implementations decorate the RFC 7591 document before it is posted. The default
//! [`SoftwareStatementStrategy`] attaches the signed software statement that proves the
//! client's provenance to the authorization server.

// self
use crate::{
	_prelude::*,
	auth::{ClientMetadata, SoftwareStatement},
};

/// Strategy hook that builds the registration document from the client metadata.
///
/// The hook works on a plain JSON object so implementations stay independent of the HTTP
/// client. Only [`augment_registration`](RegistrationStrategy::augment_registration) needs
/// overriding in the common case.
pub trait RegistrationStrategy
where
	Self: Send + Sync,
{
	/// Adds or rewrites fields of the serialized client metadata.
	fn augment_registration(&self, document: &mut JsonMap<String, JsonValue>);

	/// Produces the full registration body.
	fn build_registration_request(&self, metadata: &ClientMetadata) -> JsonMap<String, JsonValue> {
		let mut document = metadata.to_document();

		self.augment_registration(&mut document);

		document
	}
}

/// Registers with the bare client metadata.
#[derive(Clone, Copy, Debug, Default)]
pub struct PlainRegistration;
impl RegistrationStrategy for PlainRegistration {
	fn augment_registration(&self, _document: &mut JsonMap<String, JsonValue>) {}
}

/// Adds a top-level `software_statement` to the registration document.
#[derive(Clone, Debug)]
pub struct SoftwareStatementStrategy {
	statement: String,
}
impl SoftwareStatementStrategy {
	/// Wraps a raw statement string as supplied by configuration.
	pub fn new(statement: impl Into<String>) -> Self {
		Self { statement: statement.into() }
	}

	/// Wraps a statement that has already been validated.
	pub fn from_statement(statement: SoftwareStatement) -> Self {
		Self { statement: statement.into() }
	}
}
impl RegistrationStrategy for SoftwareStatementStrategy {
	fn augment_registration(&self, document: &mut JsonMap<String, JsonValue>) {
		document.insert("software_statement".into(), JsonValue::String(self.statement.clone()));
	}
}
