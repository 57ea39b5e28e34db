//! Delivery of the authorization URL to whoever grants consent.

// self
use crate::{_prelude::*, error::body_preview, http::ReqwestHttpClient};

/// Boxed future returned by [`RedirectStrategy::dispatch`].
pub type RedirectFuture<'a> = Pin<Box<dyn Future<Output = Result<()>> + 'a + Send>>;

/// Hands the authorization URL to a user agent.
///
/// The future resolves once the URL has been delivered; the provider then waits on the
/// callback listener for the outcome.
pub trait RedirectStrategy
where
	Self: Send + Sync,
{
	/// Delivers `authorization_url`.
	fn dispatch<'a>(&'a self, authorization_url: &'a Url) -> RedirectFuture<'a>;
}

/// Performs an HTTP GET on the authorization URL and follows redirects.
///
/// Suited to authorization servers that grant consent without interaction (the software
/// statement already vouches for the client). The redirect chain ends at the loopback
/// listener, which records the code before this future resolves.
#[derive(Clone, Debug, Default)]
pub struct HeadlessRedirect {
	http_client: ReqwestHttpClient,
}
impl HeadlessRedirect {
	/// Uses `http_client` for the redirect chain; it must follow redirects.
	pub fn new(http_client: ReqwestHttpClient) -> Self {
		Self { http_client }
	}
}
impl RedirectStrategy for HeadlessRedirect {
	fn dispatch<'a>(&'a self, authorization_url: &'a Url) -> RedirectFuture<'a> {
		Box::pin(async move {
			let response = self
				.http_client
				.get(authorization_url.clone())
				.send()
				.await
				.map_err(|e| Error::RedirectDispatch { message: e.to_string() })?;
			let status = response.status();

			if status.is_success() {
				tracing::debug!(status = status.as_u16(), "Authorization redirect completed.");

				return Ok(());
			}

			let body = response.text().await.unwrap_or_default();

			Err(Error::RedirectDispatch {
				message: format!("HTTP {}: {}", status.as_u16(), body_preview(&body)),
			})
		})
	}
}

/// Opens the authorization URL in the system browser.
#[derive(Clone, Copy, Debug, Default)]
pub struct BrowserRedirect;
impl RedirectStrategy for BrowserRedirect {
	fn dispatch<'a>(&'a self, authorization_url: &'a Url) -> RedirectFuture<'a> {
		let target = authorization_url.to_string();

		Box::pin(async move {
			tracing::info!("Opening the system browser for authorization.");

			tokio::task::spawn_blocking(move || open::that(target))
				.await
				.map_err(|e| Error::RedirectDispatch { message: e.to_string() })?
				.map_err(|e| Error::RedirectDispatch { message: e.to_string() })
		})
	}
}

/// Adapts an async closure into a [`RedirectStrategy`].
pub struct FnRedirect<F>(F);
impl<F> FnRedirect<F> {
	/// Wraps `f`, which receives the authorization URL.
	pub fn new(f: F) -> Self {
		Self(f)
	}
}
impl<F, Fut> RedirectStrategy for FnRedirect<F>
where
	F: Send + Sync + Fn(Url) -> Fut,
	Fut: 'static + Send + Future<Output = Result<()>>,
{
	fn dispatch<'a>(&'a self, authorization_url: &'a Url) -> RedirectFuture<'a> {
		Box::pin((self.0)(authorization_url.clone()))
	}
}
impl<F> Debug for FnRedirect<F> {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("FnRedirect(..)")
	}
}
