//! Remote tile source abstraction
//!
//! The fetcher only needs "coordinate and variant in, bytes out". This module
//! provides that seam ([`TileSource`]), an HTTP client abstraction so it can
//! be tested without a network, and the URL-template source used in
//! production.
//!
//! ```ignore
//! use tilecache::provider::{AsyncReqwestClient, UrlTemplateSource};
//!
//! let client = AsyncReqwestClient::with_timeout(10)?;
//! let source = UrlTemplateSource::new(client, plain_url, labeled_url)?;
//! ```

mod http;
mod template;
mod types;

pub use http::{AsyncHttpClient, AsyncReqwestClient, DEFAULT_USER_AGENT};
pub use template::UrlTemplateSource;
pub use types::{ProviderError, TileSource};

#[cfg(test)]
pub use http::tests::MockAsyncHttpClient;
