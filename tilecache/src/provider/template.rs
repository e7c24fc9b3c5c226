//! URL-template tile source.
//!
//! Most XYZ imagery services expose tiles at a URL that differs only in the
//! column, row and zoom. This source fills those values into one template per
//! variant and downloads the result.
//!
//! # Placeholders
//!
//! - `{x}` or `{col}`: tile column
//! - `{y}` or `{row}`: tile row
//! - `{z}` or `{zoom}`: zoom level
//! - `{s}`: subdomain, rotated deterministically per tile
//!
//! # Example
//!
//! ```ignore
//! use tilecache::provider::{AsyncReqwestClient, UrlTemplateSource};
//!
//! let client = AsyncReqwestClient::new()?;
//! let source = UrlTemplateSource::new(
//!     client,
//!     "https://{s}.tiles.example.com/plain/{z}/{x}/{y}.jpg",
//!     "https://{s}.tiles.example.com/labeled/{z}/{x}/{y}.jpg",
//! )?;
//! ```

use super::http::{AsyncHttpClient, DEFAULT_USER_AGENT};
use super::types::{ProviderError, TileSource};
use crate::coord::TileCoord;
use crate::tile::TileVariant;
use tracing::trace;

/// Subdomains used for `{s}` when none are configured.
const DEFAULT_SUBDOMAINS: [&str; 3] = ["a", "b", "c"];

/// Accept header sent with every tile request.
const ACCEPT_IMAGES: &str = "image/avif,image/webp,image/png,image/jpeg,image/*;q=0.8";

/// Tile source that builds request URLs from per-variant templates.
pub struct UrlTemplateSource<C: AsyncHttpClient> {
    http_client: C,
    plain_template: String,
    labeled_template: String,
    subdomains: Vec<String>,
    user_agent: String,
    referer: Option<String>,
    min_zoom: u8,
    max_zoom: u8,
}

impl<C: AsyncHttpClient> UrlTemplateSource<C> {
    /// Creates a source from the plain and labeled templates.
    ///
    /// Both templates must contain a column, row and zoom placeholder.
    pub fn new(
        http_client: C,
        plain_template: impl Into<String>,
        labeled_template: impl Into<String>,
    ) -> Result<Self, ProviderError> {
        let plain_template = plain_template.into();
        let labeled_template = labeled_template.into();
        validate_template(&plain_template)?;
        validate_template(&labeled_template)?;

        Ok(Self {
            http_client,
            plain_template,
            labeled_template,
            subdomains: DEFAULT_SUBDOMAINS.iter().map(|s| s.to_string()).collect(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            referer: None,
            min_zoom: 0,
            max_zoom: crate::coord::MAX_ZOOM,
        })
    }

    /// Overrides the User-Agent header.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Sets the Referer header. Empty strings disable it.
    pub fn with_referer(mut self, referer: impl Into<String>) -> Self {
        let referer = referer.into();
        self.referer = if referer.is_empty() {
            None
        } else {
            Some(referer)
        };
        self
    }

    /// Replaces the subdomain rotation used for `{s}`.
    pub fn with_subdomains<I, T>(mut self, subdomains: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        let subdomains: Vec<String> = subdomains.into_iter().map(Into::into).collect();
        if !subdomains.is_empty() {
            self.subdomains = subdomains;
        }
        self
    }

    /// Restricts the zoom range this source will serve.
    pub fn with_zoom_range(mut self, min_zoom: u8, max_zoom: u8) -> Self {
        self.min_zoom = min_zoom.min(max_zoom);
        self.max_zoom = max_zoom.max(min_zoom);
        self
    }

    /// Builds the request URL for one tile variant.
    pub fn build_url(&self, coord: TileCoord, variant: TileVariant) -> String {
        let template = match variant {
            TileVariant::Plain => &self.plain_template,
            TileVariant::Labeled => &self.labeled_template,
        };

        let index = (coord.col as usize + coord.row as usize) % self.subdomains.len();
        let col = coord.col.to_string();
        let row = coord.row.to_string();
        let zoom = coord.zoom.to_string();

        template
            .replace("{s}", &self.subdomains[index])
            .replace("{x}", &col)
            .replace("{col}", &col)
            .replace("{y}", &row)
            .replace("{row}", &row)
            .replace("{z}", &zoom)
            .replace("{zoom}", &zoom)
    }
}

impl<C: AsyncHttpClient> TileSource for UrlTemplateSource<C> {
    async fn fetch(&self, coord: TileCoord, variant: TileVariant) -> Result<Vec<u8>, ProviderError> {
        if !self.supports_zoom(coord.zoom) {
            return Err(ProviderError::UnsupportedZoom(coord.zoom));
        }

        let url = self.build_url(coord, variant);
        trace!(tile = %coord, variant = %variant, url = %url, "Fetching tile");

        let mut headers = vec![
            ("User-Agent", self.user_agent.as_str()),
            ("Accept", ACCEPT_IMAGES),
        ];
        if let Some(referer) = &self.referer {
            headers.push(("Referer", referer.as_str()));
        }

        let data = self.http_client.get_with_headers(&url, &headers).await?;
        if data.is_empty() {
            return Err(ProviderError::EmptyResponse { coord });
        }
        Ok(data)
    }

    fn name(&self) -> &str {
        "url-template"
    }

    fn min_zoom(&self) -> u8 {
        self.min_zoom
    }

    fn max_zoom(&self) -> u8 {
        self.max_zoom
    }
}

fn validate_template(template: &str) -> Result<(), ProviderError> {
    let has_any = |names: &[&str]| names.iter().any(|n| template.contains(n));

    if template.trim().is_empty() {
        return Err(ProviderError::InvalidTemplate("template is empty".into()));
    }
    if !has_any(&["{x}", "{col}"]) {
        return Err(ProviderError::InvalidTemplate(format!(
            "'{}' has no column placeholder",
            template
        )));
    }
    if !has_any(&["{y}", "{row}"]) {
        return Err(ProviderError::InvalidTemplate(format!(
            "'{}' has no row placeholder",
            template
        )));
    }
    if !has_any(&["{z}", "{zoom}"]) {
        return Err(ProviderError::InvalidTemplate(format!(
            "'{}' has no zoom placeholder",
            template
        )));
    }
    Ok(())
}
