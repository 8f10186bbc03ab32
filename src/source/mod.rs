//! Source resolution: turn a [`Handle`] into a direct download URL through
//! ordered mirror failover.
//!
//! # Overview
//!
//! Each handle kind has its own ordered [`MirrorList`]: DOIs go to document
//! mirrors that answer HTML pages, ISBNs go to catalog mirrors that answer a
//! JSON record array. [`SourceResolver::resolve`] walks the list in declared
//! order, one request per mirror, and stops at the first mirror that yields a
//! usable link. Mirrors are never raced in parallel.
//!
//! The cursor over the list lives on the stack of each `resolve` call, so one
//! handle's failover never affects another's.

mod catalog;
mod html;

use std::fmt;
use std::sync::Arc;

use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::fetch::{SetupError, StageError};
use crate::parser::{Handle, HandleKind, doi_url_path};
use crate::registry::ApiClient;

/// Default catalog API path on catalog mirrors.
pub const DEFAULT_CATALOG_PATH: &str = "search.json";

/// One mirror host, stored as a normalized base URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mirror {
    base: Url,
}

impl Mirror {
    /// Parses a mirror entry: a bare host (`mirror.example.org`, implying
    /// https) or a full `http`/`https` base URL.
    ///
    /// # Errors
    ///
    /// Returns [`SetupError::InvalidUrl`] for empty, unparseable or non-web entries.
    ///
    /// # Example
    ///
    /// ```
    /// use bibfetch_core::Mirror;
    ///
    /// let mirror = Mirror::parse("mirror.example.org").unwrap();
    /// assert_eq!(mirror.base().as_str(), "https://mirror.example.org/");
    /// ```
    pub fn parse(entry: &str) -> Result<Self, SetupError> {
        let trimmed = entry.trim();
        if trimmed.is_empty() {
            return Err(SetupError::invalid_url("mirror", entry, "empty entry"));
        }

        let candidate = if trimmed.contains("://") {
            trimmed.to_string()
        } else {
            format!("https://{trimmed}")
        };
        let base = Url::parse(&candidate)
            .map_err(|e| SetupError::invalid_url("mirror", entry, e.to_string()))?;

        if !matches!(base.scheme(), "http" | "https") {
            return Err(SetupError::invalid_url(
                "mirror",
                entry,
                format!("scheme '{}' is not supported", base.scheme()),
            ));
        }
        if base.host_str().is_none_or(str::is_empty) {
            return Err(SetupError::invalid_url("mirror", entry, "missing host"));
        }

        Ok(Self { base })
    }

    /// Base URL of the mirror.
    #[must_use]
    pub fn base(&self) -> &Url {
        &self.base
    }

    /// Builds `{base}/{tail}` without doubling slashes.
    fn endpoint(&self, tail: &str) -> String {
        format!(
            "{}/{}",
            self.base.as_str().trim_end_matches('/'),
            tail.trim_start_matches('/')
        )
    }
}

impl fmt::Display for Mirror {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.base.as_str().trim_end_matches('/'))
    }
}

/// Ordered, immutable sequence of mirrors. Order encodes preference.
#[derive(Debug, Clone, Default)]
pub struct MirrorList {
    mirrors: Arc<[Mirror]>,
}

impl MirrorList {
    /// Wraps already-parsed mirrors, keeping their order.
    #[must_use]
    pub fn new(mirrors: Vec<Mirror>) -> Self {
        Self {
            mirrors: mirrors.into(),
        }
    }

    /// Parses every entry in order.
    ///
    /// # Errors
    ///
    /// Fails on the first invalid entry.
    pub fn parse_all<S: AsRef<str>>(entries: &[S]) -> Result<Self, SetupError> {
        entries
            .iter()
            .map(|entry| Mirror::parse(entry.as_ref()))
            .collect::<Result<Vec<_>, _>>()
            .map(Self::new)
    }

    /// Mirrors in preference order.
    pub fn iter(&self) -> impl Iterator<Item = &Mirror> {
        self.mirrors.iter()
    }

    /// Number of mirrors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.mirrors.len()
    }

    /// Whether the list is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.mirrors.is_empty()
    }
}

/// Resolves download URLs by mirror failover, keyed by handle kind.
#[derive(Debug, Clone)]
pub struct SourceResolver {
    api: ApiClient,
    document_mirrors: MirrorList,
    catalog_mirrors: MirrorList,
    catalog_path: String,
    force_https: bool,
}

impl SourceResolver {
    /// Creates a resolver over the given document (DOI) and catalog (ISBN) mirrors.
    #[must_use]
    pub fn new(api: ApiClient, document_mirrors: MirrorList, catalog_mirrors: MirrorList) -> Self {
        Self {
            api,
            document_mirrors,
            catalog_mirrors,
            catalog_path: DEFAULT_CATALOG_PATH.to_string(),
            force_https: true,
        }
    }

    /// Sets the catalog API path (default [`DEFAULT_CATALOG_PATH`]).
    #[must_use]
    pub fn with_catalog_path(mut self, catalog_path: impl Into<String>) -> Self {
        self.catalog_path = catalog_path.into();
        self
    }

    /// Keeps plain-http source URLs instead of upgrading them to https.
    #[must_use]
    pub fn allow_insecure(mut self, allow: bool) -> Self {
        self.force_https = !allow;
        self
    }

    /// The mirror list consulted for `kind`.
    #[must_use]
    pub fn mirrors_for(&self, kind: HandleKind) -> &MirrorList {
        match kind {
            HandleKind::Doi => &self.document_mirrors,
            HandleKind::Isbn => &self.catalog_mirrors,
        }
    }

    /// Resolves a direct download URL for `handle`.
    ///
    /// Mirrors are tried strictly in declared order; the first success wins
    /// and later mirrors are not contacted.
    ///
    /// # Errors
    ///
    /// [`StageError::NoSourceResolved`] when every mirror failed (or none are
    /// configured for the handle's kind).
    #[instrument(skip(self, handle), fields(identifier = %handle, kind = %handle.kind()))]
    pub async fn resolve(&self, handle: &Handle) -> Result<Url, StageError> {
        let mirrors = self.mirrors_for(handle.kind());
        if mirrors.is_empty() {
            warn!("no mirrors configured for this identifier kind");
        }

        for (index, mirror) in mirrors.iter().enumerate() {
            let attempt = index + 1;
            debug!(mirror = %mirror, attempt, "querying mirror");
            match self.query_mirror(handle, mirror).await {
                Ok(url) => {
                    info!(mirror = %mirror, source_url = %url, "source resolved");
                    return Ok(url);
                }
                Err(error) => {
                    warn!(mirror = %mirror, attempt, error = %error, "mirror failed; trying next");
                }
            }
        }

        Err(StageError::no_source(handle.value(), mirrors.len()))
    }

    /// One request to one mirror, parsed per handle kind.
    async fn query_mirror(&self, handle: &Handle, mirror: &Mirror) -> Result<Url, StageError> {
        let request_url = match handle.kind() {
            HandleKind::Doi => mirror.endpoint(&doi_url_path(handle.value())),
            HandleKind::Isbn => format!(
                "{}?isbn={}",
                mirror.endpoint(&self.catalog_path),
                urlencoding::encode(handle.value())
            ),
        };

        let body = self.api.get_text(&request_url).await?;
        let raw_link = match handle.kind() {
            HandleKind::Doi => html::extract_download_link(&body).ok_or_else(|| {
                StageError::extraction(&request_url, "no download link in mirror page")
            })?,
            HandleKind::Isbn => catalog::extract_download_link(&body, &request_url, handle.value())?,
        };

        finalize_source_url(mirror.base(), &raw_link, self.force_https)
            .map_err(|reason| StageError::extraction(&request_url, reason))
    }
}

/// Turns an extracted link into an absolute download URL.
///
/// Relative and scheme-relative links are joined onto the mirror base, which
/// also supplies the host when the link has none. Plain http is upgraded to
/// https when `force_https` is set.
fn finalize_source_url(mirror_base: &Url, raw: &str, force_https: bool) -> Result<Url, String> {
    let mut url = mirror_base
        .join(raw)
        .map_err(|e| format!("unusable download link '{raw}': {e}"))?;

    match url.scheme() {
        "https" => {}
        "http" if force_https => {
            url.set_scheme("https")
                .map_err(|()| format!("cannot upgrade '{url}' to https"))?;
        }
        "http" => {}
        other => return Err(format!("download link scheme '{other}' is not supported")),
    }

    Ok(url)
}
