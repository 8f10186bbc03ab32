//! Crossref REST API client: work lookup, ISBN search and citation transforms.
//!
//! Every request goes through the shared [`ApiClient`], so it is rate-limited
//! and carries the configured per-request deadline.
//!
//! # Polite Pool
//!
//! When a contact address is configured, requests include a `mailto` query
//! parameter to reach Crossref's polite pool.

use serde::Deserialize;
use tracing::{debug, instrument};

use crate::citation::CitationFormat;
use crate::fetch::StageError;

use super::ApiClient;

/// Default Crossref API base URL.
pub const DEFAULT_CROSSREF_URL: &str = "https://api.crossref.org";

// ==================== Crossref API Response Types ====================

/// Top-level response of `GET /works/{doi}`.
#[derive(Debug, Deserialize)]
struct WorkResponse {
    message: WorkMessage,
}

/// Top-level response of `GET /works?query...`.
#[derive(Debug, Deserialize)]
struct SearchResponse {
    message: SearchMessage,
}

#[derive(Debug, Deserialize)]
struct SearchMessage {
    #[serde(default)]
    items: Vec<WorkMessage>,
}

/// A work record; only the fields the pipeline uses.
#[derive(Debug, Deserialize)]
struct WorkMessage {
    #[serde(default)]
    title: Vec<String>,
    /// The DOI field is uppercase in the Crossref response.
    #[serde(rename = "DOI")]
    doi: Option<String>,
}

/// Metadata extracted from a Crossref work record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkMetadata {
    /// First non-blank title, if any.
    pub title: Option<String>,
    /// Canonical DOI, if the record has one.
    pub doi: Option<String>,
}

impl From<WorkMessage> for WorkMetadata {
    fn from(message: WorkMessage) -> Self {
        let title = message
            .title
            .into_iter()
            .map(|t| t.trim().to_string())
            .find(|t| !t.is_empty());
        let doi = message
            .doi
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());
        Self { title, doi }
    }
}

// ==================== CrossrefClient ====================

/// Client for the bibliographic registry.
#[derive(Debug, Clone)]
pub struct CrossrefClient {
    api: ApiClient,
    base_url: String,
    mailto: Option<String>,
}

impl CrossrefClient {
    /// Creates a client against `base_url` (use [`DEFAULT_CROSSREF_URL`] in production).
    pub fn new(api: ApiClient, base_url: impl Into<String>, mailto: Option<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let mailto = mailto
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty());
        Self {
            api,
            base_url,
            mailto,
        }
    }

    /// Base URL without a trailing slash.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn works_url(&self, doi: &str) -> String {
        format!("{}/works/{}", self.base_url, urlencoding::encode(doi))
    }

    fn with_mailto(&self, mut url: String) -> String {
        if let Some(mailto) = &self.mailto {
            url.push(if url.contains('?') { '&' } else { '?' });
            url.push_str("mailto=");
            url.push_str(&urlencoding::encode(mailto));
        }
        url
    }

    /// Looks up one work by DOI.
    ///
    /// # Errors
    ///
    /// [`StageError::NotFound`] on HTTP 404, [`StageError::Extraction`] on a
    /// malformed body, transport errors otherwise.
    #[instrument(skip(self))]
    pub async fn lookup_work(&self, doi: &str) -> Result<WorkMetadata, StageError> {
        let url = self.with_mailto(self.works_url(doi));
        let response: WorkResponse = self
            .api
            .get_json(&url)
            .await
            .map_err(|e| e.not_found_on_404(doi))?;
        let metadata = WorkMetadata::from(response.message);
        debug!(title = ?metadata.title, canonical_doi = ?metadata.doi, "crossref work found");
        Ok(metadata)
    }

    /// Searches works bibliographically by ISBN and returns the top match.
    ///
    /// # Errors
    ///
    /// [`StageError::NotFound`] when the search has no items.
    #[instrument(skip(self))]
    pub async fn search_isbn(&self, isbn: &str) -> Result<WorkMetadata, StageError> {
        let url = self.with_mailto(format!(
            "{}/works?query.bibliographic={}&rows=1",
            self.base_url,
            urlencoding::encode(isbn)
        ));
        let response: SearchResponse = self.api.get_json(&url).await?;
        let Some(top) = response.message.items.into_iter().next() else {
            debug!("crossref search returned no items");
            return Err(StageError::not_found(isbn));
        };
        let metadata = WorkMetadata::from(top);
        debug!(title = ?metadata.title, canonical_doi = ?metadata.doi, "crossref search match");
        Ok(metadata)
    }

    /// Fetches the citation for `doi` in `format`, verbatim.
    ///
    /// # Errors
    ///
    /// [`StageError::NotFound`] on HTTP 404; [`StageError::Extraction`] when
    /// the body is blank.
    #[instrument(skip(self), fields(format = %format))]
    pub async fn fetch_citation(
        &self,
        doi: &str,
        format: CitationFormat,
    ) -> Result<Vec<u8>, StageError> {
        let url = self.with_mailto(format!("{}/{}", self.works_url(doi), format.endpoint()));
        let bytes = self
            .api
            .get_bytes(&url)
            .await
            .map_err(|e| e.not_found_on_404(doi))?;
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Err(StageError::extraction(url, "empty citation body"));
        }
        Ok(bytes)
    }
}
