//! Citation fetching through the registry's format-transform endpoint.

use tracing::{debug, instrument};

use crate::fetch::StageError;
use crate::parser::Handle;
use crate::registry::CrossrefClient;

use super::CitationFormat;

/// Fetches raw citation bytes for one handle in the run's format.
#[derive(Debug, Clone)]
pub struct CitationFetcher {
    crossref: CrossrefClient,
    format: CitationFormat,
}

impl CitationFetcher {
    /// Creates a fetcher for `format`.
    #[must_use]
    pub fn new(crossref: CrossrefClient, format: CitationFormat) -> Self {
        Self { crossref, format }
    }

    /// The run's citation format.
    #[must_use]
    pub fn format(&self) -> CitationFormat {
        self.format
    }

    /// Fetches the citation for `handle`, keyed on `doi`.
    ///
    /// `doi` is the article's citation DOI (canonical DOI, or the handle
    /// itself for DOI handles); ISBN handles without one fail here.
    ///
    /// # Errors
    ///
    /// [`StageError::Precondition`] when `doi` is `None`; registry errors otherwise.
    #[instrument(skip(self, handle, doi), fields(identifier = %handle, format = %self.format))]
    pub async fn fetch(&self, handle: &Handle, doi: Option<&str>) -> Result<Vec<u8>, StageError> {
        let Some(doi) = doi else {
            return Err(StageError::precondition(
                handle.value(),
                "a DOI (citation lookup is DOI-keyed)",
            ));
        };
        let bytes = self.crossref.fetch_citation(doi, self.format).await?;
        debug!(doi, bytes = bytes.len(), "citation fetched");
        Ok(bytes)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use wiremock::matchers::{method, path};
    use wiremock::{Mock, ResponseTemplate};

    use super::*;
    use crate::download::RateLimiter;
    use crate::parser::parse_handle;
    use crate::registry::ApiClient;
    use crate::test_support::socket_guard::start_mock_server_or_skip;

    fn fetcher(base_url: &str, format: CitationFormat) -> CitationFetcher {
        let api = ApiClient::new(
            "bibfetch-test/0",
            Arc::new(RateLimiter::disabled()),
            Duration::from_secs(5),
        )
        .unwrap();
        CitationFetcher::new(CrossrefClient::new(api, base_url, None), format)
    }

    #[tokio::test]
    async fn test_fetch_isbn_without_doi_is_precondition() {
        let handle = parse_handle("9780136091813").unwrap();
        let err = fetcher("http://127.0.0.1:9", CitationFormat::Bibtex)
            .fetch(&handle, None)
            .await
            .unwrap_err();
        assert!(matches!(err, StageError::Precondition { .. }), "got {err:?}");
    }

    #[tokio::test]
    async fn test_fetch_uses_selected_format_endpoint() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("GET"))
            .and(path("/works/10.5555%2Fbook/transform/text/x-bibliography"))
            .respond_with(ResponseTemplate::new(200).set_body_string("Author. Book. 2020."))
            .expect(1)
            .mount(&server)
            .await;

        let handle = parse_handle("9780136091813").unwrap();
        let f = fetcher(&server.uri(), CitationFormat::TextCitation);
        assert_eq!(f.format(), CitationFormat::TextCitation);
        let bytes = f.fetch(&handle, Some("10.5555/book")).await.unwrap();
        assert_eq!(bytes, b"Author. Book. 2020.");
    }
}
