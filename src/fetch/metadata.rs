//! Metadata resolution: title and canonical DOI for each handle.

use tracing::{instrument, warn};

use crate::article::Article;
use crate::parser::{Handle, HandleKind};
use crate::registry::{CrossrefClient, WorkMetadata};

use super::error::StageError;

/// Queries the bibliographic registry once per handle.
#[derive(Debug, Clone)]
pub struct MetadataResolver {
    crossref: CrossrefClient,
}

impl MetadataResolver {
    /// Creates a resolver backed by `crossref`.
    #[must_use]
    pub fn new(crossref: CrossrefClient) -> Self {
        Self { crossref }
    }

    /// Issues the kind-specific registry query: DOI lookup or ISBN search.
    ///
    /// # Errors
    ///
    /// Registry transport, extraction and not-found errors.
    pub async fn resolve(&self, handle: &Handle) -> Result<WorkMetadata, StageError> {
        match handle.kind() {
            HandleKind::Doi => self.crossref.lookup_work(handle.value()).await,
            HandleKind::Isbn => self.crossref.search_isbn(handle.value()).await,
        }
    }

    /// Resolves metadata and applies it to `article`.
    ///
    /// A missing title keeps the raw identifier as title (logged, not an
    /// error). On failure the article is left with its identifier title.
    ///
    /// # Errors
    ///
    /// The error from [`MetadataResolver::resolve`].
    #[instrument(skip(self, article), fields(identifier = %article.handle(), kind = %article.handle().kind()))]
    pub async fn enrich(&self, article: &mut Article) -> Result<(), StageError> {
        let metadata = self.resolve(article.handle()).await?;

        match metadata.title {
            Some(title) => article.set_title(title),
            None => {
                warn!("registry returned no title; using identifier as title");
                let fallback = article.handle().value().to_string();
                article.set_title(fallback);
            }
        }
        if let Some(doi) = metadata.doi {
            article.set_canonical_doi(doi);
        }
        Ok(())
    }
}
