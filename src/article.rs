//! Per-identifier pipeline state.
//!
//! An [`Article`] is created for every handle that passes the identifier gate
//! and is owned by exactly one pipeline task at a time: the metadata task in
//! Phase 1, then the source/citation task in Phase 2, then the citation writer.

use std::sync::OnceLock;

use url::Url;

use crate::download::snake_case_file_name;
use crate::parser::{Handle, HandleKind};

/// Pure function deriving a file stem from an article.
pub type FileNameGenerator = fn(&Article) -> String;

/// Default generator: snake_case of the article title.
#[must_use]
pub fn snake_case_generator(article: &Article) -> String {
    snake_case_file_name(article.title())
}

/// One surviving handle plus everything the pipeline learns about it.
#[derive(Debug)]
pub struct Article {
    handle: Handle,
    title: String,
    canonical_doi: Option<String>,
    source_url: Option<Url>,
    citation: Vec<u8>,
    generator: FileNameGenerator,
    file_name: OnceLock<String>,
}

impl Article {
    /// Creates an article whose title starts as the raw identifier.
    #[must_use]
    pub fn new(handle: Handle) -> Self {
        Self::with_generator(handle, snake_case_generator)
    }

    /// Creates an article with a custom file-name generator.
    #[must_use]
    pub fn with_generator(handle: Handle, generator: FileNameGenerator) -> Self {
        let title = handle.value().to_string();
        Self {
            handle,
            title,
            canonical_doi: None,
            source_url: None,
            citation: Vec::new(),
            generator,
            file_name: OnceLock::new(),
        }
    }

    /// The validated handle.
    #[must_use]
    pub fn handle(&self) -> &Handle {
        &self.handle
    }

    /// Current title (the raw identifier until metadata succeeds).
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Replaces the title. Does not affect an already-generated file name.
    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = title.into();
    }

    /// Canonical DOI reported by the registry, if any.
    #[must_use]
    pub fn canonical_doi(&self) -> Option<&str> {
        self.canonical_doi.as_deref()
    }

    /// Records the canonical DOI.
    pub fn set_canonical_doi(&mut self, doi: impl Into<String>) {
        self.canonical_doi = Some(doi.into());
    }

    /// DOI to key citation lookups on: the canonical DOI, else the handle
    /// itself for DOI handles. `None` for ISBN handles without a DOI.
    #[must_use]
    pub fn citation_doi(&self) -> Option<&str> {
        self.canonical_doi().or(match self.handle.kind() {
            HandleKind::Doi => Some(self.handle.value()),
            HandleKind::Isbn => None,
        })
    }

    /// Resolved download URL; set only after source resolution succeeds.
    #[must_use]
    pub fn source_url(&self) -> Option<&Url> {
        self.source_url.as_ref()
    }

    /// Records the resolved download URL.
    pub fn set_source_url(&mut self, url: Url) {
        self.source_url = Some(url);
    }

    /// Fetched citation bytes; empty unless the citation fetch succeeded.
    #[must_use]
    pub fn citation(&self) -> &[u8] {
        &self.citation
    }

    /// Stores fetched citation bytes.
    pub fn set_citation(&mut self, citation: Vec<u8>) {
        self.citation = citation;
    }

    /// Whether a citation was fetched.
    #[must_use]
    pub fn has_citation(&self) -> bool {
        !self.citation.is_empty()
    }

    /// File stem, generated on first call and cached for the article's lifetime.
    ///
    /// Later title changes do not alter the returned value.
    pub fn file_name(&self) -> &str {
        self.file_name.get_or_init(|| (self.generator)(self))
    }
}
