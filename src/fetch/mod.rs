//! The fetch pipeline: identifier gate, metadata resolution and the
//! two-phase orchestrator, plus the run configuration and report types.

mod error;
mod gate;
mod metadata;
mod orchestrator;

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;
use url::Url;

use crate::citation::{CitationFormat, CitationLayout};
use crate::parser::HandleKind;
use crate::registry::{DEFAULT_CROSSREF_URL, DEFAULT_DOI_REGISTRY_URL};
use crate::source::DEFAULT_CATALOG_PATH;

pub use error::{BatchError, FailureKind, SetupError, Stage, StageError, StageFailure};
pub use gate::{GateOutcome, IdentifierGate};
pub use metadata::MetadataResolver;
pub use orchestrator::Fetcher;

/// Default outbound request rate (requests per second).
pub const DEFAULT_RATE_LIMIT: u32 = 50;

/// Default per-request deadline for registry and mirror calls.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Default per-request deadline for document downloads.
pub const DEFAULT_DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(300);

/// Which Phase-2 stages a run executes. Metadata always runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum FetchMode {
    /// Source documents and citations.
    #[default]
    Full,
    /// Source documents only; the citation writer is skipped.
    SourceOnly,
    /// Citations only.
    CiteOnly,
}

impl FetchMode {
    /// Whether the source-resolver/downloader chain runs.
    #[must_use]
    pub fn fetches_source(self) -> bool {
        matches!(self, Self::Full | Self::SourceOnly)
    }

    /// Whether the citation fetcher and writer run.
    #[must_use]
    pub fn fetches_citations(self) -> bool {
        matches!(self, Self::Full | Self::CiteOnly)
    }

    /// Name accepted on the command line.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::SourceOnly => "source",
            Self::CiteOnly => "cite",
        }
    }
}

impl fmt::Display for FetchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error for an unrecognized mode name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown fetch mode '{0}' (expected one of: full, source, cite)")]
pub struct UnknownModeError(pub String);

impl FromStr for FetchMode {
    type Err = UnknownModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "full" => Ok(Self::Full),
            "source" => Ok(Self::SourceOnly),
            "cite" => Ok(Self::CiteOnly),
            _ => Err(UnknownModeError(s.trim().to_string())),
        }
    }
}

/// Everything a [`Fetcher`] needs to know about one run.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Which Phase-2 stages run.
    pub mode: FetchMode,
    /// Citation format for every article.
    pub format: CitationFormat,
    /// Directory for documents and default citation files.
    pub output_dir: PathBuf,
    /// Combined or per-article citation files.
    pub citation_layout: CitationLayout,
    /// Append to citation files instead of truncating them.
    pub append: bool,
    /// Requests per second across the whole run; 0 disables limiting.
    pub rate_limit: u32,
    /// Bucket capacity; `None` means the same as `rate_limit`.
    pub rate_burst: Option<u32>,
    /// Deadline for each registry or mirror request.
    pub request_timeout: Duration,
    /// Deadline for each document download.
    pub download_timeout: Duration,
    /// Contact address for the registry polite pool.
    pub mailto: Option<String>,
    /// Bibliographic registry base URL.
    pub crossref_url: String,
    /// Identifier-resolution registry base URL.
    pub doi_registry_url: String,
    /// Ordered document mirrors (DOI handles).
    pub document_mirrors: Vec<String>,
    /// Ordered catalog mirrors (ISBN handles).
    pub catalog_mirrors: Vec<String>,
    /// Catalog API path on catalog mirrors.
    pub catalog_path: String,
    /// Keep plain-http source URLs.
    pub allow_insecure_mirrors: bool,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            mode: FetchMode::default(),
            format: CitationFormat::default(),
            output_dir: PathBuf::from("."),
            citation_layout: CitationLayout::default(),
            append: false,
            rate_limit: DEFAULT_RATE_LIMIT,
            rate_burst: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            download_timeout: DEFAULT_DOWNLOAD_TIMEOUT,
            mailto: None,
            crossref_url: DEFAULT_CROSSREF_URL.to_string(),
            doi_registry_url: DEFAULT_DOI_REGISTRY_URL.to_string(),
            document_mirrors: Vec::new(),
            catalog_mirrors: Vec::new(),
            catalog_path: DEFAULT_CATALOG_PATH.to_string(),
            allow_insecure_mirrors: false,
        }
    }
}

/// What the pipeline learned about one admitted identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticleSummary {
    /// Normalized identifier.
    pub identifier: String,
    /// DOI or ISBN.
    pub kind: HandleKind,
    /// Registry title, or the identifier when metadata failed.
    pub title: String,
    /// Canonical DOI reported by the registry.
    pub canonical_doi: Option<String>,
    /// Resolved download URL.
    pub source_url: Option<Url>,
    /// Where the document was written.
    pub document: Option<PathBuf>,
    /// Length of the fetched citation; 0 when none was fetched.
    pub citation_bytes: usize,
}

/// Outcome of one run, returned on success and carried by [`BatchError`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    /// One entry per admitted identifier, in input order.
    pub articles: Vec<ArticleSummary>,
    /// Citation files written.
    pub citation_files: Vec<PathBuf>,
}

impl RunReport {
    /// Number of documents downloaded.
    #[must_use]
    pub fn documents(&self) -> usize {
        self.articles.iter().filter(|a| a.document.is_some()).count()
    }

    /// Number of citations fetched.
    #[must_use]
    pub fn citations(&self) -> usize {
        self.articles.iter().filter(|a| a.citation_bytes > 0).count()
    }
}
