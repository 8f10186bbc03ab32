//! Error types for the fetch pipeline.
//!
//! Every per-identifier stage reports a [`StageError`]. The orchestrator wraps
//! each one in a [`StageFailure`] attributed to its identifier and, if any
//! occurred, returns them together as a [`BatchError`] at the end of the run.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use super::RunReport;

/// Errors a single pipeline stage can report for one identifier.
#[derive(Debug, Error)]
pub enum StageError {
    /// Malformed or unregistered identifier (filtered before the pipeline).
    #[error("invalid identifier '{input}': {reason}")]
    Validation {
        /// The raw or normalized identifier.
        input: String,
        /// Why the identifier was rejected.
        reason: String,
    },

    /// Connection-level failure (DNS, refused connection, TLS, body read).
    #[error("network error requesting {url}: {source}")]
    Network {
        /// The URL being requested.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// The per-request deadline expired.
    #[error("timeout requesting {url}")]
    Timeout {
        /// The URL that timed out.
        url: String,
    },

    /// The server answered with a non-success status.
    #[error("HTTP {status} requesting {url}")]
    HttpStatus {
        /// The URL that returned an error status.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// Every mirror for the identifier's kind failed.
    #[error("no source resolved for '{identifier}' after trying {tried} mirror(s)")]
    NoSourceResolved {
        /// The identifier being resolved.
        identifier: String,
        /// Number of mirrors contacted.
        tried: usize,
    },

    /// Expected data was absent from, or unparseable in, a response.
    #[error("could not extract data from {url}: {reason}")]
    Extraction {
        /// The URL whose response was inspected.
        url: String,
        /// What was missing or malformed.
        reason: String,
    },

    /// A registry returned zero matching results.
    #[error("no results found for '{query}'")]
    NotFound {
        /// The identifier or search query.
        query: String,
    },

    /// A stage ran without a result it requires from an upstream stage.
    #[error("'{identifier}' is missing {missing}")]
    Precondition {
        /// The identifier whose pipeline is missing data.
        identifier: String,
        /// Description of the missing upstream result.
        missing: &'static str,
    },

    /// Local file create/write error.
    #[error("IO error writing to {path}: {source}")]
    Io {
        /// The file path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The task running a stage panicked.
    #[error("task for '{identifier}' panicked: {message}")]
    Panicked {
        /// The identifier the task was working on.
        identifier: String,
        /// Panic payload, when it was a string.
        message: String,
    },
}

/// Coarse failure classes used for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// Malformed or unregistered identifier.
    Validation,
    /// Non-success status, connection error, timeout or mirror exhaustion.
    Transport,
    /// Expected data absent or unparseable.
    Extraction,
    /// Zero matching registry results.
    NotFound,
    /// Missing upstream result.
    Precondition,
    /// Local file error.
    Io,
    /// A task panicked.
    Internal,
}

impl StageError {
    /// Creates a validation error.
    pub fn validation(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            input: input.into(),
            reason: reason.into(),
        }
    }

    /// Creates a transport error from a reqwest error, separating timeouts.
    pub fn from_reqwest(url: impl Into<String>, source: reqwest::Error) -> Self {
        let url = url.into();
        if source.is_timeout() {
            Self::timeout(url)
        } else {
            Self::Network { url, source }
        }
    }

    /// Creates a timeout error.
    pub fn timeout(url: impl Into<String>) -> Self {
        Self::Timeout { url: url.into() }
    }

    /// Creates an HTTP status error.
    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
        }
    }

    /// Creates a mirror-exhaustion error.
    pub fn no_source(identifier: impl Into<String>, tried: usize) -> Self {
        Self::NoSourceResolved {
            identifier: identifier.into(),
            tried,
        }
    }

    /// Creates an extraction error.
    pub fn extraction(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Extraction {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Creates a not-found error.
    pub fn not_found(query: impl Into<String>) -> Self {
        Self::NotFound {
            query: query.into(),
        }
    }

    /// Creates a precondition error.
    pub fn precondition(identifier: impl Into<String>, missing: &'static str) -> Self {
        Self::Precondition {
            identifier: identifier.into(),
            missing,
        }
    }

    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates a panic error from a `catch_unwind` payload.
    pub fn panicked(identifier: impl Into<String>, payload: &(dyn std::any::Any + Send)) -> Self {
        let message = payload
            .downcast_ref::<&str>()
            .map(ToString::to_string)
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "non-string panic payload".to_string());
        Self::Panicked {
            identifier: identifier.into(),
            message,
        }
    }

    /// Returns the failure class of this error.
    #[must_use]
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Validation { .. } => FailureKind::Validation,
            Self::Network { .. }
            | Self::Timeout { .. }
            | Self::HttpStatus { .. }
            | Self::NoSourceResolved { .. } => FailureKind::Transport,
            Self::Extraction { .. } => FailureKind::Extraction,
            Self::NotFound { .. } => FailureKind::NotFound,
            Self::Precondition { .. } => FailureKind::Precondition,
            Self::Io { .. } => FailureKind::Io,
            Self::Panicked { .. } => FailureKind::Internal,
        }
    }

    /// Rewrites an HTTP 404 into [`StageError::NotFound`] for `query`.
    #[must_use]
    pub fn not_found_on_404(self, query: &str) -> Self {
        match self {
            Self::HttpStatus { status: 404, .. } => Self::not_found(query),
            other => other,
        }
    }
}

/// Pipeline stage a failure is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Identifier gate (syntax and registry existence).
    Validation,
    /// Metadata resolver.
    Metadata,
    /// Source resolver (mirror failover).
    Source,
    /// Document download.
    Download,
    /// Citation fetch.
    Citation,
    /// Citation file assembly.
    CitationOutput,
}

impl Stage {
    /// Returns the stable label used in logs and summaries.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::Metadata => "metadata",
            Self::Source => "source",
            Self::Download => "download",
            Self::Citation => "citation",
            Self::CitationOutput => "citation-output",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stage error attributed to the identifier whose pipeline produced it.
#[derive(Debug, Error)]
#[error("{identifier}: {stage} failed: {error}")]
pub struct StageFailure {
    /// Identifier (raw input for rejected inputs, handle value otherwise).
    pub identifier: String,
    /// Stage that failed.
    pub stage: Stage,
    /// The underlying error.
    #[source]
    pub error: StageError,
}

impl StageFailure {
    /// Creates a new attributed failure.
    pub fn new(identifier: impl Into<String>, stage: Stage, error: StageError) -> Self {
        Self {
            identifier: identifier.into(),
            stage,
            error,
        }
    }
}

/// Aggregate run failure: at least one stage failed for at least one identifier.
///
/// Output for identifiers that succeeded is still on disk; `report` describes it.
#[derive(Debug, Error)]
#[error("{} stage failure(s) during fetch run", .failures.len())]
pub struct BatchError {
    /// Every stage failure in the run.
    pub failures: Vec<StageFailure>,
    /// What the run produced despite the failures.
    pub report: RunReport,
}

/// Errors building a [`Fetcher`](super::Fetcher) or its components.
#[derive(Debug, Error)]
pub enum SetupError {
    /// The HTTP client could not be built.
    #[error("HTTP client construction failed: {0}")]
    Client(#[source] reqwest::Error),

    /// The HTTP client builder panicked (system proxy lookup in some sandboxes).
    #[error("HTTP client construction panicked while initializing networking")]
    ClientPanic,

    /// A configured base URL or mirror entry is not usable.
    #[error("invalid {what} '{value}': {reason}")]
    InvalidUrl {
        /// What the URL configures (e.g. "mirror").
        what: &'static str,
        /// The rejected value.
        value: String,
        /// Why it was rejected.
        reason: String,
    },
}

impl SetupError {
    /// Creates an invalid-URL error.
    pub fn invalid_url(what: &'static str, value: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidUrl {
            what,
            value: value.into(),
            reason: reason.into(),
        }
    }
}
