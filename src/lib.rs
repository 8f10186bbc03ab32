//! Bibfetch Core Library
//!
//! This library resolves bibliographic identifiers (DOIs and ISBNs) into
//! canonical metadata, downloaded source documents and formatted citations.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`parser`] - DOI/ISBN syntax validation and typed [`Handle`]s
//! - [`registry`] - Rate-limited registry clients (Crossref, doi.org)
//! - [`source`] - Mirror-failover resolution of download URLs
//! - [`download`] - Shared rate limiter and streaming document downloads
//! - [`citation`] - Citation formats, fetching and citation-file assembly
//! - [`fetch`] - Identifier gate, metadata resolver and the two-phase orchestrator
//! - [`article`] - Per-identifier pipeline state

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod article;
pub mod citation;
pub mod download;
pub mod fetch;
pub mod parser;
pub mod registry;
pub mod source;
#[cfg(test)]
pub(crate) mod test_support;
pub mod user_agent;

// Re-export commonly used types
pub use article::{Article, FileNameGenerator, snake_case_generator};
pub use citation::{
    CitationFetcher, CitationFormat, CitationLayout, CitationWriter, UnknownFormatError,
};
pub use download::{DOCUMENT_EXTENSION, Downloader, RateLimiter, snake_case_file_name};
pub use fetch::{
    ArticleSummary, BatchError, FailureKind, FetchConfig, FetchMode, Fetcher, GateOutcome,
    IdentifierGate, MetadataResolver, RunReport, SetupError, Stage, StageError, StageFailure,
};
pub use parser::{
    Handle, HandleKind, ParseError, is_valid_doi, is_valid_isbn, normalize_doi, normalize_isbn,
    parse_handle,
};
pub use registry::{ApiClient, CrossrefClient, DoiRegistry, WorkMetadata};
pub use source::{Mirror, MirrorList, SourceResolver};
