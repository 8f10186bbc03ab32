//! Registry clients.
//!
//! - [`CrossrefClient`]: bibliographic registry (work lookup, ISBN search,
//!   citation transforms)
//! - [`DoiRegistry`]: identifier-resolution registry (DOI existence)
//!
//! Both sit on the shared, rate-limited [`ApiClient`].

mod crossref;
mod doi_org;
mod http_client;

pub use crossref::{CrossrefClient, DEFAULT_CROSSREF_URL, WorkMetadata};
pub use doi_org::{DEFAULT_DOI_REGISTRY_URL, DoiRegistry};
pub use http_client::ApiClient;
