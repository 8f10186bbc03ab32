//! Download module: the shared rate limiter, document streaming and file naming.
//!
//! - [`RateLimiter`]: process-wide token bucket every outbound request draws from
//! - [`Downloader`]: streams a resolved source URL to `{file_name}.pdf`
//! - [`snake_case_file_name`]: title to file stem

mod client;
mod filename;
pub mod rate_limiter;

pub use client::Downloader;
pub use filename::{DOCUMENT_EXTENSION, snake_case_file_name};
pub use rate_limiter::RateLimiter;
