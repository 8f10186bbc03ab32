//! Identifier parsing: DOI and ISBN syntax checks producing typed [`Handle`]s.
//!
//! Parsing is pure. Registry existence checks live in the identifier gate
//! (`fetch::gate`), which runs after syntax validation.
//!
//! # Example
//!
//! ```
//! use bibfetch_core::parser::{HandleKind, parse_handle};
//!
//! let handle = parse_handle("https://doi.org/10.1234/example").unwrap();
//! assert_eq!(handle.kind(), HandleKind::Doi);
//! assert_eq!(handle.value(), "10.1234/example");
//!
//! let handle = parse_handle("978-0-13-609181-3").unwrap();
//! assert_eq!(handle.kind(), HandleKind::Isbn);
//! assert_eq!(handle.value(), "9780136091813");
//!
//! assert!(parse_handle("cake").is_err());
//! ```

mod doi;
mod error;
mod isbn;

use std::fmt;

use tracing::trace;

pub(crate) use doi::doi_url_path;
pub use doi::{is_valid_doi, normalize_doi};
pub use error::ParseError;
pub use isbn::{is_valid_isbn, normalize_isbn};

/// Kind of bibliographic identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandleKind {
    /// Digital Object Identifier (`10.XXXX/suffix`)
    Doi,
    /// International Standard Book Number (10 or 13 digits)
    Isbn,
}

impl HandleKind {
    /// Pure syntactic check of `input` against this kind's rules.
    #[must_use]
    pub fn is_valid(self, input: &str) -> bool {
        match self {
            Self::Doi => is_valid_doi(input),
            Self::Isbn => is_valid_isbn(input),
        }
    }

    /// Lower-case label used in logs.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Doi => "doi",
            Self::Isbn => "isbn",
        }
    }
}

impl fmt::Display for HandleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A validated, normalized identifier. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Handle {
    value: String,
    kind: HandleKind,
}

impl Handle {
    /// Normalized identifier value (bare DOI, or ISBN digits).
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Identifier kind.
    #[must_use]
    pub fn kind(&self) -> HandleKind {
        self.kind
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

/// Classifies and validates one raw input string.
///
/// DOI syntax is tried first, then ISBN. When neither matches, the error
/// describes the kind the input most resembles.
///
/// # Errors
///
/// Returns [`ParseError`] when the input is neither a valid DOI nor a valid ISBN.
pub fn parse_handle(raw: &str) -> Result<Handle, ParseError> {
    let doi = normalize_doi(raw);
    let doi_result = doi::validate_doi(&doi);
    if doi_result.is_ok() {
        trace!(raw = %raw, doi = %doi, "classified as DOI");
        return Ok(Handle {
            value: doi,
            kind: HandleKind::Doi,
        });
    }

    let isbn = normalize_isbn(raw);
    let isbn_result = isbn::validate_isbn(&isbn);
    if isbn_result.is_ok() {
        trace!(raw = %raw, isbn = %isbn, "classified as ISBN");
        return Ok(Handle {
            value: isbn,
            kind: HandleKind::Isbn,
        });
    }

    if doi::looks_like_doi(&doi) {
        return Err(doi_result.err().unwrap_or_else(|| ParseError::unrecognized(raw)));
    }
    if isbn::looks_like_isbn(&isbn) {
        return Err(isbn_result.err().unwrap_or_else(|| ParseError::unrecognized(raw)));
    }
    Err(ParseError::unrecognized(raw.trim()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_handle_doi() {
        let handle = parse_handle("doi:10.1000/validdoi").unwrap();
        assert_eq!(handle.kind(), HandleKind::Doi);
        assert_eq!(handle.value(), "10.1000/validdoi");
        assert_eq!(handle.to_string(), "10.1000/validdoi");
    }

    #[test]
    fn test_parse_handle_isbn10_and_isbn13() {
        let h10 = parse_handle("0-13-609181-4").unwrap();
        assert_eq!(h10.kind(), HandleKind::Isbn);
        assert_eq!(h10.value(), "0136091814");

        let h13 = parse_handle("9780136091813").unwrap();
        assert_eq!(h13.kind(), HandleKind::Isbn);
    }

    #[test]
    fn test_parse_handle_unrecognized() {
        let err = parse_handle("not-a-real-identifier").unwrap_err();
        assert!(matches!(err, ParseError::Unrecognized { .. }));
        assert_eq!(err.input(), "not-a-real-identifier");
    }

    #[test]
    fn test_parse_handle_reports_isbn_checksum() {
        let err = parse_handle("9780136091817").unwrap_err();
        assert!(matches!(err, ParseError::InvalidIsbn { .. }), "got {err:?}");
    }

    #[test]
    fn test_parse_handle_reports_doi_syntax() {
        let err = parse_handle("10.12/short").unwrap_err();
        assert!(matches!(err, ParseError::InvalidDoi { .. }), "got {err:?}");
    }

    #[test]
    fn test_handle_kind_is_valid_is_pure() {
        assert!(HandleKind::Isbn.is_valid("9780136091813"));
        assert!(!HandleKind::Isbn.is_valid("cake"));
        assert!(!HandleKind::Isbn.is_valid("9780136091817"));
        assert!(HandleKind::Doi.is_valid("10.1000/182"));
        assert!(!HandleKind::Doi.is_valid("cake"));
        // repeated calls agree
        assert_eq!(
            HandleKind::Isbn.is_valid("0136091814"),
            HandleKind::Isbn.is_valid("0136091814")
        );
    }

    #[test]
    fn test_equal_inputs_give_equal_handles() {
        let a = parse_handle("https://doi.org/10.1234/ABC").unwrap();
        let b = parse_handle("10.1234/ABC").unwrap();
        assert_eq!(a, b);
    }
}
