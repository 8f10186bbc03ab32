//! Error types for identifier parsing.

use thiserror::Error;

use crate::fetch::StageError;

/// Errors produced when a raw input string is not a usable identifier.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// Looks like a DOI but fails DOI syntax rules
    #[error("invalid DOI '{input}': {reason}\n  Suggestion: {suggestion}")]
    InvalidDoi {
        /// The normalized DOI candidate
        input: String,
        /// Why the DOI is invalid
        reason: String,
        /// How to fix the issue
        suggestion: String,
    },

    /// Looks like an ISBN but fails length or checksum rules
    #[error("invalid ISBN '{input}': {reason}")]
    InvalidIsbn {
        /// The normalized ISBN candidate
        input: String,
        /// Why the ISBN is invalid
        reason: String,
    },

    /// Neither DOI nor ISBN
    #[error(
        "unrecognized identifier '{input}'\n  Suggestion: Provide a DOI (10.XXXX/suffix) or an ISBN-10/ISBN-13"
    )]
    Unrecognized {
        /// The raw input
        input: String,
    },
}

impl ParseError {
    /// Creates an `InvalidDoi` error with the standard suggestion.
    #[must_use]
    pub fn invalid_doi(input: &str, reason: &str) -> Self {
        Self::InvalidDoi {
            input: input.to_string(),
            reason: reason.to_string(),
            suggestion: "DOIs look like 10.1234/example".to_string(),
        }
    }

    /// Creates an `InvalidDoi` error for a DOI without a suffix.
    #[must_use]
    pub fn doi_no_suffix(input: &str) -> Self {
        Self::InvalidDoi {
            input: input.to_string(),
            reason: "missing suffix after '/'".to_string(),
            suggestion: "Include the part after the slash (e.g. 10.1234/example)".to_string(),
        }
    }

    /// Creates an `InvalidIsbn` error.
    #[must_use]
    pub fn invalid_isbn(input: &str, reason: &str) -> Self {
        Self::InvalidIsbn {
            input: input.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Creates an `Unrecognized` error.
    #[must_use]
    pub fn unrecognized(input: &str) -> Self {
        Self::Unrecognized {
            input: input.to_string(),
        }
    }

    /// The input string the error refers to.
    #[must_use]
    pub fn input(&self) -> &str {
        match self {
            Self::InvalidDoi { input, .. }
            | Self::InvalidIsbn { input, .. }
            | Self::Unrecognized { input } => input,
        }
    }
}

impl From<ParseError> for StageError {
    fn from(error: ParseError) -> Self {
        let input = error.input().to_string();
        StageError::validation(input, error.to_string())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::fetch::FailureKind;

    #[test]
    fn test_parse_error_invalid_doi_message() {
        let err = ParseError::invalid_doi("10.12/x", "registrant code must have at least 4 digits");
        let msg = err.to_string();
        assert!(msg.contains("10.12/x"), "should contain input");
        assert!(msg.contains("4 digits"), "should contain reason");
        assert!(msg.contains("10.1234/example"), "should have suggestion");
    }

    #[test]
    fn test_parse_error_unrecognized_message() {
        let err = ParseError::unrecognized("cake");
        let msg = err.to_string();
        assert!(msg.contains("'cake'"));
        assert!(msg.contains("ISBN"), "suggestion should mention ISBN");
    }

    #[test]
    fn test_parse_error_converts_to_validation_stage_error() {
        let stage: StageError = ParseError::invalid_isbn("9780136091817", "checksum mismatch").into();
        assert_eq!(stage.kind(), FailureKind::Validation);
        let msg = stage.to_string();
        assert!(msg.contains("9780136091817"));
        assert!(msg.contains("checksum mismatch"));
    }
}
