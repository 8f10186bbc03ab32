//! DOI normalization and validation.

use super::error::ParseError;

/// URL prefixes stripped from DOI input, in match order.
const DOI_URL_PREFIXES: [&str; 4] = [
    "https://doi.org/",
    "http://doi.org/",
    "https://dx.doi.org/",
    "http://dx.doi.org/",
];

/// Normalizes a DOI by stripping prefixes and decoding.
///
/// Strips URL prefixes (`https://doi.org/`, `https://dx.doi.org/`),
/// text prefixes (`doi:`, `DOI:`), URL-decodes, and trims whitespace.
///
/// # Examples
///
/// ```
/// use bibfetch_core::normalize_doi;
///
/// assert_eq!(normalize_doi("https://doi.org/10.1234/abc"), "10.1234/abc");
/// assert_eq!(normalize_doi("DOI: 10.1234%2Fabc"), "10.1234/abc");
/// ```
#[must_use]
pub fn normalize_doi(input: &str) -> String {
    let mut doi = input.trim();

    for prefix in &DOI_URL_PREFIXES {
        if doi.len() >= prefix.len() && doi[..prefix.len()].eq_ignore_ascii_case(prefix) {
            doi = &doi[prefix.len()..];
            break;
        }
    }

    if doi.len() >= 4 && doi.is_char_boundary(4) && doi[..4].eq_ignore_ascii_case("doi:") {
        doi = doi[4..].trim_start();
    }

    match urlencoding::decode(doi) {
        Ok(decoded) => decoded.trim().to_string(),
        Err(_) => doi.trim().to_string(),
    }
}

/// Validates an already-normalized DOI.
///
/// # Validation rules:
/// - Must start with `10.`
/// - First registrant segment must be 4+ digits (nested like `10.1000.10` allowed)
/// - Must have a non-empty suffix after the first `/`
pub(crate) fn validate_doi(doi: &str) -> Result<(), ParseError> {
    let Some(rest) = doi.strip_prefix("10.") else {
        return Err(ParseError::invalid_doi(doi, "DOI must start with '10.'"));
    };

    let Some((registrant, suffix)) = rest.split_once('/') else {
        return Err(ParseError::doi_no_suffix(doi));
    };

    if registrant.is_empty() {
        return Err(ParseError::invalid_doi(
            doi,
            "missing registrant code after '10.'",
        ));
    }

    let mut segments = registrant.split('.');
    let first_segment = segments.next().unwrap_or_default();
    if first_segment.len() < 4 || !first_segment.chars().all(|c| c.is_ascii_digit()) {
        return Err(ParseError::invalid_doi(
            doi,
            "registrant code must have at least 4 digits",
        ));
    }
    if segments.any(|s| s.is_empty() || !s.chars().all(|c| c.is_ascii_digit())) {
        return Err(ParseError::invalid_doi(
            doi,
            "nested registrant segments must be numeric",
        ));
    }

    if suffix.trim().is_empty() {
        return Err(ParseError::doi_no_suffix(doi));
    }
    if suffix.chars().any(char::is_whitespace) {
        return Err(ParseError::invalid_doi(doi, "suffix must not contain whitespace"));
    }

    Ok(())
}

/// Returns true if `input` normalizes to a syntactically valid DOI.
#[must_use]
pub fn is_valid_doi(input: &str) -> bool {
    validate_doi(&normalize_doi(input)).is_ok()
}

/// Percent-encodes a DOI for use as a URL path, keeping the `/` separators.
///
/// Suffixes may legally contain `#`, `?` or `%`, which would otherwise end
/// or alter the path.
pub(crate) fn doi_url_path(doi: &str) -> String {
    doi.split('/')
        .map(urlencoding::encode)
        .collect::<Vec<_>>()
        .join("/")
}

/// Cheap check for input that is clearly meant to be a DOI.
///
/// Used to pick the DOI error over the generic "unrecognized" one.
pub(crate) fn looks_like_doi(normalized: &str) -> bool {
    normalized.starts_with("10.") && normalized.contains('/')
}
