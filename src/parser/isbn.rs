//! ISBN-10 / ISBN-13 normalization and checksum validation.

use super::error::ParseError;

/// Normalizes an ISBN candidate.
///
/// Strips a case-insensitive `isbn:` prefix, hyphens and whitespace, and
/// upper-cases a trailing `x` check character.
#[must_use]
pub fn normalize_isbn(input: &str) -> String {
    let mut isbn = input.trim();
    if isbn.len() >= 5 && isbn.is_char_boundary(5) && isbn[..5].eq_ignore_ascii_case("isbn:") {
        isbn = &isbn[5..];
    } else if isbn.len() >= 4 && isbn.is_char_boundary(4) && isbn[..4].eq_ignore_ascii_case("isbn")
    {
        isbn = &isbn[4..];
    }

    isbn.chars()
        .filter(|c| *c != '-' && !c.is_whitespace())
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

/// Validates an already-normalized ISBN (10 or 13 characters).
pub(crate) fn validate_isbn(isbn: &str) -> Result<(), ParseError> {
    match isbn.len() {
        10 => validate_isbn10(isbn),
        13 => validate_isbn13(isbn),
        n => Err(ParseError::invalid_isbn(
            isbn,
            &format!("expected 10 or 13 characters, found {n}"),
        )),
    }
}

fn validate_isbn10(isbn: &str) -> Result<(), ParseError> {
    let bytes = isbn.as_bytes();
    let mut sum = 0u32;
    for (i, b) in bytes[..9].iter().enumerate() {
        if !b.is_ascii_digit() {
            return Err(ParseError::invalid_isbn(isbn, "ISBN-10 body must be digits"));
        }
        // i < 9, so the weight fits comfortably in u32
        #[allow(clippy::cast_possible_truncation)]
        let weight = 10 - i as u32;
        sum += u32::from(b - b'0') * weight;
    }

    let check = match bytes[9] {
        b'X' => 10,
        b if b.is_ascii_digit() => u32::from(b - b'0'),
        _ => {
            return Err(ParseError::invalid_isbn(
                isbn,
                "ISBN-10 check character must be a digit or X",
            ));
        }
    };

    if (11 - sum % 11) % 11 == check {
        Ok(())
    } else {
        Err(ParseError::invalid_isbn(isbn, "ISBN-10 checksum mismatch"))
    }
}

fn validate_isbn13(isbn: &str) -> Result<(), ParseError> {
    if !isbn.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ParseError::invalid_isbn(isbn, "ISBN-13 must be 13 digits"));
    }

    let digits: Vec<u32> = isbn.bytes().map(|b| u32::from(b - b'0')).collect();
    let sum: u32 = digits[..12]
        .iter()
        .enumerate()
        .map(|(i, d)| if i % 2 == 0 { *d } else { d * 3 })
        .sum();

    if (10 - sum % 10) % 10 == digits[12] {
        Ok(())
    } else {
        Err(ParseError::invalid_isbn(isbn, "ISBN-13 checksum mismatch"))
    }
}

/// Returns true if `input` normalizes to an ISBN-10 or ISBN-13 with a valid checksum.
///
/// # Examples
///
/// ```
/// use bibfetch_core::is_valid_isbn;
///
/// assert!(is_valid_isbn("9780136091813"));
/// assert!(!is_valid_isbn("9780136091817"));
/// assert!(!is_valid_isbn("cake"));
/// ```
#[must_use]
pub fn is_valid_isbn(input: &str) -> bool {
    validate_isbn(&normalize_isbn(input)).is_ok()
}

/// Cheap shape check: the right length and mostly digits.
pub(crate) fn looks_like_isbn(normalized: &str) -> bool {
    matches!(normalized.len(), 10 | 13)
        && normalized
            .bytes()
            .take(normalized.len() - 1)
            .all(|b| b.is_ascii_digit())
}
