//! Download-link extraction from catalog mirror JSON.

use serde::Deserialize;

use crate::fetch::StageError;

/// One catalog search record. All fields are optional on the wire.
#[derive(Debug, Deserialize)]
struct CatalogRecord {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    extension: Option<String>,
}

/// Extracts the first non-empty record URL from a catalog response body.
///
/// An empty array is [`StageError::NotFound`]; records that carry no URL, or
/// a body that is not a record array, are [`StageError::Extraction`].
pub(crate) fn extract_download_link(
    body: &str,
    request_url: &str,
    isbn: &str,
) -> Result<String, StageError> {
    let records: Vec<CatalogRecord> = serde_json::from_str(body).map_err(|e| {
        StageError::extraction(request_url, format!("malformed catalog response: {e}"))
    })?;

    if records.is_empty() {
        return Err(StageError::not_found(isbn));
    }

    records
        .into_iter()
        .find_map(|record| {
            let url = record.url?.trim().to_string();
            if url.is_empty() {
                return None;
            }
            tracing::trace!(
                title = ?record.title,
                extension = ?record.extension,
                url = %url,
                "catalog record selected"
            );
            Some(url)
        })
        .ok_or_else(|| StageError::extraction(request_url, "no catalog record carries a download URL"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const REQUEST: &str = "https://catalog.example/search.json?isbn=9780136091813";
    const ISBN: &str = "9780136091813";

    #[test]
    fn test_first_record_with_url_wins() {
        let body = r#"[
            {"title": "No link", "url": ""},
            {"title": "Book", "url": "/get/book.pdf", "extension": "pdf"},
            {"title": "Later", "url": "/get/later.pdf"}
        ]"#;
        assert_eq!(extract_download_link(body, REQUEST, ISBN).unwrap(), "/get/book.pdf");
    }

    #[test]
    fn test_empty_array_is_not_found() {
        let err = extract_download_link("[]", REQUEST, ISBN).unwrap_err();
        assert!(matches!(err, StageError::NotFound { ref query } if query == ISBN));
    }

    #[test]
    fn test_records_without_url_is_extraction() {
        let err = extract_download_link(r#"[{"title": "x"}]"#, REQUEST, ISBN).unwrap_err();
        assert!(matches!(err, StageError::Extraction { .. }));
    }

    #[test]
    fn test_malformed_body_is_extraction() {
        let err = extract_download_link("<html>", REQUEST, ISBN).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("malformed catalog response"), "got: {msg}");
    }
}
