//! Download-link extraction from document mirror pages.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{Html, Selector};

/// `onclick="location.href='...'"` on the mirror's download button.
#[allow(clippy::expect_used)]
static ONCLICK_HREF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"location\.href\s*=\s*['"]([^'"]+)['"]"#).expect("onclick regex is valid") // Static pattern, safe to panic
});

#[allow(clippy::expect_used)]
static BUTTON_SELECTOR: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("button[onclick]").expect("button selector is valid") // Static pattern, safe to panic
});

#[allow(clippy::expect_used)]
static EMBED_SELECTOR: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("embed[src], iframe[src]").expect("embed selector is valid") // Static pattern, safe to panic
});

/// Extracts the raw (possibly relative) download link from a mirror page.
///
/// Takes the first `button` whose `onclick` sets `location.href`, else the
/// `src` of the first `embed`/`iframe`.
pub(crate) fn extract_download_link(body: &str) -> Option<String> {
    let document = Html::parse_document(body);

    let from_button = document
        .select(&BUTTON_SELECTOR)
        .filter_map(|button| button.value().attr("onclick"))
        .find_map(|onclick| {
            ONCLICK_HREF
                .captures(onclick)
                .and_then(|caps| caps.get(1))
                .map(|m| m.as_str().trim().to_string())
        })
        .filter(|link| !link.is_empty());
    if from_button.is_some() {
        return from_button;
    }

    document
        .select(&EMBED_SELECTOR)
        .filter_map(|element| element.value().attr("src"))
        .map(str::trim)
        .find(|src| !src.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_from_button_onclick() {
        let body = r#"<html><body>
            <div id="buttons">
              <button onclick="location.href='//cdn.mirror.example/d/paper.pdf?download=true'">save</button>
            </div></body></html>"#;
        assert_eq!(
            extract_download_link(body).as_deref(),
            Some("//cdn.mirror.example/d/paper.pdf?download=true")
        );
    }

    #[test]
    fn test_extract_skips_buttons_without_location_href() {
        let body = r#"<button onclick="share()">share</button>
            <button onclick="location.href = &quot;/files/a.pdf&quot;">save</button>"#;
        assert_eq!(extract_download_link(body).as_deref(), Some("/files/a.pdf"));
    }

    #[test]
    fn test_extract_falls_back_to_embed_src() {
        let body = r#"<div><embed type="application/pdf" src="https://m.example/x.pdf#view=FitH"></div>"#;
        assert_eq!(
            extract_download_link(body).as_deref(),
            Some("https://m.example/x.pdf#view=FitH")
        );
    }

    #[test]
    fn test_extract_falls_back_to_iframe_src() {
        let body = r#"<iframe src="/viewer/y.pdf"></iframe>"#;
        assert_eq!(extract_download_link(body).as_deref(), Some("/viewer/y.pdf"));
    }

    #[test]
    fn test_extract_none_when_page_has_no_link() {
        assert_eq!(extract_download_link("<html><p>article not found</p></html>"), None);
        assert_eq!(extract_download_link(""), None);
    }
}
