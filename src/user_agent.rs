//! Shared User-Agent string for every outbound request.
//!
//! Registry lookups, mirror queries and downloads all identify the tool the
//! same way (RFC 9308 good citizenship). Crossref routes requests that carry a
//! contact address to its polite pool.

/// Project URL for User-Agent identification.
const PROJECT_UA_URL: &str = env!("CARGO_PKG_REPOSITORY");

/// Builds the User-Agent header value, with an optional `mailto:` contact.
///
/// # Example
///
/// ```
/// use bibfetch_core::user_agent::user_agent;
///
/// let ua = user_agent(Some("me@example.org"));
/// assert!(ua.starts_with("bibfetch/"));
/// assert!(ua.ends_with("; mailto:me@example.org)"));
/// ```
#[must_use]
pub fn user_agent(mailto: Option<&str>) -> String {
    let version = env!("CARGO_PKG_VERSION");
    match mailto.map(str::trim).filter(|m| !m.is_empty()) {
        Some(contact) => {
            format!("bibfetch/{version} (research-tool; +{PROJECT_UA_URL}; mailto:{contact})")
        }
        None => format!("bibfetch/{version} (research-tool; +{PROJECT_UA_URL})"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_agent_contains_version_and_project_url() {
        let ua = user_agent(None);
        assert!(ua.contains(PROJECT_UA_URL), "UA must contain project URL");
        assert_eq!(
            Some(env!("CARGO_PKG_VERSION")),
            ua.strip_prefix("bibfetch/").and_then(|s| s.split(' ').next()),
            "UA must contain crate version"
        );
        assert!(ua.contains("research-tool"));
        assert!(!ua.contains("mailto"));
    }

    #[test]
    fn test_user_agent_blank_mailto_is_ignored() {
        assert_eq!(user_agent(Some("  ")), user_agent(None));
    }

    #[test]
    fn test_user_agent_with_mailto() {
        let ua = user_agent(Some("lab@example.org"));
        assert!(ua.contains("; mailto:lab@example.org)"), "got: {ua}");
    }
}
