//! File-name generation for downloaded documents and per-article citations.

/// Extension of every downloaded source document.
pub const DOCUMENT_EXTENSION: &str = ".pdf";

/// Fallback stem when a title has no alphanumeric content.
const UNTITLED_STEM: &str = "untitled";

/// Maximum stem length in characters; keeps paths well under filesystem limits.
const MAX_STEM_CHARS: usize = 120;

/// Converts a title into a lower-case snake_case file stem.
///
/// Letters and digits are kept (lower-cased). Every run of anything else
/// (punctuation, whitespace, symbols, control characters) collapses to a
/// single `_`, and leading/trailing separators are trimmed.
///
/// # Examples
///
/// ```
/// use bibfetch_core::snake_case_file_name;
///
/// assert_eq!(snake_case_file_name("A: B.  C!"), "a_b_c");
/// assert_eq!(snake_case_file_name("Über Größe"), "über_größe");
/// assert_eq!(snake_case_file_name("???"), "untitled");
/// ```
#[must_use]
pub fn snake_case_file_name(title: &str) -> String {
    let mut stem = String::with_capacity(title.len());
    let mut pending_separator = false;
    let mut kept_chars = 0usize;

    for ch in title.chars() {
        if ch.is_alphanumeric() {
            if pending_separator && !stem.is_empty() {
                if kept_chars + 1 >= MAX_STEM_CHARS {
                    break;
                }
                stem.push('_');
                kept_chars += 1;
            }
            pending_separator = false;
            for lower in ch.to_lowercase() {
                stem.push(lower);
            }
            kept_chars += 1;
            if kept_chars >= MAX_STEM_CHARS {
                break;
            }
        } else {
            pending_separator = true;
        }
    }

    if stem.is_empty() {
        UNTITLED_STEM.to_string()
    } else {
        stem
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snake_case_collapses_punctuation_runs() {
        assert_eq!(snake_case_file_name("A: B.  C!"), "a_b_c");
        assert!(!snake_case_file_name("x -- y ,, z").contains("__"));
    }

    #[test]
    fn test_snake_case_trims_edges() {
        assert_eq!(snake_case_file_name("  (Hello) World.  "), "hello_world");
    }

    #[test]
    fn test_snake_case_control_characters_are_separators() {
        assert_eq!(snake_case_file_name("line\none\ttab"), "line_one_tab");
    }

    #[test]
    fn test_snake_case_path_separators_never_survive() {
        let stem = snake_case_file_name("../../etc/passwd");
        assert_eq!(stem, "etc_passwd");
        assert!(!stem.contains('/'));
    }

    #[test]
    fn test_snake_case_keeps_digits_and_unicode_letters() {
        assert_eq!(snake_case_file_name("COVID-19 in 2020"), "covid_19_in_2020");
        assert_eq!(snake_case_file_name("Étude Ω"), "étude_ω");
    }

    #[test]
    fn test_snake_case_empty_title_falls_back() {
        assert_eq!(snake_case_file_name(""), "untitled");
        assert_eq!(snake_case_file_name(" .!? "), "untitled");
    }

    #[test]
    fn test_snake_case_is_bounded() {
        let title = "word ".repeat(200);
        let stem = snake_case_file_name(&title);
        assert!(stem.chars().count() <= MAX_STEM_CHARS);
        assert!(!stem.ends_with('_'));
    }

    #[test]
    fn test_snake_case_identifier_as_title() {
        assert_eq!(snake_case_file_name("10.1000/validdoi"), "10_1000_validdoi");
    }
}
