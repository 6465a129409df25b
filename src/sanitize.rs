use once_cell::sync::Lazy;
use regex::Regex;

static DISALLOWED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-zA-Z0-9 ]").expect("valid sanitize regex"));

/// Keeps ASCII letters, digits and spaces; everything else is dropped.
pub fn sanitize_input(raw: &str) -> String {
    if raw.is_empty() {
        return String::new();
    }
    DISALLOWED.replace_all(raw, "").into_owned()
}

/// Sanitized and trimmed form used for search queries. `None` when nothing is left.
pub fn sanitize_query(raw: &str) -> Option<String> {
    let cleaned = sanitize_input(raw);
    let trimmed = cleaned.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_punctuation_and_markup() {
        assert_eq!(sanitize_input("<script>alert(1)</script>"), "scriptalert1script");
        assert_eq!(sanitize_input("Spider-Man: No Way Home"), "SpiderMan No Way Home");
    }

    #[test]
    fn keeps_spaces_but_not_other_whitespace() {
        assert_eq!(sanitize_input("a b\tc\n"), "a bc");
    }

    #[test]
    fn drops_non_ascii_letters() {
        assert_eq!(sanitize_input("Amélie"), "Amlie");
    }

    #[test]
    fn query_is_trimmed_and_empty_becomes_none() {
        assert_eq!(sanitize_query("  batman  "), Some("batman".to_string()));
        assert_eq!(sanitize_query(" ?! "), None);
        assert_eq!(sanitize_query(""), None);
    }
}
