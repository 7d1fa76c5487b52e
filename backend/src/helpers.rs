use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    // Leading chapter:verse reference at the start of a footnote,
    // e.g. "1:1 In the beginning" -> "In the beginning"
    pub static ref RE_LEADING_VERSE_REF: Regex = Regex::new(r"^\d{1,3}:\d{1,3}\s*").unwrap();
}

/// Replace every ASCII space with an underscore.
///
/// Used for URL path segments built from book common names. No other
/// characters are escaped; upstream naming is expected to be URL-safe.
pub fn replace_spaces_with_underscores(s: &str) -> String {
    s.replace(' ', "_")
}

/// Collapse every run of whitespace (including newlines) to a single space.
///
/// Leading and trailing runs also become a single space; stripping the ends
/// of a whole inline sequence is the accumulator's job, not this function's.
pub fn collapse_whitespace(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut in_whitespace = false;
    for ch in s.chars() {
        if ch.is_whitespace() {
            if !in_whitespace {
                out.push(' ');
                in_whitespace = true;
            }
        } else {
            out.push(ch);
            in_whitespace = false;
        }
    }
    out
}

/// Normalize footnote text: trim, then strip a leading "C:V" reference.
pub fn normalize_footnote_text(s: &str) -> String {
    let collapsed = collapse_whitespace(s);
    let trimmed = collapsed.trim();
    RE_LEADING_VERSE_REF.replace(trimmed, "").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replace_spaces() {
        assert_eq!(replace_spaces_with_underscores("1 Chronicles"), "1_Chronicles");
        assert_eq!(replace_spaces_with_underscores("Song of Solomon"), "Song_of_Solomon");
        assert_eq!(replace_spaces_with_underscores("GEN"), "GEN");
    }

    #[test]
    fn test_replace_spaces_idempotent() {
        let once = replace_spaces_with_underscores("1 2 3");
        let twice = replace_spaces_with_underscores(&once);
        assert_eq!(once, "1_2_3");
        assert_eq!(once, twice);
    }

    #[test]
    fn test_replace_spaces_preserves_other_code_points() {
        assert_eq!(replace_spaces_with_underscores("Göttingen\t!"), "Göttingen\t!");
    }

    #[test]
    fn test_collapse_whitespace() {
        assert_eq!(collapse_whitespace("a  b\n\tc"), "a b c");
        assert_eq!(collapse_whitespace("\n  are the poor"), " are the poor");
        assert_eq!(collapse_whitespace(""), "");
        assert_eq!(collapse_whitespace("   "), " ");
    }

    #[test]
    fn test_normalize_footnote_text() {
        assert_eq!(
            normalize_footnote_text("1:1 In the beginning"),
            "In the beginning"
        );
        assert_eq!(
            normalize_footnote_text("  12:34   Or formless and empty "),
            "Or formless and empty"
        );
        // No reference to strip
        assert_eq!(normalize_footnote_text("Or the sky"), "Or the sky");
        // A reference only counts at the very start
        assert_eq!(normalize_footnote_text("See 1:1"), "See 1:1");
    }
}
