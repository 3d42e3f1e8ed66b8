use once_cell::sync::Lazy;
use regex::Regex;

static THINK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<think>.*?</think>").expect("think regex"));
static MEANINGFUL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\p{L}\p{N}]").expect("meaningful"));

/// Remove `<think>…</think>` reasoning artifacts some models leak into their
/// replies. Case-insensitive, spans newlines. All other whitespace is kept.
pub fn strip_think_blocks(text: &str) -> String {
    if !text.contains('<') {
        return text.to_string();
    }
    THINK_RE.replace_all(text, "").into_owned()
}

/// A paragraph is meaningful when it contains at least one letter or digit.
/// Pure punctuation/symbol decorations (e.g. "* * *") are not.
pub fn is_meaningful(text: &str) -> bool {
    MEANINGFUL_RE.is_match(text)
}

pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Count of leading whitespace characters (poetry indentation).
pub fn leading_whitespace_count(text: &str) -> usize {
    text.chars().take_while(|c| c.is_whitespace()).count()
}

/// True when the text has cased letters and none of them is lowercase.
pub fn is_all_uppercase(text: &str) -> bool {
    let mut saw_alpha = false;
    for ch in text.chars() {
        if ch.is_lowercase() {
            return false;
        }
        if ch.is_alphabetic() {
            saw_alpha = true;
        }
    }
    saw_alpha
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn think_blocks_are_removed_across_lines() {
        let s = "  keep <THINK>drop\nthis</think> tail  ";
        assert_eq!(strip_think_blocks(s), "  keep  tail  ");
    }

    #[test]
    fn think_strip_preserves_untouched_text() {
        let s = "    line one\n        line two";
        assert_eq!(strip_think_blocks(s), s);
    }

    #[test]
    fn meaningfulness() {
        assert!(is_meaningful("Chapter 1"));
        assert!(is_meaningful("7"));
        assert!(!is_meaningful("* * *"));
        assert!(!is_meaningful("   "));
        assert!(!is_meaningful(""));
    }

    #[test]
    fn uppercase_detection() {
        assert!(is_all_uppercase("PROLOGUE"));
        assert!(is_all_uppercase("PART I"));
        assert!(!is_all_uppercase("Prologue"));
        assert!(!is_all_uppercase("1234"));
    }

    #[test]
    fn leading_whitespace_counts_chars() {
        assert_eq!(leading_whitespace_count("    four"), 4);
        assert_eq!(leading_whitespace_count("\t\ttwo tabs"), 2);
        assert_eq!(leading_whitespace_count("none"), 0);
    }
}
