use std::sync::LazyLock;

use regex::Regex;

/// Longest text handed to the synthesis backend; longer replies are cut
/// at the limit.
const MAX_SPEECH_CHARS: usize = 1000;

static CODE_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```.*?```").expect("code fence pattern"));
static INLINE_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"`([^`]+)`").expect("inline code pattern"));
static BOLD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*(.*?)\*\*").expect("bold pattern"));
static ITALIC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*(.*?)\*").expect("italic pattern"));
static HEADER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^#{1,6}\s*").expect("header pattern"));
static URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"https?://[^\s)]+").expect("url pattern"));
static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("whitespace pattern"));

/// Strip markdown and other screen-only artifacts so synthesized speech
/// does not read formatting characters aloud.
pub fn clean_for_speech(text: &str) -> String {
    let text = CODE_FENCE.replace_all(text, "[code block]");
    let text = INLINE_CODE.replace_all(&text, "$1");
    let text = BOLD.replace_all(&text, "$1");
    let text = ITALIC.replace_all(&text, "$1");
    let text = HEADER.replace_all(&text, "");
    let text = URL.replace_all(&text, "[link]");
    let text = WHITESPACE.replace_all(&text, " ");
    let mut cleaned = text.trim().to_string();

    if cleaned.chars().count() > MAX_SPEECH_CHARS {
        cleaned = cleaned.chars().take(MAX_SPEECH_CHARS).collect::<String>() + "...";
    }
    cleaned
}

#[cfg(test)]
mod tests {
    use super::clean_for_speech;

    #[test]
    fn strips_code_fences_and_inline_code() {
        let input = "Run this:\n```rust\nfn main() {}\n```\nthen call `cargo build`.";
        let cleaned = clean_for_speech(input);
        assert!(cleaned.contains("[code block]"));
        assert!(cleaned.contains("cargo build"));
        assert!(!cleaned.contains('`'));
    }

    #[test]
    fn strips_emphasis_and_headers() {
        let cleaned = clean_for_speech("# Title\nThis is **important** and *subtle*.");
        assert_eq!(cleaned, "Title This is important and subtle.");
    }

    #[test]
    fn replaces_urls() {
        let cleaned = clean_for_speech("See https://doc.rust-lang.org/book for details.");
        assert_eq!(cleaned, "See [link] for details.");
    }

    #[test]
    fn collapses_whitespace() {
        let cleaned = clean_for_speech("a\n\n  b\t c");
        assert_eq!(cleaned, "a b c");
    }

    #[test]
    fn truncates_very_long_text() {
        let long = "word ".repeat(500);
        let cleaned = clean_for_speech(&long);
        assert!(cleaned.chars().count() <= 1003);
        assert!(cleaned.ends_with("..."));
    }

    #[test]
    fn empty_input_stays_empty() {
        assert_eq!(clean_for_speech("   \n  "), "");
    }
}
