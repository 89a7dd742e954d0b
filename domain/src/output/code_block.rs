//! Fenced code block extraction
//!
//! Steps flagged `is_code` fail closed: either the output carries a fenced
//! Markdown block whose content replaces it, or the step fails and the raw
//! output never reaches the conversation state.

use regex::Regex;
use std::sync::LazyLock;

static FENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```[^\n]*\n(.*?)```").expect("fence pattern is valid")
});

/// Extract the first fenced code block of `output`, trimmed.
///
/// Returns `None` when no fence is present.
pub fn extract_code_block(output: &str) -> Option<String> {
    FENCE
        .captures(output)
        .map(|captures| captures[1].trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extracts_first_block_with_language_tag() {
        let output = "preamble\n```python\nprint(1)\n```\ntrailer";
        assert_eq!(extract_code_block(output).as_deref(), Some("print(1)"));
    }

    #[test]
    fn test_extracts_block_without_language_tag() {
        let output = "```\nfn main() {}\n```";
        assert_eq!(extract_code_block(output).as_deref(), Some("fn main() {}"));
    }

    #[test]
    fn test_plain_text_yields_none() {
        assert_eq!(extract_code_block("hello world"), None);
        assert_eq!(extract_code_block("not code"), None);
    }

    #[test]
    fn test_first_of_multiple_blocks_wins() {
        let output = "```\nfirst\n```\n\n```\nsecond\n```";
        assert_eq!(extract_code_block(output).as_deref(), Some("first"));
    }

    #[test]
    fn test_multiline_block_is_preserved() {
        let output = "```rust\nlet a = 1;\nlet b = 2;\n```";
        assert_eq!(
            extract_code_block(output).as_deref(),
            Some("let a = 1;\nlet b = 2;")
        );
    }

    #[test]
    fn test_unclosed_fence_yields_none() {
        assert_eq!(extract_code_block("```python\nprint(1)"), None);
    }
}
