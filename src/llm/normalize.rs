//! Normalization of generated text into plain source code.
//!
//! Models frequently wrap code in markdown fences, sometimes with a language
//! tag on the opening fence, and occasionally wrap an already-fenced block in
//! a second bare fence. [`normalize`] strips surrounding fence layers until
//! the text stops changing and trims whitespace. The function is idempotent:
//! normalizing already-normalized text is a no-op, so callers can apply it
//! defensively at any boundary.

const FENCE: &str = "```";

/// Strips surrounding markdown code fences and trims whitespace.
///
/// Handles all of:
/// - ` ```python\n...\n``` ` (opening fence with language tag)
/// - ` ```\n...\n``` ` (bare fences)
/// - ` ```\n```python\n...\n``` ` (double-wrapped output)
/// - an opening fence with no closing fence (truncated responses)
/// - text with no fences at all (returned trimmed, unchanged otherwise)
pub fn normalize(text: &str) -> String {
    let mut current = text.trim().to_string();
    loop {
        let stripped = strip_fence_layer(&current);
        if stripped == current {
            return current;
        }
        current = stripped;
    }
}

/// Strips one layer of surrounding fences from already-trimmed text.
fn strip_fence_layer(trimmed: &str) -> String {
    let Some(rest) = trimmed.strip_prefix(FENCE) else {
        return trimmed.to_string();
    };

    // Drop the language tag: everything on the opening fence line.
    let body = match rest.find('\n') {
        Some(idx) => &rest[idx + 1..],
        // Single-line input like "```python" or "```" carries no code.
        None => return String::new(),
    };

    let body = body.strip_suffix(FENCE).unwrap_or(body);
    body.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_language_tagged_fence() {
        let raw = "```python\ndef double(x):\n    return x * 2\n```";
        assert_eq!(normalize(raw), "def double(x):\n    return x * 2");
    }

    #[test]
    fn test_strips_bare_fence() {
        let raw = "```\nprint('hi')\n```";
        assert_eq!(normalize(raw), "print('hi')");
    }

    #[test]
    fn test_plain_text_only_trimmed() {
        assert_eq!(normalize("  x = 1\n"), "x = 1");
    }

    #[test]
    fn test_missing_closing_fence() {
        let raw = "```python\nx = 1";
        assert_eq!(normalize(raw), "x = 1");
    }

    #[test]
    fn test_fence_only_input_is_empty() {
        assert_eq!(normalize("```python"), "");
        assert_eq!(normalize("```"), "");
    }

    #[test]
    fn test_double_wrapped_fences_fully_stripped() {
        // A bare fence wrapping a tagged fenced block collapses to the code.
        let raw = "```\n```python\nprint(1)\n```";
        assert_eq!(normalize(raw), "print(1)");
        let closed = "```\n```python\nprint(1)\n```\n```";
        assert_eq!(normalize(closed), "print(1)");
    }

    #[test]
    fn test_interior_fences_preserved() {
        // Only surrounding fences are stripped; fences inside the code body
        // (e.g. in a docstring) stay put.
        let raw = "```python\ns = \"```\"\nprint(s)\n```";
        assert_eq!(normalize(raw), "s = \"```\"\nprint(s)");
    }

    #[test]
    fn test_idempotent() {
        let inputs = [
            "```python\ndef f():\n    pass\n```",
            "```\nx = 1\n```",
            "```\n```python\nprint(1)\n```",
            "```python\n```\nx\n```",
            "plain code",
            "   padded   ",
            "",
        ];
        for input in inputs {
            let once = normalize(input);
            assert_eq!(normalize(&once), once, "not idempotent for {input:?}");
        }
    }
}
