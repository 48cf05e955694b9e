use hiverag_core::Document;

/// Prompt context block: document contents joined with newlines, in rank order.
pub fn build_context(documents: &[Document]) -> String {
    documents.iter().map(|d| d.content.as_str()).collect::<Vec<_>>().join("\n")
}

/// At most `max_chars` characters of `text`, with `...` appended when cut.
pub fn preview(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((end, _)) => format!("{}...", &text[..end]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_joins_contents_in_order() {
        let docs = vec![Document::new("a", "first"), Document::new("b", "second")];
        assert_eq!(build_context(&docs), "first\nsecond");
        assert_eq!(build_context(&[]), "");
    }

    #[test]
    fn preview_respects_char_boundaries() {
        assert_eq!(preview("short", 200), "short");
        assert_eq!(preview("abcdef", 3), "abc...");
        assert_eq!(preview("🐝🐝🐝", 2), "🐝🐝...");
    }
}
