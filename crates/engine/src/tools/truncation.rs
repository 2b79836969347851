/// Truncate text to at most `max_chars` characters, noting how much was cut.
///
/// Returns the (possibly shortened) text and whether truncation happened.
pub fn truncate_text(text: &str, max_chars: usize) -> (String, bool) {
    match text.char_indices().nth(max_chars) {
        None => (text.to_string(), false),
        Some((cut, _)) => {
            let omitted = text[cut..].chars().count();
            (
                format!("{}\n[... {} characters omitted]", &text[..cut], omitted),
                true,
            )
        }
    }
}
