/// Normalizes extracted text into the cleaned-content form
///
/// This function:
/// - Trims whitespace from each line
/// - Collapses runs of whitespace inside a line into single spaces
/// - Removes empty lines
/// - Joins the remaining lines with `\n`
///
/// Applying it to its own output returns the same text.
pub fn normalize(text: &str) -> String {
    split_into_lines(text)
        .into_iter()
        .map(normalize_whitespace_in_segment)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Splits text into trimmed, non-empty lines
pub fn split_into_lines(text: &str) -> Vec<&str> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect()
}

/// Normalizes whitespace within a single line
pub fn normalize_whitespace_in_segment(segment: &str) -> String {
    segment.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Truncates text to at most `max_chars` characters, on a char boundary
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
