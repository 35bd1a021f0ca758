/// Marker appended when rendered output exceeds the byte cap.
pub const CLIPPED_MARKER: &str = "<response clipped>";

/// Cap `text` at `max_bytes` on a char boundary, marking the cut.
pub fn clip_text(text: &str, max_bytes: usize) -> String {
    if text.len() <= max_bytes {
        return text.to_string();
    }
    let mut cut = max_bytes;
    while cut > 0 && !text.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}\n{}", &text[..cut], CLIPPED_MARKER)
}

/// Prefix each line with a right-aligned 1-based line number, `cat -n` style.
pub fn numbered(content: &str, first_line: usize) -> String {
    content
        .split('\n')
        .enumerate()
        .map(|(i, line)| format!("{:6}\t{}", i + first_line, line))
        .collect::<Vec<_>>()
        .join("\n")
}
