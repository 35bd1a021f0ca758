/// Marker appended whenever output is clipped to the configured byte cap.
pub const TRUNCATED_MARKER: &str = "<response clipped>";

/// Cap `text` at `max_bytes`, appending the marker when anything was cut.
/// The cut lands on a char boundary so the result stays valid UTF-8.
pub fn maybe_truncate(text: &str, max_bytes: usize) -> String {
    if text.len() <= max_bytes {
        return text.to_string();
    }
    let mut cut = max_bytes;
    while cut > 0 && !text.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}\n{}", &text[..cut], TRUNCATED_MARKER)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_output_passes_through() {
        assert_eq!(maybe_truncate("hello", 100), "hello");
    }

    #[test]
    fn long_output_is_clipped_with_marker() {
        let long = "x".repeat(50);
        let out = maybe_truncate(&long, 10);
        assert!(out.starts_with("xxxxxxxxxx\n"));
        assert!(out.ends_with(TRUNCATED_MARKER));
    }

    #[test]
    fn cut_respects_char_boundaries() {
        let text = "ééééé";
        let out = maybe_truncate(text, 3);
        assert!(out.ends_with(TRUNCATED_MARKER));
        assert!(out.starts_with('é'));
    }
}
