//! Unicode utilities for text processing.
//!
//! Byte-budget cuts must land on character boundaries; previews are cut on
//! grapheme clusters so they never split a user-perceived character.

use unicode_segmentation::UnicodeSegmentation;

/// Finds a valid UTF-8 character boundary at or before the given position.
///
/// # Examples
///
/// ```
/// use kvwarm::io::find_char_boundary;
///
/// let s = "Hello 世界";
/// assert_eq!(find_char_boundary(s, 6), 6); // Before '世'
/// assert_eq!(find_char_boundary(s, 7), 6); // Middle of '世', backs up
/// ```
#[must_use]
pub const fn find_char_boundary(s: &str, pos: usize) -> usize {
    if pos >= s.len() {
        return s.len();
    }
    let bytes = s.as_bytes();
    let mut boundary = pos;
    // UTF-8 continuation bytes start with 10xxxxxx (0x80-0xBF)
    while boundary > 0 && (bytes[boundary] & 0xC0) == 0x80 {
        boundary -= 1;
    }
    boundary
}

/// Decodes at most `max_bytes` leading bytes as UTF-8.
///
/// A multi-byte character straddling the cut is dropped whole, so the result
/// is at most `max_bytes` long and exactly `max_bytes` for ASCII input.
///
/// # Errors
///
/// Returns the byte offset of the first invalid UTF-8 sequence before the cut.
pub fn utf8_prefix(bytes: &[u8], max_bytes: usize) -> std::result::Result<&str, usize> {
    let mut end = max_bytes.min(bytes.len());
    if end < bytes.len() {
        while end > 0 && (bytes[end] & 0xC0) == 0x80 {
            end -= 1;
        }
    }
    std::str::from_utf8(&bytes[..end]).map_err(|e| e.valid_up_to())
}

/// Truncates a string at a grapheme cluster boundary.
///
/// Returns a slice containing at most `max_graphemes` grapheme clusters.
#[must_use]
pub fn truncate_graphemes(s: &str, max_graphemes: usize) -> &str {
    let mut end_byte = 0;

    for (count, grapheme) in s.graphemes(true).enumerate() {
        if count >= max_graphemes {
            break;
        }
        end_byte += grapheme.len();
    }

    &s[..end_byte]
}

/// Single-line preview of `s`, at most `max_graphemes` long, with `...` when cut.
#[must_use]
pub fn preview(s: &str, max_graphemes: usize) -> String {
    let flat = s.replace('\n', "\\n");
    let cut = truncate_graphemes(&flat, max_graphemes);
    if cut.len() < flat.len() {
        let keep = truncate_graphemes(cut, max_graphemes.saturating_sub(3));
        format!("{keep}...")
    } else {
        flat
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_char_boundary() {
        let s = "Hello 世界!";
        assert_eq!(find_char_boundary(s, 0), 0);
        assert_eq!(find_char_boundary(s, 6), 6);
        assert_eq!(find_char_boundary(s, 7), 6);
        assert_eq!(find_char_boundary(s, 8), 6);
        assert_eq!(find_char_boundary(s, 9), 9);
        assert_eq!(find_char_boundary(s, 100), s.len());
    }

    #[test]
    fn test_utf8_prefix_ascii_exact() {
        assert_eq!(utf8_prefix(b"abcdef", 4), Ok("abcd"));
        assert_eq!(utf8_prefix(b"abc", 10), Ok("abc"));
        assert_eq!(utf8_prefix(b"abc", 0), Ok(""));
    }

    #[test]
    fn test_utf8_prefix_backs_off_multibyte() {
        let s = "ab世界";
        // '世' occupies bytes 2..5; cutting at 3 drops it whole.
        assert_eq!(utf8_prefix(s.as_bytes(), 3), Ok("ab"));
        assert_eq!(utf8_prefix(s.as_bytes(), 5), Ok("ab世"));
    }

    #[test]
    fn test_utf8_prefix_invalid() {
        assert_eq!(utf8_prefix(&[b'a', 0xFF, b'b'], 3), Err(1));
    }

    #[test]
    fn test_truncate_graphemes() {
        assert_eq!(truncate_graphemes("Hello", 3), "Hel");
        assert_eq!(truncate_graphemes("世界!", 2), "世界");
        assert_eq!(truncate_graphemes("Hello", 10), "Hello");
    }

    #[test]
    fn test_preview() {
        assert_eq!(preview("short", 10), "short");
        assert_eq!(preview("line1\nline2", 40), "line1\\nline2");
        assert_eq!(preview("abcdefghijkl", 8), "abcde...");
    }
}
