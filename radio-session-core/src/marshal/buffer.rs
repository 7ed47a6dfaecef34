/// Copy `text` into a fixed-capacity byte buffer as a NUL-terminated string.
///
/// The buffer is zero-filled first. At most `buffer.len() - 1` bytes of
/// `text` are copied, so the result is always terminated. Returns the number
/// of text bytes copied. A zero-length buffer is left untouched.
pub fn copy_str_to_buffer(text: &str, buffer: &mut [u8]) -> usize {
    if buffer.is_empty() {
        return 0;
    }
    buffer.fill(0);
    let count = text.len().min(buffer.len() - 1);
    buffer[..count].copy_from_slice(&text.as_bytes()[..count]);
    count
}

/// Cut `text` to at most `max_len` bytes without splitting a UTF-8 character.
pub fn truncate_on_char_boundary(text: &str, max_len: usize) -> &str {
    if text.len() <= max_len {
        return text;
    }
    let mut end = max_len;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn copies_and_terminates() {
        let mut buf = [0xFFu8; 8];
        assert_eq!(copy_str_to_buffer("RX2", &mut buf), 3);
        assert_eq!(&buf, b"RX2\0\0\0\0\0");
    }

    #[test]
    fn truncates_to_capacity() {
        let mut buf = [0xFFu8; 4];
        assert_eq!(copy_str_to_buffer("TX/RX,RX2", &mut buf), 3);
        assert_eq!(&buf, b"TX/\0");
    }

    #[test]
    fn zero_length_buffer() {
        let mut buf: [u8; 0] = [];
        assert_eq!(copy_str_to_buffer("anything", &mut buf), 0);
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate_on_char_boundary("gain 10 dB", 4), "gain");
        assert_eq!(truncate_on_char_boundary("µs", 1), "");
        assert_eq!(truncate_on_char_boundary("short", 64), "short");
    }
}
