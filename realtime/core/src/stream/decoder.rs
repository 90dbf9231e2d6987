//! SSE Frame Decoder
//!
//! Wire format of the assistant stream: a sequence of frames separated by a
//! blank line, each frame containing one or more `data: <json>` lines.
//!
//! ```text
//! data: {"type":"text","content":"Hello"}\n
//! \n
//! ```
//!
//! The decoder buffers incoming bytes and yields the `data:` payloads of
//! complete frames. Frame delimiters are ASCII, so the byte-level scan never
//! splits a multi-byte character; text is only decoded once a frame is
//! complete, which keeps characters straddling chunk boundaries intact.

/// Minimum buffer capacity for the decoder
const MIN_BUFFER_CAPACITY: usize = 4096;

/// Prefix marking a data line within a frame
const DATA_PREFIX: &str = "data:";

/// Decoder state machine for streaming SSE parsing
///
/// Buffers incoming bytes and yields the data payloads of complete frames.
#[derive(Debug)]
pub struct SseFrameDecoder {
    buffer: Vec<u8>,
    /// Position we have consumed up to
    read_pos: usize,
}

impl Default for SseFrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl SseFrameDecoder {
    /// Create a new decoder with default buffer capacity
    #[must_use]
    pub fn new() -> Self {
        Self {
            buffer: Vec::with_capacity(MIN_BUFFER_CAPACITY),
            read_pos: 0,
        }
    }

    /// Append bytes to the buffer
    pub fn push(&mut self, data: &[u8]) {
        // Compact buffer if we've consumed a lot
        if self.read_pos > self.buffer.len() / 2 && self.read_pos > MIN_BUFFER_CAPACITY {
            self.buffer.drain(..self.read_pos);
            self.read_pos = 0;
        }
        self.buffer.extend_from_slice(data);
    }

    /// Number of unconsumed bytes in the buffer
    #[must_use]
    pub fn available(&self) -> usize {
        self.buffer.len() - self.read_pos
    }

    /// Try to extract the next complete frame
    ///
    /// Returns the frame's `data:` payloads, or `None` if no complete frame
    /// is buffered yet. A frame without any data line yields an empty vec;
    /// the caller decides what dropping it means.
    pub fn next_frame(&mut self) -> Option<Vec<String>> {
        let (end, delimiter_len) = self.find_delimiter()?;

        let frame = &self.buffer[self.read_pos..end];
        let text = String::from_utf8_lossy(frame);
        let payloads = text
            .lines()
            .filter_map(|line| {
                line.strip_prefix(DATA_PREFIX)
                    .map(|rest| rest.trim_start().to_string())
            })
            .collect();

        self.read_pos = end + delimiter_len;
        Some(payloads)
    }

    /// Find the first frame delimiter (blank line) after `read_pos`
    ///
    /// Returns the delimiter's byte offset and length, handling both `\n\n`
    /// and `\r\n\r\n` separators.
    fn find_delimiter(&self) -> Option<(usize, usize)> {
        let buf = &self.buffer[self.read_pos..];
        let mut i = 0;
        while i < buf.len() {
            if buf[i..].starts_with(b"\r\n\r\n") {
                return Some((self.read_pos + i, 4));
            }
            if buf[i..].starts_with(b"\n\n") {
                return Some((self.read_pos + i, 2));
            }
            i += 1;
        }
        None
    }

    /// Clear the buffer
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.read_pos = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_frame() {
        let mut decoder = SseFrameDecoder::new();
        decoder.push(b"data: {\"type\":\"text\"}\n\n");

        let frame = decoder.next_frame().unwrap();
        assert_eq!(frame, vec![r#"{"type":"text"}"#.to_string()]);
        assert!(decoder.next_frame().is_none());
    }

    #[test]
    fn test_partial_frame_waits_for_delimiter() {
        let mut decoder = SseFrameDecoder::new();
        decoder.push(b"data: {\"type\":");
        assert!(decoder.next_frame().is_none());

        decoder.push(b"\"text\"}\n\n");
        let frame = decoder.next_frame().unwrap();
        assert_eq!(frame, vec![r#"{"type":"text"}"#.to_string()]);
    }

    #[test]
    fn test_multiple_frames_in_one_push() {
        let mut decoder = SseFrameDecoder::new();
        decoder.push(b"data: 1\n\ndata: 2\n\n");

        assert_eq!(decoder.next_frame().unwrap(), vec!["1".to_string()]);
        assert_eq!(decoder.next_frame().unwrap(), vec!["2".to_string()]);
        assert!(decoder.next_frame().is_none());
    }

    #[test]
    fn test_crlf_delimiters() {
        let mut decoder = SseFrameDecoder::new();
        decoder.push(b"data: 1\r\n\r\ndata: 2\r\n\r\n");

        assert_eq!(decoder.next_frame().unwrap(), vec!["1".to_string()]);
        assert_eq!(decoder.next_frame().unwrap(), vec!["2".to_string()]);
    }

    #[test]
    fn test_multibyte_character_split_across_pushes() {
        let payload = "data: {\"content\":\"🍲 stew\"}\n\n".as_bytes();
        // Split inside the 4-byte emoji
        let split = payload.iter().position(|&b| b == 0xF0).unwrap() + 2;

        let mut decoder = SseFrameDecoder::new();
        decoder.push(&payload[..split]);
        assert!(decoder.next_frame().is_none());
        decoder.push(&payload[split..]);

        let frame = decoder.next_frame().unwrap();
        assert_eq!(frame, vec![r#"{"content":"🍲 stew"}"#.to_string()]);
    }

    #[test]
    fn test_frame_without_data_line_yields_empty() {
        let mut decoder = SseFrameDecoder::new();
        decoder.push(b"event: ping\n\n");

        let frame = decoder.next_frame().unwrap();
        assert!(frame.is_empty());
    }

    #[test]
    fn test_multiple_data_lines_per_frame() {
        let mut decoder = SseFrameDecoder::new();
        decoder.push(b"data: 1\ndata: 2\n\n");

        assert_eq!(
            decoder.next_frame().unwrap(),
            vec!["1".to_string(), "2".to_string()]
        );
    }

    #[test]
    fn test_compaction_preserves_pending_bytes() {
        let mut decoder = SseFrameDecoder::new();
        // Enough consumed frames to trigger compaction
        for i in 0..2048 {
            decoder.push(format!("data: {i}\n\n").as_bytes());
            assert!(decoder.next_frame().is_some());
        }
        decoder.push(b"data: tail");
        decoder.push(b"\n\n");
        assert_eq!(decoder.next_frame().unwrap(), vec!["tail".to_string()]);
    }

    #[test]
    fn test_clear() {
        let mut decoder = SseFrameDecoder::new();
        decoder.push(b"data: 1\n\n");
        decoder.clear();
        assert_eq!(decoder.available(), 0);
        assert!(decoder.next_frame().is_none());
    }
}
