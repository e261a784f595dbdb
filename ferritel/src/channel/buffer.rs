//! Rolling byte window for raw-mode prompt detection.
//!
//! Only the last `search_depth` bytes are kept. Login and password prompts
//! sit at the very end of what the server has sent, so nothing older is
//! ever needed, and a prompt split across two reads is still found.

use std::borrow::Cow;

use bytes::{Buf, BytesMut};
use super::ansi::AnsiStripper;

/// Bounded buffer holding the tail of the raw byte stream.
#[derive(Debug)]
pub struct PatternBuffer {
    /// The retained tail of the stream.
    buffer: BytesMut,

    /// Maximum number of bytes retained and searched.
    search_depth: usize,

    /// Strips ANSI escapes before bytes are retained.
    stripper: Option<AnsiStripper>,
}

impl PatternBuffer {
    /// Create a new pattern buffer with the specified search depth.
    pub fn new(search_depth: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(search_depth.min(4096)),
            search_depth: search_depth.max(1),
            stripper: None,
        }
    }

    /// Enable or disable ANSI escape stripping.
    pub fn with_ansi_stripping(mut self, strip: bool) -> Self {
        self.stripper = strip.then(AnsiStripper::new);
        self
    }

    /// Append data, dropping whatever falls out of the window.
    pub fn extend(&mut self, data: &[u8]) {
        match self.stripper.as_mut() {
            Some(stripper) => {
                let cleaned = stripper.strip(data);
                self.buffer.extend_from_slice(&cleaned);
            }
            None => self.buffer.extend_from_slice(data),
        }

        if self.buffer.len() > self.search_depth {
            let excess = self.buffer.len() - self.search_depth;
            self.buffer.advance(excess);
        }
    }

    /// Get a reference to the buffer contents.
    pub fn as_slice(&self) -> &[u8] {
        &self.buffer
    }

    /// Get the buffer contents as a string (lossy UTF-8 conversion).
    pub fn as_str_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.buffer)
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

impl Default for PatternBuffer {
    fn default() -> Self {
        Self::new(1000)
    }
}

#[cfg(test)]
mod tests {
    use regex::bytes::Regex;

    use super::*;

    #[test]
    fn test_basic_extend() {
        let mut buffer = PatternBuffer::new(100);
        buffer.extend(b"Hello, world!");
        assert_eq!(buffer.as_slice(), b"Hello, world!");
    }

    #[test]
    fn test_ansi_stripping() {
        let mut buffer = PatternBuffer::new(100).with_ansi_stripping(true);
        buffer.extend(b"\x1b[1mlogin:\x1b[0m ");
        assert_eq!(buffer.as_slice(), b"login: ");
    }

    #[test]
    fn test_window_keeps_tail_only() {
        let mut buffer = PatternBuffer::new(10);
        buffer.extend(b"router#");
        buffer.extend(&[b'x'; 100]);

        assert_eq!(buffer.len(), 10);
        let pattern = Regex::new(r"router#").unwrap();
        assert!(!pattern.is_match(buffer.as_slice()));
    }

    #[test]
    fn test_pattern_split_across_extends() {
        let mut buffer = PatternBuffer::new(100);
        buffer.extend(b"Pass");
        buffer.extend(b"word: ");

        let pattern = Regex::new(r"[Pp]assword:\s*$").unwrap();
        let m = pattern.find(buffer.as_slice()).unwrap();
        assert_eq!(m.start(), 0);
    }

    #[test]
    fn test_clear() {
        let mut buffer = PatternBuffer::new(100);
        buffer.extend(b"test data");
        buffer.clear();
        assert!(buffer.is_empty());
        assert_eq!(buffer.as_str_lossy(), "");
    }
}
