//! Line framing for line mode.

use bytes::BytesMut;
use log::warn;
use memchr::memchr;

use super::ansi::AnsiStripper;

/// Splits the received byte stream into lines.
///
/// Lines end at `\n`; a trailing `\r` is removed. Bytes after the last
/// newline are held until more data arrives.
#[derive(Debug)]
pub struct LineFramer {
    partial: BytesMut,
    max_line_length: usize,
    stripper: Option<AnsiStripper>,
}

impl LineFramer {
    pub fn new(max_line_length: usize) -> Self {
        Self {
            partial: BytesMut::new(),
            max_line_length: max_line_length.max(1),
            stripper: None,
        }
    }

    /// Enable or disable ANSI escape stripping.
    pub fn with_ansi_stripping(mut self, strip: bool) -> Self {
        self.stripper = strip.then(AnsiStripper::new);
        self
    }

    /// Feed received bytes and return every completed line.
    pub fn push(&mut self, data: &[u8]) -> Vec<String> {
        match self.stripper.as_mut() {
            Some(stripper) => {
                let cleaned = stripper.strip(data);
                self.partial.extend_from_slice(&cleaned);
            }
            None => self.partial.extend_from_slice(data),
        }

        let mut lines = Vec::new();
        while let Some(pos) = memchr(b'\n', &self.partial) {
            let raw = self.partial.split_to(pos + 1);
            lines.push(decode_line(&raw[..pos]));
        }

        if self.partial.len() > self.max_line_length {
            warn!(
                "line exceeds {} bytes without a newline, flushing it",
                self.max_line_length
            );
            let raw = self.partial.split();
            lines.push(decode_line(&raw));
        }

        lines
    }

    /// Discard any partial line.
    pub fn clear(&mut self) {
        self.partial.clear();
    }

    /// Number of bytes held as a partial line.
    pub fn pending(&self) -> usize {
        self.partial.len()
    }
}

fn decode_line(raw: &[u8]) -> String {
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    String::from_utf8_lossy(raw).into_owned()
}
