//! ANSI escape stripping built on the vte parser.

use std::fmt;

use vte::{Parser, Perform};

/// Removes ANSI escape sequences while keeping printable text and the
/// `\n`, `\r` and `\t` control characters.
///
/// Parser state is kept between calls, so an escape sequence split across
/// two reads is still removed.
pub struct AnsiStripper {
    parser: Parser,
    collector: Collector,
}

#[derive(Default)]
struct Collector {
    out: Vec<u8>,
}

impl Perform for Collector {
    fn print(&mut self, c: char) {
        let mut utf8 = [0u8; 4];
        self.out
            .extend_from_slice(c.encode_utf8(&mut utf8).as_bytes());
    }

    fn execute(&mut self, byte: u8) {
        if matches!(byte, b'\n' | b'\r' | b'\t') {
            self.out.push(byte);
        }
    }
}

impl AnsiStripper {
    pub fn new() -> Self {
        Self {
            parser: Parser::new(),
            collector: Collector::default(),
        }
    }

    /// Strip escape sequences from `data`.
    pub fn strip(&mut self, data: &[u8]) -> Vec<u8> {
        self.parser.advance(&mut self.collector, data);
        std::mem::take(&mut self.collector.out)
    }
}

impl Default for AnsiStripper {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for AnsiStripper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnsiStripper").finish_non_exhaustive()
    }
}
