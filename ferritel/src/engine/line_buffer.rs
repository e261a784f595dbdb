//! Lines received but not yet consumed by an expect request.

use regex::Regex;

/// Ordered lines since the last resolution.
#[derive(Debug, Default)]
pub struct LineBuffer {
    lines: Vec<String>,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, line: String) {
        self.lines.push(line);
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }

    /// Join everything buffered with `\n` and clear.
    pub fn take_joined(&mut self) -> String {
        let text = self.lines.join("\n");
        self.lines.clear();
        text
    }

    /// Consume the buffer plus the head of `line` up to `match_end`.
    pub fn take_with(&mut self, line: &str, match_end: usize) -> String {
        let mut text = self.take_joined();
        if !text.is_empty() {
            text.push('\n');
        }
        text.push_str(&line[..match_end]);
        text
    }

    /// Find the first buffered line matching `pattern` and return every
    /// line up to and including it. The whole buffer is cleared on a hit,
    /// lines after the match included.
    pub fn take_through_match(&mut self, pattern: &Regex) -> Option<String> {
        let (index, end) = self
            .lines
            .iter()
            .enumerate()
            .find_map(|(i, line)| pattern.find(line).map(|m| (i, m.end())))?;

        let mut consumed: Vec<String> = self.lines.drain(..=index).collect();
        self.lines.clear();
        if let Some(last) = consumed.last_mut() {
            last.truncate(end);
        }
        Some(consumed.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buffer(lines: &[&str]) -> LineBuffer {
        let mut buffer = LineBuffer::new();
        for line in lines {
            buffer.push(line.to_string());
        }
        buffer
    }

    #[test]
    fn test_take_through_match() {
        let mut buf = buffer(&["foo", "bar123"]);
        let pattern = Regex::new(r"\d+").unwrap();
        assert_eq!(buf.take_through_match(&pattern).as_deref(), Some("foo\nbar123"));
        assert!(buf.is_empty());
    }

    #[test]
    fn test_take_through_match_clears_following_lines() {
        let mut buf = buffer(&["a", "b1 trailing", "c"]);
        let pattern = Regex::new(r"\d").unwrap();
        assert_eq!(buf.take_through_match(&pattern).as_deref(), Some("a\nb1"));
        assert!(buf.is_empty());
    }

    #[test]
    fn test_take_through_match_none() {
        let mut buf = buffer(&["a", "b"]);
        let pattern = Regex::new(r"\d").unwrap();
        assert!(buf.take_through_match(&pattern).is_none());
        assert_eq!(buf.len(), 2);
    }

    #[test]
    fn test_take_with() {
        let mut buf = buffer(&["uname -a"]);
        assert_eq!(buf.take_with("Linux host 6.1", 5), "uname -a\nLinux");
        assert!(buf.is_empty());

        assert_eq!(buf.take_with("$ ", 1), "$");
    }

    #[test]
    fn test_take_joined() {
        let mut buf = buffer(&["only", "this"]);
        assert_eq!(buf.take_joined(), "only\nthis");
        assert!(buf.is_empty());
    }
}
