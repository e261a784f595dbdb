//! Result of a resolved expect request.

use std::fmt;
use std::time::Duration;

/// Text delivered to an expect request.
///
/// A timeout is not an error: the request resolves with whatever output
/// was buffered, and `matched` is `false`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpectOutput {
    /// The pattern that was waited for.
    pub pattern: String,

    /// Buffered lines up to and including the match, joined with `\n`.
    pub text: String,

    /// Whether the pattern matched before the timeout.
    pub matched: bool,

    /// Time between the request being queued and resolved.
    pub elapsed: Duration,
}

impl ExpectOutput {
    /// Create output for a successful match.
    pub fn matched(pattern: impl Into<String>, text: impl Into<String>, elapsed: Duration) -> Self {
        Self {
            pattern: pattern.into(),
            text: text.into(),
            matched: true,
            elapsed,
        }
    }

    /// Create output for a request that timed out.
    pub fn timed_out(
        pattern: impl Into<String>,
        text: impl Into<String>,
        elapsed: Duration,
    ) -> Self {
        Self {
            pattern: pattern.into(),
            text: text.into(),
            matched: false,
            elapsed,
        }
    }

    /// Get the text lines as an iterator.
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.text.lines()
    }
}

impl fmt::Display for ExpectOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.text)
    }
}
