//! Scripted exchanges for commands that ask follow-up questions.
//!
//! Commands like `passwd`, `sudo -i` or `rm -i` stop and wait for an
//! answer. `Session::send_interactive` walks through a list of events,
//! writing each input and waiting for its pattern before moving on.

use std::time::Duration;

use regex::Regex;

use crate::error::{ExpectError, Result};

/// Placeholder logged instead of hidden input.
const MASK: &str = "********";

/// One input to send and the pattern that must follow it.
///
/// # Example
///
/// ```rust
/// use ferritel::InteractiveEvent;
///
/// # fn main() -> Result<(), ferritel::Error> {
/// let events = vec![
///     InteractiveEvent::new("passwd", r"[Cc]urrent password:")?,
///     InteractiveEvent::hidden("old-secret", r"[Nn]ew password:")?,
/// ];
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct InteractiveEvent {
    /// The line to send.
    pub input: String,

    /// Pattern to wait for after sending.
    pub pattern: Regex,

    /// Keep the input out of logs and results.
    pub hidden: bool,

    /// Per-event timeout; the session's expect timeout otherwise.
    pub timeout: Option<Duration>,
}

impl InteractiveEvent {
    pub fn new(input: impl Into<String>, pattern: &str) -> Result<Self> {
        Ok(Self {
            input: input.into(),
            pattern: Regex::new(pattern).map_err(ExpectError::from)?,
            hidden: false,
            timeout: None,
        })
    }

    /// An event whose input is masked, e.g. a password.
    pub fn hidden(input: impl Into<String>, pattern: &str) -> Result<Self> {
        Ok(Self::new(input, pattern)?.with_hidden(true))
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_hidden(mut self, hidden: bool) -> Self {
        self.hidden = hidden;
        self
    }

    /// The input as it may appear in logs.
    pub(crate) fn display_input(&self) -> String {
        if self.hidden {
            MASK.to_string()
        } else {
            self.input.clone()
        }
    }
}

/// Outcome of a whole interactive sequence.
#[derive(Debug, Clone)]
pub struct InteractiveResult {
    /// Steps actually run. Stops after the first failure.
    pub steps: Vec<InteractiveStep>,

    pub elapsed: Duration,

    /// Whether any step failed.
    pub failed: bool,
}

impl InteractiveResult {
    pub fn new(steps: Vec<InteractiveStep>, elapsed: Duration) -> Self {
        let failed = steps.iter().any(|s| s.failed);
        Self {
            steps,
            elapsed,
            failed,
        }
    }

    /// Output of the last step run.
    pub fn final_output(&self) -> Option<&str> {
        self.steps.last().map(|s| s.output.as_str())
    }

    /// Every step's output, one per line.
    pub fn full_output(&self) -> String {
        self.steps
            .iter()
            .map(|s| s.output.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Outcome of a single event.
#[derive(Debug, Clone)]
pub struct InteractiveStep {
    /// The input sent, masked if hidden.
    pub input: String,

    /// Output up to the pattern, or everything buffered on timeout.
    pub output: String,

    pub elapsed: Duration,

    /// The pattern was not seen in time.
    pub failed: bool,

    pub failure_message: Option<String>,
}

impl InteractiveStep {
    pub fn success(input: impl Into<String>, output: impl Into<String>, elapsed: Duration) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            elapsed,
            failed: false,
            failure_message: None,
        }
    }

    pub fn failed(
        input: impl Into<String>,
        output: impl Into<String>,
        elapsed: Duration,
        message: impl Into<String>,
    ) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            elapsed,
            failed: true,
            failure_message: Some(message.into()),
        }
    }
}

/// Fluent construction of an event list.
///
/// ```rust
/// use std::time::Duration;
/// use ferritel::InteractiveBuilder;
///
/// # fn main() -> Result<(), ferritel::Error> {
/// let events = InteractiveBuilder::new()
///     .send("sudo -i")
///     .expect(r"password for")?
///     .send_hidden("secret")
///     .expect(r"#\s*$")?
///     .with_timeout(Duration::from_secs(10))
///     .build();
/// assert_eq!(events.len(), 2);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct InteractiveBuilder {
    events: Vec<InteractiveEvent>,
    default_timeout: Option<Duration>,
}

impl InteractiveBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an input. Must be followed by `expect()`.
    pub fn send(self, input: impl Into<String>) -> InteractiveBuilderWithInput {
        InteractiveBuilderWithInput {
            builder: self,
            input: input.into(),
            hidden: false,
            timeout: None,
        }
    }

    /// Queue an input that is masked in logs.
    pub fn send_hidden(self, input: impl Into<String>) -> InteractiveBuilderWithInput {
        InteractiveBuilderWithInput {
            builder: self,
            input: input.into(),
            hidden: true,
            timeout: None,
        }
    }

    /// Timeout for events without their own.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = Some(timeout);
        self
    }

    pub fn build(self) -> Vec<InteractiveEvent> {
        let default_timeout = self.default_timeout;
        self.events
            .into_iter()
            .map(|event| match (event.timeout, default_timeout) {
                (None, Some(timeout)) => event.with_timeout(timeout),
                _ => event,
            })
            .collect()
    }
}

/// Builder state after `send()`, waiting for its pattern.
#[derive(Debug)]
pub struct InteractiveBuilderWithInput {
    builder: InteractiveBuilder,
    input: String,
    hidden: bool,
    timeout: Option<Duration>,
}

impl InteractiveBuilderWithInput {
    /// Pattern to wait for after the input. Fails on an invalid regex.
    pub fn expect(mut self, pattern: &str) -> Result<InteractiveBuilder> {
        let mut event = InteractiveEvent::new(self.input, pattern)?.with_hidden(self.hidden);
        if let Some(timeout) = self.timeout {
            event = event.with_timeout(timeout);
        }
        self.builder.events.push(event);
        Ok(self.builder)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}
