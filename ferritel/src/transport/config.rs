//! Telnet session configuration.

use std::time::Duration;

use secrecy::SecretString;
use serde::{Deserialize, Deserializer};

/// Default telnet port.
pub const DEFAULT_PORT: u16 = 23;

/// Telnet session configuration.
///
/// Deserializable so sessions can be described in JSON/YAML inventories;
/// durations are given in seconds.
///
/// ```rust
/// # fn main() -> Result<(), serde_json::Error> {
/// let config: ferritel::SessionConfig = serde_json::from_str(
///     r##"{ "host": "10.0.0.1", "username": "admin", "password": "secret", "prompt": "#" }"##,
/// )?;
/// assert_eq!(config.port, 23);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Deserialize)]
pub struct SessionConfig {
    /// Target host (hostname or IP address).
    pub host: String,

    /// Telnet port (default: 23).
    #[serde(default = "default_port")]
    pub port: u16,

    /// Username sent at the login prompt.
    pub username: String,

    /// Password sent at the password prompt.
    #[serde(default = "empty_secret", deserialize_with = "deserialize_secret")]
    pub password: SecretString,

    /// Shell prompt pattern. A bare `$` is matched literally.
    #[serde(default = "default_prompt")]
    pub prompt: String,

    /// Optional banner pattern that also marks the end of login.
    #[serde(default)]
    pub greeting: Option<String>,

    /// Command written by `close()` before disconnecting.
    #[serde(default = "default_logout_command")]
    pub logout_command: String,

    /// Connect timeout, per attempt.
    #[serde(default = "default_timeout", deserialize_with = "secs::deserialize")]
    pub timeout: Duration,

    /// Upper bound on the login phase. `None` waits until the prompt
    /// shows up or the connection drops.
    #[serde(default, deserialize_with = "secs::deserialize_opt")]
    pub login_timeout: Option<Duration>,

    /// Timeout used by `expect_default`.
    #[serde(default = "default_expect_timeout", deserialize_with = "secs::deserialize")]
    pub expect_timeout: Duration,

    /// How many trailing bytes are scanned for login prompts.
    #[serde(default = "default_search_depth")]
    pub search_depth: usize,

    /// Longest partial line held before it is flushed as a line.
    #[serde(default = "default_max_line_length")]
    pub max_line_length: usize,

    /// Strip ANSI escape sequences from received data.
    #[serde(default)]
    pub strip_ansi: bool,

    /// Retry policy for the initial TCP connect.
    #[serde(default)]
    pub retry: RetryPolicy,
}

impl SessionConfig {
    /// Create a configuration with defaults for everything but the
    /// target and credentials.
    pub fn new(
        host: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_PORT,
            username: username.into(),
            password: SecretString::from(password.into()),
            prompt: default_prompt(),
            greeting: None,
            logout_command: default_logout_command(),
            timeout: default_timeout(),
            login_timeout: None,
            expect_timeout: default_expect_timeout(),
            search_depth: default_search_depth(),
            max_line_length: default_max_line_length(),
            strip_ansi: false,
            retry: RetryPolicy::default(),
        }
    }

    /// Get the socket address for connection.
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Backoff policy applied when the TCP connect fails.
///
/// Only the initial connect is retried; a connection lost after login
/// ends the session.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total connect attempts, including the first (minimum 1).
    pub max_attempts: u32,

    /// Delay before the second attempt.
    #[serde(deserialize_with = "secs::deserialize")]
    pub initial_delay: Duration,

    /// Factor applied to the delay after each failed attempt.
    pub multiplier: f64,

    /// Cap on the delay between attempts.
    #[serde(deserialize_with = "secs::deserialize")]
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// Single attempt, no retries.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            initial_delay: Duration::from_secs(1),
            multiplier: 2.0,
            max_delay: Duration::from_secs(60),
        }
    }

    /// Exponential backoff starting at `initial_delay`.
    pub fn exponential(initial_delay: Duration, max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_delay,
            ..Self::none()
        }
    }

    /// Set the cap on the delay between attempts.
    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// Delay to wait after `failed` attempts, or `None` once attempts
    /// are exhausted.
    pub fn delay_after(&self, failed: u32) -> Option<Duration> {
        if failed == 0 || failed >= self.max_attempts.max(1) {
            return None;
        }
        let factor = self.multiplier.max(1.0).powi(failed as i32 - 1);
        let secs = self.initial_delay.as_secs_f64() * factor;
        if secs.is_nan() || secs >= self.max_delay.as_secs_f64() {
            Some(self.max_delay)
        } else {
            Some(Duration::from_secs_f64(secs))
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::none()
    }
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_prompt() -> String {
    "$".to_string()
}

fn default_logout_command() -> String {
    "exit".to_string()
}

fn default_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_expect_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_search_depth() -> usize {
    1000
}

fn default_max_line_length() -> usize {
    16384
}

fn empty_secret() -> SecretString {
    SecretString::from(String::new())
}

fn deserialize_secret<'de, D>(deserializer: D) -> Result<SecretString, D::Error>
where
    D: Deserializer<'de>,
{
    String::deserialize(deserializer).map(SecretString::from)
}

/// Durations expressed as (fractional) seconds.
mod secs {
    use std::time::Duration;

    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(D::Error::custom)
    }

    pub fn deserialize_opt<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<f64>::deserialize(deserializer)? {
            Some(secs) => Duration::try_from_secs_f64(secs)
                .map(Some)
                .map_err(D::Error::custom),
            None => Ok(None),
        }
    }
}
