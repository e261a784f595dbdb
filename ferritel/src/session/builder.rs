//! Fluent construction of sessions.

use std::time::Duration;

use super::Session;
use crate::error::{Result, SessionError};
use crate::transport::{Connector, RetryPolicy, SessionConfig};

/// Builder for [`Session`]s.
///
/// # Example
///
/// ```rust,no_run
/// use std::time::Duration;
/// use ferritel::{RetryPolicy, SessionBuilder};
///
/// # async fn example() -> Result<(), ferritel::Error> {
/// let session = SessionBuilder::new("192.168.1.1")
///     .username("admin")
///     .password("secret")
///     .prompt(r"router#\s*$")
///     .retry(RetryPolicy::exponential(Duration::from_millis(500), 3))
///     .connect()
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct SessionBuilder {
    host: String,
    username: Option<String>,
    password: String,
    port: Option<u16>,
    prompt: Option<String>,
    greeting: Option<String>,
    logout_command: Option<String>,
    timeout: Option<Duration>,
    login_timeout: Option<Duration>,
    expect_timeout: Option<Duration>,
    search_depth: Option<usize>,
    max_line_length: Option<usize>,
    strip_ansi: Option<bool>,
    retry: Option<RetryPolicy>,
}

impl SessionBuilder {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            username: None,
            password: String::new(),
            port: None,
            prompt: None,
            greeting: None,
            logout_command: None,
            timeout: None,
            login_timeout: None,
            expect_timeout: None,
            search_depth: None,
            max_line_length: None,
            strip_ansi: None,
            retry: None,
        }
    }

    /// Set the telnet port (default: 23).
    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = password.into();
        self
    }

    /// Set the shell prompt pattern (default: `$`).
    pub fn prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = Some(prompt.into());
        self
    }

    /// Accept a banner pattern as the end of login.
    pub fn greeting(mut self, greeting: impl Into<String>) -> Self {
        self.greeting = Some(greeting.into());
        self
    }

    /// Set the command written on close (default: `exit`).
    pub fn logout_command(mut self, command: impl Into<String>) -> Self {
        self.logout_command = Some(command.into());
        self
    }

    /// Set the connect timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Bound the time allowed for login.
    pub fn login_timeout(mut self, timeout: Duration) -> Self {
        self.login_timeout = Some(timeout);
        self
    }

    /// Set the timeout used by `expect_default`.
    pub fn expect_timeout(mut self, timeout: Duration) -> Self {
        self.expect_timeout = Some(timeout);
        self
    }

    pub fn search_depth(mut self, depth: usize) -> Self {
        self.search_depth = Some(depth);
        self
    }

    pub fn max_line_length(mut self, length: usize) -> Self {
        self.max_line_length = Some(length);
        self
    }

    pub fn strip_ansi(mut self, strip: bool) -> Self {
        self.strip_ansi = Some(strip);
        self
    }

    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = Some(retry);
        self
    }

    /// Produce the session configuration.
    pub fn build(self) -> Result<SessionConfig> {
        let username = self.username.ok_or_else(|| SessionError::InvalidConfig {
            message: "username is required".to_string(),
        })?;
        if self.search_depth == Some(0) {
            return Err(SessionError::InvalidConfig {
                message: "search depth must be at least 1".to_string(),
            }
            .into());
        }

        let mut config = SessionConfig::new(self.host, username, self.password);
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(prompt) = self.prompt {
            config.prompt = prompt;
        }
        config.greeting = self.greeting;
        if let Some(command) = self.logout_command {
            config.logout_command = command;
        }
        if let Some(timeout) = self.timeout {
            config.timeout = timeout;
        }
        config.login_timeout = self.login_timeout;
        if let Some(timeout) = self.expect_timeout {
            config.expect_timeout = timeout;
        }
        if let Some(depth) = self.search_depth {
            config.search_depth = depth;
        }
        if let Some(length) = self.max_line_length {
            config.max_line_length = length;
        }
        if let Some(strip) = self.strip_ansi {
            config.strip_ansi = strip;
        }
        if let Some(retry) = self.retry {
            config.retry = retry;
        }

        Ok(config)
    }

    /// Connect over TCP and log in.
    pub async fn connect(self) -> Result<Session> {
        Session::connect(self.build()?).await
    }

    /// Connect through a custom connector and log in.
    pub async fn connect_with<C: Connector>(self, connector: &C) -> Result<Session> {
        Session::connect_with(connector, self.build()?).await
    }
}

#[cfg(test)]
mod tests {
    use secrecy::ExposeSecret;

    use super::*;
    use crate::error::Error;

    #[test]
    fn test_build_defaults() {
        let config = SessionBuilder::new("10.0.0.1")
            .username("admin")
            .build()
            .unwrap();

        assert_eq!(config.host, "10.0.0.1");
        assert_eq!(config.port, 23);
        assert_eq!(config.prompt, "$");
        assert_eq!(config.logout_command, "exit");
        assert_eq!(config.password.expose_secret(), "");
        assert!(config.login_timeout.is_none());
    }

    #[test]
    fn test_build_overrides() {
        let config = SessionBuilder::new("router")
            .port(2323)
            .username("admin")
            .password("secret")
            .prompt(r"router#\s*$")
            .greeting("User Access Verification")
            .logout_command("quit")
            .login_timeout(Duration::from_secs(20))
            .expect_timeout(Duration::from_secs(2))
            .strip_ansi(true)
            .retry(RetryPolicy::exponential(Duration::from_millis(100), 4))
            .build()
            .unwrap();

        assert_eq!(config.port, 2323);
        assert_eq!(config.password.expose_secret(), "secret");
        assert_eq!(config.greeting.as_deref(), Some("User Access Verification"));
        assert_eq!(config.logout_command, "quit");
        assert_eq!(config.login_timeout, Some(Duration::from_secs(20)));
        assert_eq!(config.expect_timeout, Duration::from_secs(2));
        assert!(config.strip_ansi);
        assert_eq!(config.retry.max_attempts, 4);
    }

    #[test]
    fn test_build_requires_username() {
        let err = SessionBuilder::new("router").password("secret").build().unwrap_err();
        assert!(matches!(err, Error::Session(SessionError::InvalidConfig { .. })));
    }

    #[test]
    fn test_build_rejects_zero_search_depth() {
        let err = SessionBuilder::new("router")
            .username("admin")
            .search_depth(0)
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::Session(SessionError::InvalidConfig { .. })));
    }
}
