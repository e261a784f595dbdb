//! Session facade: login, write, expect, close.
//!
//! A [`Session`] is a cheap, cloneable handle to a task that owns the
//! connection. Every call is forwarded to that task in order, so an
//! `expect` issued after a `write` always sees the output of that write.

mod builder;
mod interactive;
mod state;
mod task;

pub use builder::SessionBuilder;
pub use interactive::{
    InteractiveBuilder, InteractiveBuilderWithInput, InteractiveEvent, InteractiveResult,
    InteractiveStep,
};
pub use state::{LoginStateMachine, Mode};

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

use futures_util::ready;
use log::debug;
use regex::Regex;
use tokio::sync::{mpsc, oneshot};

use self::task::{Command, SessionTask};
use crate::channel::{LineFramer, LoginRules, PatternBuffer};
use crate::engine::{ExpectEngine, ExpectOutput};
use crate::error::{ConnectionError, ExpectError, Result, SessionError};
use crate::transport::{Connector, SessionConfig, TcpConnector, Transport};

/// Connect, log in and return a session ready for commands.
///
/// # Example
///
/// ```rust,no_run
/// use std::time::Duration;
///
/// # async fn example() -> Result<(), ferritel::Error> {
/// let session = ferritel::connect(
///     "192.168.1.1",
///     23,
///     "admin",
///     "secret",
///     r"[$#]\s*$",
///     Duration::from_secs(30),
/// )
/// .await?;
///
/// session.write("uname -a")?;
/// let output = session.expect("Linux", Duration::from_secs(5))?.await?;
/// println!("{}", output);
///
/// session.close().await?;
/// # Ok(())
/// # }
/// ```
pub async fn connect(
    host: &str,
    port: u16,
    username: &str,
    password: &str,
    prompt: &str,
    timeout: Duration,
) -> Result<Session> {
    let mut config = SessionConfig::new(host, username, password);
    config.port = port;
    config.prompt = prompt.to_string();
    config.timeout = timeout;
    Session::connect(config).await
}

/// Handle to a logged-in telnet session.
#[derive(Debug, Clone)]
pub struct Session {
    commands: mpsc::UnboundedSender<Command>,
    expect_timeout: Duration,
}

impl Session {
    /// Connect over TCP using the config's retry policy, then log in.
    pub async fn connect(config: SessionConfig) -> Result<Session> {
        let connector = TcpConnector::new(config.retry.clone());
        Self::connect_with(&connector, config).await
    }

    /// Connect through `connector`, then log in.
    pub async fn connect_with<C: Connector>(connector: &C, config: SessionConfig) -> Result<Session> {
        let rules = login_rules(&config)?;
        debug!("connecting to {}", config.socket_addr());
        let transport = connector
            .connect(&config.host, config.port, config.timeout)
            .await?;
        Self::spawn(transport, config, rules).await
    }

    /// Log in over an already established transport.
    ///
    /// Resolves once the shell prompt (or greeting) has been seen. Fails
    /// with `ConnectionError::Lost` if the transport closes first, or
    /// `ConnectionError::LoginTimeout` if `login_timeout` elapses.
    pub async fn start<T: Transport>(transport: T, config: SessionConfig) -> Result<Session> {
        let rules = login_rules(&config)?;
        Self::spawn(transport, config, rules).await
    }

    async fn spawn<T: Transport>(
        transport: T,
        config: SessionConfig,
        rules: LoginRules,
    ) -> Result<Session> {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (ready_tx, ready_rx) = oneshot::channel();

        let task = SessionTask {
            transport,
            commands: commands_rx,
            login: LoginStateMachine::new(
                rules,
                PatternBuffer::new(config.search_depth).with_ansi_stripping(config.strip_ansi),
            ),
            framer: LineFramer::new(config.max_line_length).with_ansi_stripping(config.strip_ansi),
            engine: ExpectEngine::new(),
            username: config.username,
            password: config.password,
            logout_command: config.logout_command,
            ready: Some(ready_tx),
            closing: false,
        };
        tokio::spawn(task.run());

        let session = Session {
            commands: commands_tx,
            expect_timeout: config.expect_timeout,
        };

        let ready = async {
            ready_rx
                .await
                .unwrap_or_else(|_| Err(ConnectionError::lost("session ended during login").into()))
        };
        match config.login_timeout {
            Some(limit) => tokio::time::timeout(limit, ready)
                .await
                .map_err(|_| ConnectionError::LoginTimeout(limit))??,
            None => ready.await?,
        }

        debug!("session to {}:{} ready", config.host, config.port);
        Ok(session)
    }

    /// Send `command` followed by the line terminator.
    pub fn write(&self, command: &str) -> Result<()> {
        self.send(Command::Write(command.to_string()))
    }

    /// Wait for the next output matching `pattern`.
    ///
    /// The pattern is compiled here, so an invalid regex fails before
    /// anything is queued. The returned future resolves with the buffered
    /// text up to the match, or with whatever was buffered when `timeout`
    /// ran out. The timeout only starts once every earlier expectation has
    /// resolved.
    pub fn expect(&self, pattern: &str, timeout: Duration) -> Result<Expectation> {
        let pattern = Regex::new(pattern).map_err(ExpectError::from)?;
        self.expect_regex(pattern, timeout)
    }

    /// Like [`expect`](Self::expect) with the configured default timeout.
    pub fn expect_default(&self, pattern: &str) -> Result<Expectation> {
        self.expect(pattern, self.expect_timeout)
    }

    /// Like [`expect`](Self::expect) with a precompiled pattern.
    pub fn expect_regex(&self, pattern: Regex, timeout: Duration) -> Result<Expectation> {
        let (resolver, rx) = oneshot::channel();
        self.send(Command::Expect {
            pattern,
            timeout,
            resolver,
        })?;
        Ok(Expectation { rx })
    }

    /// Discard buffered output not yet consumed by an expectation.
    pub fn clear_buffer(&self) -> Result<()> {
        self.send(Command::ClearBuffer)
    }

    /// Send the logout command and request disconnect.
    ///
    /// Returns once the disconnect has been requested. Expectations still
    /// pending fail with `ConnectionError::Lost` when the connection ends.
    pub async fn close(&self) -> Result<bool> {
        let (ack, rx) = oneshot::channel();
        self.send(Command::Close { ack })?;
        rx.await.map_err(|_| SessionError::Closed)?
    }

    /// Send a sequence of inputs, waiting for each one's pattern.
    ///
    /// Stops at the first step whose pattern was not seen in time.
    pub async fn send_interactive(&self, events: &[InteractiveEvent]) -> Result<InteractiveResult> {
        let start = Instant::now();
        let mut steps = Vec::with_capacity(events.len());

        for event in events {
            let shown = event.display_input();
            debug!("interactive: sending {:?}", shown);
            self.write(&event.input)?;

            let timeout = event.timeout.unwrap_or(self.expect_timeout);
            let output = self
                .expect_regex(event.pattern.clone(), timeout)?
                .outcome()
                .await?;

            let step = if output.matched {
                InteractiveStep::success(shown, output.text, output.elapsed)
            } else {
                let message = format!(
                    "pattern {:?} not seen within {:?}",
                    event.pattern.as_str(),
                    timeout
                );
                InteractiveStep::failed(shown, output.text, output.elapsed, message)
            };

            let failed = step.failed;
            steps.push(step);
            if failed {
                break;
            }
        }

        Ok(InteractiveResult::new(steps, start.elapsed()))
    }

    /// Whether the session task is still running.
    pub fn is_alive(&self) -> bool {
        !self.commands.is_closed()
    }

    fn send(&self, command: Command) -> Result<()> {
        self.commands
            .send(command)
            .map_err(|_| SessionError::Closed.into())
    }
}

fn login_rules(config: &SessionConfig) -> Result<LoginRules> {
    Ok(LoginRules::new(&config.prompt, config.greeting.as_deref()).map_err(ExpectError::from)?)
}

/// Pending result of [`Session::expect`].
///
/// Resolves to the matched (or, on timeout, partial) text.
#[must_use = "expectations do nothing unless awaited"]
pub struct Expectation {
    rx: oneshot::Receiver<Result<ExpectOutput>>,
}

impl Expectation {
    /// Resolve to the full [`ExpectOutput`], which tells a match from a
    /// timeout.
    pub async fn outcome(self) -> Result<ExpectOutput> {
        self.rx
            .await
            .unwrap_or_else(|_| Err(SessionError::Closed.into()))
    }
}

impl Future for Expectation {
    type Output = Result<String>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let result = ready!(Pin::new(&mut self.rx).poll(cx));
        Poll::Ready(match result {
            Ok(Ok(output)) => Ok(output.text),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(SessionError::Closed.into()),
        })
    }
}
