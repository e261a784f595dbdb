//! The per-session event loop.
//!
//! One task owns the transport, the login state machine and the expect
//! engine. Caller commands, transport events and the head request's timer
//! are handled strictly one at a time, so no locking is needed.

use std::time::Duration;

use log::{debug, trace, warn};
use regex::Regex;
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, sleep_until};

use super::state::{LoginStateMachine, Mode};
use crate::channel::{LineFramer, LoginAction};
use crate::engine::{ExpectEngine, Resolver};
use crate::error::{ConnectionError, Result};
use crate::transport::{Transport, TransportEvent};

/// Requests from `Session` handles.
pub(crate) enum Command {
    Write(String),
    Expect {
        pattern: Regex,
        timeout: Duration,
        resolver: Resolver,
    },
    ClearBuffer,
    Close {
        ack: oneshot::Sender<Result<bool>>,
    },
}

pub(crate) struct SessionTask<T> {
    pub(crate) transport: T,
    pub(crate) commands: mpsc::UnboundedReceiver<Command>,
    pub(crate) login: LoginStateMachine,
    pub(crate) framer: LineFramer,
    pub(crate) engine: ExpectEngine,
    pub(crate) username: String,
    pub(crate) password: SecretString,
    pub(crate) logout_command: String,
    pub(crate) ready: Option<oneshot::Sender<Result<()>>>,
    pub(crate) closing: bool,
}

impl<T: Transport> SessionTask<T> {
    pub(crate) async fn run(mut self) {
        let reason = loop {
            let deadline = self.engine.next_deadline();
            let timer = async move {
                match deadline {
                    Some(deadline) => sleep_until(deadline).await,
                    None => std::future::pending().await,
                }
            };

            tokio::select! {
                biased;
                command = self.commands.recv() => match command {
                    Some(command) => self.handle_command(command),
                    None => {
                        debug!("all session handles dropped, disconnecting");
                        self.closing = true;
                        let _ = self.transport.disconnect();
                        break "session dropped".to_string();
                    }
                },
                event = self.transport.next_event() => match event {
                    TransportEvent::Data(data) => self.handle_data(&data),
                    TransportEvent::Closed { reason } => break reason,
                },
                () = timer => self.engine.on_timer(Instant::now()),
            }
        };

        self.shutdown(&reason);
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Write(line) => {
                trace!("write {:?}", line);
                if let Err(e) = self.transport.send_line(&line) {
                    warn!("failed to write {:?}: {}", line, e);
                }
            }
            Command::Expect {
                pattern,
                timeout,
                resolver,
            } => {
                self.engine.expect(pattern, timeout, resolver, Instant::now());
            }
            Command::ClearBuffer => {
                self.engine.clear_buffer();
                self.framer.clear();
            }
            Command::Close { ack } => {
                if !self.closing {
                    self.closing = true;
                    debug!("closing session with {:?}", self.logout_command);
                    if let Err(e) = self.transport.send_line(&self.logout_command) {
                        warn!("failed to send logout command: {}", e);
                    }
                }
                let _ = ack.send(self.transport.disconnect().map(|()| true));
            }
        }
    }

    fn handle_data(&mut self, data: &[u8]) {
        match self.login.mode() {
            Mode::Raw => {
                trace!("raw data: {:?}", String::from_utf8_lossy(data));
                if let Some(action) = self.login.on_raw(data) {
                    self.perform(action);
                }
            }
            Mode::Line => {
                let now = Instant::now();
                for line in self.framer.push(data) {
                    trace!("line: {:?}", line);
                    self.engine.on_line(line, now);
                }
            }
        }
    }

    fn perform(&mut self, action: LoginAction) {
        let sent = match action {
            LoginAction::SendUsername => {
                debug!("login prompt seen, sending username {:?}", self.username);
                self.transport.send_line(&self.username)
            }
            LoginAction::SendPassword => {
                debug!("password prompt seen, sending password");
                self.transport.send_line(self.password.expose_secret())
            }
            LoginAction::Ready => {
                if let Some(ready) = self.ready.take() {
                    let _ = ready.send(Ok(()));
                }
                Ok(())
            }
        };

        if let Err(e) = sent {
            warn!("failed to answer login prompt: {}", e);
        }
    }

    fn shutdown(mut self, reason: &str) {
        if self.closing {
            debug!("session ended: {}", reason);
        } else {
            warn!("connection lost: {}", reason);
        }

        if let Some(ready) = self.ready.take() {
            let _ = ready.send(Err(ConnectionError::lost(reason).into()));
        }
        // Stop accepting commands before failing the queue
        self.commands.close();
        self.engine.purge(reason);

        while let Ok(command) = self.commands.try_recv() {
            match command {
                Command::Expect { resolver, .. } => {
                    let _ = resolver.send(Err(ConnectionError::lost(reason).into()));
                }
                Command::Close { ack } => {
                    let _ = ack.send(Ok(true));
                }
                Command::Write(_) | Command::ClearBuffer => {}
            }
        }
    }
}
