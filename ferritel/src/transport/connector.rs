//! TCP connector with connect timeout and retry policy.

use std::future::Future;
use std::time::Duration;

use log::{debug, warn};
use tokio::net::TcpStream;

use super::config::RetryPolicy;
use super::telnet::{TelnetTransport, Transport};
use crate::error::{ConnectionError, Result};

/// Opens transports. Backoff and retry counts live here, never in the
/// session.
pub trait Connector: Send + Sync {
    /// Transport produced by a successful connect.
    type Transport: Transport;

    /// Connect to `host:port`, bounding each attempt by `timeout`.
    fn connect(
        &self,
        host: &str,
        port: u16,
        timeout: Duration,
    ) -> impl Future<Output = Result<Self::Transport>> + Send;
}

/// Connector dialing plain TCP and speaking telnet on top.
#[derive(Debug, Clone, Default)]
pub struct TcpConnector {
    retry: RetryPolicy,
}

impl TcpConnector {
    /// Create a connector with the given retry policy.
    pub fn new(retry: RetryPolicy) -> Self {
        Self { retry }
    }
}

impl Connector for TcpConnector {
    type Transport = TelnetTransport;

    async fn connect(&self, host: &str, port: u16, timeout: Duration) -> Result<TelnetTransport> {
        let mut failed = 0;

        loop {
            let err = match tokio::time::timeout(timeout, TcpStream::connect((host, port))).await {
                Ok(Ok(stream)) => {
                    if let Err(e) = stream.set_nodelay(true) {
                        debug!("failed to set TCP_NODELAY: {}", e);
                    }
                    debug!("connected to {}:{}", host, port);
                    return Ok(TelnetTransport::new(stream));
                }
                Ok(Err(source)) => ConnectionError::Failed {
                    host: host.to_string(),
                    port,
                    source,
                },
                Err(_) => ConnectionError::Timeout(timeout),
            };

            failed += 1;
            match self.retry.delay_after(failed) {
                Some(delay) => {
                    warn!(
                        "connect to {}:{} failed (attempt {}): {}; retrying in {:?}",
                        host, port, failed, err, delay
                    );
                    tokio::time::sleep(delay).await;
                }
                None => return Err(err.into()),
            }
        }
    }
}
