//! Telnet transport: socket I/O and telnet byte handling.
//!
//! The stream is split between a reader task and a writer task. The reader
//! decodes telnet, forwards data to the session and hands negotiation
//! replies to the writer. The writer owns the write half, so lines written
//! by the session and negotiation replies never interleave mid-sequence.

use std::future::Future;

use bytes::{Bytes, BytesMut};
use log::{debug, trace, warn};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, oneshot};

use super::codec::{TelnetDecoder, escape_iac};
use crate::error::{ConnectionError, Result};

/// Line terminator appended by [`Transport::send_line`].
pub const LINE_ENDING: &[u8] = b"\r\n";

const READ_CHUNK: usize = 4096;
const INBOUND_CAPACITY: usize = 64;

/// Event delivered from the transport to the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Bytes received from the peer, telnet commands removed.
    Data(Bytes),

    /// The connection is gone. No further events follow.
    Closed { reason: String },
}

/// Byte transport underneath a session.
pub trait Transport: Send + 'static {
    /// Queue `line` plus the line terminator for sending.
    fn send_line(&mut self, line: &str) -> Result<()>;

    /// Request disconnect once queued output has been flushed.
    fn disconnect(&mut self) -> Result<()>;

    /// Wait for the next event. Must be cancel-safe.
    fn next_event(&mut self) -> impl Future<Output = TransportEvent> + Send;
}

enum Outbound {
    Data(Bytes),
    Disconnect,
}

/// Telnet transport over any async byte stream.
pub struct TelnetTransport {
    outbound: mpsc::UnboundedSender<Outbound>,
    inbound: mpsc::Receiver<TransportEvent>,
}

impl TelnetTransport {
    /// Start the reader and writer tasks on `stream`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new<S>(stream: S) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (reader, writer) = tokio::io::split(stream);
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_CAPACITY);
        let (stop_tx, stop_rx) = oneshot::channel();

        tokio::spawn(read_loop(reader, inbound_tx, outbound_tx.downgrade(), stop_rx));
        tokio::spawn(write_loop(writer, outbound_rx, stop_tx));

        Self {
            outbound: outbound_tx,
            inbound: inbound_rx,
        }
    }
}

impl Transport for TelnetTransport {
    fn send_line(&mut self, line: &str) -> Result<()> {
        let mut data = BytesMut::with_capacity(line.len() + LINE_ENDING.len());
        data.extend_from_slice(&escape_iac(line.as_bytes()));
        data.extend_from_slice(LINE_ENDING);
        self.outbound
            .send(Outbound::Data(data.freeze()))
            .map_err(|_| ConnectionError::lost("transport closed"))?;
        Ok(())
    }

    fn disconnect(&mut self) -> Result<()> {
        // Already gone is as good as disconnected
        let _ = self.outbound.send(Outbound::Disconnect);
        Ok(())
    }

    async fn next_event(&mut self) -> TransportEvent {
        self.inbound
            .recv()
            .await
            .unwrap_or_else(|| TransportEvent::Closed {
                reason: "transport task ended".to_string(),
            })
    }
}

async fn read_loop<R>(
    mut reader: R,
    events: mpsc::Sender<TransportEvent>,
    replies: mpsc::WeakUnboundedSender<Outbound>,
    mut stop: oneshot::Receiver<String>,
) where
    R: AsyncRead + Unpin,
{
    let mut decoder = TelnetDecoder::new();
    let mut buf = BytesMut::with_capacity(READ_CHUNK);

    let reason = loop {
        buf.clear();
        buf.reserve(READ_CHUNK);

        let read = tokio::select! {
            biased;
            stopped = &mut stop => {
                break stopped.unwrap_or_else(|_| "writer stopped".to_string());
            }
            read = reader.read_buf(&mut buf) => read,
        };

        match read {
            Ok(0) => break "connection closed by peer".to_string(),
            Ok(n) => {
                trace!("telnet: read {} bytes: {:?}", n, String::from_utf8_lossy(&buf));
                let decoded = decoder.decode(&buf);
                if !decoded.replies.is_empty() {
                    if let Some(replies) = replies.upgrade() {
                        let _ = replies.send(Outbound::Data(decoded.replies));
                    }
                }
                if !decoded.data.is_empty()
                    && events.send(TransportEvent::Data(decoded.data)).await.is_err()
                {
                    debug!("telnet: session gone, reader exiting");
                    return;
                }
            }
            Err(e) => break e.to_string(),
        }
    };

    debug!("telnet: reader stopped: {}", reason);
    let _ = events.send(TransportEvent::Closed { reason }).await;
}

async fn write_loop<W>(
    mut writer: W,
    mut outbound: mpsc::UnboundedReceiver<Outbound>,
    stop: oneshot::Sender<String>,
) where
    W: AsyncWrite + Unpin,
{
    let reason = loop {
        match outbound.recv().await {
            Some(Outbound::Data(data)) => {
                if let Err(e) = writer.write_all(&data).await {
                    warn!("telnet: write failed: {}", e);
                    break format!("write failed: {}", e);
                }
            }
            Some(Outbound::Disconnect) => break "disconnected locally".to_string(),
            None => break "transport dropped".to_string(),
        }
    };

    let _ = writer.flush().await;
    if let Err(e) = writer.shutdown().await {
        debug!("telnet: shutdown failed: {}", e);
    }
    let _ = stop.send(reason);
}
