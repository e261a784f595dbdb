//! Telnet transport layer.
//!
//! This module provides the connection management underneath a session:
//! TCP connect with retries, telnet byte filtering and line output.

mod codec;
pub mod config;
mod connector;
mod telnet;

pub use codec::{Decoded, TelnetDecoder, escape_iac};
pub use config::{RetryPolicy, SessionConfig};
pub use connector::{Connector, TcpConnector};
pub use telnet::{LINE_ENDING, TelnetTransport, Transport, TransportEvent};
