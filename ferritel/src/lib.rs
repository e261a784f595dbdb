//! # Ferritel
//!
//! Async telnet CLI automation with expect-style response matching.
//!
//! Ferritel logs into a remote shell over telnet by spotting the login,
//! password and shell prompts in the raw byte stream, then switches to
//! line mode where callers send commands and wait for output patterns.
//!
//! ## Features
//!
//! - Unattended login (username, password, prompt or greeting detection)
//! - FIFO expect queue; each request's timeout starts when it reaches the head
//! - Timeouts return the partial output instead of failing
//! - Pending requests fail fast when the connection drops
//! - Minimal telnet option handling (refuses every option)
//! - Connect retries with exponential backoff
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use ferritel::SessionBuilder;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), ferritel::Error> {
//!     let session = SessionBuilder::new("192.168.1.1")
//!         .username("admin")
//!         .password("secret")
//!         .prompt(r"[$#]\s*$")
//!         .connect()
//!         .await?;
//!
//!     session.write("uname -a")?;
//!     let output = session.expect("Linux", Duration::from_secs(5))?.await?;
//!     println!("{}", output);
//!
//!     session.close().await?;
//!     Ok(())
//! }
//! ```

pub mod channel;
pub mod engine;
pub mod error;
pub mod session;
pub mod transport;

// Re-export main types for convenience
pub use engine::ExpectOutput;
pub use error::Error;
pub use session::{
    Expectation, InteractiveBuilder, InteractiveEvent, InteractiveResult, Session, SessionBuilder,
    connect,
};
pub use transport::{
    Connector, RetryPolicy, SessionConfig, TcpConnector, TelnetTransport, Transport,
};
