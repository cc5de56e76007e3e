//! SMTP client
//!
//! `SmtpConnection` allows manually sending SMTP commands.
//!
//! ```rust,no_run
//! # use std::error::Error;
//! # fn main() -> Result<(), Box<dyn Error>> {
//! use smtp_connection_helper::transport::{
//!     smtp::{
//!         client::{connect, ConnectionRequest},
//!         extension::ClientId,
//!     },
//!     Transport,
//! };
//!
//! let request = ConnectionRequest::new("localhost", 2525)?;
//! let mut client = connect(&request)?;
//! client.greet(&ClientId::Domain("my_hostname".to_owned()))?;
//! client.quit()?;
//! # Ok(())
//! # }
//! ```

use std::io;

pub use self::{
    connection::{DataWriter, SmtpConnection},
    connector::{connect, ConnectionRequest},
    net::NetworkStream,
    tls::TlsParameters,
};
use crate::error::{self, Error};

mod connection;
mod connector;
mod net;
mod tls;

/// The codec used for transparency
///
/// Doubles the dot starting any line of the message, see
/// [RFC 5321, section 4.5.2](https://tools.ietf.org/html/rfc5321#section-4.5.2).
#[derive(Clone, Copy, Debug)]
pub struct ClientCodec {
    escape_count: u8,
}

impl Default for ClientCodec {
    fn default() -> Self {
        // The first byte of the message starts a line
        ClientCodec { escape_count: 2 }
    }
}

impl ClientCodec {
    /// Creates a new client codec
    pub fn new() -> Self {
        ClientCodec::default()
    }

    /// Adds transparency
    pub fn encode(&mut self, frame: &[u8], buf: &mut Vec<u8>) {
        let mut start = 0;
        for (idx, byte) in frame.iter().enumerate() {
            match self.escape_count {
                0 => self.escape_count = if *byte == b'\r' { 1 } else { 0 },
                1 => {
                    self.escape_count = match *byte {
                        b'\n' => 2,
                        b'\r' => 1,
                        _ => 0,
                    }
                }
                2 => {
                    self.escape_count = match *byte {
                        b'.' => 3,
                        b'\r' => 1,
                        _ => 0,
                    }
                }
                _ => unreachable!(),
            }
            if self.escape_count == 3 {
                self.escape_count = 0;
                buf.extend_from_slice(&frame[start..idx]);
                buf.push(b'.');
                start = idx;
            }
        }
        buf.extend_from_slice(&frame[start..]);
    }

    /// Writes the end of data indicator, completing the last line if needed
    pub fn finish(&mut self, buf: &mut Vec<u8>) {
        match self.escape_count {
            1 => buf.extend_from_slice(b"\n.\r\n"),
            2 => buf.extend_from_slice(b".\r\n"),
            _ => buf.extend_from_slice(b"\r\n.\r\n"),
        }
        self.escape_count = 2;
    }
}

/// Returns the string replacing all the CRLF with "\<CRLF\>"
/// Used for debug displays
#[cfg(feature = "tracing")]
pub(super) fn escape_crlf(string: &str) -> String {
    string.replace("\r\n", "<CRLF>")
}

/// What is known about the health of a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ConnectionState {
    /// Usable
    Ok,
    /// The stream failed, nothing more can be written or read
    BrokenConnection,
    /// The server sent something unparsable
    BrokenResponse,
    /// The stream was shut down by the client
    Closed,
}

/// Keeps track of the connection state around operations on the stream
#[derive(Debug)]
pub(crate) struct ConnectionWrapper<S> {
    inner: S,
    state: ConnectionState,
}

impl<S> ConnectionWrapper<S> {
    pub(crate) fn new(inner: S) -> Self {
        Self {
            inner,
            state: ConnectionState::Ok,
        }
    }

    pub(crate) fn state(&self) -> ConnectionState {
        self.state
    }

    pub(crate) fn set_state(&mut self, state: ConnectionState) {
        self.state = state;
    }

    pub(crate) fn get_ref(&self) -> &S {
        &self.inner
    }

    pub(crate) fn get_mut(&mut self) -> &mut S {
        &mut self.inner
    }

    /// Runs `op` on the stream unless it is known to be unusable
    ///
    /// A network error marks the connection as broken.
    pub(crate) fn sync_op<T, F>(&mut self, op: F) -> Result<T, Error>
    where
        F: FnOnce(&mut S) -> Result<T, Error>,
    {
        match self.state {
            ConnectionState::Closed => return Err(error::already_closed()),
            ConnectionState::BrokenConnection => {
                return Err(error::network(io::Error::new(
                    io::ErrorKind::BrokenPipe,
                    "connection is broken",
                )))
            }
            ConnectionState::Ok | ConnectionState::BrokenResponse => {}
        }

        let result = op(&mut self.inner);
        if let Err(ref err) = result {
            if err.is_network() {
                self.state = ConnectionState::BrokenConnection;
            }
        }
        result
    }
}
