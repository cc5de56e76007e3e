//! ### Talking to the relay
//!
//! The session driver in [`smtp::session`] only speaks to the server through the
//! [`Transport`] trait, one method per protocol step.
//!
//! The following transports are available:
//!
//! * [`smtp::client::SmtpConnection`] speaks SMTP over a TCP stream, optionally encrypted
//!   with rustls. It is what the command line tool uses.
//! * [`stub::StubTransport`] records the steps it is asked to perform and answers
//!   from a script. It is useful for testing the session logic without a server.

use std::io;

use crate::{
    address::Address,
    error::Error,
    transport::smtp::{
        authentication::Authenticator,
        extension::{ClientId, MailParameter, ServerInfo},
        response::Response,
    },
};

pub mod smtp;
pub mod stub;

/// The primitive operations of an SMTP client session
///
/// Negative replies are returned as errors carrying the reply code.
pub trait Transport {
    /// Channel the message content is written to after `DATA`
    type Data<'a>: DataChannel
    where
        Self: 'a;

    /// Introduces the client with `EHLO` and records the server capabilities
    fn greet(&mut self, hello: &ClientId) -> Result<(), Error>;

    /// Capabilities from the last greeting
    fn server_info(&self) -> &ServerInfo;

    /// Tells if the stream is already encrypted
    fn is_encrypted(&self) -> bool;

    /// Upgrades the stream with `STARTTLS` and greets the server again
    fn starttls(&mut self, hello: &ClientId) -> Result<(), Error>;

    /// Runs a SASL exchange to completion
    fn auth(&mut self, authenticator: &Authenticator) -> Result<Response, Error>;

    /// Sends `MAIL FROM`
    fn mail(&mut self, sender: &Address, parameters: &[MailParameter]) -> Result<Response, Error>;

    /// Sends `RCPT TO`
    fn rcpt(&mut self, recipient: &Address) -> Result<Response, Error>;

    /// Sends `DATA` and opens the channel for the message content
    fn data(&mut self) -> Result<Self::Data<'_>, Error>;

    /// Sends `QUIT`
    fn quit(&mut self) -> Result<Response, Error>;

    /// Releases the underlying connection
    ///
    /// Releasing an already released connection is reported with an error for
    /// which [`Error::is_already_closed`] is true.
    fn close(&mut self) -> Result<(), Error>;
}

/// Where the message content goes
pub trait DataChannel: io::Write {
    /// Ends the content and returns the server verdict on the message
    fn finish(self) -> Result<Response, Error>;
}
