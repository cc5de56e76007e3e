//! Checks an SMTP relay by sending it one message.
//!
//! This SMTP client follows [RFC
//! 5321](https://tools.ietf.org/html/rfc5321). It connects, greets the server, upgrades the
//! connection when possible, authenticates when asked to, and hands over a single message
//! for a single recipient.
//!
//! It implements the following extensions:
//!
//! * 8BITMIME ([RFC 6152](https://tools.ietf.org/html/rfc6152))
//! * SMTPUTF8 ([RFC 6531](https://tools.ietf.org/html/rfc6531))
//! * AUTH ([RFC 4954](http://tools.ietf.org/html/rfc4954)) with PLAIN, LOGIN, ANONYMOUS,
//!   EXTERNAL and OAUTHBEARER mechanisms
//! * STARTTLS ([RFC 2487](http://tools.ietf.org/html/rfc2487))
//!
//! #### Example
//!
//! ```rust,no_run
//! # use std::error::Error;
//! # fn main() -> Result<(), Box<dyn Error>> {
//! use smtp_connection_helper::{
//!     transport::smtp::{authentication::AuthSpec, client::ConnectionRequest, SendRequest},
//!     Envelope, MessageContent,
//! };
//!
//! let request = SendRequest {
//!     connection: ConnectionRequest::new("mail.example.com", 587)?,
//!     auth: AuthSpec::Plain {
//!         identity: String::new(),
//!         username: "relay-user".to_owned(),
//!         password: "hunter2".to_owned(),
//!     },
//!     envelope: Envelope::new("a@x.com".parse()?, "b@y.com".parse()?),
//!     content: MessageContent::new(
//!         "Testing SMTP Server Connection",
//!         "It works!",
//!         "localhost",
//!     )?,
//! };
//!
//! request.send()?;
//! # Ok(())
//! # }
//! ```

use crate::{
    address::Envelope,
    error::Error,
    message::MessageContent,
    transport::smtp::{
        authentication::{AuthSpec, Authenticator},
        client::ConnectionRequest,
    },
};

pub mod authentication;
pub mod client;
pub mod commands;
pub mod extension;
pub mod response;
pub mod session;

/// Everything needed for one connection check
#[derive(Debug, Clone)]
pub struct SendRequest {
    /// Where and how to connect
    pub connection: ConnectionRequest,
    /// How to authenticate
    pub auth: AuthSpec,
    /// Sender and recipient
    pub envelope: Envelope,
    /// The test message
    pub content: MessageContent,
}

impl SendRequest {
    /// Connects, sends the message and releases the connection
    ///
    /// Credentials are checked before connecting.
    pub fn send(self) -> Result<(), Error> {
        let authenticator = Authenticator::from_spec(self.auth)?;
        let email = self.content.compose(&self.envelope);

        let connection = client::connect(&self.connection)?;
        session::send(
            connection,
            self.content.client_id(),
            authenticator.as_ref(),
            &self.envelope,
            &email,
        )
    }
}
