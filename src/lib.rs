//! smtp-connection-helper checks that an SMTP relay accepts mail, by sending it a single
//! test message.
//!
//! A check connects to the relay, in plaintext or over implicit TLS, greets it, upgrades the
//! connection with `STARTTLS` when the relay offers it, authenticates with the requested SASL
//! mechanism, and hands over one message for one recipient. The first failure is reported
//! with its category, so that a misconfigured relay can be told apart from bad credentials or
//! a network problem.
//!
//! ## Features
//!
//! * **cli** (default): the `smtp-connection-helper` binary
//! * **tracing** (default): logs the SMTP exchange using the `tracing` crate
//! * **native-certs**: trust the platform certificates in addition to the bundled
//!   Mozilla roots
//!
//! ## Example
//!
//! ```rust,no_run
//! # use std::error::Error;
//! # fn main() -> Result<(), Box<dyn Error>> {
//! use smtp_connection_helper::{
//!     AuthSpec, ConnectionRequest, Envelope, MessageContent, SendRequest,
//! };
//!
//! let request = SendRequest {
//!     connection: ConnectionRequest::new("smtp.example.com", 465)?.implicit_tls(true),
//!     auth: AuthSpec::Login {
//!         username: "relay-user".to_owned(),
//!         password: "hunter2".to_owned(),
//!     },
//!     envelope: Envelope::new("from@example.com".parse()?, "to@example.com".parse()?),
//!     content: MessageContent::new("Testing SMTP Server Connection", "It works!", "localhost")?,
//! };
//!
//! match request.send() {
//!     Ok(()) => println!("Successfully sent email!"),
//!     Err(e) if e.is_validation() => eprintln!("Bad arguments: {e}"),
//!     Err(e) => eprintln!("Could not send email: {e}"),
//! }
//! # Ok(())
//! # }
//! ```

#![doc(html_root_url = "https://docs.rs/crate/smtp-connection-helper/0.1.0")]
#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    missing_debug_implementations,
    trivial_casts,
    trivial_numeric_casts,
    unused_import_braces,
    unstable_features
)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod address;
pub mod error;
pub mod message;
pub mod transport;

pub use crate::{
    address::{Address, AddressError, Envelope},
    error::Error,
    message::MessageContent,
    transport::smtp::{authentication::AuthSpec, client::ConnectionRequest, SendRequest},
};

pub(crate) type BoxError = Box<dyn std::error::Error + Send + Sync>;
