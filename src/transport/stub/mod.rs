//! The stub transport records the steps of a session instead of talking to a
//! server. It can be useful for testing purposes.
//!
//! ```rust
//! # use std::error::Error;
//! # fn main() -> Result<(), Box<dyn Error>> {
//! use smtp_connection_helper::{
//!     transport::{
//!         smtp::{extension::ClientId, session},
//!         stub::{Call, StubTransport},
//!     },
//!     Envelope,
//! };
//!
//! let transport = StubTransport::new(&["STARTTLS"]);
//! let log = transport.log();
//! let envelope = Envelope::new("a@x.com".parse()?, "b@y.com".parse()?);
//!
//! session::send(transport, &ClientId::default(), None, &envelope, b"Hello")?;
//! assert!(log.calls().contains(&Call::StartTls));
//! assert_eq!(log.close_count(), 1);
//! # Ok(())
//! # }
//! ```

use std::{
    io::{self, Write},
    sync::{Arc, Mutex, PoisonError},
};

use crate::{
    address::Address,
    error::{self, Error},
    transport::{
        smtp::{
            authentication::{Authenticator, Mechanism},
            extension::{ClientId, MailParameter, ServerInfo},
            response::{Code, Response},
        },
        DataChannel, Transport,
    },
};

/// A protocol step the stub can be told to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// `EHLO`
    Greet,
    /// `STARTTLS`
    StartTls,
    /// `AUTH`
    Auth,
    /// `MAIL FROM`
    Mail,
    /// `RCPT TO`
    Rcpt,
    /// `DATA`
    Data,
    /// End of the message content
    Finish,
    /// `QUIT`
    Quit,
}

/// What releasing the stub connection reports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseOutcome {
    /// The connection is released without error
    Released,
    /// The connection was already released
    AlreadyClosed,
    /// Releasing failed
    Failed,
}

/// A call made on the stub, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    /// `EHLO` with the client identifier
    Greet(ClientId),
    /// `STARTTLS`
    StartTls,
    /// `AUTH` with the mechanism
    Auth(Mechanism),
    /// `MAIL FROM`
    Mail(Address, Vec<MailParameter>),
    /// `RCPT TO`
    Rcpt(Address),
    /// `DATA`
    Data,
    /// End of data, with everything written to the channel
    Finish(Vec<u8>),
    /// `QUIT`
    Quit,
    /// Release of the connection
    Close,
}

/// Shared view on the calls made on a [`StubTransport`]
#[derive(Debug, Clone, Default)]
pub struct StubLog {
    calls: Arc<Mutex<Vec<Call>>>,
}

impl StubLog {
    fn push(&self, call: Call) {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(call);
    }

    /// All calls so far
    pub fn calls(&self) -> Vec<Call> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// How many times the connection was released
    pub fn close_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, Call::Close))
            .count()
    }
}

/// This transport records the session and answers positively unless told otherwise
#[derive(Debug)]
pub struct StubTransport {
    capabilities: ServerInfo,
    server_info: ServerInfo,
    encrypted: bool,
    fail_at: Option<Step>,
    on_close: Option<CloseOutcome>,
    sent_quit: bool,
    log: StubLog,
}

impl StubTransport {
    /// Creates a plaintext transport advertising the given EHLO keywords
    ///
    /// As with a real server, `QUIT` closes the connection, so releasing it
    /// afterwards reports that it was already closed.
    pub fn new(capabilities: &[&str]) -> StubTransport {
        let mut lines = vec!["stub.example.org".to_owned()];
        lines.extend(capabilities.iter().map(|c| (*c).to_owned()));
        let response = Response::new(Code::OK, lines);

        StubTransport {
            capabilities: ServerInfo::from_response(&response).unwrap_or_default(),
            server_info: ServerInfo::default(),
            encrypted: false,
            fail_at: None,
            on_close: None,
            sent_quit: false,
            log: StubLog::default(),
        }
    }

    /// The stream is encrypted from the start
    pub fn implicit_tls(mut self) -> Self {
        self.encrypted = true;
        self
    }

    /// The server rejects the given step
    pub fn fail_at(mut self, step: Step) -> Self {
        self.fail_at = Some(step);
        self
    }

    /// Forces the outcome of releasing the connection
    pub fn on_close(mut self, outcome: CloseOutcome) -> Self {
        self.on_close = Some(outcome);
        self
    }

    /// Handle on the calls, usable after the transport was moved into a session
    pub fn log(&self) -> StubLog {
        self.log.clone()
    }

    fn step(&self, step: Step) -> Result<Response, Error> {
        if self.fail_at == Some(step) {
            return Err(match step {
                Step::StartTls => error::tls("stub handshake failure"),
                _ => error::code(Code::NOT_TAKEN, Some(format!("stub rejected {step:?}"))),
            });
        }
        Ok(Response::new(Code::OK, vec!["Ok".to_owned()]))
    }
}

impl Transport for StubTransport {
    type Data<'a> = StubData<'a>;

    fn greet(&mut self, hello: &ClientId) -> Result<(), Error> {
        self.log.push(Call::Greet(hello.clone()));
        self.step(Step::Greet)?;
        self.server_info = self.capabilities.clone();
        Ok(())
    }

    fn server_info(&self) -> &ServerInfo {
        &self.server_info
    }

    fn is_encrypted(&self) -> bool {
        self.encrypted
    }

    fn starttls(&mut self, hello: &ClientId) -> Result<(), Error> {
        self.log.push(Call::StartTls);
        self.step(Step::StartTls)?;
        self.encrypted = true;
        self.greet(hello)
    }

    fn auth(&mut self, authenticator: &Authenticator) -> Result<Response, Error> {
        self.log.push(Call::Auth(authenticator.mechanism()));
        self.step(Step::Auth)
    }

    fn mail(&mut self, sender: &Address, parameters: &[MailParameter]) -> Result<Response, Error> {
        self.log
            .push(Call::Mail(sender.clone(), parameters.to_vec()));
        self.step(Step::Mail)
    }

    fn rcpt(&mut self, recipient: &Address) -> Result<Response, Error> {
        self.log.push(Call::Rcpt(recipient.clone()));
        self.step(Step::Rcpt)
    }

    fn data(&mut self) -> Result<StubData<'_>, Error> {
        self.log.push(Call::Data);
        self.step(Step::Data)?;
        Ok(StubData {
            transport: self,
            content: Vec::new(),
        })
    }

    fn quit(&mut self) -> Result<Response, Error> {
        self.log.push(Call::Quit);
        let response = self.step(Step::Quit)?;
        self.sent_quit = true;
        Ok(response)
    }

    fn close(&mut self) -> Result<(), Error> {
        self.log.push(Call::Close);
        let outcome = match self.on_close {
            Some(outcome) => outcome,
            None if self.sent_quit => CloseOutcome::AlreadyClosed,
            None => CloseOutcome::Released,
        };
        match outcome {
            CloseOutcome::Released => Ok(()),
            CloseOutcome::AlreadyClosed => Err(error::already_closed()),
            CloseOutcome::Failed => Err(error::close(io::Error::new(
                io::ErrorKind::ConnectionReset,
                "stub close failure",
            ))),
        }
    }
}

/// Collects the message content for the log
#[derive(Debug)]
pub struct StubData<'a> {
    transport: &'a mut StubTransport,
    content: Vec<u8>,
}

impl Write for StubData<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.content.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl DataChannel for StubData<'_> {
    fn finish(self) -> Result<Response, Error> {
        self.transport.log.push(Call::Finish(self.content));
        self.transport.step(Step::Finish)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::transport::smtp::extension::Extension;

    #[test]
    fn test_capabilities_after_greeting() {
        let mut transport = StubTransport::new(&["STARTTLS", "AUTH PLAIN"]);
        assert!(!transport.server_info().supports_feature(Extension::StartTls));

        transport.greet(&ClientId::default()).unwrap();
        assert!(transport.server_info().supports_feature(Extension::StartTls));
        assert!(transport
            .server_info()
            .supports_auth_mechanism(Mechanism::Plain));
    }

    #[test]
    fn test_close_after_quit() {
        let mut transport = StubTransport::new(&[]);
        let log = transport.log();
        transport.quit().unwrap();
        assert!(transport.close().unwrap_err().is_already_closed());
        assert_eq!(log.calls(), vec![Call::Quit, Call::Close]);
        assert_eq!(log.close_count(), 1);
    }

    #[test]
    fn test_scripted_failures() {
        let mut transport = StubTransport::new(&[]).fail_at(Step::Rcpt);
        let recipient: Address = "b@y.com".parse().unwrap();
        let err = transport.rcpt(&recipient).unwrap_err();
        assert!(err.is_permanent());
        assert_eq!(err.status().map(u16::from), Some(550));

        let mut transport = StubTransport::new(&["STARTTLS"]).fail_at(Step::StartTls);
        assert!(transport.starttls(&ClientId::default()).unwrap_err().is_tls());
        assert!(!transport.is_encrypted());

        let mut transport = StubTransport::new(&[]).on_close(CloseOutcome::Failed);
        let err = transport.close().unwrap_err();
        assert!(err.is_close());
        assert!(!err.is_already_closed());
    }

    #[test]
    fn test_data_content_is_logged() {
        let mut transport = StubTransport::new(&[]);
        let log = transport.log();
        let mut data = transport.data().unwrap();
        data.write_all(b"Subject: hi\r\n\r\nbody\r\n").unwrap();
        data.finish().unwrap();

        assert_eq!(
            log.calls(),
            vec![
                Call::Data,
                Call::Finish(b"Subject: hi\r\n\r\nbody\r\n".to_vec())
            ]
        );
    }
}
