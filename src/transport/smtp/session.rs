//! Drives one mail transaction over a [`Transport`]
//!
//! The steps always run in this order, each one requiring the previous:
//!
//! 1. greeting, recording the server capabilities
//! 2. `STARTTLS`, only when advertised on a plaintext stream
//! 3. authentication, only when an [`Authenticator`] is given
//! 4. envelope, sender then recipient
//! 5. message content
//!
//! Whatever happens, the connection is released exactly once at the end.
//! `QUIT` is sent first when the message went through.

use std::{fmt, io::Write};

use crate::{
    address::Envelope,
    error::{self, Error},
    transport::{
        smtp::{
            authentication::Authenticator,
            extension::{ClientId, Extension, MailBodyParameter, MailParameter, ServerInfo},
        },
        DataChannel, Transport,
    },
};

/// Progress of a session, in protocol order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SessionState {
    /// The stream is established
    Connected,
    /// The server answered the greeting
    Greeted,
    /// The stream is encrypted, or stays plaintext because the server offers nothing better
    SecurityNegotiated,
    /// The SASL exchange succeeded
    Authenticated,
    /// Sender and recipient were accepted
    EnvelopeSet,
    /// The server accepted the message
    DataSent,
    /// The connection is being released
    Closing,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

struct Session {
    state: SessionState,
}

impl Session {
    fn advance(&mut self, next: SessionState) {
        #[cfg(feature = "tracing")]
        tracing::debug!("session {} -> {}", self.state, next);
        self.state = next;
    }
}

/// Sends `email` for `envelope` and releases the connection
///
/// The first error encountered is returned. An error while releasing the
/// connection is only returned when everything else succeeded, and never when
/// the connection was simply already closed.
pub fn send<T: Transport>(
    mut transport: T,
    hello: &ClientId,
    authenticator: Option<&Authenticator>,
    envelope: &Envelope,
    email: &[u8],
) -> Result<(), Error> {
    let mut session = Session {
        state: SessionState::Connected,
    };

    let mut outcome = run(
        &mut transport,
        &mut session,
        hello,
        authenticator,
        envelope,
        email,
    );
    if session.state == SessionState::DataSent {
        outcome = transport.quit().map(drop);
    }

    session.advance(SessionState::Closing);
    let released = transport.close();
    resolve(outcome, released)
}

fn run<T: Transport>(
    transport: &mut T,
    session: &mut Session,
    hello: &ClientId,
    authenticator: Option<&Authenticator>,
    envelope: &Envelope,
    email: &[u8],
) -> Result<(), Error> {
    transport.greet(hello)?;
    session.advance(SessionState::Greeted);

    if transport.is_encrypted() {
        #[cfg(feature = "tracing")]
        tracing::debug!("stream already encrypted, not looking for STARTTLS");
    } else if transport.server_info().supports_feature(Extension::StartTls) {
        transport.starttls(hello)?;
    } else {
        #[cfg(feature = "tracing")]
        tracing::warn!("server does not offer STARTTLS, staying in plaintext");
    }
    session.advance(SessionState::SecurityNegotiated);

    if let Some(authenticator) = authenticator {
        let server_info = transport.server_info();
        if !server_info.supports_feature(Extension::Authentication) {
            return Err(error::unsupported("server doesn't support AUTH"));
        }
        if !server_info.supports_auth_mechanism(authenticator.mechanism()) {
            #[cfg(feature = "tracing")]
            tracing::warn!(
                "server does not list {}, trying anyway",
                authenticator.mechanism()
            );
        }
        transport.auth(authenticator)?;
        session.advance(SessionState::Authenticated);
    }

    let parameters = mail_parameters(transport.server_info(), envelope, email);
    transport.mail(envelope.from(), &parameters)?;
    transport.rcpt(envelope.to())?;
    session.advance(SessionState::EnvelopeSet);

    let mut data = transport.data()?;
    data.write_all(email).map_err(from_io)?;
    data.finish()?;
    session.advance(SessionState::DataSent);
    Ok(())
}

// Internationalization handling
//
// * 8BITMIME: https://tools.ietf.org/html/rfc6152
// * SMTPUTF8: https://tools.ietf.org/html/rfc6531
fn mail_parameters(
    server_info: &ServerInfo,
    envelope: &Envelope,
    email: &[u8],
) -> Vec<MailParameter> {
    let mut parameters = Vec::new();

    if envelope.has_non_ascii_addresses() {
        if server_info.supports_feature(Extension::SmtpUtfEight) {
            parameters.push(MailParameter::SmtpUtfEight);
        } else {
            #[cfg(feature = "tracing")]
            tracing::warn!("envelope is not ascii but the server does not advertise SMTPUTF8");
        }
    }

    if !email.is_ascii() {
        if server_info.supports_feature(Extension::EightBitMime) {
            parameters.push(MailParameter::Body(MailBodyParameter::EightBitMime));
        } else {
            #[cfg(feature = "tracing")]
            tracing::warn!("message is not ascii but the server does not advertise 8BITMIME");
        }
    }

    parameters
}

/// Picks the error reported for the whole session
fn resolve(outcome: Result<(), Error>, released: Result<(), Error>) -> Result<(), Error> {
    match (outcome, released) {
        (Err(err), released) => {
            #[cfg(feature = "tracing")]
            if let Err(ref close_err) = released {
                tracing::debug!("ignoring release error after failure: {}", close_err);
            }
            #[cfg(not(feature = "tracing"))]
            let _ = released;
            Err(err)
        }
        (Ok(()), Err(err)) if err.is_already_closed() => Ok(()),
        (Ok(()), released) => released,
    }
}

/// Recovers the transport error carried by a data channel write error
fn from_io(err: std::io::Error) -> Error {
    match err.get_ref().map(|inner| inner.is::<Error>()) {
        Some(true) => match err.into_inner().map(|inner| inner.downcast::<Error>()) {
            Some(Ok(inner)) => *inner,
            _ => error::client("data channel error went missing"),
        },
        _ => error::network(err),
    }
}

#[cfg(test)]
mod test {
    use std::io;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{
        address::Address,
        transport::{
            smtp::authentication::{AuthSpec, Mechanism},
            stub::{Call, CloseOutcome, Step, StubTransport},
        },
    };

    const EMAIL: &[u8] = b"Subject: test\r\n\r\nhello\r\n";

    fn envelope() -> Envelope {
        Envelope::new("a@x.com".parse().unwrap(), "b@y.com".parse().unwrap())
    }

    fn hello() -> ClientId {
        ClientId::Domain("client.example.org".to_owned())
    }

    fn plain() -> Authenticator {
        Authenticator::from_spec(AuthSpec::Plain {
            identity: String::new(),
            username: "user".to_owned(),
            password: "secret".to_owned(),
        })
        .unwrap()
        .unwrap()
    }

    fn addr(s: &str) -> Address {
        s.parse().unwrap()
    }

    #[test]
    fn starttls_advertised_without_auth() {
        let transport = StubTransport::new(&["STARTTLS", "8BITMIME"]);
        let log = transport.log();

        send(transport, &hello(), None, &envelope(), EMAIL).unwrap();

        assert_eq!(
            log.calls(),
            vec![
                Call::Greet(hello()),
                Call::StartTls,
                Call::Greet(hello()),
                Call::Mail(addr("a@x.com"), vec![]),
                Call::Rcpt(addr("b@y.com")),
                Call::Data,
                Call::Finish(EMAIL.to_vec()),
                Call::Quit,
                Call::Close,
            ]
        );
    }

    #[test]
    fn implicit_tls_never_starttls() {
        let transport = StubTransport::new(&["STARTTLS"]).implicit_tls();
        let log = transport.log();

        send(transport, &hello(), None, &envelope(), EMAIL).unwrap();

        assert!(!log.calls().contains(&Call::StartTls));
        assert_eq!(log.calls()[0], Call::Greet(hello()));
    }

    #[test]
    fn no_starttls_when_not_advertised() {
        let transport = StubTransport::new(&[]);
        let log = transport.log();

        send(transport, &hello(), None, &envelope(), EMAIL).unwrap();

        assert!(!log.calls().contains(&Call::StartTls));
    }

    #[test]
    fn starttls_failure_aborts() {
        let transport = StubTransport::new(&["STARTTLS"]).fail_at(Step::StartTls);
        let log = transport.log();

        let err = send(transport, &hello(), None, &envelope(), EMAIL).unwrap_err();

        assert!(err.is_tls());
        assert!(err.is_connection());
        assert_eq!(
            log.calls(),
            vec![Call::Greet(hello()), Call::StartTls, Call::Close]
        );
    }

    #[test]
    fn auth_not_advertised() {
        let transport = StubTransport::new(&["STARTTLS"]);
        let log = transport.log();

        let err = send(transport, &hello(), Some(&plain()), &envelope(), EMAIL).unwrap_err();

        assert!(err.is_protocol());
        assert!(err.is_unsupported());
        assert_eq!(
            err.to_string(),
            "unsupported by server: server doesn't support AUTH"
        );
        assert_eq!(
            log.calls(),
            vec![
                Call::Greet(hello()),
                Call::StartTls,
                Call::Greet(hello()),
                Call::Close
            ]
        );
    }

    #[test]
    fn auth_after_security() {
        let transport = StubTransport::new(&["STARTTLS", "AUTH PLAIN LOGIN"]);
        let log = transport.log();

        send(transport, &hello(), Some(&plain()), &envelope(), EMAIL).unwrap();

        let calls = log.calls();
        assert_eq!(calls[1], Call::StartTls);
        assert_eq!(calls[3], Call::Auth(Mechanism::Plain));
        assert_eq!(calls[4], Call::Mail(addr("a@x.com"), vec![]));
    }

    #[test]
    fn auth_mechanism_not_listed_is_tried() {
        let transport = StubTransport::new(&["AUTH LOGIN"]);
        let log = transport.log();

        send(transport, &hello(), Some(&plain()), &envelope(), EMAIL).unwrap();

        assert!(log.calls().contains(&Call::Auth(Mechanism::Plain)));
    }

    #[test]
    fn released_once_whatever_fails() {
        for step in [
            Step::Greet,
            Step::Auth,
            Step::Mail,
            Step::Rcpt,
            Step::Data,
            Step::Finish,
            Step::Quit,
        ] {
            let transport = StubTransport::new(&["AUTH PLAIN"]).fail_at(step);
            let log = transport.log();

            let err = send(transport, &hello(), Some(&plain()), &envelope(), EMAIL).unwrap_err();

            assert!(err.is_permanent(), "{step:?}: {err}");
            assert_eq!(log.close_count(), 1, "{step:?}");
            assert_eq!(log.calls().last(), Some(&Call::Close), "{step:?}");
        }
    }

    #[test]
    fn quit_only_after_data() {
        let transport = StubTransport::new(&[]).fail_at(Step::Finish);
        let log = transport.log();

        send(transport, &hello(), None, &envelope(), EMAIL).unwrap_err();

        assert!(!log.calls().contains(&Call::Quit));
    }

    #[test]
    fn rcpt_rejected_stops_before_data() {
        let transport = StubTransport::new(&[]).fail_at(Step::Rcpt);
        let log = transport.log();

        let err = send(transport, &hello(), None, &envelope(), EMAIL).unwrap_err();

        assert_eq!(err.status().map(u16::from), Some(550));
        assert!(!log.calls().contains(&Call::Data));
    }

    #[test]
    fn already_closed_is_success() {
        let transport = StubTransport::new(&[]).on_close(CloseOutcome::AlreadyClosed);
        assert!(send(transport, &hello(), None, &envelope(), EMAIL).is_ok());
    }

    #[test]
    fn close_failure_is_reported() {
        let transport = StubTransport::new(&[]).on_close(CloseOutcome::Failed);
        let err = send(transport, &hello(), None, &envelope(), EMAIL).unwrap_err();
        assert!(err.is_close());
        assert!(!err.is_already_closed());
    }

    #[test]
    fn first_error_wins_over_close() {
        let transport = StubTransport::new(&[])
            .fail_at(Step::Mail)
            .on_close(CloseOutcome::Failed);
        let err = send(transport, &hello(), None, &envelope(), EMAIL).unwrap_err();
        assert!(err.is_permanent());
    }

    #[test]
    fn resolve_precedence() {
        let failed = || error::close("reset");

        assert!(resolve(Ok(()), Ok(())).is_ok());
        assert!(resolve(Ok(()), Err(error::already_closed())).is_ok());
        assert!(resolve(Ok(()), Err(failed())).unwrap_err().is_close());
        assert!(resolve(Err(error::network("eof")), Err(failed()))
            .unwrap_err()
            .is_network());
        assert!(
            resolve(Err(error::network("eof")), Err(error::already_closed()))
                .unwrap_err()
                .is_network()
        );
    }

    #[test]
    fn mail_parameters_follow_capabilities() {
        let response = "250-me\r\n250-8BITMIME\r\n250 SMTPUTF8\r\n"
            .parse()
            .unwrap();
        let capable = ServerInfo::from_response(&response).unwrap();
        let ascii = envelope();
        let utf8 = Envelope::new(addr("a@bücher.example"), addr("b@y.com"));

        assert_eq!(mail_parameters(&capable, &ascii, EMAIL), vec![]);
        assert_eq!(
            mail_parameters(&capable, &utf8, "héllo".as_bytes()),
            vec![
                MailParameter::SmtpUtfEight,
                MailParameter::Body(MailBodyParameter::EightBitMime)
            ]
        );
        assert_eq!(
            mail_parameters(&ServerInfo::default(), &utf8, "héllo".as_bytes()),
            vec![]
        );
    }

    #[test]
    fn data_channel_errors_keep_their_kind() {
        let err = from_io(io::Error::other(error::already_closed()));
        assert!(err.is_already_closed());

        let err = from_io(io::Error::new(io::ErrorKind::BrokenPipe, "pipe"));
        assert!(err.is_network());
    }
}
