//! Error and result type for a connection check

use std::{error::Error as StdError, fmt};

use crate::{
    transport::smtp::response::{Code, Severity},
    BoxError,
};

// Inspired by https://github.com/seanmonstar/reqwest/blob/a8566383168c0ef06c21f38cbc9213af6ff6db31/src/error.rs

/// The errors that may occur while checking an SMTP relay
pub struct Error {
    inner: Box<Inner>,
}

struct Inner {
    kind: Kind,
    source: Option<BoxError>,
}

impl Error {
    pub(crate) fn new<E>(kind: Kind, source: Option<E>) -> Error
    where
        E: Into<BoxError>,
    {
        Error {
            inner: Box::new(Inner {
                kind,
                source: source.map(Into::into),
            }),
        }
    }

    /// Returns true if the configuration was rejected before any network activity
    pub fn is_validation(&self) -> bool {
        matches!(self.inner.kind, Kind::Validation)
    }

    /// Returns true if the connection to the server could not be established or secured
    ///
    /// This covers name resolution, TCP connection, the server banner and both
    /// TLS handshakes. Use [`Error::is_tls`] to single out a failed `STARTTLS` upgrade.
    pub fn is_connection(&self) -> bool {
        matches!(self.inner.kind, Kind::Connection | Kind::Tls)
    }

    /// Returns true if the server rejected a command or spoke something we could not understand
    pub fn is_protocol(&self) -> bool {
        matches!(
            self.inner.kind,
            Kind::Transient(_) | Kind::Permanent(_) | Kind::Response | Kind::Unsupported | Kind::Client
        )
    }

    /// Returns true if the error is from response parsing
    pub fn is_response(&self) -> bool {
        matches!(self.inner.kind, Kind::Response)
    }

    /// Returns true if the server lacks an extension the session requires
    pub fn is_unsupported(&self) -> bool {
        matches!(self.inner.kind, Kind::Unsupported)
    }

    /// Returns true if the error is from client
    pub fn is_client(&self) -> bool {
        matches!(self.inner.kind, Kind::Client)
    }

    /// Returns true if the error is a transient SMTP error
    pub fn is_transient(&self) -> bool {
        matches!(self.inner.kind, Kind::Transient(_))
    }

    /// Returns true if the error is a permanent SMTP error
    pub fn is_permanent(&self) -> bool {
        matches!(self.inner.kind, Kind::Permanent(_))
    }

    /// Returns true if the error happened while upgrading the connection with `STARTTLS`
    pub fn is_tls(&self) -> bool {
        matches!(self.inner.kind, Kind::Tls)
    }

    /// Returns true if the underlying stream failed in the middle of the session
    pub fn is_network(&self) -> bool {
        matches!(self.inner.kind, Kind::Network)
    }

    /// Returns true if the error happened while releasing the connection
    pub fn is_close(&self) -> bool {
        matches!(self.inner.kind, Kind::Close | Kind::AlreadyClosed)
    }

    /// Returns true if the connection had already been closed
    ///
    /// Releasing a connection twice is not a failure of the session, so this
    /// error is never reported once a message went through.
    pub fn is_already_closed(&self) -> bool {
        matches!(self.inner.kind, Kind::AlreadyClosed)
    }

    /// Returns the status code, if the error was generated from a response.
    pub fn status(&self) -> Option<Code> {
        match self.inner.kind {
            Kind::Transient(code) | Kind::Permanent(code) => Some(code),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub(crate) enum Kind {
    /// Invalid configuration, detected before connecting
    Validation,
    /// The connection could not be established
    Connection,
    /// Transient SMTP error, 4xx reply code
    ///
    /// [RFC 5321, section 4.2.1](https://tools.ietf.org/html/rfc5321#section-4.2.1)
    Transient(Code),
    /// Permanent SMTP error, 5xx reply code
    ///
    /// [RFC 5321, section 4.2.1](https://tools.ietf.org/html/rfc5321#section-4.2.1)
    Permanent(Code),
    /// Error parsing a response
    Response,
    /// The server does not advertise a required extension
    Unsupported,
    /// Internal client error
    Client,
    /// Underlying network i/o error
    Network,
    /// STARTTLS handshake error
    Tls,
    /// Error while releasing the connection
    Close,
    /// The connection was released already
    AlreadyClosed,
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut builder = f.debug_struct("smtp_connection_helper::Error");

        builder.field("kind", &self.inner.kind);

        if let Some(ref source) = self.inner.source {
            builder.field("source", source);
        }

        builder.finish()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.inner.kind {
            Kind::Validation => f.write_str("invalid configuration")?,
            Kind::Connection => f.write_str("connection error")?,
            Kind::Response => f.write_str("response error")?,
            Kind::Unsupported => f.write_str("unsupported by server")?,
            Kind::Client => f.write_str("internal client error")?,
            Kind::Network => f.write_str("network error")?,
            Kind::Tls => f.write_str("tls error")?,
            Kind::Close => f.write_str("error closing connection")?,
            Kind::AlreadyClosed => f.write_str("connection already closed")?,
            Kind::Transient(ref code) => {
                write!(f, "transient error ({code})")?;
            }
            Kind::Permanent(ref code) => {
                write!(f, "permanent error ({code})")?;
            }
        };

        if let Some(ref e) = self.inner.source {
            write!(f, ": {e}")?;
        }

        Ok(())
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.inner.source.as_ref().map(|e| {
            let r: &(dyn std::error::Error + 'static) = &**e;
            r
        })
    }
}

pub(crate) fn code(c: Code, s: Option<String>) -> Error {
    match c.severity() {
        Severity::TransientNegativeCompletion => Error::new(Kind::Transient(c), s),
        Severity::PermanentNegativeCompletion => Error::new(Kind::Permanent(c), s),
        _ => client("Unknown error code"),
    }
}

pub(crate) fn validation<E: Into<BoxError>>(e: E) -> Error {
    Error::new(Kind::Validation, Some(e))
}

pub(crate) fn connection<E: Into<BoxError>>(e: E) -> Error {
    Error::new(Kind::Connection, Some(e))
}

pub(crate) fn response<E: Into<BoxError>>(e: E) -> Error {
    Error::new(Kind::Response, Some(e))
}

pub(crate) fn unsupported<E: Into<BoxError>>(e: E) -> Error {
    Error::new(Kind::Unsupported, Some(e))
}

pub(crate) fn client<E: Into<BoxError>>(e: E) -> Error {
    Error::new(Kind::Client, Some(e))
}

pub(crate) fn network<E: Into<BoxError>>(e: E) -> Error {
    Error::new(Kind::Network, Some(e))
}

pub(crate) fn tls<E: Into<BoxError>>(e: E) -> Error {
    Error::new(Kind::Tls, Some(e))
}

pub(crate) fn close<E: Into<BoxError>>(e: E) -> Error {
    Error::new(Kind::Close, Some(e))
}

pub(crate) fn already_closed() -> Error {
    Error::new(Kind::AlreadyClosed, None::<BoxError>)
}
