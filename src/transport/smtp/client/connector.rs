use super::{NetworkStream, SmtpConnection, TlsParameters};
use crate::error::{self, Error};

/// Where and how to reach the relay
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionRequest {
    host: String,
    port: u16,
    implicit_tls: bool,
    skip_certificate_verification: bool,
}

impl ConnectionRequest {
    /// Creates a request for a plaintext connection, upgraded with `STARTTLS`
    /// when the server offers it
    pub fn new<H: Into<String>>(host: H, port: u16) -> Result<Self, Error> {
        let host = host.into();
        if host.trim().is_empty() {
            return Err(error::validation("host must not be empty"));
        }
        if port == 0 {
            return Err(error::validation("port must be between 1 and 65535"));
        }

        Ok(Self {
            host,
            port,
            implicit_tls: false,
            skip_certificate_verification: false,
        })
    }

    /// Starts TLS right after connecting, as on port 465
    pub fn implicit_tls(mut self, implicit_tls: bool) -> Self {
        self.implicit_tls = implicit_tls;
        self
    }

    /// Accepts any certificate during the implicit TLS handshake
    ///
    /// # Warning
    ///
    /// You should think very carefully before using this method. If
    /// invalid certificates are trusted, *any* certificate for *any* site
    /// will be trusted for use. This includes expired certificates. This
    /// introduces significant vulnerabilities, and should only be used
    /// as a last resort.
    ///
    /// The certificate presented after `STARTTLS` is always verified.
    pub fn dangerous_skip_certificate_verification(mut self, skip: bool) -> Self {
        self.skip_certificate_verification = skip;
        self
    }

    /// Server host name or address
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Server port
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Tells if TLS starts right after connecting
    pub fn is_implicit_tls(&self) -> bool {
        self.implicit_tls
    }

    /// Tells if certificate checks are skipped for implicit TLS
    pub fn skips_certificate_verification(&self) -> bool {
        self.skip_certificate_verification
    }
}

/// Opens the connection described by `request` and reads the server greeting
///
/// Every failure, from name resolution to an unexpected greeting, is a
/// connection error. Nothing is closed here: the returned connection is owned
/// by the caller.
pub fn connect(request: &ConnectionRequest) -> Result<SmtpConnection, Error> {
    let tls_parameters = if request.implicit_tls {
        let parameters = if request.skip_certificate_verification {
            TlsParameters::new_dangerous_no_verify(request.host.clone())
        } else {
            TlsParameters::new(request.host.clone())
        };
        Some(parameters.map_err(error::connection)?)
    } else {
        None
    };

    #[cfg(feature = "tracing")]
    tracing::debug!(
        "connecting to {}:{} ({})",
        request.host,
        request.port,
        if tls_parameters.is_some() {
            "implicit tls"
        } else {
            "plaintext"
        }
    );

    let stream = NetworkStream::connect(
        (request.host.as_str(), request.port),
        tls_parameters.as_ref(),
    )?;
    SmtpConnection::from_stream(stream, request.host.clone()).map_err(error::connection)
}
