use std::{
    fmt::Display,
    io::{self, BufRead, BufReader, Write},
    net::Shutdown,
};

#[cfg(feature = "tracing")]
use super::escape_crlf;
use super::{ClientCodec, ConnectionState, ConnectionWrapper, NetworkStream, TlsParameters};
use crate::{
    address::Address,
    error::{self, Error},
    transport::{
        smtp::{
            authentication::{Authenticator, MAX_CHALLENGES},
            commands::{Auth, AuthCancel, AuthResponse, Data, Ehlo, Helo, Mail, Quit, Rcpt, Starttls},
            extension::{ClientId, Extension, MailParameter, ServerInfo},
            response::{parse_response, Response},
        },
        DataChannel, Transport,
    },
};

/// Structure that implements the SMTP client
#[derive(Debug)]
pub struct SmtpConnection {
    /// TCP stream between client and server
    stream: ConnectionWrapper<BufReader<NetworkStream>>,
    /// Information about the server
    server_info: ServerInfo,
    /// Name checked against the certificate presented after `STARTTLS`
    domain: String,
}

impl SmtpConnection {
    /// Wraps a connected stream and reads the server greeting
    ///
    /// Fails unless the server opens with a `220` reply.
    pub fn from_stream(stream: NetworkStream, domain: String) -> Result<SmtpConnection, Error> {
        let mut conn = SmtpConnection {
            stream: ConnectionWrapper::new(BufReader::new(stream)),
            server_info: ServerInfo::default(),
            domain,
        };

        let banner = conn.read_response()?;
        if !banner.has_code(220) {
            return Err(error::response(format!(
                "unexpected greeting code {}",
                banner.code()
            )));
        }
        #[cfg(feature = "tracing")]
        tracing::debug!("server greeting: {}", banner.first_line().unwrap_or_default());
        Ok(conn)
    }

    /// Sends an SMTP command
    pub fn command<C: Display>(&mut self, command: C) -> Result<Response, Error> {
        self.write(command.to_string().as_bytes(), None)?;
        self.read_response()
    }

    /// Sends a command carrying credentials, only its first word is logged
    fn secret_command<C: Display>(&mut self, command: C) -> Result<Response, Error> {
        let line = command.to_string();
        let shown = match line.split_once(' ') {
            Some(("AUTH", rest)) => match rest.split_once(' ') {
                Some((mechanism, _)) => format!("AUTH {mechanism} <redacted>"),
                None => line.trim_end().to_owned(),
            },
            _ => "<redacted>".to_owned(),
        };
        self.write(line.as_bytes(), Some(&shown))?;
        self.read_response()
    }

    /// Writes a string to the server
    fn write(&mut self, string: &[u8], shown: Option<&str>) -> Result<(), Error> {
        self.stream
            .sync_op(|stream| stream.get_mut().write_all(string).map_err(error::network))?;
        self.stream
            .sync_op(|stream| stream.get_mut().flush().map_err(error::network))?;

        #[cfg(feature = "tracing")]
        match shown {
            Some(shown) => tracing::debug!("Wrote: {}", shown),
            None => tracing::debug!("Wrote: {}", escape_crlf(&String::from_utf8_lossy(string))),
        }
        #[cfg(not(feature = "tracing"))]
        let _ = shown;
        Ok(())
    }

    /// Gets the SMTP response
    pub fn read_response(&mut self) -> Result<Response, Error> {
        let mut buffer = String::with_capacity(100);

        while self
            .stream
            .sync_op(|stream| stream.read_line(&mut buffer).map_err(error::network))?
            > 0
        {
            #[cfg(feature = "tracing")]
            tracing::debug!("<< {}", escape_crlf(&buffer));
            match parse_response(&buffer) {
                Ok((_remaining, response)) => {
                    return if response.is_positive() {
                        Ok(response)
                    } else {
                        Err(error::code(
                            response.code(),
                            Some(response.message().collect::<Vec<_>>().join(" ")),
                        ))
                    };
                }
                Err(nom::Err::Failure(e)) | Err(nom::Err::Error(e)) => {
                    self.stream.set_state(ConnectionState::BrokenResponse);
                    return Err(error::response(e.to_string()));
                }
                Err(nom::Err::Incomplete(_)) => { /* read more */ }
            }
        }

        self.stream.set_state(ConnectionState::BrokenConnection);
        Err(error::network(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "connection closed by server",
        )))
    }

    fn shutdown(&mut self) -> Result<(), Error> {
        let result = self.stream.get_mut().get_mut().shutdown(Shutdown::Both);
        self.stream.set_state(ConnectionState::Closed);
        match result {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotConnected => Err(error::already_closed()),
            Err(err) => Err(error::close(err)),
        }
    }
}

impl Transport for SmtpConnection {
    type Data<'a> = DataWriter<'a>;

    /// Sends EHLO and updates server info, falling back to HELO
    fn greet(&mut self, hello: &ClientId) -> Result<(), Error> {
        match self.command(Ehlo::new(hello.clone())) {
            Ok(response) => {
                self.server_info = ServerInfo::from_response(&response)?;
            }
            Err(err) if err.is_permanent() => {
                #[cfg(feature = "tracing")]
                tracing::debug!("EHLO rejected ({}), trying HELO", err);
                let response = self.command(Helo::new(hello.clone()))?;
                self.server_info = ServerInfo::without_extensions(&response);
            }
            Err(err) => return Err(err),
        }

        // Print server information
        #[cfg(feature = "tracing")]
        tracing::debug!("server {}", self.server_info);
        Ok(())
    }

    fn server_info(&self) -> &ServerInfo {
        &self.server_info
    }

    fn is_encrypted(&self) -> bool {
        self.stream.get_ref().get_ref().is_encrypted()
    }

    fn starttls(&mut self, hello: &ClientId) -> Result<(), Error> {
        if !self.server_info.supports_feature(Extension::StartTls) {
            return Err(error::client("STARTTLS is not supported on this server"));
        }

        self.command(Starttls)?;
        // anything already buffered arrived in plaintext and must not be
        // read as if it came through the encrypted channel
        if !self.stream.get_ref().buffer().is_empty() {
            self.stream.set_state(ConnectionState::BrokenResponse);
            return Err(error::tls("server sent data before the TLS handshake"));
        }
        let tls_parameters = TlsParameters::new(self.domain.clone())?;
        self.stream
            .sync_op(|stream| stream.get_mut().upgrade_tls(&tls_parameters))?;
        #[cfg(feature = "tracing")]
        tracing::debug!("connection encrypted");
        // Send EHLO again
        self.greet(hello)
    }

    fn auth(&mut self, authenticator: &Authenticator) -> Result<Response, Error> {
        // Limit challenges to avoid blocking
        let mut challenges = MAX_CHALLENGES;
        let mut response = self.secret_command(Auth::new(authenticator))?;

        while challenges > 0 && response.has_code(334) {
            challenges -= 1;
            let answer = match AuthResponse::new_from_response(authenticator, &response) {
                Ok(answer) => answer,
                Err(err) => {
                    // the server answers the cancellation with an error reply
                    let _ = self.command(AuthCancel);
                    return Err(err);
                }
            };
            response = self.secret_command(answer)?;
        }

        if response.has_code(334) {
            let _ = self.command(AuthCancel);
            Err(error::response("Unexpected number of challenges"))
        } else {
            Ok(response)
        }
    }

    fn mail(&mut self, sender: &Address, parameters: &[MailParameter]) -> Result<Response, Error> {
        self.command(Mail::new(sender.clone(), parameters.to_vec()))
    }

    fn rcpt(&mut self, recipient: &Address) -> Result<Response, Error> {
        self.command(Rcpt::new(recipient.clone()))
    }

    fn data(&mut self) -> Result<DataWriter<'_>, Error> {
        self.command(Data)?;
        Ok(DataWriter {
            connection: self,
            codec: ClientCodec::new(),
        })
    }

    /// Sends QUIT, the stream is shut down once the server acknowledged it
    fn quit(&mut self) -> Result<Response, Error> {
        let response = self.command(Quit)?;
        // the server closes its side anyway
        let _ = self.shutdown();
        Ok(response)
    }

    fn close(&mut self) -> Result<(), Error> {
        if self.stream.state() == ConnectionState::Closed {
            return Err(error::already_closed());
        }
        self.shutdown()
    }
}

/// Writes the message content after `DATA`, with dot-stuffing
#[derive(Debug)]
pub struct DataWriter<'a> {
    connection: &'a mut SmtpConnection,
    codec: ClientCodec,
}

impl Write for DataWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut out_buf = Vec::with_capacity(buf.len());
        self.codec.encode(buf, &mut out_buf);
        self.connection
            .write(&out_buf, None)
            .map_err(io::Error::other)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        // every write already flushes the stream
        Ok(())
    }
}

impl DataChannel for DataWriter<'_> {
    fn finish(mut self) -> Result<Response, Error> {
        let mut out_buf = Vec::with_capacity(5);
        self.codec.finish(&mut out_buf);
        self.connection.write(&out_buf, None)?;
        self.connection.read_response()
    }
}
