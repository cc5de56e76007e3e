use std::{
    io::{self, Read, Write},
    mem,
    net::{Shutdown, TcpStream, ToSocketAddrs},
};

use rustls::{ClientConnection, StreamOwned};

use super::TlsParameters;
use crate::error::{self, Error};

/// A network stream
#[derive(Debug)]
pub struct NetworkStream {
    inner: InnerNetworkStream,
}

/// Represents the different types of underlying network streams
// usually only one TLS backend at a time is going to be enabled,
// so clippy::large_enum_variant doesn't make sense here
#[allow(clippy::large_enum_variant)]
#[derive(Debug)]
enum InnerNetworkStream {
    /// Plain TCP stream
    Tcp(TcpStream),
    /// Encrypted TCP stream
    Rustls(StreamOwned<ClientConnection, TcpStream>),
    /// Can't be built
    None,
}

impl NetworkStream {
    fn new(inner: InnerNetworkStream) -> Self {
        if let InnerNetworkStream::None = inner {
            debug_assert!(false, "InnerNetworkStream::None must never be built");
        }

        NetworkStream { inner }
    }

    /// Opens a TCP connection to `server`, trying every resolved address in turn
    ///
    /// With TLS parameters the handshake is completed before returning. Any
    /// failure, including a rejected certificate, is a connection error.
    pub fn connect<T: ToSocketAddrs>(
        server: T,
        tls_parameters: Option<&TlsParameters>,
    ) -> Result<NetworkStream, Error> {
        fn try_connect<T: ToSocketAddrs>(server: T) -> Result<TcpStream, Error> {
            let addrs = server.to_socket_addrs().map_err(error::connection)?;

            let mut last_err = None;
            for addr in addrs {
                match TcpStream::connect(addr) {
                    Ok(stream) => return Ok(stream),
                    Err(err) => last_err = Some(err),
                }
            }

            Err(match last_err {
                Some(last_err) => error::connection(last_err),
                None => error::connection("could not resolve to any address"),
            })
        }

        let tcp_stream = try_connect(server)?;
        let inner = match tls_parameters {
            Some(tls_parameters) => InnerNetworkStream::Rustls(
                handshake(tcp_stream, tls_parameters).map_err(error::connection)?,
            ),
            None => InnerNetworkStream::Tcp(tcp_stream),
        };
        Ok(NetworkStream::new(inner))
    }

    /// Wraps the plain stream in TLS, for `STARTTLS`
    pub fn upgrade_tls(&mut self, tls_parameters: &TlsParameters) -> Result<(), Error> {
        match self.inner {
            InnerNetworkStream::Tcp(_) => {
                // get owned TcpStream
                let tcp_stream = mem::replace(&mut self.inner, InnerNetworkStream::None);
                let InnerNetworkStream::Tcp(tcp_stream) = tcp_stream else {
                    return Err(error::client("stream changed while upgrading"));
                };

                let stream = handshake(tcp_stream, tls_parameters).map_err(error::tls)?;
                self.inner = InnerNetworkStream::Rustls(stream);
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Tells if the stream is encrypted
    pub fn is_encrypted(&self) -> bool {
        match self.inner {
            InnerNetworkStream::Tcp(_) | InnerNetworkStream::None => false,
            InnerNetworkStream::Rustls(_) => true,
        }
    }

    /// Shuts down both halves of the stream, after a TLS `close_notify` if encrypted
    pub fn shutdown(&mut self, how: Shutdown) -> io::Result<()> {
        match self.inner {
            InnerNetworkStream::Tcp(ref s) => s.shutdown(how),
            InnerNetworkStream::Rustls(ref mut s) => {
                s.conn.send_close_notify();
                // the peer may already be gone, the TCP shutdown reports that
                let _ = s.conn.complete_io(&mut s.sock);
                s.sock.shutdown(how)
            }
            InnerNetworkStream::None => Err(not_connected()),
        }
    }
}

fn handshake(
    tcp_stream: TcpStream,
    tls_parameters: &TlsParameters,
) -> io::Result<StreamOwned<ClientConnection, TcpStream>> {
    let connection =
        ClientConnection::new(tls_parameters.config(), tls_parameters.server_name())
            .map_err(io::Error::other)?;
    let mut stream = StreamOwned::new(connection, tcp_stream);
    // rustls is lazy, certificate errors must show up here and not on the first write
    while stream.conn.is_handshaking() {
        stream.conn.complete_io(&mut stream.sock)?;
    }
    Ok(stream)
}

fn not_connected() -> io::Error {
    io::Error::new(io::ErrorKind::NotConnected, "stream is not connected")
}

impl Read for NetworkStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.inner {
            InnerNetworkStream::Tcp(ref mut s) => s.read(buf),
            InnerNetworkStream::Rustls(ref mut s) => s.read(buf),
            InnerNetworkStream::None => Err(not_connected()),
        }
    }
}

impl Write for NetworkStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self.inner {
            InnerNetworkStream::Tcp(ref mut s) => s.write(buf),
            InnerNetworkStream::Rustls(ref mut s) => s.write(buf),
            InnerNetworkStream::None => Err(not_connected()),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.inner {
            InnerNetworkStream::Tcp(ref mut s) => s.flush(),
            InnerNetworkStream::Rustls(ref mut s) => s.flush(),
            InnerNetworkStream::None => Err(not_connected()),
        }
    }
}
