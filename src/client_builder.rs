use crate::conn::Connection;
use crate::{Client, Result};
use log::debug;
use std::io::{Read, Write};
use std::net::TcpStream;
use std::time::Duration;

#[cfg(feature = "native-tls")]
use native_tls::TlsConnector;
#[cfg(feature = "rustls-tls")]
use rustls_connector::RustlsConnector;

/// The well-known port for POP3 over plain TCP.
pub const POP3_PORT: u16 = 110;
/// The well-known port for POP3 over implicit TLS.
pub const POP3S_PORT: u16 = 995;

/// The connection mode we are going to use
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConnectionMode {
    /// Plaintext TCP. Credentials travel unencrypted!
    Plaintext,
    /// Implicit TLS: the handshake happens before the greeting.
    #[cfg(any(feature = "native-tls", feature = "rustls-tls"))]
    Tls,
}

impl ConnectionMode {
    /// The conventional port for this mode.
    pub fn default_port(self) -> u16 {
        match self {
            ConnectionMode::Plaintext => POP3_PORT,
            #[cfg(any(feature = "native-tls", feature = "rustls-tls"))]
            ConnectionMode::Tls => POP3S_PORT,
        }
    }
}

/// The TLS backend to use, if any.
#[cfg(any(feature = "native-tls", feature = "rustls-tls"))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum TlsKind {
    /// Use the native-tls backend.
    #[cfg(feature = "native-tls")]
    Native,
    /// Use the rustls backend.
    #[cfg(feature = "rustls-tls")]
    Rust,
}

#[cfg(any(feature = "native-tls", feature = "rustls-tls"))]
impl Default for TlsKind {
    #[cfg(feature = "native-tls")]
    fn default() -> Self {
        TlsKind::Native
    }

    #[cfg(not(feature = "native-tls"))]
    fn default() -> Self {
        TlsKind::Rust
    }
}

/// A convenience builder for [`Client`] structs over various transports.
///
/// Creating a [`Client`] over implicit TLS is straightforward:
/// ```no_run
/// # use pop3_browse::{ClientBuilder, ConnectionMode};
/// # fn main() -> Result<(), pop3_browse::Error> {
/// let client = ClientBuilder::new("pop.example.com", 995)
///     .mode(ConnectionMode::Tls)
///     .connect()?;
/// # Ok(())
/// # }
/// ```
///
/// The returned client has already read the server greeting.
pub struct ClientBuilder<D>
where
    D: AsRef<str>,
{
    domain: D,
    port: u16,
    mode: ConnectionMode,
    #[cfg(any(feature = "native-tls", feature = "rustls-tls"))]
    tls_kind: TlsKind,
    #[cfg(any(feature = "native-tls", feature = "rustls-tls"))]
    skip_tls_verify: bool,
    timeout: Option<Duration>,
}

impl<D> ClientBuilder<D>
where
    D: AsRef<str>,
{
    /// Make a new `ClientBuilder` using the given domain and port.
    ///
    /// The connection mode defaults to plaintext.
    pub fn new(domain: D, port: u16) -> Self {
        ClientBuilder {
            domain,
            port,
            mode: ConnectionMode::Plaintext,
            #[cfg(any(feature = "native-tls", feature = "rustls-tls"))]
            tls_kind: TlsKind::default(),
            #[cfg(any(feature = "native-tls", feature = "rustls-tls"))]
            skip_tls_verify: false,
            timeout: None,
        }
    }

    /// Sets the connection mode.
    pub fn mode(&mut self, mode: ConnectionMode) -> &mut Self {
        self.mode = mode;
        self
    }

    /// Sets the TLS backend used when the mode is [`ConnectionMode::Tls`].
    #[cfg(any(feature = "native-tls", feature = "rustls-tls"))]
    pub fn tls_kind(&mut self, kind: TlsKind) -> &mut Self {
        self.tls_kind = kind;
        self
    }

    /// Controls the use of certificate validation.
    ///
    /// Defaults to `false`. Only the native-tls backend honors this.
    ///
    /// # Warning
    ///
    /// You should only use this as a last resort as it allows another server to impersonate
    /// the server you think you're talking to, which would include being able to receive your
    /// credentials.
    #[cfg(any(feature = "native-tls", feature = "rustls-tls"))]
    pub fn danger_skip_tls_verify(&mut self, skip_tls_verify: bool) -> &mut Self {
        self.skip_tls_verify = skip_tls_verify;
        self
    }

    /// Applies a read and write timeout to the socket.
    ///
    /// Without a timeout a server that stops answering blocks every call forever.
    pub fn timeout(&mut self, timeout: Duration) -> &mut Self {
        self.timeout = Some(timeout);
        self
    }

    /// Connects, performs the TLS handshake if the mode asks for one, and reads the greeting.
    pub fn connect(&mut self) -> Result<Client<Connection>> {
        match self.mode {
            ConnectionMode::Plaintext => {
                self.connect_with(|_domain, tcp| Ok(Box::new(tcp) as Connection))
            }
            #[cfg(any(feature = "native-tls", feature = "rustls-tls"))]
            ConnectionMode::Tls => {
                let kind = self.tls_kind;
                let skip_tls_verify = self.skip_tls_verify;
                self.connect_with(|domain, tcp| tls_handshake(kind, skip_tls_verify, domain, tcp))
            }
        }
    }

    /// Make a [`Client`] using a custom initialization of the TCP stream. This function is
    /// intended to be used if your TLS setup requires custom work such as adding private CAs
    /// or other specific TLS parameters.
    ///
    /// The `handshake` argument should accept two parameters:
    ///
    /// - domain: [`&str`]
    /// - tcp: [`TcpStream`]
    ///
    /// and yield a `Result<C>` where `C` is `Read + Write`. The greeting is read from the
    /// returned stream.
    pub fn connect_with<F, C>(&mut self, handshake: F) -> Result<Client<C>>
    where
        F: FnOnce(&str, TcpStream) -> Result<C>,
        C: Read + Write,
    {
        let domain = self.domain.as_ref();
        let tcp = TcpStream::connect((domain, self.port))?;
        if let Some(timeout) = self.timeout {
            tcp.set_read_timeout(Some(timeout))?;
            tcp.set_write_timeout(Some(timeout))?;
        }

        let stream = handshake(domain, tcp)?;
        let mut client = Client::new(stream);
        client.read_greeting()?;
        debug!("connected to {}:{} ({:?})", domain, self.port, self.mode);
        Ok(client)
    }
}

#[cfg(any(feature = "native-tls", feature = "rustls-tls"))]
fn tls_handshake(
    kind: TlsKind,
    skip_tls_verify: bool,
    domain: &str,
    tcp: TcpStream,
) -> Result<Connection> {
    match kind {
        #[cfg(feature = "native-tls")]
        TlsKind::Native => {
            let mut builder = TlsConnector::builder();
            if skip_tls_verify {
                builder
                    .danger_accept_invalid_certs(true)
                    .danger_accept_invalid_hostnames(true);
            }
            let ssl_conn = builder.build()?;
            Ok(Box::new(ssl_conn.connect(domain, tcp)?) as Connection)
        }
        #[cfg(feature = "rustls-tls")]
        TlsKind::Rust => {
            if skip_tls_verify {
                log::warn!("certificate verification cannot be disabled with rustls");
            }
            let ssl_conn = RustlsConnector::new_with_native_certs()?;
            Ok(Box::new(ssl_conn.connect(domain, tcp)?) as Connection)
        }
    }
}
