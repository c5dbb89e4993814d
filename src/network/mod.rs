//! Pair-wise connections between the three parties.
//!
//! Channels are TLS 1.3 with mutual authentication. For local testing a [Config] can be created
//! without certificates, the channels then use plain TCP.
use rustls::pki_types::{CertificateDer, PrivateKeyDer, ServerName};
use rustls::server::WebPkiClientVerifier;
use rustls::{
    ClientConfig, ClientConnection, RootCertStore, ServerConfig, ServerConnection, StreamOwned,
};
use serde::Deserialize;
use std::borrow::Borrow;
use std::fs::File;
use std::io::{self, BufReader, ErrorKind, Read, Write};
use std::net::{IpAddr, Ipv4Addr, Shutdown, TcpListener, TcpStream};
use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

mod non_blocking;
mod receiver;
pub mod task;

pub use receiver::{NetVectorReceiver, SliceReceiver, VecReceiver};

/// Types that can be sent over a [CommChannel].
pub trait NetSerializable: Sized {
    /// Returns the size in byte of a serialization of n_elements many elements
    fn serialized_size(n_elements: usize) -> usize;

    /// Serializes the elements
    fn as_byte_vec(it: impl IntoIterator<Item = impl Borrow<Self>>, len: usize) -> Vec<u8>;

    /// Deserializes elements from a byte vector
    fn from_byte_vec(v: Vec<u8>, len: usize) -> Vec<Self>;
}

/// The certificates and the private key used to authenticate the channels.
struct TlsIdentity {
    player_certs: Vec<CertificateDer<'static>>,
    my_cert: CertificateDer<'static>,
    my_key: PrivateKeyDer<'static>,
}

/// The network configuration of a party.
pub struct Config {
    player_addr: Vec<Ipv4Addr>,
    player_ports: Vec<u16>,
    tls: Option<TlsIdentity>,
}

/// The serialized network information for one party.
#[derive(Debug, Clone, Deserialize)]
pub struct SerializedPartyConfig {
    pub address: Ipv4Addr,
    pub port: u16,
    pub certificate: Option<String>,
    pub private_key: Option<String>,
}

impl Config {
    /// Creates a new network configuration for a party
    ///
    /// The inputs are
    /// - `player_addr` - the IP addresses of all parties
    /// - `player_ports` - the ports of all parties
    /// - `player_certs` - the TLS certificates of all parties
    /// - `my_cert` - the TLS certificate of the local party
    /// - `my_key` - the TLS private key of the local party
    pub fn new(
        player_addr: Vec<Ipv4Addr>,
        player_ports: Vec<u16>,
        player_certs: Vec<CertificateDer<'static>>,
        my_cert: CertificateDer<'static>,
        my_key: PrivateKeyDer<'static>,
    ) -> Self {
        Self {
            player_addr,
            player_ports,
            tls: Some(TlsIdentity {
                player_certs,
                my_cert,
                my_key,
            }),
        }
    }

    /// Creates a configuration whose channels are not encrypted nor authenticated.
    pub fn new_insecure(player_addr: Vec<Ipv4Addr>, player_ports: Vec<u16>) -> Self {
        Self {
            player_addr,
            player_ports,
            tls: None,
        }
    }

    pub fn is_insecure(&self) -> bool {
        self.tls.is_none()
    }

    fn load_certificate_from_file(base_dir: &Path, cert_path: &str) -> io::Result<CertificateDer<'static>> {
        let path = base_dir.join(cert_path);
        let mut reader = BufReader::new(File::open(&path)?);
        let mut certs = rustls_pemfile::certs(&mut reader).collect::<io::Result<Vec<_>>>()?;
        if certs.len() != 1 {
            return Err(io::Error::new(
                ErrorKind::InvalidData,
                format!(
                    "Found {} certificates in {}, expected 1",
                    certs.len(),
                    path.display()
                ),
            ));
        }
        Ok(certs.remove(0))
    }

    fn load_private_key_from_file(base_dir: &Path, key_path: &str) -> io::Result<PrivateKeyDer<'static>> {
        let path = base_dir.join(key_path);
        let mut reader = BufReader::new(File::open(&path)?);
        rustls_pemfile::private_key(&mut reader)?.ok_or(io::Error::new(
            ErrorKind::InvalidData,
            format!("Invalid private key in {}", path.display()),
        ))
    }

    /// Builds the configuration of party `party_index` from the serialized entries of all three
    /// parties. Certificate and key paths are resolved relative to `base_dir`.
    pub fn from_serialized(
        party_index: usize,
        parties: &[SerializedPartyConfig],
        insecure: bool,
        base_dir: &Path,
    ) -> io::Result<Self> {
        if parties.len() != 3 {
            return Err(io::Error::new(
                ErrorKind::InvalidData,
                format!("Expected 3 parties, found {}", parties.len()),
            ));
        }
        if party_index >= 3 {
            return Err(io::Error::new(
                ErrorKind::InvalidData,
                format!("Invalid party_index: {}; must be 0 <= party_index <= 2", party_index),
            ));
        }
        let player_addr = parties.iter().map(|p| p.address).collect();
        let player_ports = parties.iter().map(|p| p.port).collect();
        if insecure {
            return Ok(Self::new_insecure(player_addr, player_ports));
        }

        let player_certs = parties
            .iter()
            .enumerate()
            .map(|(i, p)| match &p.certificate {
                Some(cert) => Self::load_certificate_from_file(base_dir, cert),
                None => Err(io::Error::new(
                    ErrorKind::InvalidData,
                    format!("No \"certificate\" field found for party {}", i),
                )),
            })
            .collect::<io::Result<Vec<_>>>()?;
        let key_path = parties[party_index].private_key.as_ref().ok_or(io::Error::new(
            ErrorKind::InvalidData,
            format!("No \"private_key\" field found for party {}", party_index),
        ))?;
        let key = Self::load_private_key_from_file(base_dir, key_path)?;
        let my_cert = player_certs[party_index].clone();
        Ok(Self::new(player_addr, player_ports, player_certs, my_cert, key))
    }
}

impl Clone for Config {
    fn clone(&self) -> Self {
        Self {
            player_addr: self.player_addr.clone(),
            player_ports: self.player_ports.clone(),
            tls: self.tls.as_ref().map(|tls| TlsIdentity {
                player_certs: tls.player_certs.clone(),
                my_cert: tls.my_cert.clone(),
                my_key: tls.my_key.clone_key(),
            }),
        }
    }
}

/// A communication channel between the local party and another party.
pub struct CommChannel {
    /// Defines the party on the other end.
    ///
    /// Permissible are `0,1,2`
    pub to: usize,
    stream: Option<Stream>,
    bytes_sent: u64,
    bytes_received: u64,
    rounds: usize,
}

/// The connection used as part of a [CommChannel].
pub enum Stream {
    /// TLS connection as a client.
    Client(StreamOwned<ClientConnection, TcpStream>),
    /// TLS connection as a server.
    Server(StreamOwned<ServerConnection, TcpStream>),
    /// Unencrypted connection, only for testing.
    Plain(TcpStream),
}

impl Stream {
    pub fn as_mut_write(&mut self) -> &mut dyn io::Write {
        match self {
            Stream::Client(stream) => stream,
            Stream::Server(stream) => stream,
            Stream::Plain(stream) => stream,
        }
    }

    pub fn as_mut_read(&mut self) -> &mut dyn io::Read {
        match self {
            Stream::Client(stream) => stream,
            Stream::Server(stream) => stream,
            Stream::Plain(stream) => stream,
        }
    }

    fn socket(&self) -> &TcpStream {
        match self {
            Stream::Client(stream) => &stream.sock,
            Stream::Server(stream) => &stream.sock,
            Stream::Plain(stream) => stream,
        }
    }

    /// Drives the TLS handshake to completion, blocking.
    pub fn complete_handshake_blocking(&mut self) -> io::Result<()> {
        match self {
            Self::Client(stream) => stream.conn.complete_io(&mut stream.sock).map(|_| ()),
            Self::Server(stream) => stream.conn.complete_io(&mut stream.sock).map(|_| ()),
            Self::Plain(_) => Ok(()),
        }
    }

    /// Closes the connection.
    pub fn teardown(self) -> io::Result<()> {
        match self {
            Self::Client(mut stream) => {
                stream.conn.send_close_notify();
                while stream.conn.wants_write() {
                    stream.conn.write_tls(&mut stream.sock)?;
                }
            }
            Self::Server(mut stream) => {
                stream.conn.send_close_notify();
                while stream.conn.wants_write() {
                    stream.conn.write_tls(&mut stream.sock)?;
                }
            }
            Self::Plain(stream) => match stream.shutdown(Shutdown::Both) {
                Err(err) if err.kind() != ErrorKind::NotConnected => return Err(err),
                _ => (),
            },
        }
        Ok(())
    }
}

fn tls_error(err: rustls::Error) -> io::Error {
    io::Error::new(ErrorKind::InvalidData, err)
}

impl CommChannel {
    fn new_server_config(
        client_cert: &CertificateDer,
        my_cert: &CertificateDer<'static>,
        my_key: PrivateKeyDer<'static>,
    ) -> io::Result<ServerConfig> {
        let mut root_store = RootCertStore::empty();
        root_store.add(client_cert.clone()).map_err(tls_error)?;
        let client_verifier = WebPkiClientVerifier::builder(root_store.into())
            .build()
            .map_err(|err| io::Error::new(ErrorKind::InvalidData, err))?;
        ServerConfig::builder_with_protocol_versions(&[&rustls::version::TLS13])
            .with_client_cert_verifier(client_verifier)
            .with_single_cert(vec![my_cert.clone()], my_key)
            .map_err(tls_error)
    }

    fn new_client_config(
        server_cert: &CertificateDer,
        my_cert: &CertificateDer<'static>,
        my_key: PrivateKeyDer<'static>,
    ) -> io::Result<ClientConfig> {
        let mut root_store = RootCertStore::empty();
        root_store.add(server_cert.clone()).map_err(tls_error)?;
        ClientConfig::builder_with_protocol_versions(&[&rustls::version::TLS13])
            .with_root_certificates(root_store)
            .with_client_auth_cert(vec![my_cert.clone()], my_key)
            .map_err(tls_error)
    }

    fn new(to: usize, stream: Stream) -> Self {
        Self {
            to,
            stream: Some(stream),
            bytes_sent: 0,
            bytes_received: 0,
            rounds: 0,
        }
    }

    fn accept(server_socket: &TcpListener, timeout: Option<Duration>) -> io::Result<TcpStream> {
        server_socket.set_nonblocking(true)?;
        let start_time = Instant::now();
        let sock = loop {
            match server_socket.accept() {
                Ok((sock, _)) => break Ok(sock),
                Err(io_err) if io_err.kind() == ErrorKind::WouldBlock => (),
                Err(io_err) => break Err(io_err),
            }
            if let Some(timeout) = timeout {
                if start_time.elapsed() >= timeout {
                    break Err(io::Error::new(
                        ErrorKind::TimedOut,
                        format!("No connection after {}s", timeout.as_secs_f32()),
                    ));
                }
            }
            thread::sleep(Duration::from_millis(10));
        };
        server_socket.set_nonblocking(false)?;
        let sock = sock?;
        sock.set_nonblocking(false)?;
        Ok(sock)
    }

    /// Establishes a new communication channel where the local party acts as server.
    pub fn new_server(
        config: &Config,
        server_socket: &TcpListener,
        to: usize,
        timeout: Option<Duration>,
    ) -> io::Result<Self> {
        let sock = Self::accept(server_socket, timeout)?;
        sock.set_nodelay(true)?;
        let stream = match &config.tls {
            Some(tls) => {
                let server_config = Self::new_server_config(
                    &tls.player_certs[to],
                    &tls.my_cert,
                    tls.my_key.clone_key(),
                )?;
                let conn = ServerConnection::new(Arc::new(server_config)).map_err(tls_error)?;
                Stream::Server(StreamOwned::new(conn, sock))
            }
            None => Stream::Plain(sock),
        };
        Ok(Self::new(to, stream))
    }

    /// Establishes a new communication channel where the local party acts as client.
    pub fn new_client(config: &Config, to: usize, timeout: Option<Duration>) -> io::Result<Self> {
        let addr = config.player_addr[to];
        let port = config.player_ports[to];
        // try to connect in a loop until timeout is reached (if timeout is None, try forever)
        let start_time = Instant::now();
        let sock = loop {
            match TcpStream::connect((addr, port)) {
                Ok(sock) => break Ok(sock),
                Err(io_err) if io_err.kind() == ErrorKind::ConnectionRefused => (),
                Err(io_err) => break Err(io_err),
            }
            if let Some(timeout) = timeout {
                if start_time.elapsed() >= timeout {
                    break Err(io::Error::new(
                        ErrorKind::NotConnected,
                        format!(
                            "Cannot connect to {}:{} after {}s",
                            addr,
                            port,
                            timeout.as_secs_f32()
                        ),
                    ));
                }
            }
            thread::sleep(Duration::from_millis(100));
        }?;
        sock.set_nodelay(true)?;
        let stream = match &config.tls {
            Some(tls) => {
                let client_config = Self::new_client_config(
                    &tls.player_certs[to],
                    &tls.my_cert,
                    tls.my_key.clone_key(),
                )?;
                let conn = ClientConnection::new(
                    Arc::new(client_config),
                    ServerName::IpAddress(rustls::pki_types::IpAddr::V4(addr.into())),
                )
                .map_err(tls_error)?;
                Stream::Client(StreamOwned::new(conn, sock))
            }
            None => Stream::Plain(sock),
        };
        Ok(Self::new(to, stream))
    }

    fn stream_mut(&mut self) -> io::Result<&mut Stream> {
        self.stream
            .as_mut()
            .ok_or(io::Error::new(ErrorKind::NotConnected, "Connection was closed"))
    }

    /// Bounds blocking reads and writes on this channel.
    pub fn set_timeout(&mut self, timeout: Option<Duration>) -> io::Result<()> {
        let sock = self.stream_mut()?.socket();
        sock.set_read_timeout(timeout)?;
        sock.set_write_timeout(timeout)
    }

    pub fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.bytes_sent += bytes.len() as u64;
        self.rounds += 1;
        let stream = self.stream_mut()?.as_mut_write();
        stream.write_all(bytes)?;
        stream.flush()
    }

    pub fn read(&mut self, buffer: &mut [u8]) -> io::Result<()> {
        self.bytes_received += buffer.len() as u64;
        self.rounds += 1;
        self.stream_mut()?.as_mut_read().read_exact(buffer)
    }

    pub fn get_bytes_sent(&self) -> u64 {
        self.bytes_sent
    }

    pub fn get_bytes_received(&self) -> u64 {
        self.bytes_received
    }

    pub fn get_rounds(&self) -> usize {
        self.rounds
    }

    /// Closes the communication channel properly. This may block if data needs to be written
    pub fn teardown(&mut self) -> io::Result<()> {
        match self.stream.take() {
            Some(stream) => stream.teardown(),
            None => Ok(()),
        }
    }

    fn handshake_as_client(&mut self, my_index: usize) -> io::Result<()> {
        self.stream_mut()?.complete_handshake_blocking()?;
        self.write(&[my_index as u8])
    }

    fn handshake_as_server(&mut self) -> io::Result<()> {
        self.stream_mut()?.complete_handshake_blocking()?;
        let mut peer = [0u8; 1];
        self.read(&mut peer)?;
        if peer[0] as usize != self.to {
            return Err(io::Error::new(
                ErrorKind::InvalidData,
                format!("Expected P{} to connect, but P{} did", self.to, peer[0]),
            ));
        }
        Ok(())
    }
}

/// The communication interface of a party.
pub struct ConnectedParty {
    /// The party's index `i`.
    pub i: usize,
    /// The network configuration.
    pub config: Config,
    /// Channel to party `i+1`.
    pub comm_next: CommChannel,
    /// Channel to party `i-1`.
    pub comm_prev: CommChannel,
}

impl ConnectedParty {
    /// Establishes the basic network interface and connects to the other parties.
    ///
    /// The inputs are
    /// - `i` - the party's index
    /// - `config` - the network configuration
    /// - `timeout` - an optional timeout value
    pub fn bind_and_connect(
        i: usize,
        config: Config,
        timeout: Option<Duration>,
    ) -> io::Result<Self> {
        let party = CreatedParty::bind(i, IpAddr::V4(config.player_addr[i]), config.player_ports[i])?;
        CreatedParty::connect(party, config, timeout)
    }
}

/// The basic network interface of a party
pub struct CreatedParty {
    i: usize,
    server_socket: TcpListener,
}

impl CreatedParty {
    /// Binds the interface of party to the given address and port.
    ///
    /// This function also defines the index of the party.
    pub fn bind(i: usize, addr: IpAddr, port: u16) -> io::Result<Self> {
        let listener = TcpListener::bind((addr, port))?;
        Ok(Self {
            i,
            server_socket: listener,
        })
    }

    /// Returns the port of the [CreatedParty].
    pub fn port(&self) -> io::Result<u16> {
        self.server_socket
            .local_addr()
            .map(|socket_addr| socket_addr.port())
    }

    /// Establishes a connection with the other parties
    ///
    /// Party `i` acts as server for party `i+1`, except that party 2 waits for party 0. The
    /// connections are made in the order (0,1), (0,2), (1,2).
    pub fn connect(self, config: Config, timeout: Option<Duration>) -> io::Result<ConnectedParty> {
        let (comm_next, comm_prev) = match self.i {
            0 => {
                let mut server01 = CommChannel::new_server(&config, &self.server_socket, 1, timeout)?;
                server01.handshake_as_server()?;
                let mut client02 = CommChannel::new_client(&config, 2, timeout)?;
                client02.handshake_as_client(0)?;
                (server01, client02)
            }
            1 => {
                let mut client01 = CommChannel::new_client(&config, 0, timeout)?;
                client01.handshake_as_client(1)?;
                let mut server12 = CommChannel::new_server(&config, &self.server_socket, 2, timeout)?;
                server12.handshake_as_server()?;
                (server12, client01)
            }
            2 => {
                let mut server02 = CommChannel::new_server(&config, &self.server_socket, 0, timeout)?;
                server02.handshake_as_server()?;
                let mut client12 = CommChannel::new_client(&config, 1, timeout)?;
                client12.handshake_as_client(2)?;
                (server02, client12)
            }
            i => {
                return Err(io::Error::new(
                    ErrorKind::InvalidInput,
                    format!("Invalid party index {}", i),
                ))
            }
        };
        log::debug!("P{} connected to P{} and P{}", self.i, comm_next.to, comm_prev.to);
        Ok(ConnectedParty {
            i: self.i,
            config,
            comm_next,
            comm_prev,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::io::ErrorKind;
    use std::net::{IpAddr, Ipv4Addr};
    use std::time::Duration;

    use crate::party::test_export::localhost_connect;

    use super::{Config, ConnectedParty, CreatedParty};

    #[test]
    fn correct_channel_connection() {
        let f1 = |mut p: ConnectedParty| {
            p.comm_next.write("P12".as_bytes()).unwrap();
            let mut buf = [0u8; 3];
            p.comm_prev.read(&mut buf).unwrap();
            assert_eq!(&buf, "P31".as_bytes());
        };
        let f2 = |mut p: ConnectedParty| {
            p.comm_next.write("P23".as_bytes()).unwrap();
            let mut buf = [0u8; 3];
            p.comm_prev.read(&mut buf).unwrap();
            assert_eq!(&buf, "P12".as_bytes());
        };
        let f3 = |mut p: ConnectedParty| {
            p.comm_next.write("P31".as_bytes()).unwrap();
            let mut buf = [0u8; 3];
            p.comm_prev.read(&mut buf).unwrap();
            assert_eq!(&buf, "P23".as_bytes());
        };
        localhost_connect(f1, f2, f3);
    }

    #[test]
    fn connect_times_out_without_peers() {
        let localhost = Ipv4Addr::LOCALHOST;
        let party = CreatedParty::bind(0, IpAddr::V4(localhost), 0).unwrap();
        let port = party.port().unwrap();
        let config = Config::new_insecure(vec![localhost; 3], vec![port, 1, 1]);
        match party.connect(config, Some(Duration::from_millis(200))) {
            Err(err) => assert_eq!(err.kind(), ErrorKind::TimedOut),
            Ok(_) => panic!("expected timeout"),
        }
    }

    #[test]
    fn teardown_is_idempotent() {
        let (mut p1, mut p2, mut p3) = localhost_connect(|p| p, |p| p, |p| p);
        for p in [&mut p1, &mut p2, &mut p3] {
            p.comm_next.teardown().unwrap();
            p.comm_prev.teardown().unwrap();
            p.comm_next.teardown().unwrap();
            assert!(p.comm_next.write(&[1]).is_err());
        }
    }
}
