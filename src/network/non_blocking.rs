use rustls::{ClientConnection, ServerConnection};
use std::{
    io::{self, ErrorKind, Read, Write},
    net::TcpStream,
};

use super::{CommChannel, Stream};

pub struct NonBlockingCommChannel {
    /// to which player (0,1,2)
    pub to: usize,
    pub stream: NonBlockingStream,
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub rounds: usize,
}

pub enum NonBlockingStream {
    Client(rustls::StreamOwned<ClientConnection, TcpStream>),
    Server(rustls::StreamOwned<ServerConnection, TcpStream>),
    Plain(TcpStream),
}

impl NonBlockingStream {
    fn socket(&self) -> &TcpStream {
        match self {
            Self::Client(stream) => &stream.sock,
            Self::Server(stream) => &stream.sock,
            Self::Plain(stream) => stream,
        }
    }

    pub fn from_stream(stream: Stream) -> io::Result<Self> {
        let stream = match stream {
            Stream::Client(stream) => Self::Client(stream),
            Stream::Server(stream) => Self::Server(stream),
            Stream::Plain(stream) => Self::Plain(stream),
        };
        stream.socket().set_nonblocking(true)?;
        Ok(stream)
    }

    pub fn into_stream(self) -> io::Result<Stream> {
        self.socket().set_nonblocking(false)?;
        Ok(match self {
            Self::Client(stream) => Stream::Client(stream),
            Self::Server(stream) => Stream::Server(stream),
            Self::Plain(stream) => Stream::Plain(stream),
        })
    }

    /// True if the TLS layer holds encrypted data that is not yet written to the socket.
    pub fn wants_write(&self) -> bool {
        match self {
            Self::Client(stream) => stream.conn.wants_write(),
            Self::Server(stream) => stream.conn.wants_write(),
            Self::Plain(_) => false,
        }
    }

    pub fn write_tls(&mut self) -> io::Result<usize> {
        match self {
            Self::Client(stream) => stream.conn.write_tls(&mut stream.sock),
            Self::Server(stream) => stream.conn.write_tls(&mut stream.sock),
            Self::Plain(_) => Ok(0),
        }
    }
}

impl NonBlockingCommChannel {
    pub fn from_channel(mut channel: CommChannel) -> io::Result<Self> {
        let stream = channel
            .stream
            .take()
            .ok_or(io::Error::new(ErrorKind::NotConnected, "Stream already closed"))?;
        Ok(Self {
            to: channel.to,
            stream: NonBlockingStream::from_stream(stream)?,
            bytes_sent: channel.bytes_sent,
            bytes_received: channel.bytes_received,
            rounds: channel.rounds,
        })
    }

    pub fn into_channel(self) -> io::Result<CommChannel> {
        Ok(CommChannel {
            to: self.to,
            stream: Some(self.stream.into_stream()?),
            bytes_sent: self.bytes_sent,
            bytes_received: self.bytes_received,
            rounds: self.rounds,
        })
    }
}

impl Read for NonBlockingStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Self::Client(stream) => stream.read(buf),
            Self::Server(stream) => stream.read(buf),
            Self::Plain(stream) => stream.read(buf),
        }
    }
}

impl Write for NonBlockingStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Client(stream) => stream.write(buf),
            Self::Server(stream) => stream.write(buf),
            Self::Plain(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Client(stream) => stream.flush(),
            Self::Server(stream) => stream.flush(),
            Self::Plain(stream) => stream.flush(),
        }
    }
}
