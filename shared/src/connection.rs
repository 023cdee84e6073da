//! TCP transport for framed messages.

use crate::framing::{encode_frame, FrameDecoder, NetError, LENGTH_PREFIX_SIZE, MAX_FRAME_SIZE};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io;
use std::net::SocketAddr;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};

const READ_CHUNK_SIZE: usize = 16 * 1024;

/// One framed, non-blocking stream to a peer.
#[derive(Debug)]
pub struct Connection {
    stream: TcpStream,
    decoder: FrameDecoder,
    peer_addr: Option<SocketAddr>,
    closed: bool,
}

impl Connection {
    pub fn new(stream: TcpStream) -> Self {
        let peer_addr = stream.peer_addr().ok();
        Self {
            stream,
            decoder: FrameDecoder::new(),
            peer_addr,
            closed: false,
        }
    }

    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer_addr
    }

    /// Returns every complete message that has arrived since the last call.
    ///
    /// Never waits for data: an idle socket yields an empty vector. Frames
    /// that arrived just before the peer closed are still returned; once none
    /// are left the closed stream yields [`NetError::Disconnected`].
    pub fn receive<T: DeserializeOwned>(&mut self) -> Result<Vec<T>, NetError> {
        let mut chunk = [0u8; READ_CHUNK_SIZE];
        while !self.closed && self.decoder.buffered() <= MAX_FRAME_SIZE + LENGTH_PREFIX_SIZE {
            match self.stream.try_read(&mut chunk) {
                Ok(0) => self.closed = true,
                Ok(n) => self.decoder.extend(&chunk[..n]),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) => return Err(e.into()),
            }
        }

        let messages = self.decoder.decode_frames()?;
        if self.closed && messages.is_empty() {
            return Err(NetError::Disconnected);
        }
        Ok(messages)
    }

    /// Frames and writes a single message, flushing it completely.
    pub async fn send<T: Serialize>(&mut self, message: &T) -> Result<(), NetError> {
        let frame = encode_frame(message)?;
        self.stream.write_all(&frame).await?;
        Ok(())
    }

    /// Resolves once the socket has bytes (or EOF) to read.
    pub async fn readable(&self) -> Result<(), NetError> {
        self.stream.readable().await?;
        Ok(())
    }

    /// Shuts down the write half and releases the socket.
    pub async fn close(mut self) -> Result<(), NetError> {
        self.stream.shutdown().await?;
        Ok(())
    }
}

/// Listening side of the transport.
pub struct Server {
    listener: TcpListener,
}

impl Server {
    pub async fn bind(addr: &str) -> Result<Self, NetError> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self { listener })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, NetError> {
        Ok(self.listener.local_addr()?)
    }

    pub async fn accept(&self) -> Result<Connection, NetError> {
        let (stream, _) = self.listener.accept().await?;
        stream.set_nodelay(true)?;
        Ok(Connection::new(stream))
    }
}

/// Connecting side of the transport.
pub struct Client {
    host: String,
    port: u16,
}

impl Client {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    pub async fn connect(&self) -> Result<Connection, NetError> {
        let stream = TcpStream::connect((self.host.as_str(), self.port)).await?;
        stream.set_nodelay(true)?;
        Ok(Connection::new(stream))
    }
}
