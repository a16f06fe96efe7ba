//! Tokio flavour of [`Link`](crate::Link) for async readers.

use std::time::Duration;

use bytes::{Bytes, BytesMut};
use pacman_frame::{Message, PacmanCodec};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_util::codec::{Decoder, Encoder};
use tracing::debug;

use crate::bootstrap::{check_flags, BootstrapFrame, FLAG_LONG, FLAG_MORE};
use crate::config::{LinkConfig, Role};
use crate::error::{LinkError, Result};
use crate::state::LinkState;

const READ_CHUNK_SIZE: usize = 8 * 1024;

/// Async link over a tokio TCP stream.
#[derive(Debug)]
pub struct AsyncLink {
    stream: Option<TcpStream>,
    codec: PacmanCodec,
    read_buf: BytesMut,
    write_buf: BytesMut,
    role: Role,
    state: LinkState,
    peer_identity: Option<Bytes>,
}

impl AsyncLink {
    /// Connect with the retry policy in `config`, then bootstrap.
    pub async fn connect(addr: &str, role: Role, config: LinkConfig) -> Result<Self> {
        let mut state = LinkState::Disconnected;
        state.transition(LinkState::Connecting)?;

        let attempts = config.retry.attempts();
        let mut attempt = 0u32;
        let stream = loop {
            attempt += 1;
            match TcpStream::connect(addr).await {
                Ok(stream) => break stream,
                Err(err) if attempt < attempts => {
                    debug!(addr, attempt, error = %err, "connect failed, retrying");
                    tokio::time::sleep(config.retry.retry_interval).await;
                    state.transition(LinkState::Connecting)?;
                }
                Err(source) => {
                    state.transition(LinkState::Disconnected)?;
                    return Err(LinkError::Connect {
                        addr: addr.to_string(),
                        attempts: attempt,
                        source,
                    });
                }
            }
        };

        state.transition(LinkState::Handshaking)?;
        Self::establish(stream, role, config).await
    }

    /// Bootstrap an already connected stream for `role`.
    pub async fn establish(
        mut stream: TcpStream,
        role: Role,
        config: LinkConfig,
    ) -> Result<Self> {
        stream.set_nodelay(true)?;
        let mut state = LinkState::Handshaking;
        let timeout = config.handshake_timeout;

        let exchange = async {
            match role {
                Role::Reader => read_bootstrap(&mut stream, config.max_bootstrap_size)
                    .await
                    .map(Some),
                Role::Emulator => write_bootstrap(&mut stream, &config.identity)
                    .await
                    .map(|()| None),
            }
        };
        let peer_identity = tokio::time::timeout(timeout, exchange)
            .await
            .map_err(|_| LinkError::Timeout(timeout))??;

        state.transition(LinkState::Streaming)?;
        debug!(%role, "async link streaming");

        Ok(Self {
            stream: Some(stream),
            codec: PacmanCodec::with_max_words(config.frame.max_words),
            read_buf: BytesMut::with_capacity(READ_CHUNK_SIZE),
            write_buf: BytesMut::new(),
            role,
            state,
            peer_identity,
        })
    }

    /// Send one message.
    pub async fn send(&mut self, message: &Message) -> Result<()> {
        let stream = self.stream.as_mut().ok_or(LinkError::Closed)?;
        self.write_buf.clear();
        self.codec.encode(message, &mut self.write_buf)?;
        stream.write_all(&self.write_buf).await?;
        stream.flush().await?;
        Ok(())
    }

    /// Wait for the next whole message.
    pub async fn recv(&mut self) -> Result<Message> {
        let stream = self.stream.as_mut().ok_or(LinkError::Closed)?;
        loop {
            if let Some(message) = self.codec.decode(&mut self.read_buf)? {
                return Ok(message);
            }
            if stream.read_buf(&mut self.read_buf).await? == 0 {
                return Err(pacman_frame::FrameError::ConnectionClosed.into());
            }
        }
    }

    /// [`recv`](Self::recv) bounded by `timeout`.
    pub async fn recv_timeout(&mut self, timeout: Duration) -> Result<Message> {
        tokio::time::timeout(timeout, self.recv())
            .await
            .map_err(|_| LinkError::Timeout(timeout))?
    }

    /// Enter `Closed` and drop the stream.
    pub fn close(&mut self) -> Result<()> {
        if self.state.is_closed() {
            return Err(LinkError::Closed);
        }
        self.state.transition(LinkState::Closed)?;
        self.stream = None;
        Ok(())
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn peer_identity(&self) -> Option<&[u8]> {
        self.peer_identity.as_deref()
    }
}

async fn write_bootstrap(stream: &mut TcpStream, identity: &[u8]) -> Result<()> {
    let mut buf = BytesMut::new();
    BootstrapFrame::new(FLAG_MORE, Bytes::copy_from_slice(identity)).encode(&mut buf);
    BootstrapFrame::new(0, Bytes::new()).encode(&mut buf);
    stream.write_all(&buf).await?;
    stream.flush().await?;
    debug!(identity_len = identity.len(), "sent bootstrap frames");
    Ok(())
}

async fn read_bootstrap(stream: &mut TcpStream, max_size: usize) -> Result<Bytes> {
    let mut identity = Bytes::new();
    for index in 0..2 {
        let body = read_frame(stream, max_size).await?;
        debug!(index, len = body.len(), "received bootstrap frame");
        if index == 0 {
            identity = body;
        }
    }
    Ok(identity)
}

async fn read_frame(stream: &mut TcpStream, max_size: usize) -> Result<Bytes> {
    let mut head = [0u8; 2];
    read_exact(stream, &mut head).await?;
    let flags = head[0];
    check_flags(flags)?;
    let size = if flags & FLAG_LONG != 0 {
        let mut long = [0u8; 8];
        long[0] = head[1];
        read_exact(stream, &mut long[1..]).await?;
        u64::from_be_bytes(long)
    } else {
        u64::from(head[1])
    };
    if size > max_size as u64 {
        return Err(LinkError::Handshake(format!(
            "bootstrap frame too large: {size} (max {max_size})"
        )));
    }
    let mut body = vec![0u8; size as usize];
    read_exact(stream, &mut body).await?;
    Ok(Bytes::from(body))
}

async fn read_exact(stream: &mut TcpStream, buf: &mut [u8]) -> Result<()> {
    match stream.read_exact(buf).await {
        Ok(_) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::UnexpectedEof => Err(LinkError::Handshake(
            "connection closed during bootstrap".to_string(),
        )),
        Err(err) => Err(LinkError::Io(err)),
    }
}
