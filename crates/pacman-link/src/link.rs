use std::fmt;
use std::io::{ErrorKind, Read, Write};
use std::net::{SocketAddr, TcpStream};

use bytes::Bytes;
use larpix_packet::Packet;
use pacman_frame::{
    message_to_packets, packets_to_message, FrameError, Message, MessageReader, MessageWriter,
    MsgType,
};
use tracing::debug;

use crate::bootstrap::{read_bootstrap, write_bootstrap};
use crate::config::{LinkConfig, Role};
use crate::error::{LinkError, Result};
use crate::state::LinkState;

/// A bootstrapped link streaming whole PACMAN messages.
///
/// After [`Link::close`] the streams are dropped and every operation
/// returns [`LinkError::Closed`].
pub struct Link<R, W> {
    role: Role,
    state: LinkState,
    peer_identity: Option<Bytes>,
    io: Option<(MessageReader<R>, MessageWriter<W>)>,
    config: LinkConfig,
}

/// Link over a TCP stream split with `try_clone`.
pub type TcpLink = Link<TcpStream, TcpStream>;

impl<R, W> fmt::Debug for Link<R, W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Link")
            .field("role", &self.role)
            .field("state", &self.state)
            .field("peer_identity", &self.peer_identity)
            .field("open", &self.io.is_some())
            .finish_non_exhaustive()
    }
}

impl<R: Read, W: Write> Link<R, W> {
    /// Run the bootstrap exchange for `role` and enter `Streaming`.
    ///
    /// The link starts in `Handshaking`; on failure the error is returned
    /// and the streams are dropped.
    pub fn establish(
        mut reader: R,
        mut writer: W,
        role: Role,
        config: LinkConfig,
    ) -> Result<Self> {
        let mut state = LinkState::Handshaking;
        let peer_identity = match role {
            Role::Reader => Some(read_bootstrap(
                &mut reader,
                config.max_bootstrap_size,
                config.handshake_timeout,
            )?),
            Role::Emulator => {
                write_bootstrap(&mut writer, &config.identity, config.handshake_timeout)?;
                None
            }
        };
        state.transition(LinkState::Streaming)?;
        debug!(%role, "link streaming");

        Ok(Self {
            role,
            state,
            peer_identity,
            io: Some((
                MessageReader::with_config(reader, config.frame.clone()),
                MessageWriter::with_config(writer, config.frame.clone()),
            )),
            config,
        })
    }

    /// Send one message.
    pub fn send(&mut self, message: &Message) -> Result<()> {
        let (_, writer) = self.io_mut()?;
        writer.send(message)?;
        Ok(())
    }

    /// Pack `packets` into one message of `msg_type` and send it.
    ///
    /// Packets with no word in `msg_type` are dropped. Returns the number of
    /// words sent.
    pub fn send_packets(
        &mut self,
        packets: &[Packet],
        msg_type: MsgType,
        ts_pacman: u32,
    ) -> Result<usize> {
        let message = packets_to_message(packets, msg_type, ts_pacman);
        self.send(&message)?;
        Ok(message.words.len())
    }

    /// Block until the next whole message arrives.
    ///
    /// A socket read timeout surfaces as [`LinkError::Timeout`]; the link
    /// stays usable.
    pub fn recv(&mut self) -> Result<Message> {
        let timeout = self.config.frame.read_timeout;
        let (reader, _) = self.io_mut()?;
        match reader.read_message() {
            Ok(message) => Ok(message),
            Err(FrameError::Io(err))
                if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) =>
            {
                Err(LinkError::Timeout(timeout.unwrap_or_default()))
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Receive one message and unpack its packets.
    pub fn recv_packets(&mut self, io_group: Option<u8>) -> Result<Vec<Packet>> {
        let message = self.recv()?;
        Ok(message_to_packets(&message, io_group))
    }

    /// Enter `Closed` and drop the streams.
    pub fn close(&mut self) -> Result<()> {
        if self.state.is_closed() {
            return Err(LinkError::Closed);
        }
        self.state.transition(LinkState::Closed)?;
        self.io = None;
        debug!(role = %self.role, "link closed");
        Ok(())
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    pub fn role(&self) -> Role {
        self.role
    }

    /// Identity frame body received during bootstrap (reader role only).
    pub fn peer_identity(&self) -> Option<&[u8]> {
        self.peer_identity.as_deref()
    }

    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    /// Borrow the write half, if the link is still open.
    pub fn writer_ref(&self) -> Option<&W> {
        self.io.as_ref().map(|(_, writer)| writer.get_ref())
    }

    fn io_mut(&mut self) -> Result<&mut (MessageReader<R>, MessageWriter<W>)> {
        self.io.as_mut().ok_or(LinkError::Closed)
    }
}

impl TcpLink {
    /// Split `stream`, bootstrap under the handshake timeout, then apply
    /// the streaming timeouts from `config.frame`.
    pub fn from_tcp(stream: TcpStream, role: Role, config: LinkConfig) -> Result<Self> {
        stream.set_nodelay(true)?;
        stream.set_read_timeout(Some(config.handshake_timeout))?;
        stream.set_write_timeout(Some(config.handshake_timeout))?;
        let reader = stream.try_clone()?;

        let read_timeout = config.frame.read_timeout;
        let write_timeout = config.frame.write_timeout;
        let link = Link::establish(reader, stream, role, config)?;
        if let Some(stream) = link.writer_ref() {
            stream.set_read_timeout(read_timeout)?;
            stream.set_write_timeout(write_timeout)?;
        }
        Ok(link)
    }

    /// Remote address of the underlying socket.
    pub fn peer_addr(&self) -> Result<SocketAddr> {
        let stream = self.writer_ref().ok_or(LinkError::Closed)?;
        Ok(stream.peer_addr()?)
    }
}
