use std::net::{SocketAddr, TcpListener, ToSocketAddrs};
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::debug;

use crate::config::{LinkConfig, Role};
use crate::error::Result;
use crate::link::{Link, TcpLink};

/// Accepts readers on behalf of an emulated PACMAN card.
///
/// Every accepted link plays [`Role::Emulator`]: it sends the bootstrap
/// frames and is then ready to stream.
pub struct LinkListener {
    listener: TcpListener,
    config: LinkConfig,
    next_link_id: AtomicU64,
}

impl LinkListener {
    /// Bind a TCP listener.
    pub fn bind(addr: impl ToSocketAddrs) -> Result<Self> {
        let listener = TcpListener::bind(addr)?;
        Ok(Self {
            listener,
            config: LinkConfig::default(),
            next_link_id: AtomicU64::new(1),
        })
    }

    /// Override link config for accepted links.
    pub fn with_config(mut self, config: LinkConfig) -> Self {
        self.config = config;
        self
    }

    /// Accept the next reader and send it the bootstrap frames.
    pub fn accept(&self) -> Result<TcpLink> {
        let id = self.next_link_id.fetch_add(1, Ordering::Relaxed);
        let (stream, peer) = self.listener.accept()?;
        debug!(link = id, %peer, "accepted reader");
        Link::from_tcp(stream, Role::Emulator, self.config.clone())
    }

    /// Bound local address.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn config(&self) -> &LinkConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use larpix_packet::{ChipKey, Packet, PacketV2};
    use pacman_frame::MsgType;

    use super::*;
    use crate::connector::connect_with_config;
    use crate::state::LinkState;

    fn data_packets(count: u8) -> Vec<Packet> {
        (0..count)
            .map(|channel| {
                let mut packet = PacketV2::new();
                packet.set_chip_key(Some(ChipKey::new(1, 3, 12)));
                packet.set_channel_id(channel);
                packet.assign_parity();
                packet.into()
            })
            .collect()
    }

    #[test]
    fn accept_returns_emulator_link() {
        let listener = LinkListener::bind("127.0.0.1:0")
            .expect("listener should bind")
            .with_config(LinkConfig::default().with_identity(*b"tile-3"));
        let addr = listener.local_addr().expect("listener should have address");

        let server = thread::spawn(move || {
            let mut link = listener.accept().expect("listener should accept");
            assert_eq!(link.role(), Role::Emulator);
            assert_eq!(link.state(), LinkState::Streaming);
            link.send_packets(&data_packets(4), MsgType::Data, 99)
                .expect("packets should send");
            link.close().expect("close should succeed");
        });

        let mut reader =
            connect_with_config(&addr.to_string(), Role::Reader, LinkConfig::default())
                .expect("reader should connect");
        assert_eq!(reader.peer_identity(), Some(&b"tile-3"[..]));
        assert!(reader.peer_addr().is_ok());

        let packets = reader.recv_packets(Some(1)).expect("packets should arrive");
        server.join().expect("server thread should complete");

        assert_eq!(packets.len(), 5);
        assert!(matches!(packets[0], Packet::Timestamp(_)));
        assert_eq!(&packets[1..], data_packets(4).as_slice());
    }

    #[test]
    fn accepts_several_readers() {
        let listener = LinkListener::bind("127.0.0.1:0").expect("listener should bind");
        let addr = listener
            .local_addr()
            .expect("listener should have address")
            .to_string();

        let server = thread::spawn(move || {
            for _ in 0..2 {
                let mut link = listener.accept().expect("listener should accept");
                link.send_packets(&data_packets(1), MsgType::Data, 0)
                    .expect("packets should send");
            }
        });

        for _ in 0..2 {
            let mut reader = connect_with_config(&addr, Role::Reader, LinkConfig::default())
                .expect("reader should connect");
            let packets = reader.recv_packets(None).expect("packets should arrive");
            assert_eq!(packets.len(), 2);
        }
        server.join().expect("server thread should complete");
    }
}
