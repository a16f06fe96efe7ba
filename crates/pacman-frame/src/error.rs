use larpix_packet::PacketError;

use crate::message::MsgType;

/// Errors that can occur while encoding or decoding PACMAN messages.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The header carries a message type byte that is not REQ, REP or DATA.
    #[error("unknown message type 0x{0:02x}")]
    UnknownMessageType(u8),

    /// The word type byte has no layout within this message type.
    #[error("unknown word type 0x{code:02x} in {msg_type} message")]
    UnknownWordType { msg_type: MsgType, code: u8 },

    /// Fewer bytes than a header or word needs.
    #[error("truncated input ({actual} bytes, need {expected})")]
    Truncated { expected: usize, actual: usize },

    /// The message declares or carries more words than allowed.
    #[error("too many words ({count}, max {max})")]
    TooManyWords { count: usize, max: usize },

    /// An I/O error occurred while reading or writing messages.
    #[error("message I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The stream ended before a complete message was received.
    #[error("connection closed (incomplete message)")]
    ConnectionClosed,

    /// A packet carried by a word could not be built.
    #[error(transparent)]
    Packet(#[from] PacketError),
}

pub type Result<T> = std::result::Result<T, FrameError>;
