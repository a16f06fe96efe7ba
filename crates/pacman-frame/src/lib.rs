//! PACMAN wire messages.
//!
//! A message is an 8-byte header followed by 16-byte words:
//! - header: message type (`?` REQ, `!` REP, `D` DATA), a 4-byte
//!   little-endian unix timestamp, one reserved byte and a 2-byte
//!   little-endian word count
//! - words: a type byte whose meaning depends on the message type, then a
//!   fixed layout per word type
//!
//! [`packets`] maps LArPix packets onto words and back.

#[cfg(feature = "async")]
pub mod async_codec;
pub mod codec;
pub mod error;
pub mod message;
pub mod packets;
pub mod reader;
pub mod writer;

#[cfg(feature = "async")]
pub use async_codec::PacmanCodec;
pub use codec::{
    decode_message, encode_message, format_header, format_message, format_word, parse_header,
    parse_message, parse_word, words, FrameConfig, Words, DEFAULT_MAX_WORDS, HEADER_SIZE,
    WORD_SIZE,
};
pub use error::{FrameError, Result};
pub use message::{Header, Message, MsgType, Word, WordType};
pub use packets::{format_packets, message_to_packets, packet_word, packets_to_message, parse_packets};
pub use reader::MessageReader;
pub use writer::MessageWriter;
