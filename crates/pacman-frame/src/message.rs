//! Message and word types of the PACMAN protocol.

use std::fmt;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;

use crate::error::{FrameError, Result};

/// Kind of message, the first header byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MsgType {
    /// Request to the card.
    Req,
    /// Reply from the card.
    Rep,
    /// Unsolicited data from the card.
    Data,
}

impl MsgType {
    pub const fn code(self) -> u8 {
        match self {
            MsgType::Req => b'?',
            MsgType::Rep => b'!',
            MsgType::Data => b'D',
        }
    }

    pub fn from_code(code: u8) -> Result<Self> {
        match code {
            b'?' => Ok(MsgType::Req),
            b'!' => Ok(MsgType::Rep),
            b'D' => Ok(MsgType::Data),
            other => Err(FrameError::UnknownMessageType(other)),
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            MsgType::Req => "REQ",
            MsgType::Rep => "REP",
            MsgType::Data => "DATA",
        }
    }
}

impl fmt::Display for MsgType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for MsgType {
    type Err = String;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        match value.to_ascii_uppercase().as_str() {
            "REQ" => Ok(MsgType::Req),
            "REP" => Ok(MsgType::Rep),
            "DATA" => Ok(MsgType::Data),
            other => Err(format!("unknown message type '{other}' (expected REQ, REP or DATA)")),
        }
    }
}

/// Kind of word. The same byte means different words in different
/// message types (`D` is DATA in a DATA message and TX in REQ/REP).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum WordType {
    Data,
    Trig,
    Sync,
    Ping,
    Write,
    Read,
    Tx,
    Pong,
    Err,
}

impl WordType {
    pub const fn code(self) -> u8 {
        match self {
            WordType::Data | WordType::Tx => b'D',
            WordType::Trig => b'T',
            WordType::Sync => b'S',
            WordType::Ping | WordType::Pong => b'P',
            WordType::Write => b'W',
            WordType::Read => b'R',
            WordType::Err => b'E',
        }
    }

    /// Word type that `code` names inside a `msg_type` message.
    pub fn from_code(msg_type: MsgType, code: u8) -> Result<Self> {
        let word_type = match (msg_type, code) {
            (MsgType::Data, b'D') => WordType::Data,
            (MsgType::Data, b'T') => WordType::Trig,
            (MsgType::Data, b'S') => WordType::Sync,
            (MsgType::Req, b'P') => WordType::Ping,
            (MsgType::Rep, b'P') => WordType::Pong,
            (MsgType::Req | MsgType::Rep, b'W') => WordType::Write,
            (MsgType::Req | MsgType::Rep, b'R') => WordType::Read,
            (MsgType::Req | MsgType::Rep, b'D') => WordType::Tx,
            (MsgType::Rep, b'E') => WordType::Err,
            (msg_type, code) => return Err(FrameError::UnknownWordType { msg_type, code }),
        };
        Ok(word_type)
    }

    /// Whether a `msg_type` message may carry this word type.
    pub fn allowed_in(self, msg_type: MsgType) -> bool {
        WordType::from_code(msg_type, self.code()).is_ok_and(|decoded| decoded == self)
    }

    pub const fn name(self) -> &'static str {
        match self {
            WordType::Data => "DATA",
            WordType::Trig => "TRIG",
            WordType::Sync => "SYNC",
            WordType::Ping => "PING",
            WordType::Write => "WRITE",
            WordType::Read => "READ",
            WordType::Tx => "TX",
            WordType::Pong => "PONG",
            WordType::Err => "ERR",
        }
    }
}

impl fmt::Display for WordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Decoded 8-byte message header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Header {
    pub msg_type: MsgType,
    /// Unix time the card stamped on the message, in seconds.
    pub timestamp: u32,
    pub word_count: u16,
}

impl Header {
    pub fn new(msg_type: MsgType, timestamp: u32, word_count: u16) -> Self {
        Self {
            msg_type,
            timestamp,
            word_count,
        }
    }

    /// Header stamped with the current unix time.
    pub fn now(msg_type: MsgType, word_count: u16) -> Self {
        Self::new(msg_type, unix_now(), word_count)
    }
}

/// One decoded 16-byte word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "word_type", rename_all = "UPPERCASE")]
pub enum Word {
    Data {
        io_channel: u8,
        receipt_timestamp: u32,
        packet: [u8; 8],
    },
    Trig {
        trigger_type: u8,
        timestamp: u32,
    },
    Sync {
        sync_type: u8,
        clk_source: u8,
        timestamp: u32,
    },
    Ping,
    Write {
        address: u32,
        value: u32,
    },
    Read {
        address: u32,
        value: u32,
    },
    Tx {
        io_channel: u8,
        packet: [u8; 8],
    },
    Pong,
    Err {
        code: u8,
        message: [u8; 14],
    },
}

impl Word {
    pub fn word_type(&self) -> WordType {
        match self {
            Word::Data { .. } => WordType::Data,
            Word::Trig { .. } => WordType::Trig,
            Word::Sync { .. } => WordType::Sync,
            Word::Ping => WordType::Ping,
            Word::Write { .. } => WordType::Write,
            Word::Read { .. } => WordType::Read,
            Word::Tx { .. } => WordType::Tx,
            Word::Pong => WordType::Pong,
            Word::Err { .. } => WordType::Err,
        }
    }

    /// ERR word with `text` cut to the 14-byte message field.
    pub fn error(code: u8, text: &str) -> Self {
        let mut message = [0u8; 14];
        let len = text.len().min(message.len());
        message[..len].copy_from_slice(&text.as_bytes()[..len]);
        Word::Err { code, message }
    }
}

/// A header and its words.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    pub header: Header,
    pub words: Vec<Word>,
}

impl Message {
    /// Message stamped with the current unix time.
    ///
    /// Word counts past `u16::MAX` saturate; encoding rejects them.
    pub fn new(msg_type: MsgType, words: Vec<Word>) -> Self {
        Self::at(msg_type, unix_now(), words)
    }

    pub fn at(msg_type: MsgType, timestamp: u32, words: Vec<Word>) -> Self {
        let word_count = u16::try_from(words.len()).unwrap_or(u16::MAX);
        Self {
            header: Header::new(msg_type, timestamp, word_count),
            words,
        }
    }

    pub fn msg_type(&self) -> MsgType {
        self.header.msg_type
    }
}

fn unix_now() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| u32::try_from(elapsed.as_secs()).unwrap_or(u32::MAX))
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_type_codes() {
        for msg_type in [MsgType::Req, MsgType::Rep, MsgType::Data] {
            assert_eq!(MsgType::from_code(msg_type.code()).unwrap(), msg_type);
        }
        assert!(matches!(
            MsgType::from_code(b'x'),
            Err(FrameError::UnknownMessageType(b'x'))
        ));
        assert_eq!("data".parse::<MsgType>().unwrap(), MsgType::Data);
        assert!("nope".parse::<MsgType>().is_err());
    }

    #[test]
    fn shared_codes_resolve_by_message_type() {
        assert_eq!(WordType::from_code(MsgType::Data, b'D').unwrap(), WordType::Data);
        assert_eq!(WordType::from_code(MsgType::Req, b'D').unwrap(), WordType::Tx);
        assert_eq!(WordType::from_code(MsgType::Req, b'P').unwrap(), WordType::Ping);
        assert_eq!(WordType::from_code(MsgType::Rep, b'P').unwrap(), WordType::Pong);
    }

    #[test]
    fn word_tables_per_message_type() {
        assert!(WordType::Err.allowed_in(MsgType::Rep));
        assert!(!WordType::Err.allowed_in(MsgType::Req));
        assert!(!WordType::Trig.allowed_in(MsgType::Req));
        assert!(!WordType::Data.allowed_in(MsgType::Rep));
        assert!(WordType::Tx.allowed_in(MsgType::Rep));
        assert!(matches!(
            WordType::from_code(MsgType::Data, b'W'),
            Err(FrameError::UnknownWordType {
                msg_type: MsgType::Data,
                code: b'W'
            })
        ));
    }

    #[test]
    fn error_word_text_is_cut() {
        let Word::Err { code, message } = Word::error(3, "a very long error message") else {
            panic!("expected an ERR word");
        };
        assert_eq!(code, 3);
        assert_eq!(&message, b"a very long er");
    }

    #[test]
    fn message_counts_words() {
        let message = Message::at(MsgType::Req, 5, vec![Word::Ping, Word::Ping]);
        assert_eq!(message.header, Header::new(MsgType::Req, 5, 2));
        assert!(Message::new(MsgType::Data, Vec::new()).header.timestamp > 0);
    }
}
