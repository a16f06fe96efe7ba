use bytes::{Buf, BufMut, Bytes, BytesMut};
use tracing::warn;

use crate::error::{FrameError, Result};
use crate::message::{Header, Message, MsgType, Word, WordType};

/// Header: type (1) + unix timestamp (4) + reserved (1) + word count (2) = 8 bytes.
pub const HEADER_SIZE: usize = 8;

/// Every word is 16 bytes.
pub const WORD_SIZE: usize = 16;

/// Largest word count a header can declare.
pub const DEFAULT_MAX_WORDS: usize = u16::MAX as usize;

/// Encode a header.
///
/// Wire format (little-endian):
/// ```text
/// ┌──────────┬──────────────┬──────────┬──────────────┐
/// │ Type (1) │ Unix ts (4)  │ Rsvd (1) │ Words (2)    │
/// │ ? ! D    │ u32          │ 0        │ u16          │
/// └──────────┴──────────────┴──────────┴──────────────┘
/// ```
pub fn format_header(header: &Header, dst: &mut BytesMut) {
    dst.reserve(HEADER_SIZE);
    dst.put_u8(header.msg_type.code());
    dst.put_u32_le(header.timestamp);
    dst.put_u8(0);
    dst.put_u16_le(header.word_count);
}

/// Encode one word of a `msg_type` message.
///
/// Fails with [`FrameError::UnknownWordType`] when the message type has no
/// layout for the word.
pub fn format_word(msg_type: MsgType, word: &Word, dst: &mut BytesMut) -> Result<()> {
    let word_type = word.word_type();
    if !word_type.allowed_in(msg_type) {
        return Err(FrameError::UnknownWordType {
            msg_type,
            code: word_type.code(),
        });
    }

    dst.reserve(WORD_SIZE);
    dst.put_u8(word_type.code());
    match *word {
        Word::Data {
            io_channel,
            receipt_timestamp,
            packet,
        } => {
            dst.put_u8(io_channel);
            dst.put_u32_le(receipt_timestamp);
            dst.put_bytes(0, 2);
            dst.put_slice(&packet);
        }
        Word::Trig {
            trigger_type,
            timestamp,
        } => {
            dst.put_u8(trigger_type);
            dst.put_bytes(0, 2);
            dst.put_u32_le(timestamp);
            dst.put_bytes(0, 8);
        }
        Word::Sync {
            sync_type,
            clk_source,
            timestamp,
        } => {
            dst.put_u8(sync_type);
            dst.put_u8(clk_source);
            dst.put_u8(0);
            dst.put_u32_le(timestamp);
            dst.put_bytes(0, 8);
        }
        Word::Ping | Word::Pong => dst.put_bytes(0, 15),
        Word::Write { address, value } | Word::Read { address, value } => {
            dst.put_bytes(0, 3);
            dst.put_u32_le(address);
            dst.put_bytes(0, 4);
            dst.put_u32_le(value);
        }
        Word::Tx { io_channel, packet } => {
            dst.put_u8(io_channel);
            dst.put_bytes(0, 6);
            dst.put_slice(&packet);
        }
        Word::Err { code, message } => {
            dst.put_u8(code);
            dst.put_slice(&message);
        }
    }
    Ok(())
}

/// Encode a whole message into `dst`. Its length is `8 + 16 * words`.
pub fn encode_message(message: &Message, dst: &mut BytesMut) -> Result<()> {
    let count = message.words.len();
    let word_count = u16::try_from(count).map_err(|_| FrameError::TooManyWords {
        count,
        max: DEFAULT_MAX_WORDS,
    })?;
    let header = Header {
        word_count,
        ..message.header
    };

    dst.reserve(HEADER_SIZE + WORD_SIZE * count);
    format_header(&header, dst);
    for word in &message.words {
        format_word(header.msg_type, word, dst)?;
    }
    Ok(())
}

/// Encode `words` as a `msg_type` message stamped with the current time.
pub fn format_message(msg_type: MsgType, words: Vec<Word>) -> Result<Bytes> {
    let mut dst = BytesMut::new();
    encode_message(&Message::new(msg_type, words), &mut dst)?;
    Ok(dst.freeze())
}

pub fn parse_header(src: &[u8]) -> Result<Header> {
    if src.len() < HEADER_SIZE {
        return Err(FrameError::Truncated {
            expected: HEADER_SIZE,
            actual: src.len(),
        });
    }
    let mut buf = &src[..HEADER_SIZE];
    let msg_type = MsgType::from_code(buf.get_u8())?;
    let timestamp = buf.get_u32_le();
    buf.advance(1);
    let word_count = buf.get_u16_le();
    Ok(Header::new(msg_type, timestamp, word_count))
}

/// Decode one word of a `msg_type` message.
pub fn parse_word(msg_type: MsgType, src: &[u8]) -> Result<Word> {
    if src.len() < WORD_SIZE {
        return Err(FrameError::Truncated {
            expected: WORD_SIZE,
            actual: src.len(),
        });
    }
    let mut buf = &src[..WORD_SIZE];
    let word_type = WordType::from_code(msg_type, buf.get_u8())?;
    let word = match word_type {
        WordType::Data => {
            let io_channel = buf.get_u8();
            let receipt_timestamp = buf.get_u32_le();
            buf.advance(2);
            Word::Data {
                io_channel,
                receipt_timestamp,
                packet: take_array(&mut buf),
            }
        }
        WordType::Trig => {
            let trigger_type = buf.get_u8();
            buf.advance(2);
            Word::Trig {
                trigger_type,
                timestamp: buf.get_u32_le(),
            }
        }
        WordType::Sync => {
            let sync_type = buf.get_u8();
            let clk_source = buf.get_u8();
            buf.advance(1);
            Word::Sync {
                sync_type,
                clk_source,
                timestamp: buf.get_u32_le(),
            }
        }
        WordType::Ping => Word::Ping,
        WordType::Pong => Word::Pong,
        WordType::Write | WordType::Read => {
            buf.advance(3);
            let address = buf.get_u32_le();
            buf.advance(4);
            let value = buf.get_u32_le();
            if word_type == WordType::Write {
                Word::Write { address, value }
            } else {
                Word::Read { address, value }
            }
        }
        WordType::Tx => {
            let io_channel = buf.get_u8();
            buf.advance(6);
            Word::Tx {
                io_channel,
                packet: take_array(&mut buf),
            }
        }
        WordType::Err => Word::Err {
            code: buf.get_u8(),
            message: take_array(&mut buf),
        },
    };
    Ok(word)
}

fn take_array<const N: usize>(buf: &mut &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    buf.copy_to_slice(&mut out);
    out
}

/// Iterator over the whole words after a header.
#[derive(Debug, Clone)]
pub struct Words<'a> {
    msg_type: MsgType,
    chunks: std::slice::ChunksExact<'a, u8>,
}

impl Iterator for Words<'_> {
    type Item = Result<Word>;

    fn next(&mut self) -> Option<Self::Item> {
        self.chunks
            .next()
            .map(|chunk| parse_word(self.msg_type, chunk))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.chunks.size_hint()
    }
}

impl ExactSizeIterator for Words<'_> {}

/// Decode the words of a full message one at a time, so a caller can keep
/// going past a word it does not understand. A trailing partial word is
/// not yielded.
pub fn words(src: &[u8]) -> Result<(Header, Words<'_>)> {
    let header = parse_header(src)?;
    let words = Words {
        msg_type: header.msg_type,
        chunks: src[HEADER_SIZE..].chunks_exact(WORD_SIZE),
    };
    Ok((header, words))
}

/// Decode a full message.
///
/// Exactly `(len - 8) / 16` words are read; a trailing partial word is
/// ignored. A header word count that disagrees is logged, not rejected.
pub fn parse_message(src: &[u8]) -> Result<Message> {
    let (header, words) = words(src)?;
    if words.len() != usize::from(header.word_count) {
        warn!(
            declared = header.word_count,
            present = words.len(),
            "message word count does not match its length"
        );
    }
    let words = words.collect::<Result<Vec<_>>>()?;
    Ok(Message { header, words })
}

/// Decode a message from a stream buffer.
///
/// Returns `Ok(None)` until the header and every declared word are
/// buffered. On success, consumes the message bytes from the buffer.
pub fn decode_message(src: &mut BytesMut, max_words: usize) -> Result<Option<Message>> {
    if src.len() < HEADER_SIZE {
        return Ok(None); // Need more data
    }

    let header = parse_header(src)?;
    let count = usize::from(header.word_count);
    if count > max_words {
        return Err(FrameError::TooManyWords {
            count,
            max: max_words,
        });
    }

    let total = HEADER_SIZE + WORD_SIZE * count;
    if src.len() < total {
        return Ok(None); // Need more data
    }

    let frame = src.split_to(total);
    parse_message(&frame).map(Some)
}

/// Configuration for message I/O.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum declared word count accepted from a stream. Default: 65535.
    pub max_words: usize,
    /// Read timeout for blocking operations.
    pub read_timeout: Option<std::time::Duration>,
    /// Write timeout for blocking operations.
    pub write_timeout: Option<std::time::Duration>,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_words: DEFAULT_MAX_WORDS,
            read_timeout: None,
            write_timeout: None,
        }
    }
}

impl FrameConfig {
    pub fn with_max_words(mut self, max_words: usize) -> Self {
        self.max_words = max_words;
        self
    }

    pub fn with_read_timeout(mut self, timeout: std::time::Duration) -> Self {
        self.read_timeout = Some(timeout);
        self
    }

    pub fn with_write_timeout(mut self, timeout: std::time::Duration) -> Self {
        self.write_timeout = Some(timeout);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encoded(message: &Message) -> BytesMut {
        let mut buf = BytesMut::new();
        encode_message(message, &mut buf).unwrap();
        buf
    }

    #[test]
    fn header_layout() {
        let mut buf = BytesMut::new();
        format_header(&Header::new(MsgType::Data, 0x0102_0304, 3), &mut buf);
        assert_eq!(buf.as_ref(), &[b'D', 0x04, 0x03, 0x02, 0x01, 0x00, 0x03, 0x00]);
        assert_eq!(
            parse_header(&buf).unwrap(),
            Header::new(MsgType::Data, 0x0102_0304, 3)
        );
    }

    #[test]
    fn data_word_layout() {
        let mut buf = BytesMut::new();
        let word = Word::Data {
            io_channel: 7,
            receipt_timestamp: 0xaabbccdd,
            packet: [1, 2, 3, 4, 5, 6, 7, 8],
        };
        format_word(MsgType::Data, &word, &mut buf).unwrap();
        assert_eq!(
            buf.as_ref(),
            &[b'D', 7, 0xdd, 0xcc, 0xbb, 0xaa, 0, 0, 1, 2, 3, 4, 5, 6, 7, 8]
        );
        assert_eq!(parse_word(MsgType::Data, &buf).unwrap(), word);
    }

    #[test]
    fn every_word_is_sixteen_bytes() {
        let cases = [
            (MsgType::Data, Word::Trig { trigger_type: 1, timestamp: 500 }),
            (MsgType::Data, Word::Sync { sync_type: b'S', clk_source: 1, timestamp: 600 }),
            (MsgType::Req, Word::Ping),
            (MsgType::Rep, Word::Pong),
            (MsgType::Req, Word::Write { address: 0x10, value: 0xff }),
            (MsgType::Rep, Word::Read { address: 0x11, value: 0x1 }),
            (MsgType::Req, Word::Tx { io_channel: 2, packet: [9; 8] }),
            (MsgType::Rep, Word::error(4, "bad")),
        ];
        for (msg_type, word) in cases {
            let mut buf = BytesMut::new();
            format_word(msg_type, &word, &mut buf).unwrap();
            assert_eq!(buf.len(), WORD_SIZE, "{word:?}");
            assert_eq!(parse_word(msg_type, &buf).unwrap(), word);
        }
    }

    #[test]
    fn sync_and_write_field_offsets() {
        let mut buf = BytesMut::new();
        format_word(
            MsgType::Data,
            &Word::Sync { sync_type: b'H', clk_source: 1, timestamp: 2 },
            &mut buf,
        )
        .unwrap();
        assert_eq!(&buf[..8], &[b'S', b'H', 1, 0, 2, 0, 0, 0]);

        let mut buf = BytesMut::new();
        format_word(MsgType::Req, &Word::Write { address: 3, value: 4 }, &mut buf).unwrap();
        assert_eq!(buf[4], 3);
        assert_eq!(buf[12], 4);
    }

    #[test]
    fn word_without_layout_in_message_type() {
        let mut buf = BytesMut::new();
        let err = format_word(MsgType::Req, &Word::Trig { trigger_type: 0, timestamp: 0 }, &mut buf)
            .unwrap_err();
        assert!(matches!(err, FrameError::UnknownWordType { msg_type: MsgType::Req, code: b'T' }));
        assert!(buf.is_empty());
    }

    #[test]
    fn message_length_and_round_trip() {
        let message = Message::at(
            MsgType::Data,
            1234,
            vec![
                Word::Trig { trigger_type: 1, timestamp: 500 },
                Word::Sync { sync_type: b'S', clk_source: 0, timestamp: 600 },
            ],
        );
        let buf = encoded(&message);
        assert_eq!(buf.len(), HEADER_SIZE + 2 * WORD_SIZE);
        assert_eq!(parse_message(&buf).unwrap(), message);
    }

    #[test]
    fn trailing_partial_word_ignored() {
        let message = Message::at(MsgType::Req, 1, vec![Word::Ping]);
        let mut buf = encoded(&message);
        buf.put_slice(&[b'P', 0, 0, 0, 0]);
        assert_eq!(parse_message(&buf).unwrap(), message);
    }

    #[test]
    fn word_iterator_continues_past_unknown_words() {
        let message = Message::at(MsgType::Req, 1, vec![Word::Ping, Word::Ping]);
        let mut buf = encoded(&message);
        buf[HEADER_SIZE] = b'Z';

        let (header, words) = words(&buf).unwrap();
        assert_eq!(header.word_count, 2);
        let results: Vec<_> = words.collect();
        assert!(matches!(results[0], Err(FrameError::UnknownWordType { code: b'Z', .. })));
        assert_eq!(results[1].as_ref().unwrap(), &Word::Ping);
        assert!(parse_message(&buf).is_err());
    }

    #[test]
    fn header_errors() {
        assert!(matches!(
            parse_header(&[b'D', 0, 0]),
            Err(FrameError::Truncated { expected: 8, actual: 3 })
        ));
        assert!(matches!(
            parse_header(&[b'x', 0, 0, 0, 0, 0, 0, 0]),
            Err(FrameError::UnknownMessageType(b'x'))
        ));
    }

    #[test]
    fn decode_waits_for_declared_words() {
        let message = Message::at(MsgType::Rep, 9, vec![Word::Pong, Word::Read { address: 1, value: 2 }]);
        let full = encoded(&message);

        let mut buf = BytesMut::from(&full[..HEADER_SIZE + WORD_SIZE + 3]);
        assert!(decode_message(&mut buf, DEFAULT_MAX_WORDS).unwrap().is_none());
        buf.extend_from_slice(&full[HEADER_SIZE + WORD_SIZE + 3..]);
        assert_eq!(decode_message(&mut buf, DEFAULT_MAX_WORDS).unwrap(), Some(message));
        assert!(buf.is_empty());
    }

    #[test]
    fn decode_multiple_messages() {
        let first = Message::at(MsgType::Req, 1, vec![Word::Ping]);
        let second = Message::at(MsgType::Rep, 2, vec![Word::Pong]);
        let mut buf = encoded(&first);
        buf.extend_from_slice(&encoded(&second));

        assert_eq!(decode_message(&mut buf, DEFAULT_MAX_WORDS).unwrap(), Some(first));
        assert_eq!(decode_message(&mut buf, DEFAULT_MAX_WORDS).unwrap(), Some(second));
        assert!(buf.is_empty());
    }

    #[test]
    fn decode_rejects_oversized_word_count() {
        let mut buf = BytesMut::new();
        format_header(&Header::new(MsgType::Data, 0, 100), &mut buf);
        assert!(matches!(
            decode_message(&mut buf, 10),
            Err(FrameError::TooManyWords { count: 100, max: 10 })
        ));
    }

    #[test]
    fn empty_message() {
        let bytes = format_message(MsgType::Data, Vec::new()).unwrap();
        assert_eq!(bytes.len(), HEADER_SIZE);
        assert!(parse_message(&bytes).unwrap().words.is_empty());
    }
}
