//! `tokio_util` codec for framed async streams.

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};

use crate::codec::{decode_message, encode_message, DEFAULT_MAX_WORDS};
use crate::error::FrameError;
use crate::message::Message;

/// Decodes and encodes whole PACMAN messages.
#[derive(Debug, Clone)]
pub struct PacmanCodec {
    max_words: usize,
}

impl PacmanCodec {
    pub fn new() -> Self {
        Self::with_max_words(DEFAULT_MAX_WORDS)
    }

    pub fn with_max_words(max_words: usize) -> Self {
        Self { max_words }
    }

    pub fn max_words(&self) -> usize {
        self.max_words
    }
}

impl Default for PacmanCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for PacmanCodec {
    type Item = Message;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        decode_message(src, self.max_words)
    }
}

impl Encoder<Message> for PacmanCodec {
    type Error = FrameError;

    fn encode(&mut self, item: Message, dst: &mut BytesMut) -> Result<(), Self::Error> {
        <Self as Encoder<&Message>>::encode(self, &item, dst)
    }
}

impl Encoder<&Message> for PacmanCodec {
    type Error = FrameError;

    fn encode(&mut self, item: &Message, dst: &mut BytesMut) -> Result<(), Self::Error> {
        if item.words.len() > self.max_words {
            return Err(FrameError::TooManyWords {
                count: item.words.len(),
                max: self.max_words,
            });
        }
        encode_message(item, dst)
    }
}
