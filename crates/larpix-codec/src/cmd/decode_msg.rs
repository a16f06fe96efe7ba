use std::fs;

use bytes::BytesMut;
use pacman_frame::{decode_message, message_to_packets, Message, DEFAULT_MAX_WORDS};
use tracing::{debug, warn};

use crate::cmd::DecodeMsgArgs;
use crate::exit::{frame_error, io_error, CliResult, SUCCESS};
use crate::output::{print_message, OutputFormat};

pub fn run(args: DecodeMsgArgs, format: OutputFormat) -> CliResult<i32> {
    let bytes = fs::read(&args.file)
        .map_err(|err| io_error(&format!("failed reading {}", args.file.display()), err))?;

    let messages = split_messages(&bytes)?;
    debug!(count = messages.len(), file = %args.file.display(), "decoded messages");
    for (index, message) in messages.iter().enumerate() {
        let packets = message_to_packets(message, args.io_group);
        print_message(index, message, &packets, None, format);
    }
    Ok(SUCCESS)
}

/// Split a byte dump into whole messages. Trailing bytes that do not form a
/// whole message are ignored.
pub fn split_messages(bytes: &[u8]) -> CliResult<Vec<Message>> {
    let mut buf = BytesMut::from(bytes);
    let mut messages = Vec::new();
    while let Some(message) = decode_message(&mut buf, DEFAULT_MAX_WORDS)
        .map_err(|err| frame_error("decode failed", err))?
    {
        messages.push(message);
    }
    if !buf.is_empty() {
        warn!(bytes = buf.len(), "trailing bytes do not form a whole message");
    }
    Ok(messages)
}

#[cfg(test)]
mod tests {
    use pacman_frame::{encode_message, MsgType, Word};

    use super::*;
    use crate::exit::DATA_INVALID;

    #[test]
    fn splits_concatenated_messages() {
        let mut wire = BytesMut::new();
        let first = Message::at(MsgType::Req, 1, vec![Word::Ping]);
        let trig = Word::Trig {
            trigger_type: 1,
            timestamp: 5,
        };
        let second = Message::at(MsgType::Data, 2, vec![trig]);
        encode_message(&first, &mut wire).unwrap();
        encode_message(&second, &mut wire).unwrap();
        wire.extend_from_slice(&[b'D', 0, 0]);

        let messages = split_messages(&wire).unwrap();
        assert_eq!(messages, vec![first, second]);
    }

    #[test]
    fn unknown_message_type_is_invalid_data() {
        let err = split_messages(&[b'X', 0, 0, 0, 0, 0, 0, 0]).unwrap_err();
        assert_eq!(err.code, DATA_INVALID);
    }
}
