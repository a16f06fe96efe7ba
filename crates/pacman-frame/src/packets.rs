//! Mapping between LArPix packets and PACMAN words.

use bytes::{Bytes, BytesMut};
use larpix_packet::{Packet, PacketV2, SyncPacket, TimestampPacket, TriggerPacket};
use tracing::trace;

use crate::codec::{encode_message, parse_message};
use crate::error::Result;
use crate::message::{Message, MsgType, Word};

/// Word carrying `packet` in a `msg_type` message, if there is one.
///
/// DATA messages carry v2 packets (stamped with their receipt timestamp, or
/// `ts_pacman` when they have none), sync and trigger packets. REQ and REP
/// messages carry v2 packets as TX words. Nothing else has a word.
pub fn packet_word(packet: &Packet, msg_type: MsgType, ts_pacman: u32) -> Option<Word> {
    match (msg_type, packet) {
        (MsgType::Data, Packet::V2(v2)) => Some(Word::Data {
            io_channel: v2.io_channel().unwrap_or(0),
            receipt_timestamp: v2.receipt_timestamp().unwrap_or(ts_pacman),
            packet: v2.bytes(),
        }),
        (MsgType::Data, Packet::Sync(sync)) => Some(Word::Sync {
            sync_type: sync.sync_type,
            clk_source: sync.clk_source,
            timestamp: sync.timestamp,
        }),
        (MsgType::Data, Packet::Trigger(trigger)) => Some(Word::Trig {
            trigger_type: trigger.trigger_type,
            timestamp: trigger.timestamp,
        }),
        (MsgType::Req | MsgType::Rep, Packet::V2(v2)) => Some(Word::Tx {
            io_channel: v2.io_channel().unwrap_or(0),
            packet: v2.bytes(),
        }),
        _ => None,
    }
}

/// Build a `msg_type` message from the packets that have a word.
pub fn packets_to_message(packets: &[Packet], msg_type: MsgType, ts_pacman: u32) -> Message {
    let words: Vec<Word> = packets
        .iter()
        .filter_map(|packet| packet_word(packet, msg_type, ts_pacman))
        .collect();
    if words.len() != packets.len() {
        trace!(
            dropped = packets.len() - words.len(),
            msg_type = %msg_type,
            "packets without a word left out"
        );
    }
    Message::new(msg_type, words)
}

/// Encode `packets` as one `msg_type` message stamped with the current time.
pub fn format_packets(packets: &[Packet], msg_type: MsgType, ts_pacman: u32) -> Result<Bytes> {
    let mut dst = BytesMut::new();
    encode_message(&packets_to_message(packets, msg_type, ts_pacman), &mut dst)?;
    Ok(dst.freeze())
}

/// Packets carried by a decoded message.
///
/// The first packet is always a timestamp packet holding the header time.
/// DATA and TX words become v2 packets, TRIG and SYNC words become trigger
/// and sync packets. Other words carry no packet.
pub fn message_to_packets(message: &Message, io_group: Option<u8>) -> Vec<Packet> {
    let mut timestamp = TimestampPacket::new(u64::from(message.header.timestamp));
    timestamp.io_group = io_group;

    let mut packets = Vec::with_capacity(message.words.len() + 1);
    packets.push(timestamp.into());
    packets.extend(
        message
            .words
            .iter()
            .filter_map(|word| word_packet(word, io_group)),
    );
    packets
}

fn word_packet(word: &Word, io_group: Option<u8>) -> Option<Packet> {
    let packet = match *word {
        Word::Data {
            io_channel,
            receipt_timestamp,
            packet,
        } => {
            let mut v2 = hardware_packet(packet, io_group, io_channel);
            v2.set_receipt_timestamp(Some(receipt_timestamp));
            v2.into()
        }
        Word::Tx { io_channel, packet } => hardware_packet(packet, io_group, io_channel).into(),
        Word::Trig {
            trigger_type,
            timestamp,
        } => TriggerPacket {
            trigger_type,
            timestamp,
            io_group,
        }
        .into(),
        Word::Sync {
            sync_type,
            clk_source,
            timestamp,
        } => SyncPacket {
            sync_type,
            clk_source: clk_source & 0x01,
            timestamp,
            io_group,
        }
        .into(),
        _ => return None,
    };
    Some(packet)
}

fn hardware_packet(bytes: [u8; 8], io_group: Option<u8>, io_channel: u8) -> PacketV2 {
    let mut packet = PacketV2::from_array(bytes);
    packet.set_io_group(io_group);
    packet.set_io_channel(Some(io_channel));
    packet
}

/// Decode a message and return the packets it carries.
pub fn parse_packets(src: &[u8], io_group: Option<u8>) -> Result<Vec<Packet>> {
    Ok(message_to_packets(&parse_message(src)?, io_group))
}
