//! Row to packet conversion, one step per schema version.

use larpix_packet::{
    ChipKey, MessagePacket, Packet, PacketType, PacketV1, PacketV2, SyncPacket, TimestampPacket,
    TriggerPacket, V1Field, V2Field,
};
use tracing::debug;

use crate::config::ParseConfig;
use crate::error::{Result, SchemaError};
use crate::layout::{Dataset, Row, RowValue, RowView};
use crate::registry::{SchemaRegistry, VersionLayout};
use crate::version::SchemaVersion;

/// Rebuild one packet from a row of `version`'s packet table.
///
/// `messages` is the file's messages table; message rows point into it.
pub fn parse_row(row: &[RowValue], messages: &[Row], version: SchemaVersion) -> Result<Packet> {
    SchemaRegistry::builtin().get(version)?.parse_packet(row, messages)
}

/// Rebuild the packets of a whole table.
///
/// Rows that carry no representable packet are dropped when
/// [`ParseConfig::skip_unparsable`] is set; any other failure aborts.
pub fn parse_rows(
    rows: &[Row],
    messages: &[Row],
    version: SchemaVersion,
    config: &ParseConfig,
) -> Result<Vec<Packet>> {
    let layout = SchemaRegistry::builtin().get(version)?;
    parse_rows_in(layout, rows, messages, config)
}

pub(crate) fn parse_rows_in(
    layout: &VersionLayout,
    rows: &[Row],
    messages: &[Row],
    config: &ParseConfig,
) -> Result<Vec<Packet>> {
    let range = config.range(rows.len());
    let mut packets = Vec::with_capacity(range.len());
    for (index, row) in rows[range.clone()].iter().enumerate() {
        match layout.parse_packet(row, messages) {
            Ok(packet) => packets.push(packet),
            Err(err) if config.skip_unparsable && err.is_skippable() => {
                debug!(row = range.start + index, error = %err, "skipping row");
            }
            Err(err) => return Err(err),
        }
    }
    Ok(packets)
}

fn packet_row<'a>(layout: &'a VersionLayout, row: &'a [RowValue]) -> Result<RowView<'a>> {
    Ok(layout.packets()?.view(row))
}

fn message_packet(
    layout: &VersionLayout,
    view: &RowView<'_>,
    messages: &[Row],
) -> Result<Packet> {
    let index = view.uint("counter")?;
    let row = usize::try_from(index)
        .ok()
        .and_then(|position| messages.get(position))
        .ok_or(SchemaError::MissingMessage {
            index,
            available: messages.len(),
        })?;
    let message = layout.dataset(Dataset::Messages)?.view(row).text("message")?;
    Ok(MessagePacket::new(message, view.uint("timestamp")?).into())
}

fn v1_packet(view: &RowView<'_>, code: u64) -> Result<PacketV1> {
    let mut packet = PacketV1::new();
    let key = view.text("chip_key")?;
    if !key.is_empty() {
        packet.set_chip_key(Some(key.parse::<ChipKey>()?));
    }
    packet.set(V1Field::PacketType, code);
    packet.set(V1Field::ChipId, view.uint("chipid")?);
    packet.set(V1Field::Parity, view.uint("parity")?);

    let fields: &[V1Field] = match packet.kind() {
        PacketType::Data => &[
            V1Field::ChannelId,
            V1Field::Timestamp,
            V1Field::Dataword,
            V1Field::FifoHalf,
            V1Field::FifoFull,
        ],
        PacketType::Test => &[V1Field::TestCounter],
        _ => &[V1Field::RegisterAddress, V1Field::RegisterData],
    };
    for field in fields {
        packet.set(*field, view.uint(field.name())?);
    }
    Ok(packet)
}

pub(crate) fn parse_v0_0(
    layout: &VersionLayout,
    row: &[RowValue],
    _messages: &[Row],
) -> Result<Packet> {
    let view = packet_row(layout, row)?;
    match view.uint("type")? {
        4 => Ok(TimestampPacket::new(view.uint("timestamp")?).into()),
        code @ 0..=3 => Ok(v1_packet(&view, code)?.into()),
        other => Err(SchemaError::UnknownPacketType(other)),
    }
}

pub(crate) fn parse_v1_0(
    layout: &VersionLayout,
    row: &[RowValue],
    messages: &[Row],
) -> Result<Packet> {
    let view = packet_row(layout, row)?;
    if view.uint("type")? == u64::from(PacketType::Message.code()) {
        return message_packet(layout, &view, messages);
    }
    let mut packet = parse_v0_0(layout, row, messages)?;
    if let Packet::V1(v1) = &mut packet {
        v1.set_direction(Some(view.narrow("direction")?));
    }
    Ok(packet)
}

fn v2_packet(view: &RowView<'_>, code: u64) -> Result<PacketV2> {
    let mut packet = PacketV2::new();
    packet.set_io_group(Some(view.narrow("io_group")?));
    packet.set_io_channel(Some(view.narrow("io_channel")?));
    packet.set(V2Field::PacketType, code);
    for field in [V2Field::ChipId, V2Field::DownstreamMarker, V2Field::Parity] {
        packet.set(field, view.uint(field.name())?);
    }
    packet.set_direction(Some(view.narrow("direction")?));

    match packet.kind() {
        PacketType::Data => {
            for field in [
                V2Field::ChannelId,
                V2Field::Timestamp,
                V2Field::Dataword,
                V2Field::TriggerType,
                V2Field::LocalFifo,
                V2Field::SharedFifo,
            ] {
                packet.set(field, view.uint(field.name())?);
            }
            if view.uint("fifo_diagnostics_enabled")? != 0 {
                // The timestamp window shrinks once the event counters exist.
                packet.set_fifo_diagnostics_enabled(true);
                for field in [
                    V2Field::LocalFifoEvents,
                    V2Field::SharedFifoEvents,
                    V2Field::Timestamp,
                ] {
                    packet.set(field, view.uint(field.name())?);
                }
            }
        }
        PacketType::ConfigRead | PacketType::ConfigWrite => {
            for field in [V2Field::RegisterAddress, V2Field::RegisterData] {
                packet.set(field, view.uint(field.name())?);
            }
        }
        _ => {}
    }
    Ok(packet)
}

pub(crate) fn parse_v2_0(
    layout: &VersionLayout,
    row: &[RowValue],
    messages: &[Row],
) -> Result<Packet> {
    let view = packet_row(layout, row)?;
    match view.uint("packet_type")? {
        4 => Ok(TimestampPacket {
            timestamp: view.uint("timestamp")?,
            io_group: Some(view.narrow("io_group")?),
        }
        .into()),
        5 => message_packet(layout, &view, messages),
        code @ 0..=3 => Ok(v2_packet(&view, code)?.into()),
        other => Err(SchemaError::UnknownPacketType(other)),
    }
}

pub(crate) fn parse_v2_1(
    layout: &VersionLayout,
    row: &[RowValue],
    messages: &[Row],
) -> Result<Packet> {
    let mut packet = parse_v2_0(layout, row, messages)?;
    if let Packet::V2(v2) = &mut packet {
        let first_packet = packet_row(layout, row)?.uint("first_packet")?;
        v2.set(V2Field::FirstPacket, first_packet);
    }
    Ok(packet)
}

pub(crate) fn parse_v2_2(
    layout: &VersionLayout,
    row: &[RowValue],
    messages: &[Row],
) -> Result<Packet> {
    let view = packet_row(layout, row)?;
    match view.uint("packet_type")? {
        6 => Ok(SyncPacket {
            sync_type: view.narrow("trigger_type")?,
            clk_source: view.narrow("dataword")?,
            timestamp: view.narrow("timestamp")?,
            io_group: Some(view.narrow("io_group")?),
        }
        .into()),
        7 => Ok(TriggerPacket {
            trigger_type: view.narrow("trigger_type")?,
            timestamp: view.narrow("timestamp")?,
            io_group: Some(view.narrow("io_group")?),
        }
        .into()),
        _ => parse_v2_1(layout, row, messages),
    }
}

pub(crate) fn parse_v2_3(
    layout: &VersionLayout,
    row: &[RowValue],
    messages: &[Row],
) -> Result<Packet> {
    let mut packet = parse_v2_2(layout, row, messages)?;
    if let Packet::V2(v2) = &mut packet {
        let receipt = packet_row(layout, row)?.narrow("receipt_timestamp")?;
        v2.set_receipt_timestamp(Some(receipt));
    }
    Ok(packet)
}
