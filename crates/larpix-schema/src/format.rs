//! Packet to row conversion, one step per schema version.
//!
//! Each step runs the previous version's step and then applies its own
//! change, so a version only states what it adds.

use larpix_packet::record::get_u64;
use larpix_packet::{MessagePacket, Packet, V2Field};
use serde_json::Value;

use crate::error::{Result, SchemaError};
use crate::layout::{ColumnType, Dataset, Layout, Row};
use crate::registry::{SchemaRegistry, VersionLayout};
use crate::version::SchemaVersion;

/// Flatten `packet` into a row of `version`'s packet table.
pub fn format_row(packet: &Packet, version: SchemaVersion) -> Result<Row> {
    SchemaRegistry::builtin().get(version)?.format_packet(packet)
}

/// Row of the `messages` table for the `index`-th message of a file.
pub fn format_message_row(message: &MessagePacket, index: u32, version: SchemaVersion) -> Result<Row> {
    format_message_row_in(SchemaRegistry::builtin().get(version)?, message, index)
}

pub(crate) fn format_message_row_in(
    layout: &VersionLayout,
    message: &MessagePacket,
    index: u32,
) -> Result<Row> {
    let messages = layout.dataset(Dataset::Messages)?;
    let mut row = messages.default_row();
    {
        let mut cells = messages.view_mut(&mut row);
        cells.set_text("message", &message.message)?;
        cells.set_uint("timestamp", message.timestamp)?;
        cells.set_uint("index", u64::from(index))?;
    }
    Ok(row)
}

/// Whether `version` has a representation for `packet`.
pub fn is_representable(packet: &Packet, version: SchemaVersion) -> bool {
    match packet {
        Packet::V1(_) => version.major < 2,
        Packet::V2(_) => version.major == 2,
        Packet::Timestamp(_) => true,
        Packet::Message(_) => version >= SchemaVersion::new(1, 0),
        Packet::Sync(_) | Packet::Trigger(_) => version >= SchemaVersion::new(2, 2),
    }
}

fn check_representable(packet: &Packet, layout: &VersionLayout) -> Result<()> {
    if is_representable(packet, layout.version()) {
        return Ok(());
    }
    let packet = match packet {
        Packet::V1(_) => "v1".to_string(),
        Packet::V2(_) => "v2".to_string(),
        other => other.type_str().to_string(),
    };
    Err(SchemaError::UnsupportedPacket {
        packet,
        version: layout.version().to_string(),
    })
}

/// Copy every export-record field whose name matches a column.
/// Missing and `null` fields keep the column default.
fn fill_by_name(packet: &Packet, layout: &Layout) -> Result<Row> {
    let record = packet.export();
    let mut row = layout.default_row();
    {
        let mut cells = layout.view_mut(&mut row);
        for column in layout.columns() {
            match (column.ty, record.get(column.name)) {
                (_, None | Some(Value::Null)) | (ColumnType::U8Array(_), _) => {}
                (ColumnType::Text(_), Some(Value::String(text))) => {
                    cells.set_text(column.name, text)?;
                }
                _ => {
                    if let Some(value) = get_u64(&record, column.name)? {
                        cells.set_uint(column.name, value)?;
                    }
                }
            }
        }
    }
    Ok(row)
}

pub(crate) fn format_v0_0(packet: &Packet, layout: &VersionLayout) -> Result<Row> {
    check_representable(packet, layout)?;
    fill_by_name(packet, layout.packets()?)
}

pub(crate) fn format_v1_0(packet: &Packet, layout: &VersionLayout) -> Result<Row> {
    let mut row = format_v0_0(packet, layout)?;
    if let Some(direction) = packet.direction() {
        layout
            .packets()?
            .view_mut(&mut row)
            .set_uint("direction", u64::from(direction))?;
    }
    Ok(row)
}

pub(crate) fn format_v2_0(packet: &Packet, layout: &VersionLayout) -> Result<Row> {
    let mut row = format_v1_0(packet, layout)?;
    let packets = layout.packets()?;
    let mut cells = packets.view_mut(&mut row);
    cells.set_uint("packet_type", u64::from(packet.packet_type().code()))?;
    if packet.as_v2().is_some_and(|v2| v2.fifo_diagnostics_enabled()) {
        cells.set_uint("fifo_diagnostics_enabled", 1)?;
    }
    Ok(row)
}

/// Sync and trigger packets reuse the `trigger_type` and `dataword` columns.
fn reuse_trigger_columns(packet: &Packet, layout: &Layout, row: &mut Row) -> Result<()> {
    let mut cells = layout.view_mut(row);
    match packet {
        Packet::Sync(sync) => {
            cells.set_uint("trigger_type", u64::from(sync.sync_type))?;
            cells.set_uint("dataword", u64::from(sync.clk_source))?;
        }
        Packet::Trigger(trigger) => {
            cells.set_uint("trigger_type", u64::from(trigger.trigger_type))?;
        }
        _ => {}
    }
    Ok(())
}

pub(crate) fn format_v2_2(packet: &Packet, layout: &VersionLayout) -> Result<Row> {
    let mut row = format_v2_0(packet, layout)?;
    reuse_trigger_columns(packet, layout.packets()?, &mut row)?;
    Ok(row)
}

/// From 2.3 on, v2 packets store every bit field whatever their type, the
/// computed parity check and the card receipt timestamp.
pub(crate) fn format_v2_3(packet: &Packet, layout: &VersionLayout) -> Result<Row> {
    let mut row = format_v2_2(packet, layout)?;
    if let Some(v2) = packet.as_v2() {
        let packets = layout.packets()?;
        let mut cells = packets.view_mut(&mut row);
        for field in V2Field::ALL {
            cells.set_uint_if_present(field.name(), v2.get(field).unwrap_or(0))?;
        }
        cells.set_uint("valid_parity", u64::from(v2.has_valid_parity()))?;
        cells.set_uint(
            "fifo_diagnostics_enabled",
            u64::from(v2.fifo_diagnostics_enabled()),
        )?;
        cells.set_uint("io_group", v2.io_group().map_or(0, u64::from))?;
        cells.set_uint("io_channel", v2.io_channel().map_or(0, u64::from))?;
        cells.set_uint("direction", v2.direction().map_or(0, u64::from))?;
        cells.set_uint(
            "receipt_timestamp",
            v2.receipt_timestamp().map_or(0, u64::from),
        )?;
    }
    Ok(row)
}
