//! In-memory tables built from a packet stream.

use larpix_packet::{ChipKey, Packet};
use serde::Serialize;
use tracing::{debug, trace};

use crate::config::ParseConfig;
use crate::error::{Result, SchemaError};
use crate::format::format_message_row_in;
use crate::layout::{Dataset, Row, RowValue};
use crate::parse::parse_rows_in;
use crate::registry::{SchemaRegistry, VersionLayout, NUM_REGISTERS};
use crate::version::{resolve_version, SchemaVersion, LATEST_VERSION};

/// Register snapshot of one chip at a point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChipConfigRow {
    pub timestamp: u64,
    pub io_group: u8,
    pub io_channel: u8,
    pub chip_id: u8,
    pub registers: Vec<u8>,
}

impl ChipConfigRow {
    pub fn new(key: ChipKey, timestamp: u64, registers: Vec<u8>) -> Self {
        Self {
            timestamp,
            io_group: key.io_group(),
            io_channel: key.io_channel(),
            chip_id: key.chip_id(),
            registers,
        }
    }

    pub fn chip_key(&self) -> ChipKey {
        ChipKey::new(self.io_group, self.io_channel, self.chip_id)
    }
}

/// Row of the `configs` table. Register lists shorter than the column are
/// zero padded.
pub fn format_config_row(config: &ChipConfigRow, version: SchemaVersion) -> Result<Row> {
    format_config_row_in(SchemaRegistry::builtin().get(version)?, config)
}

fn format_config_row_in(layout: &VersionLayout, config: &ChipConfigRow) -> Result<Row> {
    let configs = layout.dataset(Dataset::Configs)?;
    let mut row = configs.default_row();
    {
        let mut cells = configs.view_mut(&mut row);
        cells.set_uint("timestamp", config.timestamp)?;
        cells.set_uint("io_group", u64::from(config.io_group))?;
        cells.set_uint("io_channel", u64::from(config.io_channel))?;
        cells.set_uint("chip_id", u64::from(config.chip_id))?;
        cells.set_bytes("registers", &config.registers)?;
    }
    Ok(row)
}

pub fn parse_config_row(row: &[RowValue], version: SchemaVersion) -> Result<ChipConfigRow> {
    parse_config_row_in(SchemaRegistry::builtin().get(version)?, row)
}

fn parse_config_row_in(layout: &VersionLayout, row: &[RowValue]) -> Result<ChipConfigRow> {
    let view = layout.dataset(Dataset::Configs)?.view(row);
    Ok(ChipConfigRow {
        timestamp: view.uint("timestamp")?,
        io_group: view.narrow("io_group")?,
        io_channel: view.narrow("io_channel")?,
        chip_id: view.narrow("chip_id")?,
        registers: view.bytes("registers")?.to_vec(),
    })
}

/// Accumulates packet, message and config rows for one version.
#[derive(Debug)]
pub struct TableWriter {
    layout: &'static VersionLayout,
    packets: Vec<Row>,
    messages: Vec<Row>,
    configs: Vec<Row>,
}

impl TableWriter {
    pub fn new(version: SchemaVersion) -> Result<Self> {
        Ok(Self {
            layout: SchemaRegistry::builtin().get(version)?,
            packets: Vec::new(),
            messages: Vec::new(),
            configs: Vec::new(),
        })
    }

    /// Writer for the newest version.
    pub fn latest() -> Result<Self> {
        Self::new(LATEST_VERSION)
    }

    pub fn version(&self) -> SchemaVersion {
        self.layout.version()
    }

    pub fn layout(&self) -> &VersionLayout {
        self.layout
    }

    /// Append one packet. Message packets also add a `messages` row that
    /// the packet row points at through its `counter` column.
    pub fn append(&mut self, packet: &Packet) -> Result<()> {
        let mut row = self.layout.format_packet(packet)?;
        if let Packet::Message(message) = packet {
            let index = u32::try_from(self.messages.len()).map_err(|_| {
                SchemaError::invalid_cell("counter", "messages table is full")
            })?;
            let message_row = format_message_row_in(self.layout, message, index)?;
            self.layout
                .packets()?
                .view_mut(&mut row)
                .set_uint("counter", u64::from(index))?;
            self.messages.push(message_row);
        }
        trace!(packet_type = packet.type_str(), "appended row");
        self.packets.push(row);
        Ok(())
    }

    /// Append every packet, dropping those the version cannot represent.
    /// Returns how many rows were written.
    pub fn append_all<'a, I>(&mut self, packets: I) -> Result<usize>
    where
        I: IntoIterator<Item = &'a Packet>,
    {
        let mut written = 0;
        for packet in packets {
            match self.append(packet) {
                Ok(()) => written += 1,
                Err(err) if err.is_skippable() => {
                    debug!(version = %self.version(), error = %err, "dropping packet");
                }
                Err(err) => return Err(err),
            }
        }
        Ok(written)
    }

    pub fn append_config(&mut self, config: &ChipConfigRow) -> Result<()> {
        if config.registers.len() > NUM_REGISTERS {
            return Err(SchemaError::invalid_cell(
                "registers",
                format!("{} registers exceed {NUM_REGISTERS}", config.registers.len()),
            ));
        }
        let row = format_config_row_in(self.layout, config)?;
        self.configs.push(row);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.packets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packets.is_empty()
    }

    pub fn finish(self) -> Table {
        Table {
            version: self.layout.version(),
            packets: self.packets,
            messages: self.messages,
            configs: self.configs,
        }
    }
}

/// Finished tables tagged with the version they were written with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Table {
    pub version: SchemaVersion,
    pub packets: Vec<Row>,
    pub messages: Vec<Row>,
    pub configs: Vec<Row>,
}

impl Table {
    /// Read the packets back, checking `requested` against the table version
    /// with [`resolve_version`].
    pub fn read_packets(&self, requested: Option<&str>, config: &ParseConfig) -> Result<Vec<Packet>> {
        let version = resolve_version(requested, &self.version.to_string())?;
        let layout = SchemaRegistry::builtin().get(version)?;
        parse_rows_in(layout, &self.packets, &self.messages, config)
    }

    pub fn read_configs(&self) -> Result<Vec<ChipConfigRow>> {
        let layout = SchemaRegistry::builtin().get(self.version)?;
        self.configs
            .iter()
            .map(|row| parse_config_row_in(layout, row))
            .collect()
    }
}
