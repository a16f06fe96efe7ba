use std::collections::BTreeMap;

use larpix_packet::Packet;
use once_cell::sync::Lazy;

use crate::error::{Result, SchemaError};
use crate::format;
use crate::layout::{Column, ColumnType, Dataset, Layout, Row, RowValue};
use crate::parse;
use crate::version::SchemaVersion;

/// Builds one packet row for a version.
pub type FormatStep = fn(&Packet, &VersionLayout) -> Result<Row>;

/// Rebuilds one packet from a row of a version; gets the messages table.
pub type ParseStep = fn(&VersionLayout, &[RowValue], &[Row]) -> Result<Packet>;

/// How one version changes a dataset relative to the previous version.
#[derive(Debug, Clone, Copy)]
pub enum LayoutChange {
    /// Replace (or create) the dataset with these columns.
    Define(Dataset, &'static [Column]),
    /// Add columns at the end of an existing dataset.
    Append(Dataset, &'static [Column]),
    /// Drop the dataset.
    Retire(Dataset),
}

/// One link of the version chain. Datasets a delta does not mention are
/// kept unchanged from the previous version.
#[derive(Debug, Clone, Copy)]
pub struct SchemaDelta {
    pub version: SchemaVersion,
    pub changes: &'static [LayoutChange],
    pub format: FormatStep,
    pub parse: ParseStep,
}

/// Every dataset layout of one version, plus its row converters.
#[derive(Debug, Clone)]
pub struct VersionLayout {
    version: SchemaVersion,
    datasets: BTreeMap<Dataset, Layout>,
    format: FormatStep,
    parse: ParseStep,
}

impl VersionLayout {
    pub fn version(&self) -> SchemaVersion {
        self.version
    }

    pub fn datasets(&self) -> impl Iterator<Item = &Layout> {
        self.datasets.values()
    }

    pub fn dataset(&self, dataset: Dataset) -> Result<&Layout> {
        self.datasets
            .get(&dataset)
            .ok_or_else(|| SchemaError::MissingDataset {
                version: self.version.to_string(),
                dataset: dataset.name().to_string(),
            })
    }

    /// The packet table: `raw_packet` in 0.0, `packets` afterwards.
    pub fn packet_dataset(&self) -> Dataset {
        if self.datasets.contains_key(&Dataset::RawPacket) {
            Dataset::RawPacket
        } else {
            Dataset::Packets
        }
    }

    pub fn packets(&self) -> Result<&Layout> {
        self.dataset(self.packet_dataset())
    }

    pub fn format_packet(&self, packet: &Packet) -> Result<Row> {
        (self.format)(packet, self)
    }

    pub fn parse_packet(&self, row: &[RowValue], messages: &[Row]) -> Result<Packet> {
        (self.parse)(self, row, messages)
    }
}

/// Ordered set of versions folded from a delta chain.
#[derive(Debug, Clone)]
pub struct SchemaRegistry {
    versions: BTreeMap<SchemaVersion, VersionLayout>,
}

impl SchemaRegistry {
    /// Fold `deltas` in order. Versions must be strictly increasing.
    pub fn from_deltas(deltas: &[SchemaDelta]) -> Result<Self> {
        let mut versions = BTreeMap::new();
        let mut datasets: BTreeMap<Dataset, Layout> = BTreeMap::new();
        let mut previous: Option<SchemaVersion> = None;

        for delta in deltas {
            if previous.is_some_and(|prev| prev >= delta.version) {
                return Err(SchemaError::InvalidLayout(format!(
                    "version {} is out of order",
                    delta.version
                )));
            }
            for change in delta.changes {
                apply_change(&mut datasets, *change, delta.version)?;
            }
            versions.insert(
                delta.version,
                VersionLayout {
                    version: delta.version,
                    datasets: datasets.clone(),
                    format: delta.format,
                    parse: delta.parse,
                },
            );
            previous = Some(delta.version);
        }
        Ok(Self { versions })
    }

    /// Registry of every version LArPix files have been written with.
    pub fn builtin() -> &'static SchemaRegistry {
        static BUILTIN: Lazy<SchemaRegistry> = Lazy::new(|| {
            SchemaRegistry::from_deltas(BUILTIN_DELTAS)
                .expect("built-in schema deltas are consistent")
        });
        &BUILTIN
    }

    pub fn get(&self, version: SchemaVersion) -> Result<&VersionLayout> {
        self.versions
            .get(&version)
            .ok_or_else(|| SchemaError::UnknownVersion(version.to_string()))
    }

    pub fn contains(&self, version: SchemaVersion) -> bool {
        self.versions.contains_key(&version)
    }

    pub fn versions(&self) -> impl Iterator<Item = SchemaVersion> + '_ {
        self.versions.keys().copied()
    }

    pub fn latest(&self) -> Option<SchemaVersion> {
        self.versions.keys().next_back().copied()
    }
}

fn apply_change(
    datasets: &mut BTreeMap<Dataset, Layout>,
    change: LayoutChange,
    version: SchemaVersion,
) -> Result<()> {
    match change {
        LayoutChange::Define(dataset, columns) => {
            let mut layout = Layout::new(dataset, Vec::with_capacity(columns.len()));
            layout.extend(columns)?;
            datasets.insert(dataset, layout);
        }
        LayoutChange::Append(dataset, columns) => {
            let layout = datasets.get_mut(&dataset).ok_or_else(|| {
                SchemaError::InvalidLayout(format!(
                    "{version} appends to undefined dataset {dataset}"
                ))
            })?;
            layout.extend(columns)?;
        }
        LayoutChange::Retire(dataset) => {
            if datasets.remove(&dataset).is_none() {
                return Err(SchemaError::InvalidLayout(format!(
                    "{version} retires undefined dataset {dataset}"
                )));
            }
        }
    }
    Ok(())
}

/// Registers per chip in the `configs` table.
pub const NUM_REGISTERS: usize = 239;

const RAW_PACKET_V0_0: &[Column] = &[
    Column::new("chip_key", ColumnType::Text(32)),
    Column::new("type", ColumnType::U8),
    Column::new("chipid", ColumnType::U8),
    Column::new("parity", ColumnType::U8),
    Column::new("valid_parity", ColumnType::U8),
    Column::new("counter", ColumnType::U32),
    Column::new("channel", ColumnType::U8),
    Column::new("timestamp", ColumnType::U64),
    Column::new("adc_counts", ColumnType::U8),
    Column::new("fifo_half", ColumnType::U8),
    Column::new("fifo_full", ColumnType::U8),
    Column::new("register", ColumnType::U8),
    Column::new("value", ColumnType::U8),
];

const PACKETS_V1_0: &[Column] = &[
    Column::new("chip_key", ColumnType::Text(32)),
    Column::new("type", ColumnType::U8),
    Column::new("chipid", ColumnType::U8),
    Column::new("parity", ColumnType::U8),
    Column::new("valid_parity", ColumnType::U8),
    Column::new("channel", ColumnType::U8),
    Column::new("timestamp", ColumnType::U64),
    Column::new("adc_counts", ColumnType::U8),
    Column::new("fifo_half", ColumnType::U8),
    Column::new("fifo_full", ColumnType::U8),
    Column::new("register", ColumnType::U8),
    Column::new("value", ColumnType::U8),
    Column::new("counter", ColumnType::U32),
    Column::new("direction", ColumnType::U8),
];

const MESSAGES_V1_0: &[Column] = &[
    Column::new("message", ColumnType::Text(64)),
    Column::new("timestamp", ColumnType::U64),
    Column::new("index", ColumnType::U32),
];

const PACKETS_V2_0: &[Column] = &[
    Column::new("io_group", ColumnType::U8),
    Column::new("io_channel", ColumnType::U8),
    Column::new("chip_id", ColumnType::U8),
    Column::new("packet_type", ColumnType::U8),
    Column::new("downstream_marker", ColumnType::U8),
    Column::new("parity", ColumnType::U8),
    Column::new("valid_parity", ColumnType::U8),
    Column::new("channel_id", ColumnType::U8),
    Column::new("timestamp", ColumnType::U64),
    Column::new("dataword", ColumnType::U8),
    Column::new("trigger_type", ColumnType::U8),
    Column::new("local_fifo", ColumnType::U8),
    Column::new("shared_fifo", ColumnType::U8),
    Column::new("register_address", ColumnType::U8),
    Column::new("register_data", ColumnType::U8),
    Column::new("direction", ColumnType::U8),
    Column::new("local_fifo_events", ColumnType::U8),
    Column::new("shared_fifo_events", ColumnType::U16),
    Column::new("counter", ColumnType::U32),
    Column::new("fifo_diagnostics_enabled", ColumnType::U8),
];

const CONFIGS_V2_4: &[Column] = &[
    Column::new("timestamp", ColumnType::U64),
    Column::new("io_group", ColumnType::U8),
    Column::new("io_channel", ColumnType::U8),
    Column::new("chip_id", ColumnType::U8),
    Column::new("registers", ColumnType::U8Array(NUM_REGISTERS)),
];

/// The version chain, oldest first.
pub const BUILTIN_DELTAS: &[SchemaDelta] = &[
    SchemaDelta {
        version: SchemaVersion::new(0, 0),
        changes: &[LayoutChange::Define(Dataset::RawPacket, RAW_PACKET_V0_0)],
        format: format::format_v0_0,
        parse: parse::parse_v0_0,
    },
    SchemaDelta {
        version: SchemaVersion::new(1, 0),
        changes: &[
            LayoutChange::Retire(Dataset::RawPacket),
            LayoutChange::Define(Dataset::Packets, PACKETS_V1_0),
            LayoutChange::Define(Dataset::Messages, MESSAGES_V1_0),
        ],
        format: format::format_v1_0,
        parse: parse::parse_v1_0,
    },
    SchemaDelta {
        version: SchemaVersion::new(2, 0),
        changes: &[LayoutChange::Define(Dataset::Packets, PACKETS_V2_0)],
        format: format::format_v2_0,
        parse: parse::parse_v2_0,
    },
    SchemaDelta {
        version: SchemaVersion::new(2, 1),
        changes: &[LayoutChange::Append(
            Dataset::Packets,
            &[Column::new("first_packet", ColumnType::U8)],
        )],
        format: format::format_v2_0,
        parse: parse::parse_v2_1,
    },
    SchemaDelta {
        version: SchemaVersion::new(2, 2),
        changes: &[],
        format: format::format_v2_2,
        parse: parse::parse_v2_2,
    },
    SchemaDelta {
        version: SchemaVersion::new(2, 3),
        changes: &[LayoutChange::Append(
            Dataset::Packets,
            &[Column::new("receipt_timestamp", ColumnType::U32)],
        )],
        format: format::format_v2_3,
        parse: parse::parse_v2_3,
    },
    SchemaDelta {
        version: SchemaVersion::new(2, 4),
        changes: &[LayoutChange::Define(Dataset::Configs, CONFIGS_V2_4)],
        format: format::format_v2_3,
        parse: parse::parse_v2_3,
    },
];
