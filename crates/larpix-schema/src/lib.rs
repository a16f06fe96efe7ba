//! Versioned row layouts for persisting LArPix packet streams.
//!
//! Each schema version defines named datasets (`packets`, `messages`,
//! `configs`) as ordered, typed columns. Versions are folded from a chain of
//! deltas in [`registry`], and each version carries the row converters used
//! by [`format_row`] and [`parse_row`]. Storage itself is left to the caller:
//! rows are plain `Vec<RowValue>`.

pub mod config;
pub mod error;
pub mod format;
pub mod layout;
pub mod parse;
pub mod registry;
pub mod table;
pub mod version;

pub use config::ParseConfig;
pub use error::{Result, SchemaError};
pub use format::{format_message_row, format_row, is_representable};
pub use layout::{Column, ColumnType, Dataset, Layout, Row, RowValue, RowView, RowViewMut};
pub use parse::{parse_row, parse_rows};
pub use registry::{
    LayoutChange, SchemaDelta, SchemaRegistry, VersionLayout, BUILTIN_DELTAS, NUM_REGISTERS,
};
pub use table::{format_config_row, parse_config_row, ChipConfigRow, Table, TableWriter};
pub use version::{resolve_version, resolve_version_in, SchemaVersion, LATEST_VERSION};
