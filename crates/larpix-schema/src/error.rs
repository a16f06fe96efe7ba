use larpix_packet::PacketError;

/// Errors raised while resolving schema versions or converting rows.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    /// The requested version cannot read a table written with `file`.
    #[error("incompatible versions: existing: {file}, specified: {requested}")]
    IncompatibleVersion { requested: String, file: String },

    /// The version string is malformed or not registered.
    #[error("unknown version: {0}")]
    UnknownVersion(String),

    /// A row carries a packet type discriminant no parser understands.
    #[error("unknown packet type {0} in row")]
    UnknownPacketType(u64),

    /// The packet kind has no representation in this version.
    #[error("{packet} packets cannot be stored in version {version}")]
    UnsupportedPacket { packet: String, version: String },

    /// A message row references an index past the end of the messages table.
    #[error("message index {index} out of range ({available} messages)")]
    MissingMessage { index: u64, available: usize },

    /// The version layout has no such column.
    #[error("dataset '{dataset}' has no column '{column}'")]
    MissingColumn { dataset: String, column: String },

    /// The version defines no such dataset.
    #[error("version {version} has no '{dataset}' dataset")]
    MissingDataset { version: String, dataset: String },

    /// A cell holds a value of the wrong shape for its column.
    #[error("invalid value in column '{column}': {reason}")]
    InvalidCell { column: String, reason: String },

    /// A delta chain does not fold into a consistent set of layouts.
    #[error("invalid schema layout: {0}")]
    InvalidLayout(String),

    /// Packet construction failed.
    #[error(transparent)]
    Packet(#[from] PacketError),
}

impl SchemaError {
    /// True for per-row failures a reader skips instead of aborting on.
    pub fn is_skippable(&self) -> bool {
        matches!(
            self,
            SchemaError::UnknownPacketType(_)
                | SchemaError::UnsupportedPacket { .. }
                | SchemaError::MissingMessage { .. }
        )
    }

    pub(crate) fn invalid_cell(column: &str, reason: impl Into<String>) -> Self {
        SchemaError::InvalidCell {
            column: column.to_string(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, SchemaError>;
