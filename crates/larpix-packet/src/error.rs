/// Errors that can occur while building or converting packets.
#[derive(Debug, thiserror::Error)]
pub enum PacketError {
    /// The raw buffer does not have the exact wire size of the packet.
    #[error("invalid number of bytes: {actual} (expected {expected})")]
    InvalidLength { expected: usize, actual: usize },

    /// A chip key string or triple could not be parsed.
    #[error("invalid chip key: {0}")]
    InvalidChipKey(String),

    /// An export record carries a version or type tag the target cannot hold.
    #[error("unsupported version: {0}")]
    UnsupportedVersion(String),

    /// The packet type discriminant is outside the known set.
    #[error("unknown packet type {0}")]
    UnknownPacketType(u64),

    /// An export record field has the wrong shape.
    #[error("invalid record field '{field}': {reason}")]
    InvalidRecord { field: String, reason: String },
}

impl PacketError {
    pub(crate) fn invalid_record(field: &str, reason: impl Into<String>) -> Self {
        Self::InvalidRecord {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, PacketError>;
