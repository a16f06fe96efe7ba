//! Chip keys: the `io_group-io_channel-chip_id` address of one ASIC.
//!
//! Bit packets cache their key and drop the cache whenever one of the three
//! parts is reassigned.

use std::cell::Cell;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::error::{PacketError, Result};
use crate::record::Record;

/// Separator used in the canonical key string.
pub const KEY_DELIMITER: char = '-';

/// Hardware address of one ASIC: `io_group-io_channel-chip_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChipKey {
    io_group: u8,
    io_channel: u8,
    chip_id: u8,
}

impl ChipKey {
    pub const fn new(io_group: u8, io_channel: u8, chip_id: u8) -> Self {
        Self {
            io_group,
            io_channel,
            chip_id,
        }
    }

    /// Build a key from wide integers, rejecting anything outside one byte.
    pub fn from_parts(io_group: i64, io_channel: i64, chip_id: i64) -> Result<Self> {
        Ok(Self {
            io_group: one_byte("io_group", io_group)?,
            io_channel: one_byte("io_channel", io_channel)?,
            chip_id: one_byte("chip_id", chip_id)?,
        })
    }

    pub const fn io_group(&self) -> u8 {
        self.io_group
    }

    pub const fn io_channel(&self) -> u8 {
        self.io_channel
    }

    pub const fn chip_id(&self) -> u8 {
        self.chip_id
    }

    /// Returns true if `text` parses as a key.
    pub fn is_valid_keystring(text: &str) -> bool {
        text.parse::<ChipKey>().is_ok()
    }

    pub fn to_record(&self) -> Record {
        let mut record = Record::new();
        record.insert("io_group".to_string(), Value::from(self.io_group));
        record.insert("io_channel".to_string(), Value::from(self.io_channel));
        record.insert("chip_id".to_string(), Value::from(self.chip_id));
        record
    }

    pub fn from_record(record: &Record) -> Result<Self> {
        let field = |name: &str| -> Result<i64> {
            record
                .get(name)
                .and_then(Value::as_i64)
                .ok_or_else(|| PacketError::InvalidChipKey(format!("record must specify {name}")))
        };
        Self::from_parts(field("io_group")?, field("io_channel")?, field("chip_id")?)
    }
}

fn one_byte(name: &str, value: i64) -> Result<u8> {
    u8::try_from(value).map_err(|_| {
        PacketError::InvalidChipKey(format!("{name} must be 1-byte ({value} invalid)"))
    })
}

impl fmt::Display for ChipKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{KEY_DELIMITER}{}{KEY_DELIMITER}{}",
            self.io_group, self.io_channel, self.chip_id
        )
    }
}

impl FromStr for ChipKey {
    type Err = PacketError;

    fn from_str(text: &str) -> Result<Self> {
        let parts: Vec<&str> = text.split(KEY_DELIMITER).collect();
        if parts.len() != 3 {
            return Err(PacketError::InvalidChipKey(format!(
                "invalid keystring formatting: '{text}'"
            )));
        }
        let parse = |part: &str| -> Result<i64> {
            part.trim().parse::<i64>().map_err(|_| {
                PacketError::InvalidChipKey(format!("non-integer key field '{part}' in '{text}'"))
            })
        };
        Self::from_parts(parse(parts[0])?, parse(parts[1])?, parse(parts[2])?)
    }
}

impl From<(u8, u8, u8)> for ChipKey {
    fn from((io_group, io_channel, chip_id): (u8, u8, u8)) -> Self {
        Self::new(io_group, io_channel, chip_id)
    }
}

impl Serialize for ChipKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ChipKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

/// Lazily derived chip key.
///
/// Mutators of io_group, io_channel or chip_id call [`KeyCache::invalidate`];
/// the next read recomputes the key.
#[derive(Debug, Clone)]
pub(crate) struct KeyCache {
    dirty: Cell<bool>,
    key: Cell<Option<ChipKey>>,
}

impl KeyCache {
    pub(crate) fn get_or_derive(&self, derive: impl FnOnce() -> Option<ChipKey>) -> Option<ChipKey> {
        if self.dirty.get() {
            self.key.set(derive());
            self.dirty.set(false);
        }
        self.key.get()
    }

    pub(crate) fn invalidate(&self) {
        self.dirty.set(true);
    }
}

impl Default for KeyCache {
    fn default() -> Self {
        Self {
            dirty: Cell::new(true),
            key: Cell::new(None),
        }
    }
}
