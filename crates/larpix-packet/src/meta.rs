//! Meta packets produced by the readout rather than by an ASIC.

use std::fmt;

use crate::bits::{from_uint, parse_bit_string, to_bit_string, to_uint, Endian};
use crate::error::{PacketError, Result};
use crate::key::ChipKey;
use crate::packet::PacketType;
use crate::record::{self, Record};

fn check_type(source: &Record, expected: PacketType) -> Result<()> {
    match record::get_u64(source, "type")? {
        Some(code) if code != u64::from(expected.code()) => Err(PacketError::UnsupportedVersion(
            format!("packet type {code} is not a {} packet", expected.type_str()),
        )),
        _ => Ok(()),
    }
}

fn narrow<T: TryFrom<u64>>(field: &str, value: u64) -> Result<T> {
    T::try_from(value).map_err(|_| PacketError::invalid_record(field, format!("{value} out of range")))
}

/// Key of the first chip on an io_group; io_group 0 has no key.
fn group_key(io_group: Option<u8>) -> Option<ChipKey> {
    io_group
        .filter(|group| *group != 0)
        .map(|group| ChipKey::new(group, 0, 0))
}

/// Wall-clock marker inserted into the packet stream.
#[derive(Debug, Clone, Copy, Default)]
pub struct TimestampPacket {
    pub timestamp: u64,
    pub io_group: Option<u8>,
}

impl TimestampPacket {
    pub const SIZE_BITS: usize = 56;

    pub fn new(timestamp: u64) -> Self {
        Self {
            timestamp,
            io_group: None,
        }
    }

    /// Build from the 7-byte little-endian code the hardware emits.
    pub fn from_code(code: &[u8]) -> Result<Self> {
        let code: [u8; 7] = code.try_into().map_err(|_| PacketError::InvalidLength {
            expected: 7,
            actual: code.len(),
        })?;
        let mut wide = [0u8; 8];
        wide[..7].copy_from_slice(&code);
        Ok(Self::new(u64::from_le_bytes(wide)))
    }

    pub fn with_io_group(mut self, io_group: u8) -> Self {
        self.io_group = Some(io_group);
        self
    }

    pub fn bytes(&self) -> [u8; 8] {
        self.timestamp.to_le_bytes()
    }

    pub fn bit_string(&self) -> String {
        to_bit_string(from_uint(self.timestamp, Self::SIZE_BITS, Endian::Big).as_bitslice())
    }

    pub fn chip_key(&self) -> Option<ChipKey> {
        None
    }

    pub fn export(&self) -> Record {
        let mut out = Record::new();
        record::put(&mut out, "type_str", PacketType::Timestamp.type_str());
        record::put(&mut out, "type", PacketType::Timestamp.code());
        record::put(&mut out, "timestamp", self.timestamp);
        record::put(&mut out, "bits", self.bit_string());
        if let Some(io_group) = self.io_group {
            record::put(&mut out, "io_group", io_group);
        }
        out
    }

    pub fn import(source: &Record) -> Result<Self> {
        check_type(source, PacketType::Timestamp)?;
        let mut packet = Self::default();
        if let Some(text) = record::get_str(source, "bits")? {
            let bits = parse_bit_string(text, Self::SIZE_BITS)
                .ok_or_else(|| PacketError::invalid_record("bits", "expected 56 binary digits"))?;
            packet.timestamp = to_uint(bits.as_bitslice(), Endian::Big);
        }
        if let Some(timestamp) = record::get_u64(source, "timestamp")? {
            packet.timestamp = timestamp;
        }
        packet.io_group = record::get_u8(source, "io_group")?;
        Ok(packet)
    }
}

impl PartialEq for TimestampPacket {
    fn eq(&self, other: &Self) -> bool {
        self.timestamp == other.timestamp
    }
}

impl Eq for TimestampPacket {}

impl fmt::Display for TimestampPacket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[ Timestamp: {} ]", self.timestamp)
    }
}

/// Free-text annotation with a timestamp.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessagePacket {
    pub message: String,
    pub timestamp: u64,
}

impl MessagePacket {
    pub const MESSAGE_BYTES: usize = 64;
    pub const NUM_BYTES: usize = 72;

    pub fn new(message: impl Into<String>, timestamp: u64) -> Self {
        Self {
            message: message.into(),
            timestamp,
        }
    }

    /// Message NUL-padded (or cut) to 64 bytes, then the timestamp as `u64` LE.
    pub fn bytes(&self) -> [u8; 72] {
        let mut out = [0u8; 72];
        let text = self.message.as_bytes();
        let len = text.len().min(Self::MESSAGE_BYTES);
        out[..len].copy_from_slice(&text[..len]);
        out[Self::MESSAGE_BYTES..].copy_from_slice(&self.timestamp.to_le_bytes());
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != Self::NUM_BYTES {
            return Err(PacketError::InvalidLength {
                expected: Self::NUM_BYTES,
                actual: bytes.len(),
            });
        }
        let (text, stamp) = bytes.split_at(Self::MESSAGE_BYTES);
        let end = text.iter().position(|b| *b == 0).unwrap_or(text.len());
        let mut wide = [0u8; 8];
        wide.copy_from_slice(stamp);
        Ok(Self {
            message: String::from_utf8_lossy(&text[..end]).into_owned(),
            timestamp: u64::from_le_bytes(wide),
        })
    }

    pub fn bit_string(&self) -> String {
        self.bytes().iter().map(|byte| format!("{byte:08b}")).collect()
    }

    pub fn chip_key(&self) -> Option<ChipKey> {
        None
    }

    pub fn export(&self) -> Record {
        let mut out = Record::new();
        record::put(&mut out, "type_str", PacketType::Message.type_str());
        record::put(&mut out, "type", PacketType::Message.code());
        record::put(&mut out, "message", self.message.clone());
        record::put(&mut out, "timestamp", self.timestamp);
        record::put(&mut out, "bits", self.bit_string());
        out
    }

    pub fn import(source: &Record) -> Result<Self> {
        check_type(source, PacketType::Message)?;
        let mut packet = Self::default();
        if let Some(text) = record::get_str(source, "bits")? {
            let bits = parse_bit_string(text, Self::NUM_BYTES * 8)
                .ok_or_else(|| PacketError::invalid_record("bits", "expected 576 binary digits"))?;
            packet = Self::from_bytes(bits.as_raw_slice())?;
        }
        if let Some(message) = record::get_str(source, "message")? {
            packet.message = message.to_string();
        }
        if let Some(timestamp) = record::get_u64(source, "timestamp")? {
            packet.timestamp = timestamp;
        }
        Ok(packet)
    }
}

impl fmt::Display for MessagePacket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[ Message: {} | Timestamp: {} ]", self.message, self.timestamp)
    }
}

/// Clock synchronisation event reported by a PACMAN card.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncPacket {
    pub sync_type: u8,
    pub clk_source: u8,
    pub timestamp: u32,
    pub io_group: Option<u8>,
}

impl SyncPacket {
    pub const SYNC: u8 = b'S';
    pub const HEARTBEAT: u8 = b'H';
    pub const CLOCK_SWITCH: u8 = b'C';

    pub fn new(sync_type: u8, clk_source: u8, timestamp: u32) -> Self {
        Self {
            sync_type,
            clk_source,
            timestamp,
            io_group: None,
        }
    }

    pub fn with_io_group(mut self, io_group: u8) -> Self {
        self.io_group = Some(io_group);
        self
    }

    pub fn sync_label(&self) -> &'static str {
        match self.sync_type {
            Self::SYNC => "SYNC",
            Self::HEARTBEAT => "HEARTBEAT",
            Self::CLOCK_SWITCH => "CLOCK SWITCH",
            _ => "OTHER",
        }
    }

    pub fn chip_key(&self) -> Option<ChipKey> {
        group_key(self.io_group)
    }

    pub fn export(&self) -> Record {
        let mut out = Record::new();
        record::put(&mut out, "type_str", PacketType::Sync.type_str());
        record::put_opt(&mut out, "io_group", self.io_group);
        record::put(&mut out, "sync_type", self.sync_type);
        record::put(&mut out, "timestamp", self.timestamp);
        record::put(&mut out, "clk_source", self.clk_source);
        record::put(&mut out, "type", PacketType::Sync.code());
        out
    }

    pub fn import(source: &Record) -> Result<Self> {
        check_type(source, PacketType::Sync)?;
        let mut packet = Self::default();
        if let Some(value) = record::get_u8(source, "sync_type")? {
            packet.sync_type = value;
        }
        if let Some(value) = record::get_u8(source, "clk_source")? {
            packet.clk_source = value;
        }
        if let Some(value) = record::get_u64(source, "timestamp")? {
            packet.timestamp = narrow("timestamp", value)?;
        }
        packet.io_group = record::get_u8(source, "io_group")?;
        Ok(packet)
    }
}

impl fmt::Display for SyncPacket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[ Sync")?;
        if let Some(io_group) = self.io_group {
            write!(f, " | IO group: {io_group}")?;
        }
        write!(
            f,
            " | Type: {} | Timestamp: {} | Clk source: {} ]",
            self.sync_label(),
            self.timestamp,
            self.clk_source
        )
    }
}

/// External trigger seen by a PACMAN card.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TriggerPacket {
    pub trigger_type: u8,
    pub timestamp: u32,
    pub io_group: Option<u8>,
}

impl TriggerPacket {
    pub fn new(trigger_type: u8, timestamp: u32) -> Self {
        Self {
            trigger_type,
            timestamp,
            io_group: None,
        }
    }

    pub fn with_io_group(mut self, io_group: u8) -> Self {
        self.io_group = Some(io_group);
        self
    }

    pub fn chip_key(&self) -> Option<ChipKey> {
        group_key(self.io_group)
    }

    pub fn export(&self) -> Record {
        let mut out = Record::new();
        record::put(&mut out, "type_str", PacketType::Trigger.type_str());
        record::put_opt(&mut out, "io_group", self.io_group);
        record::put(&mut out, "trigger_type", self.trigger_type);
        record::put(&mut out, "timestamp", self.timestamp);
        record::put(&mut out, "type", PacketType::Trigger.code());
        out
    }

    pub fn import(source: &Record) -> Result<Self> {
        check_type(source, PacketType::Trigger)?;
        let mut packet = Self::default();
        if let Some(value) = record::get_u8(source, "trigger_type")? {
            packet.trigger_type = value;
        }
        if let Some(value) = record::get_u64(source, "timestamp")? {
            packet.timestamp = narrow("timestamp", value)?;
        }
        packet.io_group = record::get_u8(source, "io_group")?;
        Ok(packet)
    }
}

impl fmt::Display for TriggerPacket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[ Trigger")?;
        if let Some(io_group) = self.io_group {
            write!(f, " | IO group: {io_group}")?;
        }
        write!(f, " | Type: {} | Timestamp: {} ]", self.trigger_type, self.timestamp)
    }
}
