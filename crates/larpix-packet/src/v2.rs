//! LArPix v2 packet: 64 bits, little-endian bit order, 8 bytes on the wire.

use std::fmt;

use bitvec::prelude::*;

use crate::bits::{parse_bit_string, read_window, to_bit_string, write_window, BitWindow, Endian};
use crate::error::{PacketError, Result};
use crate::key::{ChipKey, KeyCache};
use crate::packet::PacketType;
use crate::record::{self, Record};

const ENDIAN: Endian = Endian::Little;

/// Named bit fields of a v2 packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum V2Field {
    PacketType,
    ChipId,
    ChannelId,
    Timestamp,
    FirstPacket,
    Dataword,
    TriggerType,
    LocalFifo,
    SharedFifo,
    LocalFifoEvents,
    SharedFifoEvents,
    RegisterAddress,
    RegisterData,
    DownstreamMarker,
    Parity,
}

impl V2Field {
    pub const ALL: [V2Field; 15] = [
        V2Field::PacketType,
        V2Field::ChipId,
        V2Field::ChannelId,
        V2Field::Timestamp,
        V2Field::FirstPacket,
        V2Field::Dataword,
        V2Field::TriggerType,
        V2Field::LocalFifo,
        V2Field::SharedFifo,
        V2Field::LocalFifoEvents,
        V2Field::SharedFifoEvents,
        V2Field::RegisterAddress,
        V2Field::RegisterData,
        V2Field::DownstreamMarker,
        V2Field::Parity,
    ];

    /// Record key of the field.
    pub const fn name(self) -> &'static str {
        match self {
            V2Field::PacketType => "packet_type",
            V2Field::ChipId => "chip_id",
            V2Field::ChannelId => "channel_id",
            V2Field::Timestamp => "timestamp",
            V2Field::FirstPacket => "first_packet",
            V2Field::Dataword => "dataword",
            V2Field::TriggerType => "trigger_type",
            V2Field::LocalFifo => "local_fifo",
            V2Field::SharedFifo => "shared_fifo",
            V2Field::LocalFifoEvents => "local_fifo_events",
            V2Field::SharedFifoEvents => "shared_fifo_events",
            V2Field::RegisterAddress => "register_address",
            V2Field::RegisterData => "register_data",
            V2Field::DownstreamMarker => "downstream_marker",
            V2Field::Parity => "parity",
        }
    }

    /// Bit window of the field. `None` when the field does not exist in the
    /// current layout (FIFO event counters without diagnostics).
    pub const fn window(self, fifo_diagnostics: bool) -> Option<BitWindow> {
        let window = match self {
            V2Field::PacketType => BitWindow::new(0, 2),
            V2Field::ChipId => BitWindow::new(2, 10),
            V2Field::ChannelId => BitWindow::new(10, 16),
            V2Field::Timestamp if fifo_diagnostics => BitWindow::new(16, 32),
            V2Field::Timestamp => BitWindow::new(16, 47),
            V2Field::FirstPacket => BitWindow::bit(47),
            V2Field::Dataword => BitWindow::new(48, 56),
            V2Field::TriggerType => BitWindow::new(56, 58),
            V2Field::LocalFifo => BitWindow::new(58, 60),
            V2Field::SharedFifo => BitWindow::new(60, 62),
            V2Field::LocalFifoEvents if fifo_diagnostics => BitWindow::new(44, 46),
            V2Field::SharedFifoEvents if fifo_diagnostics => BitWindow::new(32, 44),
            V2Field::LocalFifoEvents | V2Field::SharedFifoEvents => return None,
            V2Field::RegisterAddress => BitWindow::new(10, 18),
            V2Field::RegisterData => BitWindow::new(18, 26),
            V2Field::DownstreamMarker => BitWindow::bit(62),
            V2Field::Parity => BitWindow::bit(63),
        };
        Some(window)
    }
}

/// Self-trigger source of a data packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TriggerKind {
    Normal,
    External,
    Cross,
    Periodic,
}

impl TriggerKind {
    /// Decode the 2-bit trigger field. Higher bits are ignored.
    pub const fn from_bits(value: u8) -> Self {
        match value & 0b11 {
            0 => TriggerKind::Normal,
            1 => TriggerKind::External,
            2 => TriggerKind::Cross,
            _ => TriggerKind::Periodic,
        }
    }

    pub const fn bits(self) -> u8 {
        match self {
            TriggerKind::Normal => 0,
            TriggerKind::External => 1,
            TriggerKind::Cross => 2,
            TriggerKind::Periodic => 3,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            TriggerKind::Normal => "normal",
            TriggerKind::External => "external",
            TriggerKind::Cross => "cross",
            TriggerKind::Periodic => "periodic",
        }
    }
}

/// One 64-bit v2 ASIC packet plus the routing metadata that travels beside it.
#[derive(Debug, Clone)]
pub struct PacketV2 {
    bits: BitArray<[u8; 8], Lsb0>,
    fifo_diagnostics_enabled: bool,
    io_group: Option<u8>,
    io_channel: Option<u8>,
    direction: Option<u8>,
    receipt_timestamp: Option<u32>,
    chip_key: KeyCache,
}

impl PacketV2 {
    pub const ASIC_VERSION: u8 = 2;
    pub const SIZE_BITS: usize = 64;
    pub const NUM_BYTES: usize = 8;

    /// All-zero packet.
    pub fn new() -> Self {
        Self::from_array([0u8; 8])
    }

    /// Build a packet from its exact 8-byte wire form.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let array: [u8; 8] = bytes.try_into().map_err(|_| PacketError::InvalidLength {
            expected: Self::NUM_BYTES,
            actual: bytes.len(),
        })?;
        Ok(Self::from_array(array))
    }

    pub fn from_array(bytes: [u8; 8]) -> Self {
        Self {
            bits: BitArray::new(bytes),
            fifo_diagnostics_enabled: false,
            io_group: None,
            io_channel: None,
            direction: None,
            receipt_timestamp: None,
            chip_key: KeyCache::default(),
        }
    }

    /// Wire form.
    pub fn bytes(&self) -> [u8; 8] {
        self.bits.data
    }

    /// The packet as one little-endian integer.
    pub fn as_u64(&self) -> u64 {
        u64::from_le_bytes(self.bits.data)
    }

    pub fn bits(&self) -> &BitSlice<u8, Lsb0> {
        self.bits.as_bitslice()
    }

    /// `0`/`1` string in bit-index order.
    pub fn bit_string(&self) -> String {
        to_bit_string(self.bits.as_bitslice())
    }

    /// Read a field; `None` when the field is inactive in the current layout.
    pub fn get(&self, field: V2Field) -> Option<u64> {
        field
            .window(self.fifo_diagnostics_enabled)
            .map(|window| read_window(self.bits.as_bitslice(), window, ENDIAN))
    }

    /// Write a field, truncating to its width. Inactive fields are left alone.
    pub fn set(&mut self, field: V2Field, value: u64) {
        let Some(window) = field.window(self.fifo_diagnostics_enabled) else {
            return;
        };
        write_window(self.bits.as_mut_bitslice(), window, value, ENDIAN);
        if field == V2Field::ChipId {
            self.chip_key.invalidate();
        }
    }

    fn field(&self, field: V2Field) -> u64 {
        self.get(field).unwrap_or(0)
    }

    pub fn fifo_diagnostics_enabled(&self) -> bool {
        self.fifo_diagnostics_enabled
    }

    /// Switch the FIFO-diagnostics layout. Bits are never rewritten.
    pub fn set_fifo_diagnostics_enabled(&mut self, enabled: bool) {
        self.fifo_diagnostics_enabled = enabled;
    }

    pub fn packet_type(&self) -> u8 {
        self.field(V2Field::PacketType) as u8
    }

    pub fn set_packet_type(&mut self, value: u8) {
        self.set(V2Field::PacketType, u64::from(value));
    }

    pub fn kind(&self) -> PacketType {
        PacketType::from_hardware_bits(self.packet_type())
    }

    pub fn chip_id(&self) -> u8 {
        self.field(V2Field::ChipId) as u8
    }

    pub fn set_chip_id(&mut self, value: u8) {
        self.set(V2Field::ChipId, u64::from(value));
    }

    pub fn channel_id(&self) -> u8 {
        self.field(V2Field::ChannelId) as u8
    }

    pub fn set_channel_id(&mut self, value: u8) {
        self.set(V2Field::ChannelId, u64::from(value));
    }

    /// 31-bit timestamp, or 16 bits in FIFO-diagnostics mode.
    pub fn timestamp(&self) -> u32 {
        self.field(V2Field::Timestamp) as u32
    }

    pub fn set_timestamp(&mut self, value: u32) {
        self.set(V2Field::Timestamp, u64::from(value));
    }

    pub fn first_packet(&self) -> u8 {
        self.field(V2Field::FirstPacket) as u8
    }

    pub fn set_first_packet(&mut self, value: u8) {
        self.set(V2Field::FirstPacket, u64::from(value));
    }

    pub fn dataword(&self) -> u8 {
        self.field(V2Field::Dataword) as u8
    }

    pub fn set_dataword(&mut self, value: u8) {
        self.set(V2Field::Dataword, u64::from(value));
    }

    pub fn trigger_type(&self) -> u8 {
        self.field(V2Field::TriggerType) as u8
    }

    pub fn set_trigger_type(&mut self, value: u8) {
        self.set(V2Field::TriggerType, u64::from(value));
    }

    pub fn trigger_kind(&self) -> TriggerKind {
        TriggerKind::from_bits(self.trigger_type())
    }

    pub fn local_fifo(&self) -> u8 {
        self.field(V2Field::LocalFifo) as u8
    }

    pub fn set_local_fifo(&mut self, value: u8) {
        self.set(V2Field::LocalFifo, u64::from(value));
    }

    pub fn shared_fifo(&self) -> u8 {
        self.field(V2Field::SharedFifo) as u8
    }

    pub fn set_shared_fifo(&mut self, value: u8) {
        self.set(V2Field::SharedFifo, u64::from(value));
    }

    pub fn local_fifo_half(&self) -> bool {
        self.local_fifo() & 1 == 1
    }

    pub fn local_fifo_full(&self) -> bool {
        self.local_fifo() >> 1 == 1
    }

    pub fn set_local_fifo_half(&mut self, half: bool) {
        self.set_local_fifo((self.local_fifo() & 0b10) | u8::from(half));
    }

    pub fn set_local_fifo_full(&mut self, full: bool) {
        self.set_local_fifo((u8::from(full) << 1) | (self.local_fifo() & 1));
    }

    pub fn shared_fifo_half(&self) -> bool {
        self.shared_fifo() & 1 == 1
    }

    pub fn shared_fifo_full(&self) -> bool {
        self.shared_fifo() >> 1 == 1
    }

    pub fn set_shared_fifo_half(&mut self, half: bool) {
        self.set_shared_fifo((self.shared_fifo() & 0b10) | u8::from(half));
    }

    pub fn set_shared_fifo_full(&mut self, full: bool) {
        self.set_shared_fifo((u8::from(full) << 1) | (self.shared_fifo() & 1));
    }

    /// Local FIFO event counter; present only in FIFO-diagnostics mode.
    pub fn local_fifo_events(&self) -> Option<u8> {
        self.get(V2Field::LocalFifoEvents).map(|value| value as u8)
    }

    pub fn set_local_fifo_events(&mut self, value: u8) {
        self.set(V2Field::LocalFifoEvents, u64::from(value));
    }

    /// Shared FIFO event counter; present only in FIFO-diagnostics mode.
    pub fn shared_fifo_events(&self) -> Option<u16> {
        self.get(V2Field::SharedFifoEvents).map(|value| value as u16)
    }

    pub fn set_shared_fifo_events(&mut self, value: u16) {
        self.set(V2Field::SharedFifoEvents, u64::from(value));
    }

    pub fn register_address(&self) -> u8 {
        self.field(V2Field::RegisterAddress) as u8
    }

    pub fn set_register_address(&mut self, value: u8) {
        self.set(V2Field::RegisterAddress, u64::from(value));
    }

    pub fn register_data(&self) -> u8 {
        self.field(V2Field::RegisterData) as u8
    }

    pub fn set_register_data(&mut self, value: u8) {
        self.set(V2Field::RegisterData, u64::from(value));
    }

    pub fn downstream_marker(&self) -> u8 {
        self.field(V2Field::DownstreamMarker) as u8
    }

    pub fn set_downstream_marker(&mut self, value: u8) {
        self.set(V2Field::DownstreamMarker, u64::from(value));
    }

    pub fn parity(&self) -> u8 {
        self.field(V2Field::Parity) as u8
    }

    pub fn set_parity(&mut self, value: u8) {
        self.set(V2Field::Parity, u64::from(value));
    }

    /// Odd parity over bits [0, 63).
    pub fn compute_parity(&self) -> u8 {
        let ones = self.bits.as_bitslice()[..63].count_ones();
        1 - (ones % 2) as u8
    }

    pub fn assign_parity(&mut self) {
        let parity = self.compute_parity();
        self.set_parity(parity);
    }

    pub fn has_valid_parity(&self) -> bool {
        self.parity() == self.compute_parity()
    }

    pub fn io_group(&self) -> Option<u8> {
        self.io_group
    }

    pub fn set_io_group(&mut self, value: Option<u8>) {
        self.io_group = value;
        self.chip_key.invalidate();
    }

    pub fn io_channel(&self) -> Option<u8> {
        self.io_channel
    }

    pub fn set_io_channel(&mut self, value: Option<u8>) {
        self.io_channel = value;
        self.chip_key.invalidate();
    }

    /// Chip key; `None` until both io_group and io_channel are known.
    pub fn chip_key(&self) -> Option<ChipKey> {
        self.chip_key.get_or_derive(|| {
            Some(ChipKey::new(self.io_group?, self.io_channel?, self.chip_id()))
        })
    }

    /// Assign io_group, io_channel and chip_id at once; `None` clears the routing.
    pub fn set_chip_key(&mut self, key: Option<ChipKey>) {
        match key {
            Some(key) => {
                self.io_group = Some(key.io_group());
                self.io_channel = Some(key.io_channel());
                self.set_chip_id(key.chip_id());
            }
            None => {
                self.io_group = None;
                self.io_channel = None;
            }
        }
        self.chip_key.invalidate();
    }

    /// 0 = write to chip, 1 = read from chip.
    pub fn direction(&self) -> Option<u8> {
        self.direction
    }

    pub fn set_direction(&mut self, value: Option<u8>) {
        self.direction = value;
    }

    /// Arrival time stamped by the PACMAN card.
    pub fn receipt_timestamp(&self) -> Option<u32> {
        self.receipt_timestamp
    }

    pub fn set_receipt_timestamp(&mut self, value: Option<u32>) {
        self.receipt_timestamp = value;
    }

    /// Flat record of the fields meaningful for this packet type.
    pub fn export(&self) -> Record {
        let mut out = Record::new();
        record::put(&mut out, "asic_version", Self::ASIC_VERSION);
        record::put_opt(&mut out, "chip_key", self.chip_key().map(|key| key.to_string()));
        record::put_opt(&mut out, "io_group", self.io_group);
        record::put_opt(&mut out, "io_channel", self.io_channel);
        record::put(&mut out, "bits", self.bit_string());
        record::put(&mut out, "type_str", self.kind().type_str());
        for field in [
            V2Field::PacketType,
            V2Field::ChipId,
            V2Field::DownstreamMarker,
            V2Field::Parity,
        ] {
            record::put(&mut out, field.name(), self.field(field));
        }
        record::put(&mut out, "valid_parity", self.has_valid_parity());
        match self.kind() {
            PacketType::Data => {
                for field in [
                    V2Field::ChannelId,
                    V2Field::Timestamp,
                    V2Field::FirstPacket,
                    V2Field::Dataword,
                    V2Field::TriggerType,
                    V2Field::LocalFifo,
                    V2Field::SharedFifo,
                ] {
                    record::put(&mut out, field.name(), self.field(field));
                }
                if self.fifo_diagnostics_enabled {
                    for field in [V2Field::LocalFifoEvents, V2Field::SharedFifoEvents] {
                        record::put(&mut out, field.name(), self.field(field));
                    }
                }
            }
            PacketType::ConfigWrite | PacketType::ConfigRead => {
                for field in [V2Field::RegisterAddress, V2Field::RegisterData] {
                    record::put(&mut out, field.name(), self.field(field));
                }
            }
            _ => {}
        }
        if let Some(direction) = self.direction {
            record::put(&mut out, "direction", direction);
        }
        if let Some(receipt) = self.receipt_timestamp {
            record::put(&mut out, "receipt_timestamp", receipt);
        }
        out
    }

    /// Rebuild a packet from [`PacketV2::export`] output.
    ///
    /// `bits` is applied first, then every named field present in the record.
    pub fn import(source: &Record) -> Result<Self> {
        match record::get_u64(source, "asic_version")? {
            Some(version) if version == u64::from(Self::ASIC_VERSION) => {}
            other => {
                return Err(PacketError::UnsupportedVersion(format!(
                    "asic version {other:?} is not a v2 packet"
                )))
            }
        }
        if let Some(kind) = record::get_u64(source, "type")? {
            if kind > 3 {
                return Err(PacketError::UnsupportedVersion(format!(
                    "packet type {kind} is not a v2 packet"
                )));
            }
        }

        let mut packet = match record::get_str(source, "bits")? {
            Some(text) => {
                let bits = parse_bit_string(text, Self::SIZE_BITS)
                    .ok_or_else(|| PacketError::invalid_record("bits", "expected 64 binary digits"))?;
                let mut packet = Self::new();
                packet.bits.as_mut_bitslice().clone_from_bitslice(&bits);
                packet
            }
            None => Self::new(),
        };

        packet.fifo_diagnostics_enabled = record::get_u64(source, "local_fifo_events")?.is_some()
            || record::get_u64(source, "shared_fifo_events")?.is_some();

        if let Some(text) = record::get_str(source, "chip_key")? {
            packet.set_chip_key(Some(text.parse()?));
        }
        if source.contains_key("io_group") {
            packet.set_io_group(record::get_u8(source, "io_group")?);
        }
        if source.contains_key("io_channel") {
            packet.set_io_channel(record::get_u8(source, "io_channel")?);
        }
        packet.direction = record::get_u8(source, "direction")?;
        packet.receipt_timestamp = record::get_u64(source, "receipt_timestamp")?
            .map(|value| {
                u32::try_from(value)
                    .map_err(|_| PacketError::invalid_record("receipt_timestamp", "exceeds u32"))
            })
            .transpose()?;

        for field in V2Field::ALL {
            if let Some(value) = record::get_u64(source, field.name())? {
                packet.set(field, value);
            }
        }
        Ok(packet)
    }
}

impl Default for PacketV2 {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for PacketV2 {
    fn eq(&self, other: &Self) -> bool {
        self.bits.data == other.bits.data
    }
}

impl Eq for PacketV2 {}

impl fmt::Display for PacketV2 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some(direction) = self.direction {
            parts.push(format!("Direction: {direction}"));
        }
        match self.chip_key() {
            Some(key) => parts.push(format!("Key: {key}")),
            None => parts.push("Key: None".to_string()),
        }
        parts.push(format!("Chip: {}", self.chip_id()));
        parts.push(if self.downstream_marker() == 1 { "Downstream" } else { "Upstream" }.to_string());
        match self.kind() {
            PacketType::Data => {
                parts.push("Data".to_string());
                parts.push(format!("Channel: {}", self.channel_id()));
                parts.push(format!("Timestamp: {}", self.timestamp()));
                parts.push(format!("First packet: {}", self.first_packet()));
                parts.push(format!("Dataword: {}", self.dataword()));
                parts.push(format!("Trigger: {}", self.trigger_kind().label()));
                parts.push(fifo_status("Local", self.local_fifo_half(), self.local_fifo_full()));
                parts.push(fifo_status("Shared", self.shared_fifo_half(), self.shared_fifo_full()));
                if let (Some(local), Some(shared)) = (self.local_fifo_events(), self.shared_fifo_events()) {
                    parts.push(format!("Local FIFO: {local}"));
                    parts.push(format!("Shared FIFO: {shared}"));
                }
            }
            PacketType::Test => parts.push("Test".to_string()),
            kind => {
                parts.push(if kind == PacketType::ConfigRead { "Read" } else { "Write" }.to_string());
                parts.push(format!("Register: {}", self.register_address()));
                parts.push(format!("Value: {}", self.register_data()));
            }
        }
        if let Some(receipt) = self.receipt_timestamp {
            parts.push(format!("Receipt TS: {receipt}"));
        }
        parts.push(format!(
            "Parity: {} (valid: {})",
            self.parity(),
            self.has_valid_parity()
        ));
        write!(f, "[ {} ]", parts.join(" | "))
    }
}

fn fifo_status(name: &str, half: bool, full: bool) -> String {
    if full {
        format!("{name} FIFO 100%")
    } else if half {
        format!("{name} FIFO >50%")
    } else {
        format!("{name} FIFO ok")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data_packet() -> PacketV2 {
        let mut packet = PacketV2::new();
        packet.set_packet_type(0);
        packet.set_chip_id(3);
        packet.set_channel_id(5);
        packet.set_timestamp(1000);
        packet.set_dataword(42);
        packet
    }

    #[test]
    fn from_bytes_requires_eight_bytes() {
        let err = PacketV2::from_bytes(&[0u8; 7]).unwrap_err();
        assert!(matches!(err, PacketError::InvalidLength { expected: 8, actual: 7 }));
        assert!(PacketV2::from_bytes(&[0u8; 9]).is_err());
        assert!(PacketV2::from_bytes(&[0u8; 8]).is_ok());
    }

    #[test]
    fn bytes_roundtrip_is_bit_exact() {
        let raw = [0x12, 0x34, 0x56, 0x78, 0x9a, 0xbc, 0xde, 0xf0];
        let packet = PacketV2::from_bytes(&raw).unwrap();
        assert_eq!(packet.bytes(), raw);
        assert_eq!(packet.as_u64(), u64::from_le_bytes(raw));
    }

    #[test]
    fn field_layout_matches_little_endian_integer() {
        let packet = data_packet();
        let word = packet.as_u64();
        assert_eq!(word & 0b11, 0);
        assert_eq!((word >> 2) & 0xff, 3);
        assert_eq!((word >> 10) & 0x3f, 5);
        assert_eq!((word >> 16) & 0x7fff_ffff, 1000);
        assert_eq!((word >> 48) & 0xff, 42);
    }

    #[test]
    fn config_windows_overlap_data_windows() {
        let mut packet = PacketV2::new();
        packet.set_packet_type(2);
        packet.set_register_address(0xab);
        packet.set_register_data(0xcd);
        assert_eq!(packet.register_address(), 0xab);
        assert_eq!(packet.register_data(), 0xcd);
        // register_address [10,18) shares its low 6 bits with channel_id [10,16)
        assert_eq!(packet.channel_id(), 0xab & 0x3f);
    }

    #[test]
    fn parity_detects_single_flip() {
        let mut packet = data_packet();
        packet.assign_parity();
        assert!(packet.has_valid_parity());
        assert_eq!(packet.bits().count_ones() % 2, 1);

        for bit in 0..64 {
            let mut flipped = packet.clone();
            let current = flipped.bits.as_bitslice()[bit];
            flipped.bits.as_mut_bitslice().set(bit, !current);
            assert!(!flipped.has_valid_parity(), "flip of bit {bit} went unnoticed");
        }
    }

    #[test]
    fn fifo_diagnostics_switches_layout_without_rewriting() {
        let mut packet = data_packet();
        let before = packet.bytes();
        assert_eq!(packet.local_fifo_events(), None);
        packet.set_local_fifo_events(3);
        assert_eq!(packet.bytes(), before);

        packet.set_fifo_diagnostics_enabled(true);
        assert_eq!(packet.bytes(), before);
        assert_eq!(packet.timestamp(), 1000 & 0xffff);
        packet.set_shared_fifo_events(0xabc);
        packet.set_local_fifo_events(2);
        assert_eq!(packet.shared_fifo_events(), Some(0xabc));
        assert_eq!(packet.local_fifo_events(), Some(2));

        packet.set_fifo_diagnostics_enabled(false);
        assert_eq!(packet.local_fifo_events(), None);
    }

    #[test]
    fn fifo_half_and_full_flags() {
        let mut packet = PacketV2::new();
        packet.set_local_fifo_full(true);
        assert_eq!(packet.local_fifo(), 2);
        packet.set_local_fifo_half(true);
        assert_eq!(packet.local_fifo(), 3);
        packet.set_local_fifo_full(false);
        assert!(packet.local_fifo_half());
        assert!(!packet.local_fifo_full());

        packet.set_shared_fifo(2);
        assert!(packet.shared_fifo_full());
        assert!(!packet.shared_fifo_half());
    }

    #[test]
    fn chip_key_tracks_mutations() {
        let mut packet = data_packet();
        assert_eq!(packet.chip_key(), None);
        packet.set_io_group(Some(1));
        assert_eq!(packet.chip_key(), None);
        packet.set_io_channel(Some(2));
        assert_eq!(packet.chip_key(), Some(ChipKey::new(1, 2, 3)));
        packet.set_chip_id(9);
        assert_eq!(packet.chip_key(), Some(ChipKey::new(1, 2, 9)));
        packet.set(V2Field::ChipId, 10);
        assert_eq!(packet.chip_key().unwrap().to_string(), "1-2-10");
        packet.set_chip_key(None);
        assert_eq!(packet.chip_key(), None);
        assert_eq!(packet.chip_id(), 10);
    }

    #[test]
    fn equality_ignores_metadata() {
        let mut a = data_packet();
        let b = data_packet();
        a.set_io_group(Some(4));
        a.set_receipt_timestamp(Some(77));
        assert_eq!(a, b);
        a.set_dataword(1);
        assert_ne!(a, b);
    }

    #[test]
    fn export_picks_fields_by_type() {
        let mut packet = data_packet();
        packet.set_chip_key(Some(ChipKey::new(1, 2, 3)));
        let exported = packet.export();
        assert_eq!(exported["type_str"], "data");
        assert_eq!(exported["chip_key"], "1-2-3");
        assert_eq!(exported["dataword"], 42);
        assert!(!exported.contains_key("register_address"));
        assert!(!exported.contains_key("direction"));

        packet.set_packet_type(3);
        let exported = packet.export();
        assert_eq!(exported["type_str"], "config read");
        assert!(exported.contains_key("register_data"));
        assert!(!exported.contains_key("dataword"));
    }

    #[test]
    fn import_inverts_export() {
        let mut packet = data_packet();
        packet.set_chip_key(Some(ChipKey::new(1, 2, 3)));
        packet.set_fifo_diagnostics_enabled(true);
        packet.set_local_fifo_events(1);
        packet.set_direction(Some(1));
        packet.set_receipt_timestamp(Some(123_456));
        packet.assign_parity();

        let restored = PacketV2::import(&packet.export()).unwrap();
        assert_eq!(restored, packet);
        assert!(restored.fifo_diagnostics_enabled());
        assert_eq!(restored.chip_key(), packet.chip_key());
        assert_eq!(restored.direction(), Some(1));
        assert_eq!(restored.receipt_timestamp(), Some(123_456));
    }

    #[test]
    fn import_rejects_other_asic_versions() {
        let mut exported = data_packet().export();
        exported.insert("asic_version".to_string(), 1.into());
        assert!(matches!(
            PacketV2::import(&exported),
            Err(PacketError::UnsupportedVersion(_))
        ));

        let mut exported = data_packet().export();
        exported.insert("type".to_string(), 4.into());
        assert!(matches!(
            PacketV2::import(&exported),
            Err(PacketError::UnsupportedVersion(_))
        ));
    }

    #[test]
    fn display_lists_data_fields() {
        let mut packet = data_packet();
        packet.assign_parity();
        let text = packet.to_string();
        assert!(text.starts_with("[ Key: None | Chip: 3 | Upstream | Data"));
        assert!(text.contains("Dataword: 42"));
        assert!(text.contains("Trigger: normal"));
        assert!(text.ends_with("Parity: 1 (valid: true) ]") || text.ends_with("Parity: 0 (valid: true) ]"));
    }
}
