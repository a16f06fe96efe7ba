//! LArPix v1 packet: 54 bits, big-endian bit order, 7 bytes on the wire.
//!
//! The wire bytes are stored reversed and read MSB-first; the first two bits
//! of that buffer are padding and are always zero. Bit index `i` of every
//! window below is logical bit `i`, i.e. buffer bit `i + 2`.

use std::fmt;

use bitvec::prelude::*;

use crate::bits::{parse_bit_string, read_window, to_bit_string, write_window, BitWindow, Endian};
use crate::error::{PacketError, Result};
use crate::key::{ChipKey, KeyCache};
use crate::packet::PacketType;
use crate::record::{self, Record};

const ENDIAN: Endian = Endian::Big;
const PADDING: usize = 2;

/// Named bit fields of a v1 packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum V1Field {
    PacketType,
    ChipId,
    Parity,
    ChannelId,
    Timestamp,
    Dataword,
    FifoHalf,
    FifoFull,
    RegisterAddress,
    RegisterData,
    TestCounter,
}

impl V1Field {
    pub const ALL: [V1Field; 11] = [
        V1Field::PacketType,
        V1Field::ChipId,
        V1Field::Parity,
        V1Field::ChannelId,
        V1Field::Timestamp,
        V1Field::Dataword,
        V1Field::FifoHalf,
        V1Field::FifoFull,
        V1Field::RegisterAddress,
        V1Field::RegisterData,
        V1Field::TestCounter,
    ];

    /// Record key of the field.
    pub const fn name(self) -> &'static str {
        match self {
            V1Field::PacketType => "type",
            V1Field::ChipId => "chipid",
            V1Field::Parity => "parity",
            V1Field::ChannelId => "channel",
            V1Field::Timestamp => "timestamp",
            V1Field::Dataword => "adc_counts",
            V1Field::FifoHalf => "fifo_half",
            V1Field::FifoFull => "fifo_full",
            V1Field::RegisterAddress => "register",
            V1Field::RegisterData => "value",
            V1Field::TestCounter => "counter",
        }
    }

    /// Windows holding the field, most-significant part first.
    pub const fn windows(self) -> &'static [BitWindow] {
        match self {
            V1Field::PacketType => const { &[BitWindow::new(52, 54)] },
            V1Field::ChipId => const { &[BitWindow::new(44, 52)] },
            V1Field::Parity => const { &[BitWindow::bit(0)] },
            V1Field::ChannelId => const { &[BitWindow::new(37, 44)] },
            V1Field::Timestamp => const { &[BitWindow::new(13, 37)] },
            V1Field::Dataword => const { &[BitWindow::new(3, 13)] },
            V1Field::FifoHalf => const { &[BitWindow::bit(2)] },
            V1Field::FifoFull => const { &[BitWindow::bit(1)] },
            V1Field::RegisterAddress => const { &[BitWindow::new(36, 44)] },
            V1Field::RegisterData => const { &[BitWindow::new(28, 36)] },
            V1Field::TestCounter => const { &[BitWindow::new(40, 44), BitWindow::new(1, 13)] },
        }
    }
}

/// One 54-bit v1 ASIC packet.
#[derive(Debug, Clone)]
pub struct PacketV1 {
    bits: BitArray<[u8; 7], Msb0>,
    io_group: Option<u8>,
    io_channel: Option<u8>,
    direction: Option<u8>,
    chip_key: KeyCache,
}

impl PacketV1 {
    pub const ASIC_VERSION: u8 = 1;
    pub const SIZE_BITS: usize = 54;
    pub const NUM_BYTES: usize = 7;

    pub fn new() -> Self {
        Self {
            bits: BitArray::new([0u8; 7]),
            io_group: None,
            io_channel: None,
            direction: None,
            chip_key: KeyCache::default(),
        }
    }

    /// Build a packet from its exact 7-byte wire form. Padding bits are dropped.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut array: [u8; 7] = bytes.try_into().map_err(|_| PacketError::InvalidLength {
            expected: Self::NUM_BYTES,
            actual: bytes.len(),
        })?;
        array.reverse();
        let mut packet = Self::new();
        packet.bits = BitArray::new(array);
        packet.bits.as_mut_bitslice()[..PADDING].fill(false);
        Ok(packet)
    }

    /// Wire form, padding bits zero.
    pub fn bytes(&self) -> [u8; 7] {
        let mut out = self.bits.data;
        out.reverse();
        out
    }

    /// The 54 significant bits.
    pub fn bits(&self) -> &BitSlice<u8, Msb0> {
        &self.bits.as_bitslice()[PADDING..]
    }

    fn bits_mut(&mut self) -> &mut BitSlice<u8, Msb0> {
        &mut self.bits.as_mut_bitslice()[PADDING..]
    }

    pub fn bit_string(&self) -> String {
        to_bit_string(self.bits())
    }

    /// Read a field. `Dataword` reads with its low bit cleared.
    pub fn get(&self, field: V1Field) -> u64 {
        let value = field.windows().iter().fold(0u64, |acc, window| {
            (acc << window.width()) | read_window(self.bits(), *window, ENDIAN)
        });
        if field == V1Field::Dataword {
            value & !1
        } else {
            value
        }
    }

    /// Write a field, truncating to its total width.
    pub fn set(&mut self, field: V1Field, value: u64) {
        let mut remaining = value;
        for window in field.windows().iter().rev() {
            write_window(self.bits_mut(), *window, remaining, ENDIAN);
            remaining = remaining.checked_shr(window.width() as u32).unwrap_or(0);
        }
        if field == V1Field::ChipId {
            self.chip_key.invalidate();
        }
    }

    pub fn packet_type(&self) -> u8 {
        self.get(V1Field::PacketType) as u8
    }

    pub fn set_packet_type(&mut self, value: u8) {
        self.set(V1Field::PacketType, u64::from(value));
    }

    pub fn kind(&self) -> PacketType {
        PacketType::from_hardware_bits(self.packet_type())
    }

    pub fn chip_id(&self) -> u8 {
        self.get(V1Field::ChipId) as u8
    }

    pub fn set_chip_id(&mut self, value: u8) {
        self.set(V1Field::ChipId, u64::from(value));
    }

    pub fn channel_id(&self) -> u8 {
        self.get(V1Field::ChannelId) as u8
    }

    pub fn set_channel_id(&mut self, value: u8) {
        self.set(V1Field::ChannelId, u64::from(value));
    }

    /// 24-bit timestamp.
    pub fn timestamp(&self) -> u32 {
        self.get(V1Field::Timestamp) as u32
    }

    pub fn set_timestamp(&mut self, value: u32) {
        self.set(V1Field::Timestamp, u64::from(value));
    }

    /// 10-bit ADC word; the hardware leaves its low bit meaningless.
    pub fn dataword(&self) -> u16 {
        self.get(V1Field::Dataword) as u16
    }

    pub fn set_dataword(&mut self, value: u16) {
        self.set(V1Field::Dataword, u64::from(value));
    }

    pub fn fifo_half(&self) -> bool {
        self.get(V1Field::FifoHalf) == 1
    }

    pub fn set_fifo_half(&mut self, flag: bool) {
        self.set(V1Field::FifoHalf, u64::from(flag));
    }

    pub fn fifo_full(&self) -> bool {
        self.get(V1Field::FifoFull) == 1
    }

    pub fn set_fifo_full(&mut self, flag: bool) {
        self.set(V1Field::FifoFull, u64::from(flag));
    }

    pub fn register_address(&self) -> u8 {
        self.get(V1Field::RegisterAddress) as u8
    }

    pub fn set_register_address(&mut self, value: u8) {
        self.set(V1Field::RegisterAddress, u64::from(value));
    }

    pub fn register_data(&self) -> u8 {
        self.get(V1Field::RegisterData) as u8
    }

    pub fn set_register_data(&mut self, value: u8) {
        self.set(V1Field::RegisterData, u64::from(value));
    }

    /// 16-bit test counter spread over two windows.
    pub fn test_counter(&self) -> u16 {
        self.get(V1Field::TestCounter) as u16
    }

    pub fn set_test_counter(&mut self, value: u16) {
        self.set(V1Field::TestCounter, u64::from(value));
    }

    pub fn parity(&self) -> u8 {
        self.get(V1Field::Parity) as u8
    }

    pub fn set_parity(&mut self, value: u8) {
        self.set(V1Field::Parity, u64::from(value));
    }

    /// Odd parity over logical bits [1, 54).
    pub fn compute_parity(&self) -> u8 {
        let ones = self.bits()[1..].count_ones();
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

    pub fn chip_key(&self) -> Option<ChipKey> {
        self.chip_key.get_or_derive(|| {
            Some(ChipKey::new(self.io_group?, self.io_channel?, self.chip_id()))
        })
    }

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

    pub fn direction(&self) -> Option<u8> {
        self.direction
    }

    pub fn set_direction(&mut self, value: Option<u8>) {
        self.direction = value;
    }

    pub fn export(&self) -> Record {
        let mut out = Record::new();
        record::put(&mut out, "asic_version", Self::ASIC_VERSION);
        record::put_opt(&mut out, "chip_key", self.chip_key().map(|key| key.to_string()));
        record::put(&mut out, "bits", self.bit_string());
        record::put(&mut out, "type_str", self.kind().type_str());
        record::put(&mut out, "type", self.packet_type());
        record::put(&mut out, "chipid", self.chip_id());
        record::put(&mut out, "parity", self.parity());
        record::put(&mut out, "valid_parity", self.has_valid_parity());
        match self.kind() {
            PacketType::Test => record::put(&mut out, "counter", self.test_counter()),
            PacketType::Data => {
                record::put(&mut out, "channel", self.channel_id());
                record::put(&mut out, "timestamp", self.timestamp());
                record::put(&mut out, "adc_counts", self.dataword());
                record::put(&mut out, "fifo_half", self.fifo_half());
                record::put(&mut out, "fifo_full", self.fifo_full());
            }
            _ => {
                record::put(&mut out, "register", self.register_address());
                record::put(&mut out, "value", self.register_data());
            }
        }
        if let Some(direction) = self.direction {
            record::put(&mut out, "direction", direction);
        }
        out
    }

    /// Rebuild a packet from [`PacketV1::export`] output.
    pub fn import(source: &Record) -> Result<Self> {
        match record::get_u64(source, "asic_version")? {
            Some(version) if version == u64::from(Self::ASIC_VERSION) => {}
            other => {
                return Err(PacketError::UnsupportedVersion(format!(
                    "asic version {other:?} is not a v1 packet"
                )))
            }
        }
        if let Some(kind) = record::get_u64(source, "type")? {
            if kind > 3 {
                return Err(PacketError::UnsupportedVersion(format!(
                    "packet type {kind} is not a v1 packet"
                )));
            }
        }

        let mut packet = Self::new();
        if let Some(text) = record::get_str(source, "bits")? {
            let bits = parse_bit_string(text, Self::SIZE_BITS)
                .ok_or_else(|| PacketError::invalid_record("bits", "expected 54 binary digits"))?;
            packet.bits_mut().clone_from_bitslice(&bits);
        }
        if let Some(text) = record::get_str(source, "chip_key")? {
            packet.set_chip_key(Some(text.parse()?));
        }
        packet.direction = record::get_u8(source, "direction")?;
        for field in V1Field::ALL {
            if let Some(value) = record::get_u64(source, field.name())? {
                packet.set(field, value);
            }
        }
        Ok(packet)
    }
}

impl Default for PacketV1 {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for PacketV1 {
    fn eq(&self, other: &Self) -> bool {
        self.bits.data == other.bits.data
    }
}

impl Eq for PacketV1 {}

impl fmt::Display for PacketV1 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let key = self
            .chip_key()
            .map_or_else(|| "None".to_string(), |key| key.to_string());
        write!(f, "[ Chip key: {key} | Chip: {} | ", self.chip_id())?;
        if let Some(direction) = self.direction {
            write!(f, "Direction: {direction} | ")?;
        }
        match self.kind() {
            PacketType::Test => write!(f, "Test | Counter: {} | ", self.test_counter())?,
            PacketType::Data => write!(
                f,
                "Data | Channel: {} | Timestamp: {} | ADC data: {} | FIFO Half: {} | FIFO Full: {} | ",
                self.channel_id(),
                self.timestamp(),
                self.dataword(),
                self.fifo_half(),
                self.fifo_full()
            )?,
            kind => {
                let label = if kind == PacketType::ConfigRead {
                    "Config read"
                } else {
                    "Config write"
                };
                write!(
                    f,
                    "{label} | Register: {} | Value: {} | ",
                    self.register_address(),
                    self.register_data()
                )?;
            }
        }
        write!(
            f,
            "Parity: {} (valid: {}) ]",
            self.parity(),
            self.has_valid_parity()
        )
    }
}
