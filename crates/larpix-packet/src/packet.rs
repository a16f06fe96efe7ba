//! The [`Packet`] enum over every packet kind and its shared type codes.

use std::fmt;

use crate::error::{PacketError, Result};
use crate::key::ChipKey;
use crate::meta::{MessagePacket, SyncPacket, TimestampPacket, TriggerPacket};
use crate::record::{self, Record};
use crate::v1::PacketV1;
use crate::v2::PacketV2;

/// Packet type discriminant shared by the ASIC and meta packets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum PacketType {
    Data = 0,
    Test = 1,
    ConfigWrite = 2,
    ConfigRead = 3,
    Timestamp = 4,
    Message = 5,
    Sync = 6,
    Trigger = 7,
}

impl PacketType {
    pub const fn code(self) -> u8 {
        self as u8
    }

    pub const fn type_str(self) -> &'static str {
        match self {
            PacketType::Data => "data",
            PacketType::Test => "test",
            PacketType::ConfigWrite => "config write",
            PacketType::ConfigRead => "config read",
            PacketType::Timestamp => "timestamp",
            PacketType::Message => "message",
            PacketType::Sync => "sync",
            PacketType::Trigger => "trigger",
        }
    }

    /// Map the 2-bit hardware `packet_type` field.
    pub const fn from_hardware_bits(bits: u8) -> Self {
        match bits & 0b11 {
            0 => PacketType::Data,
            1 => PacketType::Test,
            2 => PacketType::ConfigWrite,
            _ => PacketType::ConfigRead,
        }
    }

    /// True for the four types an ASIC can emit.
    pub const fn is_hardware(self) -> bool {
        (self as u8) < 4
    }
}

impl TryFrom<u64> for PacketType {
    type Error = PacketError;

    fn try_from(code: u64) -> Result<Self> {
        Ok(match code {
            0 => PacketType::Data,
            1 => PacketType::Test,
            2 => PacketType::ConfigWrite,
            3 => PacketType::ConfigRead,
            4 => PacketType::Timestamp,
            5 => PacketType::Message,
            6 => PacketType::Sync,
            7 => PacketType::Trigger,
            other => return Err(PacketError::UnknownPacketType(other)),
        })
    }
}

impl fmt::Display for PacketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_str())
    }
}

/// Any packet that can appear in a readout stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packet {
    V1(PacketV1),
    V2(PacketV2),
    Timestamp(TimestampPacket),
    Message(MessagePacket),
    Sync(SyncPacket),
    Trigger(TriggerPacket),
}

impl Packet {
    pub fn packet_type(&self) -> PacketType {
        match self {
            Packet::V1(packet) => packet.kind(),
            Packet::V2(packet) => packet.kind(),
            Packet::Timestamp(_) => PacketType::Timestamp,
            Packet::Message(_) => PacketType::Message,
            Packet::Sync(_) => PacketType::Sync,
            Packet::Trigger(_) => PacketType::Trigger,
        }
    }

    pub fn type_str(&self) -> &'static str {
        self.packet_type().type_str()
    }

    pub fn chip_key(&self) -> Option<ChipKey> {
        match self {
            Packet::V1(packet) => packet.chip_key(),
            Packet::V2(packet) => packet.chip_key(),
            Packet::Timestamp(packet) => packet.chip_key(),
            Packet::Message(packet) => packet.chip_key(),
            Packet::Sync(packet) => packet.chip_key(),
            Packet::Trigger(packet) => packet.chip_key(),
        }
    }

    pub fn io_group(&self) -> Option<u8> {
        match self {
            Packet::V1(packet) => packet.io_group(),
            Packet::V2(packet) => packet.io_group(),
            Packet::Timestamp(packet) => packet.io_group,
            Packet::Message(_) => None,
            Packet::Sync(packet) => packet.io_group,
            Packet::Trigger(packet) => packet.io_group,
        }
    }

    /// Transfer direction of ASIC packets.
    pub fn direction(&self) -> Option<u8> {
        match self {
            Packet::V1(packet) => packet.direction(),
            Packet::V2(packet) => packet.direction(),
            _ => None,
        }
    }

    pub fn as_v1(&self) -> Option<&PacketV1> {
        match self {
            Packet::V1(packet) => Some(packet),
            _ => None,
        }
    }

    pub fn as_v2(&self) -> Option<&PacketV2> {
        match self {
            Packet::V2(packet) => Some(packet),
            _ => None,
        }
    }

    pub fn export(&self) -> Record {
        match self {
            Packet::V1(packet) => packet.export(),
            Packet::V2(packet) => packet.export(),
            Packet::Timestamp(packet) => packet.export(),
            Packet::Message(packet) => packet.export(),
            Packet::Sync(packet) => packet.export(),
            Packet::Trigger(packet) => packet.export(),
        }
    }

    /// Rebuild any packet from its export record.
    ///
    /// Records carrying `asic_version` go to the matching ASIC variant; the
    /// rest are dispatched on `type`.
    pub fn import(source: &Record) -> Result<Self> {
        if let Some(version) = record::get_u64(source, "asic_version")? {
            return match version {
                1 => PacketV1::import(source).map(Packet::V1),
                2 => PacketV2::import(source).map(Packet::V2),
                other => Err(PacketError::UnsupportedVersion(format!("asic version {other}"))),
            };
        }
        let code = record::require_u64(source, "type")?;
        match PacketType::try_from(code)? {
            PacketType::Timestamp => TimestampPacket::import(source).map(Packet::Timestamp),
            PacketType::Message => MessagePacket::import(source).map(Packet::Message),
            PacketType::Sync => SyncPacket::import(source).map(Packet::Sync),
            PacketType::Trigger => TriggerPacket::import(source).map(Packet::Trigger),
            hardware => Err(PacketError::UnsupportedVersion(format!(
                "{hardware} packet record has no asic_version"
            ))),
        }
    }
}

impl fmt::Display for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Packet::V1(packet) => fmt::Display::fmt(packet, f),
            Packet::V2(packet) => fmt::Display::fmt(packet, f),
            Packet::Timestamp(packet) => fmt::Display::fmt(packet, f),
            Packet::Message(packet) => fmt::Display::fmt(packet, f),
            Packet::Sync(packet) => fmt::Display::fmt(packet, f),
            Packet::Trigger(packet) => fmt::Display::fmt(packet, f),
        }
    }
}

impl From<PacketV1> for Packet {
    fn from(packet: PacketV1) -> Self {
        Packet::V1(packet)
    }
}

impl From<PacketV2> for Packet {
    fn from(packet: PacketV2) -> Self {
        Packet::V2(packet)
    }
}

impl From<TimestampPacket> for Packet {
    fn from(packet: TimestampPacket) -> Self {
        Packet::Timestamp(packet)
    }
}

impl From<MessagePacket> for Packet {
    fn from(packet: MessagePacket) -> Self {
        Packet::Message(packet)
    }
}

impl From<SyncPacket> for Packet {
    fn from(packet: SyncPacket) -> Self {
        Packet::Sync(packet)
    }
}

impl From<TriggerPacket> for Packet {
    fn from(packet: TriggerPacket) -> Self {
        Packet::Trigger(packet)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_codes() {
        for code in 0..8u64 {
            let kind = PacketType::try_from(code).unwrap();
            assert_eq!(u64::from(kind.code()), code);
        }
        assert!(matches!(
            PacketType::try_from(8),
            Err(PacketError::UnknownPacketType(8))
        ));
        assert_eq!(PacketType::ConfigWrite.type_str(), "config write");
        assert!(PacketType::ConfigRead.is_hardware());
        assert!(!PacketType::Timestamp.is_hardware());
    }

    #[test]
    fn import_dispatches_by_record() {
        let packets: Vec<Packet> = vec![
            PacketV1::new().into(),
            PacketV2::new().into(),
            TimestampPacket::new(10).into(),
            MessagePacket::new("hi", 3).into(),
            SyncPacket::new(b'S', 1, 2).into(),
            TriggerPacket::new(1, 2).into(),
        ];
        for packet in packets {
            let restored = Packet::import(&packet.export()).unwrap();
            assert_eq!(restored, packet);
            assert_eq!(restored.type_str(), packet.type_str());
        }
    }

    #[test]
    fn import_rejects_unknown_records() {
        let mut source = Record::new();
        source.insert("type".to_string(), 9.into());
        assert!(matches!(
            Packet::import(&source),
            Err(PacketError::UnknownPacketType(9))
        ));

        let mut source = Record::new();
        source.insert("asic_version".to_string(), 3.into());
        assert!(matches!(
            Packet::import(&source),
            Err(PacketError::UnsupportedVersion(_))
        ));

        assert!(Packet::import(&Record::new()).is_err());
    }

    #[test]
    fn chip_key_per_variant() {
        let mut v2 = PacketV2::new();
        v2.set_chip_key(Some(ChipKey::new(1, 2, 3)));
        assert_eq!(Packet::from(v2).chip_key(), Some(ChipKey::new(1, 2, 3)));
        assert_eq!(Packet::from(TimestampPacket::new(1)).chip_key(), None);
        assert_eq!(
            Packet::from(TriggerPacket::new(0, 0).with_io_group(5)).chip_key(),
            Some(ChipKey::new(5, 0, 0))
        );
    }
}
