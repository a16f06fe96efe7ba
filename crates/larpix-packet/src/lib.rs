//! Bit-exact LArPix packet layouts.
//!
//! Every hardware packet is a fixed-size bit buffer read through named bit
//! windows:
//! - v1 ASICs: 54 significant bits, big-endian bit order, 7 bytes on the wire
//! - v2 ASICs: 64 bits, little-endian bit order, 8 bytes on the wire
//!
//! Meta packets (timestamp, message, sync, trigger) sit beside them in the
//! [`Packet`] enum so that readers can carry one ordered stream of records.

pub mod bits;
pub mod error;
pub mod key;
pub mod meta;
pub mod packet;
pub mod record;
pub mod v1;
pub mod v2;

pub use bits::{from_uint, to_uint, BitWindow, Endian};
pub use error::{PacketError, Result};
pub use key::ChipKey;
pub use meta::{MessagePacket, SyncPacket, TimestampPacket, TriggerPacket};
pub use packet::{Packet, PacketType};
pub use record::Record;
pub use v1::{PacketV1, V1Field};
pub use v2::{PacketV2, TriggerKind, V2Field};
