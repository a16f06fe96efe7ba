//! LArPix packet codec and PACMAN messaging.
//!
//! # Crate Structure
//!
//! - [`packet`]: bit-exact v1/v2 ASIC packets, chip keys and meta packets
//! - [`schema`]: versioned row layouts for persisting packet streams
//! - [`frame`]: PACMAN wire messages and packet/word conversion
//! - [`link`]: TCP link with bootstrap handshake (behind `link` feature)

/// Re-export packet types.
pub mod packet {
    pub use larpix_packet::*;
}

/// Re-export schema types.
pub mod schema {
    pub use larpix_schema::*;
}

/// Re-export frame types.
pub mod frame {
    pub use pacman_frame::*;
}

/// Re-export link types (requires `link` feature).
#[cfg(feature = "link")]
pub mod link {
    pub use pacman_link::*;
}
