//! TCP link to a PACMAN readout card.
//!
//! A link walks `Disconnected -> Connecting -> Handshaking -> Streaming`
//! and ends in `Closed`. During the handshake the card side sends two
//! opaque bootstrap frames that the reader consumes; afterwards both sides
//! exchange whole PACMAN messages.
//!
//! [`connect`] opens reader-role links with retry. [`LinkListener`] accepts
//! readers on behalf of an emulated card.

#[cfg(feature = "async")]
pub mod async_link;
pub mod bootstrap;
pub mod config;
pub mod connector;
pub mod error;
pub mod link;
pub mod listener;
pub mod state;

#[cfg(feature = "async")]
pub use async_link::AsyncLink;
pub use bootstrap::{
    read_bootstrap, write_bootstrap, BootstrapFrame, FLAG_COMMAND, FLAG_LONG, FLAG_MORE,
};
pub use config::{LinkConfig, RetryPolicy, Role, DEFAULT_IDENTITY};
pub use connector::{connect, connect_with_config};
pub use error::{LinkError, Result};
pub use link::{Link, TcpLink};
pub use listener::LinkListener;
pub use state::LinkState;
