use std::time::Duration;

use crate::state::LinkState;

/// Errors that can occur in link operations.
#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    /// Every connect attempt failed.
    #[error("failed to connect to {addr} after {attempts} attempt(s): {source}")]
    Connect {
        addr: String,
        attempts: u32,
        #[source]
        source: std::io::Error,
    },

    /// The link state machine refused a transition.
    #[error("invalid link transition: {from} -> {to}")]
    InvalidTransition { from: LinkState, to: LinkState },

    /// Bootstrap exchange failed.
    #[error("handshake failed: {0}")]
    Handshake(String),

    /// The link was closed locally.
    #[error("link closed")]
    Closed,

    /// A blocking operation hit its deadline.
    #[error("link operation timed out after {0:?}")]
    Timeout(Duration),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] pacman_frame::FrameError),

    /// Socket error outside framing.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, LinkError>;
