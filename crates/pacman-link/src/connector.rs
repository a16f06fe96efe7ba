use std::net::TcpStream;
use std::thread;

use tracing::debug;

use crate::config::{LinkConfig, Role};
use crate::error::{LinkError, Result};
use crate::link::TcpLink;
use crate::state::LinkState;

/// Connect to a PACMAN card (or emulator) as a reader with default configuration.
pub fn connect(addr: &str) -> Result<TcpLink> {
    connect_with_config(addr, Role::Reader, LinkConfig::default())
}

/// Connect with explicit role and configuration.
///
/// Connect errors are retried every `config.retry.retry_interval` until
/// `config.retry.max_connect_attempts` is spent.
pub fn connect_with_config(addr: &str, role: Role, config: LinkConfig) -> Result<TcpLink> {
    let mut state = LinkState::Disconnected;
    state.transition(LinkState::Connecting)?;

    let attempts = config.retry.attempts();
    let mut attempt = 0u32;
    let stream = loop {
        attempt += 1;
        match TcpStream::connect(addr) {
            Ok(stream) => break stream,
            Err(err) if attempt < attempts => {
                debug!(addr, attempt, error = %err, "connect failed, retrying");
                thread::sleep(config.retry.retry_interval);
                state.transition(LinkState::Connecting)?;
            }
            Err(source) => {
                state.transition(LinkState::Disconnected)?;
                return Err(LinkError::Connect {
                    addr: addr.to_string(),
                    attempts: attempt,
                    source,
                });
            }
        }
    };
    debug!(addr, attempt, %role, "connected");

    state.transition(LinkState::Handshaking)?;
    match TcpLink::from_tcp(stream, role, config) {
        Ok(link) => Ok(link),
        Err(err) => {
            state.transition(LinkState::Disconnected)?;
            debug!(addr, error = %err, "bootstrap failed");
            Err(err)
        }
    }
}
