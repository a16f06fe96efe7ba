use std::fmt;
use std::io;

use larpix_packet::PacketError;
use larpix_schema::SchemaError;
use pacman_frame::FrameError;
use pacman_link::LinkError;

// sysexits-style exit codes.
pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const LINK_ERROR: i32 = 3;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::ConnectionRefused | io::ErrorKind::NotFound => FAILURE,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn packet_error(context: &str, err: PacketError) -> CliError {
    CliError::new(DATA_INVALID, format!("{context}: {err}"))
}

pub fn schema_error(context: &str, err: SchemaError) -> CliError {
    match err {
        SchemaError::UnknownVersion(_) => CliError::new(USAGE, format!("{context}: {err}")),
        other => CliError::new(DATA_INVALID, format!("{context}: {other}")),
    }
}

pub fn frame_error(context: &str, err: FrameError) -> CliError {
    match err {
        FrameError::Io(source) => io_error(context, source),
        FrameError::ConnectionClosed => CliError::new(FAILURE, format!("{context}: {err}")),
        other => CliError::new(DATA_INVALID, format!("{context}: {other}")),
    }
}

pub fn link_error(context: &str, err: LinkError) -> CliError {
    match err {
        LinkError::Connect { .. } => CliError::new(LINK_ERROR, format!("{context}: {err}")),
        LinkError::Handshake(_) => CliError::new(LINK_ERROR, format!("{context}: {err}")),
        LinkError::Timeout(_) => CliError::new(TIMEOUT, format!("{context}: {err}")),
        LinkError::Frame(err) => frame_error(context, err),
        LinkError::Io(err) => io_error(context, err),
        other => CliError::new(INTERNAL, format!("{context}: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn schema_errors_map_to_codes() {
        let err = schema_error("resolve", SchemaError::UnknownVersion("9.9".to_string()));
        assert_eq!(err.code, USAGE);
        let err = schema_error(
            "resolve",
            SchemaError::IncompatibleVersion {
                requested: "2.2".to_string(),
                file: "2.4".to_string(),
            },
        );
        assert_eq!(err.code, DATA_INVALID);
        assert!(err.message.starts_with("resolve: incompatible versions"));
    }

    #[test]
    fn link_errors_map_to_codes() {
        assert_eq!(
            link_error("read", LinkError::Timeout(Duration::from_secs(1))).code,
            TIMEOUT
        );
        assert_eq!(
            link_error("read", LinkError::Frame(FrameError::ConnectionClosed)).code,
            FAILURE
        );
        let refused = io::Error::from(io::ErrorKind::ConnectionRefused);
        let err = LinkError::Connect {
            addr: "127.0.0.1:1".to_string(),
            attempts: 2,
            source: refused,
        };
        assert_eq!(link_error("connect", err).code, LINK_ERROR);
    }
}
