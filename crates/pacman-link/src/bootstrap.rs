//! Bootstrap frames exchanged before a link streams PACMAN messages.
//!
//! Each frame is a flags byte, a size and a body. The size is one byte
//! unless [`FLAG_LONG`] is set, in which case it is 8 bytes big-endian.
//! The emulator sends an identity frame followed by an empty frame; the
//! reader consumes both and keeps the identity.

use std::io::{ErrorKind, Read, Write};
use std::time::{Duration, Instant};

use bytes::{BufMut, Bytes, BytesMut};
use tracing::debug;

use crate::error::{LinkError, Result};

/// More frames follow in the same bootstrap.
pub const FLAG_MORE: u8 = 0x01;
/// Size field is 8 bytes.
pub const FLAG_LONG: u8 = 0x02;
/// Frame carries a transport command.
pub const FLAG_COMMAND: u8 = 0x04;

const RESERVED_FLAGS: u8 = !(FLAG_MORE | FLAG_LONG | FLAG_COMMAND);
const BOOTSTRAP_FRAMES: usize = 2;

/// One opaque bootstrap frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapFrame {
    pub flags: u8,
    pub body: Bytes,
}

impl BootstrapFrame {
    pub fn new(flags: u8, body: impl Into<Bytes>) -> Self {
        Self {
            flags,
            body: body.into(),
        }
    }

    pub fn has_more(&self) -> bool {
        self.flags & FLAG_MORE != 0
    }

    /// Encode with a short size when the body fits in one byte.
    pub fn encode(&self, dst: &mut BytesMut) {
        let len = self.body.len();
        if len > u8::MAX as usize {
            dst.reserve(9 + len);
            dst.put_u8(self.flags | FLAG_LONG);
            dst.put_u64(len as u64);
        } else {
            dst.reserve(2 + len);
            dst.put_u8(self.flags & !FLAG_LONG);
            dst.put_u8(len as u8);
        }
        dst.put_slice(&self.body);
    }
}

/// Emulator side: send the identity frame and the empty delimiter.
pub fn write_bootstrap<W: Write>(
    writer: &mut W,
    identity: &[u8],
    timeout: Duration,
) -> Result<()> {
    let mut buf = BytesMut::new();
    BootstrapFrame::new(FLAG_MORE, Bytes::copy_from_slice(identity)).encode(&mut buf);
    BootstrapFrame::new(0, Bytes::new()).encode(&mut buf);

    let written = writer.write_all(&buf).and_then(|()| writer.flush());
    match written {
        Ok(()) => {
            debug!(identity_len = identity.len(), "sent bootstrap frames");
            Ok(())
        }
        Err(err) if is_timeout(&err) => Err(LinkError::Timeout(timeout)),
        Err(err) => Err(LinkError::Io(err)),
    }
}

/// Reader side: consume the two bootstrap frames and return the identity body.
pub fn read_bootstrap<R: Read>(
    reader: &mut R,
    max_size: usize,
    timeout: Duration,
) -> Result<Bytes> {
    let deadline = Instant::now() + timeout;
    let mut identity = Bytes::new();
    for index in 0..BOOTSTRAP_FRAMES {
        let frame = read_frame(reader, max_size, deadline, timeout)?;
        debug!(
            index,
            flags = frame.flags,
            len = frame.body.len(),
            "received bootstrap frame"
        );
        if index == 0 {
            identity = frame.body;
        }
    }
    Ok(identity)
}

/// Read one frame, retrying transient errors until `deadline`.
pub fn read_frame<R: Read>(
    reader: &mut R,
    max_size: usize,
    deadline: Instant,
    timeout: Duration,
) -> Result<BootstrapFrame> {
    let mut head = [0u8; 2];
    read_exact_until(reader, &mut head, deadline, timeout)?;
    let flags = head[0];
    check_flags(flags)?;

    let size = if flags & FLAG_LONG != 0 {
        let mut rest = [0u8; 7];
        read_exact_until(reader, &mut rest, deadline, timeout)?;
        let mut long = [0u8; 8];
        long[0] = head[1];
        long[1..].copy_from_slice(&rest);
        u64::from_be_bytes(long)
    } else {
        u64::from(head[1])
    };

    if size > max_size as u64 {
        return Err(LinkError::Handshake(format!(
            "bootstrap frame too large: {size} (max {max_size})"
        )));
    }

    let mut body = vec![0u8; size as usize];
    read_exact_until(reader, &mut body, deadline, timeout)?;
    Ok(BootstrapFrame::new(flags, body))
}

pub(crate) fn check_flags(flags: u8) -> Result<()> {
    if flags & RESERVED_FLAGS != 0 {
        return Err(LinkError::Handshake(format!(
            "reserved bootstrap flags set: {flags:#04x}"
        )));
    }
    Ok(())
}

fn read_exact_until<R: Read>(
    reader: &mut R,
    buf: &mut [u8],
    deadline: Instant,
    timeout: Duration,
) -> Result<()> {
    let mut filled = 0usize;
    while filled < buf.len() {
        if Instant::now() >= deadline {
            return Err(LinkError::Timeout(timeout));
        }
        match reader.read(&mut buf[filled..]) {
            Ok(0) => {
                return Err(LinkError::Handshake(
                    "connection closed during bootstrap".to_string(),
                ));
            }
            Ok(n) => filled += n,
            Err(err) if err.kind() == ErrorKind::Interrupted || is_timeout(&err) => continue,
            Err(err) => return Err(LinkError::Io(err)),
        }
    }
    Ok(())
}

fn is_timeout(err: &std::io::Error) -> bool {
    matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut)
}
