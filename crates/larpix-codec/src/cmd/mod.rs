use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Subcommand, ValueEnum};

use crate::exit::{CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod decode_msg;
pub mod decode_packet;
pub mod emulate;
pub mod read;
pub mod resolve;
pub mod schema;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Decode one hex-encoded ASIC packet.
    DecodePacket(DecodePacketArgs),
    /// Decode a file of PACMAN messages into packets.
    DecodeMsg(DecodeMsgArgs),
    /// Print the row layout of a schema version.
    Schema(SchemaArgs),
    /// Resolve a requested schema version against a file's version.
    Resolve(ResolveArgs),
    /// Connect to a PACMAN card as a reader and print received packets.
    Read(ReadArgs),
    /// Emulate a PACMAN card: accept a reader and replay messages from a file.
    Emulate(EmulateArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::DecodePacket(args) => decode_packet::run(args, format),
        Command::DecodeMsg(args) => decode_msg::run(args, format),
        Command::Schema(args) => schema::run(args, format),
        Command::Resolve(args) => resolve::run(args, format),
        Command::Read(args) => read::run(args, format),
        Command::Emulate(args) => emulate::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum Asic {
    #[value(name = "1")]
    V1,
    #[value(name = "2")]
    V2,
}

#[derive(Args, Debug)]
pub struct DecodePacketArgs {
    /// Packet bytes as hex (7 bytes for v1, 8 bytes for v2; `0x` prefix allowed).
    pub hex: String,
    /// ASIC version. Default: inferred from the byte count.
    #[arg(long)]
    pub asic: Option<Asic>,
}

#[derive(Args, Debug)]
pub struct DecodeMsgArgs {
    /// File holding one or more encoded PACMAN messages.
    pub file: PathBuf,
    /// io_group assigned to decoded packets.
    #[arg(long)]
    pub io_group: Option<u8>,
}

#[derive(Args, Debug)]
pub struct SchemaArgs {
    /// Schema version (e.g. 2.4).
    pub version: String,
}

#[derive(Args, Debug)]
pub struct ResolveArgs {
    /// Requested version: `M.m` for an exact match, `~M.m` for a compatible one.
    pub requested: String,
    /// Version recorded in the file.
    pub file_version: String,
}

#[derive(Args, Debug)]
pub struct ReadArgs {
    /// Card address (host:port).
    pub addr: String,
    /// Exit after receiving N messages.
    #[arg(long)]
    pub count: Option<usize>,
    /// io_group assigned to received packets.
    #[arg(long)]
    pub io_group: Option<u8>,
    /// Connect attempts before giving up.
    #[arg(long, default_value = "10", env = "LARPIX_CONNECT_ATTEMPTS")]
    pub attempts: u32,
    /// Delay between connect attempts (e.g. 500ms, 1s).
    #[arg(long, default_value = "500ms")]
    pub retry_interval: String,
    /// Bootstrap handshake timeout (e.g. 5s).
    #[arg(long, default_value = "5s")]
    pub handshake_timeout: String,
}

#[derive(Args, Debug)]
pub struct EmulateArgs {
    /// Address to listen on (host:port).
    pub addr: String,
    /// File of encoded PACMAN messages to replay.
    pub file: PathBuf,
    /// Delay between messages (e.g. 10ms). Default: none.
    #[arg(long)]
    pub interval: Option<String>,
    /// Replay the file this many times per reader.
    #[arg(long, default_value = "1")]
    pub loops: usize,
    /// Serve this many readers, then exit. Default: until interrupted.
    #[arg(long)]
    pub readers: Option<usize>,
    /// Identity frame body sent during the bootstrap.
    #[arg(long, default_value = "pacman")]
    pub identity: String,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Parse `150ms`, `2s` or a bare number of seconds.
pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, millis) = if let Some(num) = input.strip_suffix("ms") {
        (num, true)
    } else if let Some(num) = input.strip_suffix('s') {
        (num, false)
    } else {
        (input, false)
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    Ok(if millis {
        Duration::from_millis(value)
    } else {
        Duration::from_secs(value)
    })
}
