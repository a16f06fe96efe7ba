mod cmd;
mod exit;
mod logging;
mod output;

use clap::Parser;

use crate::cmd::Command;
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "larpix-codec", version, about = "LArPix packet and PACMAN message tool")]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(
        long,
        value_name = "LEVEL",
        default_value = "info",
        env = "LARPIX_LOG_LEVEL",
        global = true
    )]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    let result = cmd::run(cli.command, format);

    match result {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cmd::Asic;

    #[test]
    fn parses_decode_packet_subcommand() {
        let cli = Cli::try_parse_from([
            "larpix-codec",
            "decode-packet",
            "0400000000000000",
            "--asic",
            "2",
        ])
        .expect("decode-packet args should parse");
        match cli.command {
            Command::DecodePacket(args) => assert_eq!(args.asic, Some(Asic::V2)),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn rejects_unknown_asic() {
        let err = Cli::try_parse_from(["larpix-codec", "decode-packet", "00", "--asic", "3"])
            .expect_err("asic 3 should fail");
        assert_eq!(err.kind(), clap::error::ErrorKind::InvalidValue);
    }

    #[test]
    fn parses_read_with_global_flags() {
        let cli = Cli::try_parse_from([
            "larpix-codec",
            "read",
            "127.0.0.1:5556",
            "--count",
            "3",
            "--format",
            "json",
            "--log-level",
            "debug",
        ])
        .expect("read args should parse");
        assert!(matches!(cli.format, Some(OutputFormat::Json)));
        assert!(matches!(cli.command, Command::Read(ref args) if args.count == Some(3)));
    }

    #[test]
    fn parses_resolve_subcommand() {
        let cli = Cli::try_parse_from(["larpix-codec", "resolve", "~2.3", "2.4"])
            .expect("resolve args should parse");
        assert!(matches!(cli.command, Command::Resolve(_)));
    }
}
