use larpix_packet::{Packet, PacketV1, PacketV2};

use crate::cmd::{Asic, DecodePacketArgs};
use crate::exit::{packet_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{print_packets, OutputFormat};

pub fn run(args: DecodePacketArgs, format: OutputFormat) -> CliResult<i32> {
    let packet = decode(&args.hex, args.asic)?;
    let valid_parity = match &packet {
        Packet::V1(v1) => v1.has_valid_parity(),
        Packet::V2(v2) => v2.has_valid_parity(),
        _ => true,
    };
    if !valid_parity {
        tracing::warn!(packet = %args.hex, "parity bit does not match");
    }
    print_packets(std::slice::from_ref(&packet), format);
    Ok(SUCCESS)
}

fn decode(hex_text: &str, asic: Option<Asic>) -> CliResult<Packet> {
    let cleaned: String = hex_text
        .trim()
        .trim_start_matches("0x")
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '_')
        .collect();
    let bytes = hex::decode(&cleaned)
        .map_err(|err| CliError::new(USAGE, format!("invalid hex packet: {err}")))?;

    let asic = match asic {
        Some(asic) => asic,
        None => match bytes.len() {
            PacketV1::NUM_BYTES => Asic::V1,
            PacketV2::NUM_BYTES => Asic::V2,
            other => {
                return Err(CliError::new(
                    USAGE,
                    format!("cannot infer ASIC version from {other} bytes; pass --asic"),
                ));
            }
        },
    };

    let packet = match asic {
        Asic::V1 => PacketV1::from_bytes(&bytes).map(Packet::from),
        Asic::V2 => PacketV2::from_bytes(&bytes).map(Packet::from),
    };
    packet.map_err(|err| packet_error("decode failed", err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exit::DATA_INVALID;

    #[test]
    fn infers_version_from_length() {
        let v2 = decode("0x0400000000000000", None).expect("v2 packet should decode");
        assert_eq!(v2.as_v2().map(|p| p.chip_id()), Some(1));

        let v1 = decode("00 00 00 00 00 00 00", None).expect("v1 packet should decode");
        assert!(v1.as_v1().is_some());
    }

    #[test]
    fn explicit_version_checks_length() {
        let err = decode("0400000000000000", Some(Asic::V1)).unwrap_err();
        assert_eq!(err.code, DATA_INVALID);
    }

    #[test]
    fn rejects_bad_input() {
        assert_eq!(decode("zz", None).unwrap_err().code, USAGE);
        assert_eq!(decode("0102", None).unwrap_err().code, USAGE);
    }
}
