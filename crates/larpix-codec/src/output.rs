use std::io::IsTerminal;

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use larpix_packet::Packet;
use pacman_frame::Message;
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct MessageOutput<'a> {
    index: usize,
    msg_type: &'static str,
    timestamp: u32,
    word_count: u16,
    words: Vec<&'static str>,
    packets: Vec<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    peer: Option<&'a str>,
}

/// Print one JSON document on its own line.
pub fn print_json<T: Serialize>(value: &T) {
    println!(
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    );
}

pub fn print_packets(packets: &[Packet], format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            for packet in packets {
                print_json(&packet.export());
            }
        }
        OutputFormat::Table => println!("{}", packet_table(packets)),
        OutputFormat::Pretty => {
            for packet in packets {
                println!("{packet}");
            }
        }
        OutputFormat::Raw => {
            for packet in packets {
                println!("{}", raw_packet(packet));
            }
        }
    }
}

/// Print a decoded message and the packets it carries.
pub fn print_message(
    index: usize,
    message: &Message,
    packets: &[Packet],
    peer: Option<&str>,
    format: OutputFormat,
) {
    match format {
        OutputFormat::Json => {
            let out = MessageOutput {
                index,
                msg_type: message.msg_type().name(),
                timestamp: message.header.timestamp,
                word_count: message.header.word_count,
                words: message.words.iter().map(|w| w.word_type().name()).collect(),
                packets: packets
                    .iter()
                    .map(|p| serde_json::Value::Object(p.export()))
                    .collect(),
                peer,
            };
            print_json(&out);
        }
        OutputFormat::Table => {
            println!(
                "message {index}: {} t={} words={}",
                message.msg_type(),
                message.header.timestamp,
                message.words.len()
            );
            println!("{}", packet_table(packets));
        }
        OutputFormat::Pretty => {
            println!(
                "[{index}] {} timestamp={} words={}",
                message.msg_type(),
                message.header.timestamp,
                message.words.len()
            );
            for packet in packets {
                println!("  {packet}");
            }
        }
        OutputFormat::Raw => print_packets(packets, OutputFormat::Raw),
    }
}

fn packet_table(packets: &[Packet]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["TYPE", "CHIP KEY", "DETAIL"]);
    for packet in packets {
        table.add_row(vec![
            packet.type_str().to_string(),
            packet
                .chip_key()
                .map(|key| key.to_string())
                .unwrap_or_else(|| "-".to_string()),
            packet.to_string(),
        ]);
    }
    table
}

/// Hardware packets as wire hex, meta packets as their display form.
pub fn raw_packet(packet: &Packet) -> String {
    match packet {
        Packet::V1(v1) => hex::encode(v1.bytes()),
        Packet::V2(v2) => hex::encode(v2.bytes()),
        other => other.to_string(),
    }
}
