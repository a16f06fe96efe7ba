#![cfg(all(unix, feature = "cli"))]

use std::net::TcpListener;
use std::path::PathBuf;
use std::process::{Command, Output, Stdio};

use larpix_packet::{Packet, SyncPacket, TriggerPacket};
use pacman_frame::{format_packets, MsgType};

fn unique_temp_dir(tag: &str) -> PathBuf {
    let dir = PathBuf::from(format!(
        "/tmp/larpix-cli-{tag}-{}-{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time should be after epoch")
            .as_nanos()
    ));
    std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
    dir
}

fn free_addr() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("listener should bind");
    let addr = listener.local_addr().expect("listener should have address");
    addr.to_string()
}

fn cli(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_larpix-codec"))
        .args(["--log-level", "error"])
        .args(args)
        .output()
        .expect("command should run")
}

fn json_lines(output: &Output) -> Vec<serde_json::Value> {
    String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(|line| serde_json::from_str(line).expect("stdout should be json lines"))
        .collect()
}

fn write_message_file(dir: &std::path::Path, count: u32) -> PathBuf {
    let mut wire = Vec::new();
    for tick in 0..count {
        let packets: Vec<Packet> = vec![
            TriggerPacket::new(1, tick).into(),
            SyncPacket::new(b'S', 1, tick + 1).into(),
        ];
        let bytes = format_packets(&packets, MsgType::Data, tick).expect("message should encode");
        wire.extend_from_slice(&bytes);
    }
    let path = dir.join("messages.bin");
    std::fs::write(&path, wire).expect("message file should be writable");
    path
}

#[test]
fn decode_packet_prints_record() {
    let output = cli(&["--format", "json", "decode-packet", "0x0400000000000000"]);
    assert!(output.status.success());
    let records = json_lines(&output);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["chip_id"], 1);
    assert_eq!(records[0]["asic_version"], 2);
}

#[test]
fn decode_packet_rejects_bad_hex() {
    let output = cli(&["decode-packet", "not-hex"]);
    assert_eq!(output.status.code(), Some(64));
}

#[test]
fn decode_msg_lists_words_and_packets() {
    let dir = unique_temp_dir("decode-msg");
    let file = write_message_file(&dir, 2);

    let output = cli(&[
        "--format",
        "json",
        "decode-msg",
        file.to_str().expect("path should be utf-8"),
        "--io-group",
        "4",
    ]);
    assert!(output.status.success());
    let messages = json_lines(&output);
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[1]["msg_type"], "DATA");
    assert_eq!(messages[1]["words"], serde_json::json!(["TRIG", "SYNC"]));
    assert_eq!(messages[1]["packets"].as_array().map(Vec::len), Some(3));

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn schema_and_resolve() {
    let output = cli(&["--format", "json", "schema", "2.4"]);
    assert!(output.status.success());
    let schema = &json_lines(&output)[0];
    assert_eq!(schema["version"], "2.4");
    assert_eq!(schema["latest"], true);

    let output = cli(&["--format", "raw", "resolve", "~2.3", "2.4"]);
    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "2.4");

    let output = cli(&["resolve", "2.2", "2.4"]);
    assert_eq!(output.status.code(), Some(60));

    let output = cli(&["schema", "9.9"]);
    assert_eq!(output.status.code(), Some(64));
}

#[test]
fn read_from_emulated_card() {
    let dir = unique_temp_dir("emulate");
    let file = write_message_file(&dir, 3);
    let addr = free_addr();

    let emulator = Command::new(env!("CARGO_BIN_EXE_larpix-codec"))
        .args(["--log-level", "error", "--format", "json", "emulate"])
        .arg(&addr)
        .arg(&file)
        .args(["--readers", "1", "--identity", "tile-1"])
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("emulator should start");

    let output = cli(&[
        "--format",
        "json",
        "read",
        &addr,
        "--count",
        "3",
        "--retry-interval",
        "100ms",
        "--attempts",
        "50",
    ]);
    assert!(output.status.success());
    let messages = json_lines(&output);
    assert_eq!(messages.len(), 3);
    for (index, message) in messages.iter().enumerate() {
        assert_eq!(message["index"], index);
        assert_eq!(message["packets"][1]["type_str"], "trigger");
        assert_eq!(message["packets"][1]["timestamp"], index);
    }

    let served = emulator.wait_with_output().expect("emulator should exit");
    assert!(served.status.success());
    let summary = json_lines(&served);
    assert_eq!(summary[0]["messages"], 3);

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn read_gives_up_on_closed_port() {
    let addr = free_addr();
    let output = cli(&["read", &addr, "--attempts", "1"]);
    assert_eq!(output.status.code(), Some(3));
}
