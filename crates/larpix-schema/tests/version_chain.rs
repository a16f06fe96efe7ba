use larpix_packet::{
    ChipKey, MessagePacket, Packet, PacketV1, PacketV2, SyncPacket, TimestampPacket, TriggerPacket,
};
use larpix_schema::{
    format_message_row, format_row, is_representable, parse_row, resolve_version, ParseConfig,
    SchemaError, SchemaRegistry, SchemaVersion, TableWriter, LATEST_VERSION,
};

fn data_packet() -> PacketV2 {
    let mut packet = PacketV2::new();
    packet.set_chip_key(Some(ChipKey::new(1, 2, 3)));
    packet.set_channel_id(5);
    packet.set_timestamp(1000);
    packet.set_dataword(42);
    packet.assign_parity();
    packet
}

fn v(major: u16, minor: u16) -> SchemaVersion {
    SchemaVersion::new(major, minor)
}

/// One packet of every kind, with io_group, io_channel, direction and
/// receipt timestamp set wherever the kind carries them.
fn annotated_packets() -> Vec<Packet> {
    let mut v1_data = PacketV1::new();
    v1_data.set_chip_key(Some(ChipKey::new(1, 1, 7)));
    v1_data.set_channel_id(9);
    v1_data.set_timestamp(12345);
    v1_data.set_dataword(200);
    v1_data.set_fifo_half(true);
    v1_data.set_direction(Some(1));
    v1_data.assign_parity();

    let mut v1_config = PacketV1::new();
    v1_config.set_chip_key(Some(ChipKey::new(2, 1, 4)));
    v1_config.set_packet_type(2);
    v1_config.set_register_address(10);
    v1_config.set_register_data(200);
    v1_config.set_direction(Some(0));

    let mut v2_data = data_packet();
    v2_data.set_first_packet(1);
    v2_data.set_direction(Some(1));
    v2_data.set_receipt_timestamp(Some(99));
    v2_data.assign_parity();

    let mut v2_diagnostics = data_packet();
    v2_diagnostics.set_fifo_diagnostics_enabled(true);
    v2_diagnostics.set_timestamp(0x1234);
    v2_diagnostics.set_local_fifo_events(3);
    v2_diagnostics.set_shared_fifo_events(0x7ff);
    v2_diagnostics.set_direction(Some(1));
    v2_diagnostics.set_receipt_timestamp(Some(5));
    v2_diagnostics.assign_parity();

    let mut v2_config = PacketV2::new();
    v2_config.set_chip_key(Some(ChipKey::new(3, 4, 5)));
    v2_config.set_packet_type(2);
    v2_config.set_register_address(0x20);
    v2_config.set_register_data(0x7f);
    v2_config.set_direction(Some(0));
    v2_config.set_receipt_timestamp(Some(1));
    v2_config.assign_parity();

    vec![
        v1_data.into(),
        v1_config.into(),
        v2_data.into(),
        v2_diagnostics.into(),
        v2_config.into(),
        TimestampPacket::new(1_700_000_000).with_io_group(2).into(),
        MessagePacket::new("begin run", 1_700_000_001).into(),
        SyncPacket::new(SyncPacket::SYNC, 1, 600).with_io_group(2).into(),
        TriggerPacket::new(1, 500).with_io_group(2).into(),
    ]
}

/// The same kinds with no metadata at all.
fn bare_packets() -> Vec<Packet> {
    let mut v1_test = PacketV1::new();
    v1_test.set_packet_type(1);
    v1_test.set_test_counter(0xabc);

    let mut v2_data = PacketV2::new();
    v2_data.set_channel_id(5);
    v2_data.set_dataword(17);

    vec![
        v1_test.into(),
        v2_data.into(),
        TimestampPacket::new(10).into(),
        SyncPacket::new(SyncPacket::HEARTBEAT, 0, 1).into(),
        TriggerPacket::new(2, 3).into(),
    ]
}

/// What a row of `version` keeps of `packet`. Rows have no empty numeric
/// cells, so metadata with a column reads back present (absent is stored
/// as 0) and metadata without one reads back absent.
fn stored_form(packet: &Packet, version: SchemaVersion) -> Packet {
    let mut stored = packet.clone();
    match &mut stored {
        Packet::V1(v1) => {
            let direction = (version >= v(1, 0)).then(|| v1.direction().unwrap_or(0));
            v1.set_direction(direction);
        }
        Packet::V2(v2) => {
            v2.set_io_group(Some(v2.io_group().unwrap_or(0)));
            v2.set_io_channel(Some(v2.io_channel().unwrap_or(0)));
            v2.set_direction(Some(v2.direction().unwrap_or(0)));
            if version < v(2, 1) {
                v2.set_first_packet(0);
            }
            let receipt = (version >= v(2, 3)).then(|| v2.receipt_timestamp().unwrap_or(0));
            v2.set_receipt_timestamp(receipt);
        }
        Packet::Timestamp(stamp) => {
            stamp.io_group = (version.major >= 2).then(|| stamp.io_group.unwrap_or(0));
        }
        Packet::Sync(sync) => sync.io_group = Some(sync.io_group.unwrap_or(0)),
        Packet::Trigger(trigger) => trigger.io_group = Some(trigger.io_group.unwrap_or(0)),
        Packet::Message(_) => {}
    }
    stored
}

fn through_row(packet: &Packet, version: SchemaVersion) -> Packet {
    let messages = match packet {
        Packet::Message(message) => vec![
            format_message_row(message, 0, version).expect("message row should format"),
        ],
        _ => Vec::new(),
    };
    let row = format_row(packet, version).expect("representable packet should format");
    parse_row(&row, &messages, version).expect("row should parse")
}

#[test]
fn exported_records_survive_every_version() {
    let annotated = annotated_packets();
    let bare = bare_packets();
    let mut checked = 0;
    for version in SchemaRegistry::builtin().versions() {
        for packet in annotated.iter().chain(bare.iter()) {
            if !is_representable(packet, version) {
                continue;
            }
            let parsed = through_row(packet, version);
            assert_eq!(
                parsed.export(),
                stored_form(packet, version).export(),
                "{} at {version}",
                packet.type_str()
            );
            checked += 1;
        }
    }
    assert!(checked > 50);
}

#[test]
fn annotated_packets_come_back_unchanged_at_latest() {
    for packet in annotated_packets() {
        if !is_representable(&packet, LATEST_VERSION) {
            continue;
        }
        assert_eq!(
            through_row(&packet, LATEST_VERSION).export(),
            packet.export(),
            "{}",
            packet.type_str()
        );
    }
}

#[test]
fn absent_metadata_reads_back_as_zero() {
    let bare: Packet = PacketV2::new().into();
    let parsed = through_row(&bare, LATEST_VERSION);
    let v2 = parsed.as_v2().expect("v2 row");
    assert_eq!(bare.as_v2().and_then(PacketV2::chip_key), None);
    assert_eq!(v2.chip_key(), Some(ChipKey::new(0, 0, 0)));
    assert_eq!(v2.receipt_timestamp(), Some(0));
    assert_eq!(parsed, bare);
}

#[test]
fn every_v2_version_round_trips_a_data_packet() {
    let packet: Packet = data_packet().into();
    for version in SchemaRegistry::builtin()
        .versions()
        .filter(|version| version.major == 2)
    {
        let row = format_row(&packet, version).expect("v2 packet should format");
        let parsed = parse_row(&row, &[], version).expect("row should parse");
        assert_eq!(parsed, packet, "version {version}");
    }
}

#[test]
fn mixed_stream_survives_a_file_round_trip() {
    let stream: Vec<Packet> = vec![
        TimestampPacket::new(1_700_000_000).into(),
        MessagePacket::new("begin run", 1_700_000_001).into(),
        data_packet().into(),
        TriggerPacket::new(1, 500).with_io_group(1).into(),
        SyncPacket::new(SyncPacket::SYNC, 0, 600).with_io_group(1).into(),
        MessagePacket::new("end run", 1_700_000_002).into(),
    ];

    let mut writer = TableWriter::latest().expect("latest version is registered");
    assert_eq!(writer.append_all(&stream).expect("append should succeed"), stream.len());
    let table = writer.finish();
    assert_eq!(table.version, LATEST_VERSION);
    assert_eq!(table.messages.len(), 2);

    let read = table
        .read_packets(Some("~2.3"), &ParseConfig::default())
        .expect("~2.3 should read a 2.4 table");
    assert_eq!(read, stream);
}

#[test]
fn older_versions_drop_what_they_cannot_hold() {
    let stream: Vec<Packet> = vec![
        TimestampPacket::new(10).into(),
        data_packet().into(),
        SyncPacket::new(SyncPacket::HEARTBEAT, 0, 1).into(),
    ];
    let mut writer = TableWriter::new(SchemaVersion::new(2, 1)).expect("2.1 is registered");
    assert_eq!(writer.append_all(&stream).expect("append should succeed"), 2);

    let mut writer = TableWriter::new(SchemaVersion::new(0, 0)).expect("0.0 is registered");
    assert_eq!(writer.append_all(&stream).expect("append should succeed"), 1);
}

#[test]
fn version_resolution() {
    assert_eq!(
        resolve_version(Some("~2.3"), "2.4").expect("newer minor is compatible"),
        SchemaVersion::new(2, 4)
    );
    assert!(matches!(
        resolve_version(Some("~2.3"), "2.2"),
        Err(SchemaError::IncompatibleVersion { .. })
    ));
}
