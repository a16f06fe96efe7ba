use std::thread;
use std::time::Duration;

use larpix_packet::{Packet, SyncPacket, TriggerPacket};
use pacman_frame::{FrameConfig, FrameError, Message, MsgType, Word};
use pacman_link::{connect_with_config, LinkConfig, LinkError, LinkListener, LinkState, Role};

#[test]
fn reader_drains_emulated_stream() {
    let listener = LinkListener::bind("127.0.0.1:0").expect("listener should bind");
    let addr = listener
        .local_addr()
        .expect("listener should have address")
        .to_string();

    let server = thread::spawn(move || {
        let mut link = listener.accept().expect("listener should accept");
        for tick in 0..5u32 {
            let packets: Vec<Packet> = vec![
                TriggerPacket::new(1, tick * 10).into(),
                SyncPacket::new(b'H', 1, tick * 10 + 1).into(),
            ];
            link.send_packets(&packets, MsgType::Data, tick)
                .expect("packets should send");
        }
        link.close().expect("close should succeed");
    });

    let config = LinkConfig::default()
        .with_frame_config(FrameConfig::default().with_read_timeout(Duration::from_secs(5)));
    let mut reader =
        connect_with_config(&addr, Role::Reader, config).expect("reader should connect");

    let mut messages = Vec::new();
    loop {
        match reader.recv() {
            Ok(message) => messages.push(message),
            Err(LinkError::Frame(FrameError::ConnectionClosed)) => break,
            Err(err) => panic!("unexpected error: {err}"),
        }
    }
    server.join().expect("server thread should complete");

    assert_eq!(messages.len(), 5);
    for message in &messages {
        assert_eq!(message.msg_type(), MsgType::Data);
        assert!(matches!(message.words[0], Word::Trig { trigger_type: 1, .. }));
        assert!(matches!(message.words[1], Word::Sync { sync_type: b'H', .. }));
    }

    reader.close().expect("close should succeed");
    assert_eq!(reader.state(), LinkState::Closed);
}

#[test]
fn reader_times_out_waiting_for_data() {
    let listener = LinkListener::bind("127.0.0.1:0").expect("listener should bind");
    let addr = listener
        .local_addr()
        .expect("listener should have address")
        .to_string();

    let server = thread::spawn(move || {
        let mut link = listener.accept().expect("listener should accept");
        thread::sleep(Duration::from_millis(300));
        link.send(&Message::at(MsgType::Data, 0, Vec::new()))
            .expect("late message should send");
        thread::sleep(Duration::from_millis(100));
    });

    let config = LinkConfig::default()
        .with_frame_config(FrameConfig::default().with_read_timeout(Duration::from_millis(50)));
    let mut reader =
        connect_with_config(&addr, Role::Reader, config).expect("reader should connect");

    assert!(matches!(reader.recv(), Err(LinkError::Timeout(_))));
    let message = loop {
        match reader.recv() {
            Ok(message) => break message,
            Err(LinkError::Timeout(_)) => continue,
            Err(err) => panic!("unexpected error: {err}"),
        }
    };
    assert!(message.words.is_empty());
    server.join().expect("server thread should complete");
}
