use std::fs;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use pacman_link::{LinkConfig, LinkListener};
use serde::Serialize;
use tracing::{info, warn};

use crate::cmd::decode_msg::split_messages;
use crate::cmd::read::install_ctrlc_handler;
use crate::cmd::{parse_duration, EmulateArgs};
use crate::exit::{io_error, link_error, CliResult, SUCCESS};
use crate::output::{print_json, OutputFormat};

#[derive(Serialize)]
struct ServedOutput {
    reader: usize,
    peer: String,
    messages: usize,
}

pub fn run(args: EmulateArgs, format: OutputFormat) -> CliResult<i32> {
    let bytes = fs::read(&args.file)
        .map_err(|err| io_error(&format!("failed reading {}", args.file.display()), err))?;
    let messages = split_messages(&bytes)?;
    let interval = args.interval.as_deref().map(parse_duration).transpose()?;

    let listener = LinkListener::bind(args.addr.as_str())
        .map_err(|err| link_error("bind failed", err))?
        .with_config(LinkConfig::default().with_identity(args.identity.as_bytes()));
    let local = listener
        .local_addr()
        .map_err(|err| link_error("bind failed", err))?;
    info!(addr = %local, messages = messages.len(), "emulator listening");

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let mut served = 0usize;
    while running.load(Ordering::SeqCst) {
        if args.readers.is_some_and(|limit| served >= limit) {
            break;
        }

        let mut link = listener
            .accept()
            .map_err(|err| link_error("accept failed", err))?;
        let peer = link
            .peer_addr()
            .map(|addr| addr.to_string())
            .unwrap_or_default();
        served += 1;

        let mut sent = 0usize;
        'replay: for _ in 0..args.loops {
            for message in &messages {
                if !running.load(Ordering::SeqCst) {
                    break 'replay;
                }
                if let Err(err) = link.send(message) {
                    warn!(%peer, error = %err, "reader went away");
                    break 'replay;
                }
                sent += 1;
                if let Some(interval) = interval {
                    thread::sleep(interval);
                }
            }
        }
        link.close().map_err(|err| link_error("close failed", err))?;
        info!(reader = served, %peer, sent, "reader served");

        match format {
            OutputFormat::Json => print_json(&ServedOutput {
                reader: served,
                peer,
                messages: sent,
            }),
            _ => println!("reader {served} ({peer}): sent {sent} message(s)"),
        }
    }

    Ok(SUCCESS)
}
