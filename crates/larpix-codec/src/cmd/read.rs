use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use pacman_frame::{message_to_packets, FrameConfig, FrameError};
use pacman_link::{connect_with_config, LinkConfig, LinkError, RetryPolicy, Role};
use tracing::info;

use crate::cmd::{parse_duration, ReadArgs};
use crate::exit::{link_error, CliError, CliResult, INTERNAL, SUCCESS};
use crate::output::{print_message, OutputFormat};

// Poll interval for the stop flag while no data arrives.
const RECV_POLL: Duration = Duration::from_millis(250);

pub fn run(args: ReadArgs, format: OutputFormat) -> CliResult<i32> {
    let config = LinkConfig::default()
        .with_handshake_timeout(parse_duration(&args.handshake_timeout)?)
        .with_frame_config(FrameConfig::default().with_read_timeout(RECV_POLL))
        .with_retry(
            RetryPolicy::default()
                .with_retry_interval(parse_duration(&args.retry_interval)?)
                .with_max_connect_attempts(args.attempts),
        );

    let mut link = connect_with_config(&args.addr, Role::Reader, config)
        .map_err(|err| link_error("connect failed", err))?;
    let identity = link
        .peer_identity()
        .map(|id| String::from_utf8_lossy(id).into_owned())
        .unwrap_or_default();
    info!(addr = %args.addr, %identity, "link streaming");

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let mut received = 0usize;
    while running.load(Ordering::SeqCst) {
        let message = match link.recv() {
            Ok(message) => message,
            Err(LinkError::Timeout(_)) => continue,
            Err(LinkError::Frame(FrameError::ConnectionClosed)) => {
                info!(received, "card closed the link");
                break;
            }
            Err(err) => return Err(link_error("receive failed", err)),
        };

        let packets = message_to_packets(&message, args.io_group);
        print_message(received, &message, &packets, Some(&args.addr), format);
        received = received.saturating_add(1);

        if let Some(count) = args.count {
            if received >= count {
                break;
            }
        }
    }

    link.close().map_err(|err| link_error("close failed", err))?;
    Ok(SUCCESS)
}

pub(crate) fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
