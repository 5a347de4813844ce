use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info};
use urlink_pipeline::Consumer;
use urlink_primary::PrimaryPackage;

use crate::cmd::{install_ctrlc_handler, parse_duration, primary_client, start_client, PrimaryArgs};
use crate::exit::{primary_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{print_package, OutputFormat};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

const KINDS: [&str; 8] = [
    "text",
    "version",
    "error_code",
    "key",
    "runtime_exception",
    "unknown_robot_message",
    "kinematics_info",
    "robot_state_raw",
];

/// Hands dispatched packages to the printing thread.
struct Forwarder {
    tx: Sender<PrimaryPackage>,
}

impl Consumer<PrimaryPackage> for Forwarder {
    fn consume(&self, package: &PrimaryPackage) -> bool {
        self.tx.send(package.clone()).is_ok()
    }

    fn on_unknown(&self, package_type: u8, length: usize) {
        debug!(package_type, length, "skipped package of unknown type");
    }
}

pub fn run(args: PrimaryArgs, format: OutputFormat) -> CliResult<i32> {
    let duration = args.duration.as_deref().map(parse_duration).transpose()?;
    if let Some(kinds) = &args.kind {
        if let Some(unknown) = kinds.iter().find(|kind| !KINDS.contains(&kind.as_str())) {
            return Err(CliError::new(
                USAGE,
                format!("unknown package kind: {unknown} (expected one of {})", KINDS.join(", ")),
            ));
        }
    }

    let mut client = primary_client(&args.connection)?;
    let (tx, rx) = mpsc::channel();
    client.add_consumer(Arc::new(Forwarder { tx }));

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;
    start_client(&mut client)?;

    let started = Instant::now();
    let mut printed = 0usize;

    while running.load(Ordering::SeqCst) {
        if duration.is_some_and(|limit| started.elapsed() >= limit) {
            break;
        }

        let package = match rx.recv_timeout(POLL_INTERVAL) {
            Ok(package) => package,
            Err(RecvTimeoutError::Timeout) => {
                if let Err(err) = client.check() {
                    client.stop();
                    let context = format!("lost connection to {}", client.config().endpoint());
                    return Err(primary_error(&context, err));
                }
                continue;
            }
            Err(RecvTimeoutError::Disconnected) => break,
        };

        if let Some(kinds) = &args.kind {
            if !kinds.iter().any(|kind| kind == package.kind()) {
                continue;
            }
        }

        print_package(&package, format);
        printed = printed.saturating_add(1);

        if args.count.is_some_and(|count| printed >= count) {
            break;
        }
    }

    client.stop();
    info!(printed, "primary stream closed");
    Ok(SUCCESS)
}
