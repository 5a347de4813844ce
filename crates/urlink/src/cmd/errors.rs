use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tracing::warn;

use crate::cmd::{install_ctrlc_handler, parse_duration, primary_client, start_client, ErrorsArgs};
use crate::exit::{CliResult, FAILURE, SUCCESS};
use crate::output::{print_error_codes, OutputFormat};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

pub fn run(args: ErrorsArgs, format: OutputFormat) -> CliResult<i32> {
    let wait = parse_duration(&args.wait)?;
    let mut client = primary_client(&args.connection)?;

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;
    start_client(&mut client)?;

    let deadline = Instant::now() + wait;
    while running.load(Ordering::SeqCst) {
        let now = Instant::now();
        if now >= deadline {
            break;
        }
        thread::sleep(POLL_INTERVAL.min(deadline - now));
    }

    client.stop();
    let codes = client.drain_error_codes();
    print_error_codes(&codes, format);

    let severe = codes
        .iter()
        .filter(|code| code.report_level.is_severe())
        .count();
    if severe > 0 {
        warn!(severe, "controller reported severe error codes");
        if args.fail_on_severe {
            return Ok(FAILURE);
        }
    }
    Ok(SUCCESS)
}
