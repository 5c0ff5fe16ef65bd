use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::cmd::{install_ctrlc_handler, open_link, parse_duration, MonitorArgs, IDLE_SLEEP};
use crate::exit::{link_error, CliResult, SUCCESS};
use crate::output::{print_received, OutputFormat, Received};

pub fn run(args: MonitorArgs, format: OutputFormat) -> CliResult<i32> {
    let deadline = match &args.duration {
        Some(duration) => Some(Instant::now() + parse_duration(duration)?),
        None => None,
    };

    let link = open_link(&args.port)?;

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let mut printed = 0usize;

    while running.load(Ordering::SeqCst) {
        let mut idle = true;

        while let Some(message) = link
            .try_read_message()
            .map_err(|err| link_error("read failed", err))?
        {
            idle = false;
            if args.no_messages {
                continue;
            }
            print_received(Received::Message, &message, &args.port.port, format);
            printed = printed.saturating_add(1);
            if reached(args.count, printed) {
                return Ok(SUCCESS);
            }
        }

        while let Some(line) = link
            .try_read_line()
            .map_err(|err| link_error("read failed", err))?
        {
            idle = false;
            print_received(Received::Line, &line, &args.port.port, format);
            printed = printed.saturating_add(1);
            if reached(args.count, printed) {
                return Ok(SUCCESS);
            }
        }

        if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            break;
        }
        if idle {
            std::thread::sleep(IDLE_SLEEP);
        }
    }

    link.stop();
    Ok(SUCCESS)
}

fn reached(count: Option<usize>, printed: usize) -> bool {
    count.is_some_and(|count| printed >= count)
}
