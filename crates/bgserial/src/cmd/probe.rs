use serde::Serialize;
use tracing::{debug, warn};

use crate::cmd::{collect_lines, open_link, parse_duration, ProbeArgs};
use crate::exit::{link_error, CliResult, DATA_INVALID, SUCCESS, TIMEOUT};
use crate::output::{print_json, print_received, OutputFormat, Received};

/// Replies to a control variable request start with this prefix.
const REPLY_PREFIX: char = 'V';

#[derive(Debug, Default, Serialize, PartialEq, Eq)]
struct ProbeSummary {
    rounds: usize,
    requests: usize,
    successes: usize,
    failures: usize,
}

#[derive(Debug, PartialEq, Eq)]
enum Reply {
    Decoded,
    Invalid,
    Other,
}

pub fn run(args: ProbeArgs, format: OutputFormat) -> CliResult<i32> {
    let pause = parse_duration(&args.pause)?;
    let link = open_link(&args.port)?;

    let mut summary = ProbeSummary {
        rounds: args.rounds,
        requests: args.requests,
        ..ProbeSummary::default()
    };

    for round in 1..=args.rounds {
        for _ in 0..args.requests {
            link.writeln(&args.command)
                .map_err(|err| link_error("write failed", err))?;
        }
        debug!(round, requests = args.requests, "requests written");

        for line in collect_lines(&link, pause)? {
            match classify(&line) {
                Reply::Decoded => summary.successes += 1,
                Reply::Invalid => {
                    warn!(line = %line, "invalid JSON parameter string received");
                    summary.failures += 1;
                }
                Reply::Other => print_received(Received::Line, &line, &args.port.port, format),
            }
        }
    }

    link.stop();
    print_summary(&summary, format);

    if summary.failures > 0 {
        Ok(DATA_INVALID)
    } else if summary.successes == 0 {
        Ok(TIMEOUT)
    } else {
        Ok(SUCCESS)
    }
}

fn classify(line: &str) -> Reply {
    if !line.starts_with(REPLY_PREFIX) {
        return Reply::Other;
    }
    // Skip the prefix and its separator, e.g. `V:{...}`.
    let payload = line.get(2..).unwrap_or("");
    match serde_json::from_str::<serde_json::Value>(payload) {
        Ok(_) => Reply::Decoded,
        Err(_) => Reply::Invalid,
    }
}

fn print_summary(summary: &ProbeSummary, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(summary),
        _ => println!(
            "Successes: {}, Fails: {}",
            summary.successes, summary.failures
        ),
    }
}
