mod cmd;
mod exit;
mod logging;
mod output;

use clap::Parser;

use crate::cmd::Command;
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(
    name = "bgserial",
    version,
    about = "Line-oriented serial link with a background reader"
)]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(long, value_name = "LEVEL", default_value = "info", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    let result = cmd::run(cli.command, format);

    match result {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_monitor_subcommand() {
        let cli = Cli::try_parse_from([
            "bgserial",
            "monitor",
            "socket://127.0.0.1:9000",
            "--count",
            "3",
        ])
        .expect("monitor args should parse");

        match cli.command {
            Command::Monitor(args) => {
                assert_eq!(args.port.port, "socket://127.0.0.1:9000");
                assert_eq!(args.port.baud, 57600);
                assert_eq!(args.count, Some(3));
                assert!(!args.no_messages);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn send_requires_line() {
        let err = Cli::try_parse_from(["bgserial", "send", "/dev/ttyACM0"])
            .expect_err("missing --line should fail");

        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn probe_defaults_match_request_pattern() {
        let cli = Cli::try_parse_from(["bgserial", "probe", "/dev/ttyACM0", "--baud", "115200"])
            .expect("probe args should parse");

        match cli.command {
            Command::Probe(args) => {
                assert_eq!(args.port.baud, 115200);
                assert_eq!(args.rounds, 4);
                assert_eq!(args.requests, 5);
                assert_eq!(args.command, "v");
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn global_flags_parse_after_subcommand() {
        let cli = Cli::try_parse_from([
            "bgserial",
            "version",
            "--format",
            "json",
            "--log-level",
            "debug",
        ])
        .expect("global flags should parse");

        assert!(matches!(cli.format, Some(OutputFormat::Json)));
        assert!(matches!(cli.command, Command::Version(_)));
    }
}
