use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bgserial_link::{BackgroundSerial, LinkConfig};
use clap::{Args, Subcommand};
use tracing::info;

use crate::exit::{link_error, CliError, CliResult, INTERNAL, USAGE};
use crate::output::OutputFormat;

pub mod monitor;
#[cfg(feature = "serial")]
pub mod ports;
pub mod probe;
pub mod send;
pub mod version;

/// Sleep between queue checks while waiting for data.
const IDLE_SLEEP: Duration = Duration::from_millis(10);

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print lines and diagnostic messages as they arrive.
    Monitor(MonitorArgs),
    /// Send one line, optionally printing what comes back.
    Send(SendArgs),
    /// Request control variables repeatedly and check the JSON replies.
    Probe(ProbeArgs),
    /// List serial ports on this machine.
    #[cfg(feature = "serial")]
    Ports(PortsArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Monitor(args) => monitor::run(args, format),
        Command::Send(args) => send::run(args, format),
        Command::Probe(args) => probe::run(args, format),
        #[cfg(feature = "serial")]
        Command::Ports(args) => ports::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug, Clone)]
pub struct PortArgs {
    /// Serial device (e.g. /dev/ttyACM0) or socket://host:port.
    #[arg(env = "BGSERIAL_PORT")]
    pub port: String,
    /// Baud rate for serial devices.
    #[arg(long, default_value_t = 57600, env = "BGSERIAL_BAUD")]
    pub baud: u32,
}

#[derive(Args, Debug)]
pub struct MonitorArgs {
    #[command(flatten)]
    pub port: PortArgs,
    /// Exit after printing N items.
    #[arg(long)]
    pub count: Option<usize>,
    /// Exit after this long (e.g. 30s, 500ms).
    #[arg(long)]
    pub duration: Option<String>,
    /// Do not print diagnostic messages.
    #[arg(long)]
    pub no_messages: bool,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    #[command(flatten)]
    pub port: PortArgs,
    /// Line to send (the terminator is appended).
    #[arg(long)]
    pub line: String,
    /// Print lines received for this long after sending (e.g. 2s, 500ms).
    #[arg(long)]
    pub wait: Option<String>,
}

#[derive(Args, Debug)]
pub struct ProbeArgs {
    #[command(flatten)]
    pub port: PortArgs,
    /// Number of request rounds.
    #[arg(long, default_value_t = 4)]
    pub rounds: usize,
    /// Requests written back to back in each round.
    #[arg(long, default_value_t = 5)]
    pub requests: usize,
    /// Pause after each round before collecting replies (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub pause: String,
    /// Command sent for each request.
    #[arg(long, default_value = "v")]
    pub command: String,
}

#[cfg(feature = "serial")]
#[derive(Args, Debug, Default)]
pub struct PortsArgs {}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Open the port and start the background reader.
pub fn open_link(args: &PortArgs) -> CliResult<BackgroundSerial> {
    let link = BackgroundSerial::open(&args.port, args.baud, LinkConfig::default())
        .map_err(|err| link_error(&format!("failed to open {}", args.port), err))?;
    link.start()
        .map_err(|err| link_error("failed to start reader", err))?;
    info!(port = %args.port, baud = args.baud, "serial link started");
    Ok(link)
}

/// Collect every line that arrives within `window`.
pub fn collect_lines(link: &BackgroundSerial, window: Duration) -> CliResult<Vec<String>> {
    let deadline = std::time::Instant::now() + window;
    let mut lines = Vec::new();
    loop {
        while let Some(line) = link
            .try_read_line()
            .map_err(|err| link_error("read failed", err))?
        {
            lines.push(line);
        }
        if std::time::Instant::now() >= deadline {
            return Ok(lines);
        }
        std::thread::sleep(IDLE_SLEEP);
    }
}

pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        _ => Ok(Duration::from_secs(value)),
    }
}

pub fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
