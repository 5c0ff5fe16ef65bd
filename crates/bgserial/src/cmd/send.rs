use crate::cmd::{collect_lines, open_link, parse_duration, SendArgs};
use crate::exit::{link_error, CliError, CliResult, FAILURE, SUCCESS};
use crate::output::{print_received, OutputFormat, Received};

pub fn run(args: SendArgs, format: OutputFormat) -> CliResult<i32> {
    let wait = args.wait.as_deref().map(parse_duration).transpose()?;
    let link = open_link(&args.port)?;

    let written = link
        .writeln(&args.line)
        .map_err(|err| link_error("write failed", err))?;
    if written <= args.line.len() {
        return Err(CliError::new(
            FAILURE,
            format!(
                "write incomplete: {written} of {} bytes accepted",
                args.line.len() + 1
            ),
        ));
    }

    if let Some(wait) = wait {
        for line in collect_lines(&link, wait)? {
            print_received(Received::Line, &line, &args.port.port, format);
        }
    }

    link.stop();
    Ok(SUCCESS)
}
