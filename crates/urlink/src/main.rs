mod cmd;
mod exit;
mod logging;
mod output;

use clap::Parser;

use crate::cmd::Command;
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "urlink", version, about = "UR robot controller client")]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(
        long,
        value_name = "LEVEL",
        default_value = "info",
        env = "URLINK_LOG_LEVEL",
        global = true
    )]
    log_level: LogLevel,

    /// Raise the log level one step per occurrence.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level.raised(cli.verbose));

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
    fn parses_primary_subcommand() {
        let cli = Cli::try_parse_from([
            "urlink",
            "primary",
            "192.168.56.101",
            "--count",
            "10",
            "--kind",
            "version,error_code",
        ])
        .expect("primary args should parse");

        let Command::Primary(args) = cli.command else {
            panic!("expected primary subcommand");
        };
        assert_eq!(args.connection.port, 30001);
        assert_eq!(args.count, Some(10));
        assert_eq!(
            args.kind,
            Some(vec!["version".to_string(), "error_code".to_string()])
        );
    }

    #[test]
    fn parses_command_subcommand() {
        let cli = Cli::try_parse_from([
            "urlink",
            "--format",
            "json",
            "command",
            "servoj",
            "--values",
            "-0.5,-1.57,0,0,0,0",
            "--timeout",
            "20ms",
        ])
        .expect("command args should parse");

        let Command::Command(args) = cli.command else {
            panic!("expected command subcommand");
        };
        assert_eq!(args.port, 50001);
        assert_eq!(args.values, Some(vec![-0.5, -1.57, 0.0, 0.0, 0.0, 0.0]));
        assert!(matches!(cli.format, Some(OutputFormat::Json)));
    }

    #[test]
    fn verbose_flags_raise_log_level() {
        let cli = Cli::try_parse_from([
            "urlink",
            "--log-level",
            "warn",
            "errors",
            "ur5e.local",
            "-vv",
        ])
        .expect("verbose flags should parse");

        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.log_level.raised(cli.verbose), LogLevel::Debug);
    }

    #[test]
    fn rejects_unknown_command_action() {
        let err = Cli::try_parse_from(["urlink", "command", "teleport"])
            .expect_err("unknown action should fail");
        assert_eq!(err.kind(), clap::error::ErrorKind::InvalidValue);
    }

    #[test]
    fn parses_errors_subcommand() {
        let cli = Cli::try_parse_from([
            "urlink",
            "errors",
            "ur5e.local",
            "--port",
            "30011",
            "--wait",
            "500ms",
        ])
        .expect("errors args should parse");

        let Command::Errors(args) = cli.command else {
            panic!("expected errors subcommand");
        };
        assert_eq!(args.connection.host, "ur5e.local");
        assert_eq!(args.connection.port, 30011);
        assert_eq!(args.wait, "500ms");
    }
}
