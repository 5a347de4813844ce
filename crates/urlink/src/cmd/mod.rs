use std::net::IpAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Subcommand, ValueEnum};
use urlink_control::{ReceiveTimeout, StepTime, COMMAND_PORT};
use urlink_pipeline::{PipelineConfig, ReconnectPolicy};
use urlink_primary::{PrimaryClient, PrimaryClientConfig, PRIMARY_PORT};
use urlink_transport::StreamConfig;

use crate::exit::{primary_error, CliError, CliResult, INTERNAL, USAGE};
use crate::output::OutputFormat;

pub mod command;
pub mod errors;
pub mod primary;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print packages received on the primary interface.
    Primary(PrimaryArgs),
    /// Collect error codes reported by the controller.
    Errors(ErrorsArgs),
    /// Wait for the robot program and send commands on the reverse interface.
    Command(CommandArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Primary(args) => primary::run(args, format),
        Command::Errors(args) => errors::run(args, format),
        Command::Command(args) => command::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct ConnectionArgs {
    /// Robot controller host name or address.
    #[arg(env = "URLINK_ROBOT_HOST")]
    pub host: String,
    /// Primary interface port.
    #[arg(long, default_value_t = PRIMARY_PORT)]
    pub port: u16,
    /// Connection timeout (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub connect_timeout: String,
    /// Reconnect attempts before giving up on a lost connection.
    #[arg(long, default_value_t = 10)]
    pub reconnect_attempts: u32,
}

#[derive(Args, Debug)]
pub struct PrimaryArgs {
    #[command(flatten)]
    pub connection: ConnectionArgs,
    /// Exit after printing N packages.
    #[arg(long)]
    pub count: Option<usize>,
    /// Exit after this long (e.g. 10s, 500ms).
    #[arg(long)]
    pub duration: Option<String>,
    /// Only print these package kinds (comma-separated, e.g. version,error_code).
    #[arg(long, value_delimiter = ',')]
    pub kind: Option<Vec<String>>,
}

#[derive(Args, Debug)]
pub struct ErrorsArgs {
    #[command(flatten)]
    pub connection: ConnectionArgs,
    /// How long to collect error codes before printing them (e.g. 2s, 500ms).
    #[arg(long, default_value = "2s")]
    pub wait: String,
    /// Exit with status 1 if any violation or fault was reported.
    #[arg(long)]
    pub fail_on_severe: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum CommandAction {
    Keepalive,
    Stop,
    FreedriveStart,
    FreedriveStop,
    TrajectoryStart,
    TrajectoryCancel,
    Servoj,
    Speedj,
    Speedl,
    Pose,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ControllerSeries {
    /// CB3 controllers (8ms step).
    Cb3,
    /// e-Series controllers (2ms step).
    ESeries,
}

impl ControllerSeries {
    pub fn step_time(self) -> StepTime {
        match self {
            Self::Cb3 => StepTime::CB3,
            Self::ESeries => StepTime::E_SERIES,
        }
    }
}

#[derive(Args, Debug)]
pub struct CommandArgs {
    /// Command to send.
    #[arg(value_enum)]
    pub action: CommandAction,
    /// Six joint or pose values for servoj/speedj/speedl/pose (comma-separated).
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
    pub values: Option<Vec<f64>>,
    /// Trajectory point number for trajectory-start.
    #[arg(long, default_value_t = 0)]
    pub point_number: i32,
    /// Receive timeout sent with each command (e.g. 200ms, 1s, off).
    #[arg(long, default_value = "200ms")]
    pub timeout: String,
    /// Port the robot program connects back to.
    #[arg(long, default_value_t = COMMAND_PORT)]
    pub port: u16,
    /// Address to listen on.
    #[arg(long, default_value = "0.0.0.0")]
    pub bind: IpAddr,
    /// Controller generation, which sets the control step time.
    #[arg(long, value_enum, default_value = "cb3")]
    pub series: ControllerSeries,
    /// How long to wait for the robot to connect (e.g. 30s).
    #[arg(long, default_value = "30s")]
    pub accept_timeout: String,
    /// Send the command this many times.
    #[arg(long, default_value_t = 1)]
    pub repeat: usize,
    /// Delay between repeated commands (e.g. 8ms).
    #[arg(long, default_value = "100ms")]
    pub interval: String,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Build a primary client from connection flags. The client is not started.
pub fn primary_client(args: &ConnectionArgs) -> CliResult<PrimaryClient> {
    let stream = StreamConfig {
        connect_timeout: parse_duration(&args.connect_timeout)?,
        ..StreamConfig::default()
    };
    let pipeline = PipelineConfig::default().with_reconnect(ReconnectPolicy {
        max_attempts: args.reconnect_attempts,
        ..ReconnectPolicy::default()
    });
    let config = PrimaryClientConfig::new(args.host.clone())
        .with_port(args.port)
        .with_stream(stream)
        .with_pipeline(pipeline);
    Ok(PrimaryClient::new(config))
}

pub fn start_client(client: &mut PrimaryClient) -> CliResult<()> {
    client
        .start()
        .map_err(|err| primary_error("connect failed", err))
}

pub fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}

/// Parse `500ms`, `5s` or bare seconds. Zero is rejected.
pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, millis) = if let Some(num) = input.strip_suffix("ms") {
        (num, true)
    } else if let Some(num) = input.strip_suffix('s') {
        (num, false)
    } else {
        (input, false)
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    if millis {
        Ok(Duration::from_millis(value))
    } else {
        Ok(Duration::from_secs(value))
    }
}

/// Parse a receive timeout: a duration or `off`.
pub fn parse_receive_timeout(input: &str) -> CliResult<ReceiveTimeout> {
    if input.trim().eq_ignore_ascii_case("off") {
        return Ok(ReceiveTimeout::off());
    }
    parse_duration(input).map(ReceiveTimeout::from_duration)
}
