use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use tracing::info;
use urlink_control::{
    CommandListener, ControlCommand, ControlMode, FreedriveAction, TrajectoryAction,
};

use crate::cmd::{
    install_ctrlc_handler, parse_duration, parse_receive_timeout, CommandAction, CommandArgs,
};
use crate::exit::{control_error, CliError, CliResult, SUCCESS, TIMEOUT, USAGE};
use crate::output::{print_command, CommandRecord, OutputFormat};

pub fn run(args: CommandArgs, format: OutputFormat) -> CliResult<i32> {
    let command = build_command(&args)?;
    let timeout = parse_receive_timeout(&args.timeout)?;
    let accept_timeout = parse_duration(&args.accept_timeout)?;
    let interval = parse_duration(&args.interval)?;
    if args.repeat == 0 {
        return Err(CliError::new(USAGE, "repeat must be greater than zero"));
    }

    // Fail before waiting for the robot if the command can never be sent.
    timeout
        .resolve(command.mode(), args.series.step_time())
        .map_err(|err| control_error("invalid command", err))?;

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let listener = CommandListener::bind_addr(SocketAddr::new(args.bind, args.port))
        .map_err(|err| control_error("bind failed", err))?
        .with_step_time(args.series.step_time());

    let Some(mut writer) = listener
        .accept_timeout(accept_timeout)
        .map_err(|err| control_error("accept failed", err))?
    else {
        return Err(CliError::new(
            TIMEOUT,
            format!("robot did not connect within {accept_timeout:?}"),
        ));
    };

    let mut sent = 0usize;
    while sent < args.repeat && running.load(Ordering::SeqCst) {
        if sent > 0 {
            thread::sleep(interval);
        }
        writer
            .write(&command, timeout)
            .map_err(|err| control_error("write failed", err))?;
        sent += 1;

        if let Some(words) = writer.last_frame() {
            print_command(
                &CommandRecord {
                    sequence: sent,
                    command: &command,
                    mode: command.mode(),
                    receive_timeout: timeout,
                    words,
                },
                format,
            );
        }
    }

    info!(sent, mode = %command.mode(), "commands sent");
    Ok(SUCCESS)
}

fn build_command(args: &CommandArgs) -> CliResult<ControlCommand> {
    let joint_mode = match args.action {
        CommandAction::Keepalive => return Ok(ControlCommand::Keepalive),
        CommandAction::Stop => return Ok(ControlCommand::Stop),
        CommandAction::FreedriveStart => {
            return Ok(ControlCommand::Freedrive {
                action: FreedriveAction::Start,
            })
        }
        CommandAction::FreedriveStop => {
            return Ok(ControlCommand::Freedrive {
                action: FreedriveAction::Stop,
            })
        }
        CommandAction::TrajectoryStart => {
            return Ok(ControlCommand::Trajectory {
                action: TrajectoryAction::Start,
                point_number: args.point_number,
            })
        }
        CommandAction::TrajectoryCancel => {
            return Ok(ControlCommand::Trajectory {
                action: TrajectoryAction::Cancel,
                point_number: 0,
            })
        }
        CommandAction::Servoj => ControlMode::ServoJ,
        CommandAction::Speedj => ControlMode::SpeedJ,
        CommandAction::Speedl => ControlMode::SpeedL,
        CommandAction::Pose => ControlMode::Pose,
    };

    let values = args
        .values
        .as_deref()
        .ok_or_else(|| CliError::new(USAGE, format!("{joint_mode} needs --values")))?;
    let values: [f64; 6] = values.try_into().map_err(|_| {
        CliError::new(
            USAGE,
            format!("{joint_mode} needs exactly 6 values, got {}", values.len()),
        )
    })?;

    Ok(ControlCommand::Joint {
        values,
        mode: joint_mode,
    })
}
