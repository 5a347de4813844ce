use std::io::IsTerminal;
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;
use urlink_control::{ControlCommand, ControlMode, ReceiveTimeout, COMMAND_WORDS};
use urlink_primary::{ErrorCode, PrimaryPackage, RobotMessageHeader};

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct PackageOutput<'a> {
    received_at: String,
    #[serde(flatten)]
    package: &'a PrimaryPackage,
}

pub fn print_package(package: &PrimaryPackage, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = PackageOutput {
                received_at: now_unix_seconds(),
                package,
            };
            println!("{}", to_json(&out));
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["KIND", "TIMESTAMP", "SOURCE", "CONTENT"])
                .add_row(vec![
                    package.kind().to_string(),
                    header_field(package, |h| h.timestamp.to_string()),
                    header_field(package, |h| h.source.to_string()),
                    package.to_string(),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            let summary = package.to_string().replace('\n', "; ");
            match package.header() {
                Some(header) => println!(
                    "kind={} timestamp={} source={} {}",
                    package.kind(),
                    header.timestamp,
                    header.source,
                    summary
                ),
                None => println!("kind={} {}", package.kind(), summary),
            }
        }
    }
}

#[derive(Serialize)]
struct ErrorCodesOutput<'a> {
    count: usize,
    error_codes: &'a [ErrorCode],
}

pub fn print_error_codes(codes: &[ErrorCode], format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = ErrorCodesOutput {
                count: codes.len(),
                error_codes: codes,
            };
            println!("{}", to_json(&out));
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["TIMESTAMP", "CODE", "LEVEL", "TEXT"]);
            for code in codes {
                table.add_row(vec![
                    code.timestamp.to_string(),
                    format!("C{}A{}", code.message_code, code.message_argument),
                    code.report_level.to_string(),
                    code.text.clone(),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            if codes.is_empty() {
                println!("no error codes reported");
            }
            for code in codes {
                println!("{} {}", code.timestamp, code.rendered);
            }
        }
    }
}

#[derive(Serialize)]
pub struct CommandRecord<'a> {
    pub sequence: usize,
    #[serde(flatten)]
    pub command: &'a ControlCommand,
    pub mode: ControlMode,
    pub receive_timeout: ReceiveTimeout,
    pub words: [i32; COMMAND_WORDS],
}

pub fn print_command(record: &CommandRecord<'_>, format: OutputFormat) {
    let words = record
        .words
        .iter()
        .map(i32::to_string)
        .collect::<Vec<_>>()
        .join(" ");
    match format {
        OutputFormat::Json => println!("{}", to_json(record)),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["#", "MODE", "RECEIVE TIMEOUT", "WORDS"])
                .add_row(vec![
                    record.sequence.to_string(),
                    record.mode.to_string(),
                    record.receive_timeout.to_string(),
                    words,
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "sent #{} mode={} receive_timeout={} words=[{}]",
                record.sequence, record.mode, record.receive_timeout, words
            );
        }
    }
}

fn header_field(
    package: &PrimaryPackage,
    field: impl Fn(&RobotMessageHeader) -> String,
) -> String {
    package.header().map(field).unwrap_or_else(|| "-".to_string())
}

fn to_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}
