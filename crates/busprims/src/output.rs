use std::io::IsTerminal;
use std::time::{SystemTime, UNIX_EPOCH};

use busprims_core::{DecodedField, ListenerReport, ReceivedSignal};
use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;

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
struct SignalOutput<'a> {
    #[serde(flatten)]
    signal: &'a ReceivedSignal,
    timestamp: String,
}

pub fn print_signal(signal: &ReceivedSignal, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = SignalOutput {
                signal,
                timestamp: now_unix_seconds(),
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["MEMBER", "POS", "TYPE", "VALUE"]);
            if signal.fields.is_empty() {
                table.add_row(vec![signal.member.as_str(), "-", "-", "-"]);
            }
            for field in &signal.fields {
                table.add_row(vec![
                    signal.member.clone(),
                    field.position.to_string(),
                    field.kind.to_string(),
                    field_text(field),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            let fields: Vec<String> = signal
                .fields
                .iter()
                .map(|field| format!("{}:{}", field.kind, field_text(field)))
                .collect();
            println!(
                "{}.{} from={} [{}]",
                signal.interface,
                signal.member,
                signal.sender.as_deref().unwrap_or("-"),
                fields.join(", ")
            );
        }
    }
}

#[derive(Serialize)]
struct ReplyOutput<'a> {
    interface: &'a str,
    member: &'a str,
    reply: Option<&'a str>,
    timestamp: String,
}

/// Print the outcome of a send. `reply` is `None` for broadcasts.
pub fn print_reply(interface: &str, member: &str, reply: Option<&str>, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = ReplyOutput {
                interface,
                member,
                reply,
                timestamp: now_unix_seconds(),
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["INTERFACE", "MEMBER", "REPLY"])
                .add_row(vec![interface, member, reply.unwrap_or("(broadcast)")]);
            println!("{table}");
        }
        OutputFormat::Pretty => match reply {
            Some(reply) => println!("{interface}.{member} -> {reply}"),
            None => println!("{interface}.{member} sent"),
        },
    }
}

#[derive(Serialize)]
struct ReportOutput<'a> {
    interface: &'a str,
    signals: u64,
    calls: u64,
    ignored: u64,
    error: Option<String>,
}

/// Summarize listener threads after shutdown.
pub fn print_reports(reports: &[ListenerReport], format: OutputFormat) {
    let rows: Vec<ReportOutput<'_>> = reports
        .iter()
        .map(|report| match &report.outcome {
            Ok(stats) => ReportOutput {
                interface: &report.interface,
                signals: stats.signals,
                calls: stats.calls,
                ignored: stats.ignored,
                error: None,
            },
            Err(err) => ReportOutput {
                interface: &report.interface,
                signals: 0,
                calls: 0,
                ignored: 0,
                error: Some(err.to_string()),
            },
        })
        .collect();

    match format {
        OutputFormat::Json => {
            for row in &rows {
                println!(
                    "{}",
                    serde_json::to_string(row).unwrap_or_else(|_| "{}".to_string())
                );
            }
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["INTERFACE", "SIGNALS", "CALLS", "IGNORED", "ERROR"]);
            for row in &rows {
                table.add_row(vec![
                    row.interface.to_string(),
                    row.signals.to_string(),
                    row.calls.to_string(),
                    row.ignored.to_string(),
                    row.error.clone().unwrap_or_default(),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for row in &rows {
                match &row.error {
                    Some(err) => println!("{} failed: {err}", row.interface),
                    None => println!(
                        "{} signals={} calls={} ignored={}",
                        row.interface, row.signals, row.calls, row.ignored
                    ),
                }
            }
        }
    }
}

fn field_text(field: &DecodedField) -> String {
    match &field.value {
        Some(value) => value.to_string(),
        None => "<unknown>".to_string(),
    }
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}

#[cfg(test)]
mod tests {
    use busprims_message::{ArgType, TypeTag, Value};

    use super::*;

    #[test]
    fn unknown_fields_render_placeholder() {
        let field = DecodedField {
            position: 0,
            kind: ArgType::Unknown(b'z'),
            value: None,
        };
        assert_eq!(field_text(&field), "<unknown>");
    }

    #[test]
    fn signal_json_flattens_fields() {
        let signal = ReceivedSignal {
            interface: "test.signal.Type".to_string(),
            member: "Num".to_string(),
            path: Some("/test/signal/Object".to_string()),
            sender: Some(":1.3".to_string()),
            serial: 4,
            fields: vec![DecodedField {
                position: 0,
                kind: ArgType::Known(TypeTag::Int32),
                value: Some(Value::Int32(42)),
            }],
        };
        let out = SignalOutput {
            signal: &signal,
            timestamp: "0".to_string(),
        };
        let json: serde_json::Value = serde_json::to_value(&out).unwrap();
        assert_eq!(json["member"], "Num");
        assert_eq!(json["fields"][0]["value"], 42);
        assert_eq!(json["timestamp"], "0");
    }
}
