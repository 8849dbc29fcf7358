use anyhow::{Context, Result};
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::process;

/// Success or failure signal for one operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryEvent {
    pub scenario: String,
    pub message: String,
    pub success: bool,
    pub code: i32,
}

impl TelemetryEvent {
    pub fn new(scenario: &str, message: impl Into<String>, success: bool, code: i32) -> Self {
        Self {
            scenario: scenario.to_string(),
            message: message.into(),
            success,
            code,
        }
    }
}

// Event file layout the guest agent collects from the events folder
#[derive(Serialize, Debug)]
#[serde(rename_all = "PascalCase")]
struct GuestAgentEvent<'a> {
    version: &'a str,
    timestamp: String,
    task_name: &'a str,
    event_level: &'a str,
    message: String,
    event_pid: String,
    event_tid: String,
    operation_id: String,
}

/// Write `event` into `events_folder` as a new JSON file and return its path.
///
/// # Errors
///
/// Returns an error if the folder or file cannot be written.
pub fn write_event<P: AsRef<Path>>(
    events_folder: P,
    operation_id: &str,
    event: &TelemetryEvent,
) -> Result<PathBuf> {
    let folder = events_folder.as_ref();
    fs::create_dir_all(folder)
        .with_context(|| format!("failed to create events folder {}", folder.display()))?;

    let now = Utc::now();
    // Single-threaded process, so the thread id is reported as the pid
    let pid = process::id().to_string();
    let record = GuestAgentEvent {
        version: env!("CARGO_PKG_VERSION"),
        timestamp: now.to_rfc3339_opts(SecondsFormat::Millis, true),
        task_name: &event.scenario,
        event_level: if event.success { "Informational" } else { "Error" },
        message: format!("{} (code {})", event.message, event.code),
        event_pid: pid.clone(),
        event_tid: pid,
        operation_id: operation_id.to_string(),
    };
    let content =
        serde_json::to_string(&record).context("failed to serialize telemetry event to JSON")?;

    let nanos = now.timestamp_nanos_opt().unwrap_or_else(|| now.timestamp_micros() * 1000);
    let path = folder.join(format!("{nanos}.json"));
    fs::write(&path, content)
        .with_context(|| format!("failed to write telemetry event to {}", path.display()))?;

    Ok(path)
}
