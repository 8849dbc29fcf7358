use anyhow::{Context, Result};
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::command::Command;

/// Lifecycle phase reported to the platform.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StatusType {
    Transitioning,
    Success,
    Error,
}

// Status document format, one report per file
#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    pub version: f32,
    #[serde(rename = "timestampUTC")]
    pub timestamp_utc: String,
    pub status: StatusDetail,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct StatusDetail {
    pub name: String,
    pub operation: String,
    pub status: StatusType,
    pub code: i32,
    pub formatted_message: FormattedMessage,
}

#[derive(Serialize, Debug)]
pub struct FormattedMessage {
    pub lang: String,
    pub message: String,
}

impl StatusReport {
    #[must_use]
    pub fn new(handler_name: &str, cmd: Command, status: StatusType, message: &str) -> Self {
        let code = match status {
            StatusType::Error => cmd.fail_exit_code(),
            StatusType::Transitioning | StatusType::Success => 0,
        };

        Self {
            version: 1.0,
            timestamp_utc: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            status: StatusDetail {
                name: handler_name.to_string(),
                operation: cmd.operation().to_string(),
                status,
                code,
                formatted_message: FormattedMessage {
                    lang: "en".to_string(),
                    message: message.to_string(),
                },
            },
        }
    }

    /// Write the report as `<seq>.status` in `status_folder`, replacing any
    /// previous report for the same sequence number.
    ///
    /// # Errors
    ///
    /// Returns an error if the folder or file cannot be written.
    pub fn save<P: AsRef<Path>>(&self, status_folder: P, seq: u64) -> Result<PathBuf> {
        let folder = status_folder.as_ref();
        fs::create_dir_all(folder)
            .with_context(|| format!("failed to create status folder {}", folder.display()))?;

        // The platform expects a single-element array
        let content = serde_json::to_string(&[self])
            .context("failed to serialize status report to JSON")?;

        let path = status_path(folder, seq);
        let tmp_path = folder.join(format!("{seq}.status.tmp"));
        fs::write(&tmp_path, content)
            .with_context(|| format!("failed to write status to {}", tmp_path.display()))?;
        fs::rename(&tmp_path, &path)
            .with_context(|| format!("failed to move status into {}", path.display()))?;

        Ok(path)
    }
}

#[must_use]
pub fn status_path(status_folder: &Path, seq: u64) -> PathBuf {
    status_folder.join(format!("{seq}.status"))
}
