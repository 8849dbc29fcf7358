//! Lifecycle command dispatcher for an Azure VM extension handler.
//!
//! The guest agent runs the handler binary once per lifecycle operation
//! (`install`, `enable`, `disable`, `update`, `uninstall`). Each run loads
//! `HandlerEnvironment.json`, resolves the current sequence number, runs the
//! command and reports the outcome through a status file and telemetry.

pub mod command;
pub mod config;
pub mod dispatch;
pub mod handler_env;
pub mod lifecycle;
pub mod logger;
pub mod status;
pub mod system;
pub mod telemetry;

pub use command::{parse_command, usage, Command, UsageError};
pub use dispatch::{run, AzureHost, CommandHandler, Host};
pub use handler_env::{find_seq_num, HandlerEnvironment, HandlerFolders, HandlerSettings};
pub use lifecycle::{LifecycleHandler, SeqTracker};
pub use logger::{ExtensionLogger, LogOptions, NopLogger, TracingLogger};
pub use status::{StatusReport, StatusType};
pub use telemetry::TelemetryEvent;
