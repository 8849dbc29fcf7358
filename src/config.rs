// Handler configuration constants and environment overrides

use std::env;
use std::path::PathBuf;

/// File the guest agent drops next to the handler binary
pub const HANDLER_ENV_FILE: &str = "HandlerEnvironment.json";

/// Log file created inside the handler's log folder
pub const LOG_FILE_NAME: &str = "handler.log";

/// Most-recently-executed sequence number, kept in the handler root
pub const MRSEQ_FILE_NAME: &str = "mrseq";

/// Working directory for commands run by enable
pub const DATA_DIR_NAME: &str = "data";

/// Scenario tag attached to every telemetry event
pub const TELEMETRY_SCENARIO: &str = "scenario:vmext-handler";

/// Maximum bytes of command output kept in logs
pub const OUTPUT_LIMIT: usize = 4096;

pub const HANDLER_ENV_VAR: &str = "VMEXT_HANDLER_ENVIRONMENT";
pub const UPDATE_FROM_VERSION_VAR: &str = "VMEXT_UPDATE_FROM_VERSION";

// Explicit path to HandlerEnvironment.json, if the operator set one
#[must_use]
pub fn handler_env_override() -> Option<PathBuf> {
    env::var_os(HANDLER_ENV_VAR)
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
}

// Version being upgraded from, exported by the agent during update
#[must_use]
pub fn update_from_version() -> Option<String> {
    env::var(UPDATE_FROM_VERSION_VAR)
        .ok()
        .filter(|value| !value.trim().is_empty())
}
