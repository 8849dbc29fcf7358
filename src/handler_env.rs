use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Deserializer};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::{handler_env_override, HANDLER_ENV_FILE};

/// Folders the guest agent assigns to this handler.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HandlerFolders {
    pub log_folder: PathBuf,
    pub config_folder: PathBuf,
    pub status_folder: PathBuf,
    #[serde(default)]
    pub heartbeat_file: Option<PathBuf>,
    #[serde(default)]
    pub events_folder: Option<PathBuf>,
}

// One element of HandlerEnvironment.json
#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct HandlerEnvironmentEntry {
    name: String,
    #[serde(deserialize_with = "string_or_number")]
    version: String,
    #[serde(default, deserialize_with = "optional_string_or_number")]
    seq_no: Option<String>,
    handler_environment: HandlerFolders,
}

/// Parsed `HandlerEnvironment.json`.
#[derive(Debug, Clone, PartialEq)]
pub struct HandlerEnvironment {
    pub name: String,
    pub version: String,
    pub seq_no: Option<String>,
    /// Directory holding HandlerEnvironment.json
    pub root: PathBuf,
    pub handler: HandlerFolders,
}

impl HandlerEnvironment {
    /// Locate and parse the handler environment for this process.
    ///
    /// # Errors
    ///
    /// Returns an error if no environment file is found or it cannot be parsed.
    pub fn load() -> Result<Self> {
        let path = match handler_env_override() {
            Some(path) => path,
            None => locate_handler_env()?,
        };
        Self::from_file(&path)
    }

    /// Parse a specific `HandlerEnvironment.json`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is malformed.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let path_str = path.to_string_lossy();
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read handler environment from {path_str}"))?;
        let root = path
            .parent()
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf);

        Self::from_json(&content, root)
            .with_context(|| format!("failed to parse handler environment from {path_str}"))
    }

    /// Parse handler environment JSON content.
    ///
    /// # Errors
    ///
    /// Returns an error unless `content` is an array with exactly one entry.
    pub fn from_json(content: &str, root: PathBuf) -> Result<Self> {
        let mut entries: Vec<HandlerEnvironmentEntry> =
            serde_json::from_str(content).context("invalid handler environment JSON")?;

        if entries.len() != 1 {
            bail!(
                "expected exactly one handler environment entry, found {}",
                entries.len()
            );
        }
        let entry = entries.remove(0);

        Ok(Self {
            name: entry.name,
            version: entry.version,
            seq_no: entry.seq_no,
            root,
            handler: entry.handler_environment,
        })
    }
}

// HandlerEnvironment.json sits next to the binary or one level up
fn locate_handler_env() -> Result<PathBuf> {
    let exe = env::current_exe().context("failed to resolve handler executable path")?;
    let exe_dir = exe
        .parent()
        .ok_or_else(|| anyhow!("handler executable has no parent directory"))?;

    let candidates: Vec<PathBuf> = [Some(exe_dir), exe_dir.parent()]
        .into_iter()
        .flatten()
        .map(|dir| dir.join(HANDLER_ENV_FILE))
        .collect();
    let found = candidates.into_iter().find(|path| path.is_file());

    found.ok_or_else(|| {
        anyhow!(
            "{HANDLER_ENV_FILE} not found in {} or its parent",
            exe_dir.display()
        )
    })
}

// The agent writes version and seqNo either quoted or as bare numbers
#[derive(Deserialize)]
#[serde(untagged)]
enum StringOrNumber {
    Text(String),
    Number(serde_json::Number),
}

impl StringOrNumber {
    fn into_string(self) -> String {
        match self {
            StringOrNumber::Text(text) => text,
            StringOrNumber::Number(number) => number.to_string(),
        }
    }
}

fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    StringOrNumber::deserialize(deserializer).map(StringOrNumber::into_string)
}

fn optional_string_or_number<'de, D>(
    deserializer: D,
) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<StringOrNumber>::deserialize(deserializer)
        .map(|value| value.map(StringOrNumber::into_string))
}

/// Largest `<n>.settings` sequence number in `config_folder`.
///
/// # Errors
///
/// Returns an error if the folder cannot be read or holds no settings file.
pub fn find_seq_num<P: AsRef<Path>>(config_folder: P) -> Result<u64> {
    let folder = config_folder.as_ref();
    let entries = fs::read_dir(folder)
        .with_context(|| format!("failed to read config folder {}", folder.display()))?;

    let mut latest: Option<u64> = None;
    for entry in entries {
        let entry = entry
            .with_context(|| format!("failed to list config folder {}", folder.display()))?;
        let path = entry.path();
        if path.extension().and_then(|ext| ext.to_str()) != Some("settings") {
            continue;
        }
        let seq = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .and_then(|stem| stem.parse::<u64>().ok());
        if let Some(seq) = seq {
            latest = Some(latest.map_or(seq, |current| current.max(seq)));
        }
    }

    latest.ok_or_else(|| anyhow!("no .settings file found in {}", folder.display()))
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
struct SettingsFile {
    #[serde(default)]
    runtime_settings: Vec<RuntimeSettings>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct RuntimeSettings {
    handler_settings: HandlerSettings,
}

/// Settings the platform published for one sequence number.
#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HandlerSettings {
    #[serde(default)]
    pub public_settings: serde_json::Value,
    #[serde(default)]
    pub protected_settings: Option<String>,
    #[serde(default)]
    pub protected_settings_cert_thumbprint: Option<String>,
}

impl HandlerSettings {
    /// Read `<seq>.settings` from the config folder.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load<P: AsRef<Path>>(config_folder: P, seq: u64) -> Result<Self> {
        let path = config_folder.as_ref().join(format!("{seq}.settings"));
        let path_str = path.to_string_lossy();
        let content = fs::read_to_string(&path)
            .with_context(|| format!("failed to read settings from {path_str}"))?;
        Self::from_json(&content)
            .with_context(|| format!("failed to parse settings from {path_str}"))
    }

    /// Parse settings file content. An empty runtime settings list yields
    /// empty settings.
    ///
    /// # Errors
    ///
    /// Returns an error if `content` is not valid settings JSON.
    pub fn from_json(content: &str) -> Result<Self> {
        let file: SettingsFile = serde_json::from_str(content).context("invalid settings JSON")?;
        let mut settings = file
            .runtime_settings
            .into_iter()
            .next()
            .map(|runtime| runtime.handler_settings)
            .unwrap_or_default();

        // Some agents publish publicSettings as an embedded JSON string
        if let Some(embedded) = settings.public_settings.as_str().map(str::to_owned) {
            settings.public_settings = serde_json::from_str(&embedded)
                .context("invalid embedded publicSettings JSON")?;
        }
        Ok(settings)
    }

    // Public setting as a string, if present
    #[must_use]
    pub fn public_str(&self, key: &str) -> Option<&str> {
        self.public_settings.get(key).and_then(|value| value.as_str())
    }
}
