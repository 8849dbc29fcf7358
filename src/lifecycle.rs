use anyhow::{bail, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use crate::command::Command;
use crate::config::{update_from_version, DATA_DIR_NAME, MRSEQ_FILE_NAME, OUTPUT_LIMIT};
use crate::dispatch::CommandHandler;
use crate::handler_env::{HandlerEnvironment, HandlerSettings};
use crate::logger::ExtensionLogger;
use crate::system::{is_elevated, run_shell};

/// Tracks the most recently executed sequence number on disk.
#[derive(Debug, Clone)]
pub struct SeqTracker {
    path: PathBuf,
}

impl SeqTracker {
    #[must_use]
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            path: root.as_ref().join(MRSEQ_FILE_NAME),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Last executed sequence number, or `None` if nothing ran yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(&self) -> Result<Option<u64>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let path_str = self.path.to_string_lossy();
        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read {path_str}"))?;
        let seq = content
            .trim()
            .parse::<u64>()
            .with_context(|| format!("invalid sequence number in {path_str}"))?;
        Ok(Some(seq))
    }

    /// Record `seq` as executed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save(&self, seq: u64) -> Result<()> {
        fs::write(&self.path, seq.to_string())
            .with_context(|| format!("failed to write {}", self.path.to_string_lossy()))
    }

    /// Forget any recorded sequence number.
    ///
    /// # Errors
    ///
    /// Returns an error if an existing file cannot be removed.
    pub fn clear(&self) -> Result<()> {
        if self.path.exists() {
            fs::remove_file(&self.path)
                .with_context(|| format!("failed to remove {}", self.path.to_string_lossy()))?;
        }
        Ok(())
    }
}

/// Production behavior of the five lifecycle commands.
///
/// State lives in the handler root: `mrseq` for the last executed sequence
/// number and `data/` as the working directory for `commandToExecute`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LifecycleHandler;

fn data_dir(env: &HandlerEnvironment) -> PathBuf {
    env.root.join(DATA_DIR_NAME)
}

fn install(logger: &dyn ExtensionLogger, env: &HandlerEnvironment) -> Result<()> {
    if !is_elevated() {
        logger.event("warning: handler is not running as root");
    }
    let data_dir = data_dir(env);
    fs::create_dir_all(&data_dir)
        .with_context(|| format!("failed to create {}", data_dir.display()))?;
    logger.event(&format!("created data directory {}", data_dir.display()));
    Ok(())
}

fn enable(logger: &dyn ExtensionLogger, env: &HandlerEnvironment, seq: u64) -> Result<()> {
    logger.debug(&format!(
        "loading {seq}.settings from {}",
        env.handler.config_folder.display()
    ));
    let settings = HandlerSettings::load(&env.handler.config_folder, seq)?;

    match settings.public_str("commandToExecute") {
        Some(command) => run_command(logger, env, command)?,
        None => logger.event("no commandToExecute in public settings"),
    }

    SeqTracker::new(&env.root).save(seq)?;
    logger.event(&format!("saved mrseq: {seq}"));
    Ok(())
}

fn run_command(
    logger: &dyn ExtensionLogger,
    env: &HandlerEnvironment,
    command: &str,
) -> Result<()> {
    let data_dir = data_dir(env);
    fs::create_dir_all(&data_dir)
        .with_context(|| format!("failed to create {}", data_dir.display()))?;

    logger.event(&format!("executing command: {command}"));
    logger.debug(&format!("working directory {}", data_dir.display()));
    let output = run_shell(command, &data_dir, OUTPUT_LIMIT)?;
    logger.debug(&format!("command exit status {:?}", output.code));
    logger.custom_log("stdout", &output.stdout);
    logger.custom_log("stderr", &output.stderr);

    match output.code {
        Some(0) => Ok(()),
        Some(code) => bail!("command exited with code {code}"),
        None => bail!("command terminated by signal"),
    }
}

fn update(logger: &dyn ExtensionLogger, env: &HandlerEnvironment) {
    match update_from_version() {
        Some(from) => logger.event(&format!("updating from {from} to {}", env.version)),
        None => logger.event(&format!("updating to {}", env.version)),
    }
}

fn uninstall(logger: &dyn ExtensionLogger, env: &HandlerEnvironment) -> Result<()> {
    SeqTracker::new(&env.root).clear()?;

    let data_dir = data_dir(env);
    if data_dir.exists() {
        fs::remove_dir_all(&data_dir)
            .with_context(|| format!("failed to remove {}", data_dir.display()))?;
        logger.event(&format!("removed data directory {}", data_dir.display()));
    }
    Ok(())
}

impl CommandHandler for LifecycleHandler {
    fn pre_check(
        &self,
        cmd: Command,
        logger: &dyn ExtensionLogger,
        env: &HandlerEnvironment,
        seq: u64,
    ) -> Result<()> {
        if cmd != Command::Enable {
            return Ok(());
        }

        // Skip settings the handler already applied
        let tracker = SeqTracker::new(&env.root);
    logger.debug(&format!("checking {}", tracker.path().display()));
    if let Some(mrseq) = tracker.load()? {
            if seq <= mrseq {
                bail!("sequence number {seq} already processed (mrseq {mrseq})");
            }
        }
        Ok(())
    }

    fn execute(
        &self,
        cmd: Command,
        logger: &dyn ExtensionLogger,
        env: &HandlerEnvironment,
        seq: u64,
    ) -> Result<()> {
        match cmd {
            Command::Install => install(logger, env),
            Command::Enable => enable(logger, env, seq),
            Command::Disable => {
                logger.event("nothing running, disable is a no-op");
                Ok(())
            }
            Command::Update => {
                update(logger, env);
                Ok(())
            }
            Command::Uninstall => uninstall(logger, env),
        }
    }
}
