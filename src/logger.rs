use anyhow::{Context, Result};
use std::fmt::Display;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::Path;
use std::sync::Mutex;
use tracing::field::display;
use tracing::Dispatch;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::EnvFilter;

use crate::config::LOG_FILE_NAME;

/// Effect of the `-verbose` and `-debug` flags on log output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LogOptions {
    /// Mirror the log file to stderr and add thread ids to every line
    pub verbose: bool,
    /// Lower the maximum level to DEBUG
    pub debug: bool,
}

impl LogOptions {
    fn filter(self) -> EnvFilter {
        // RUST_LOG wins when the operator sets it
        EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(if self.debug { "debug" } else { "info" })
        })
    }
}

/// Logging capability threaded through every dispatch stage.
///
/// None of the methods fail; a sink that cannot write drops the line.
pub trait ExtensionLogger {
    /// Attach a key/value pair to every following line.
    fn with(&mut self, key: &str, value: &str);

    /// Write an informational line.
    fn event(&self, message: &str);

    /// Write a diagnostic line, shown only with `-debug`.
    fn debug(&self, message: &str);

    /// Write an error line pairing `message` with `error`.
    fn event_error(&self, message: &str, error: &dyn Display);

    /// Write a bare key/value record.
    fn custom_log(&self, key: &str, value: &str);
}

/// Logger backed by its own `tracing` dispatcher, so nothing is installed
/// globally.
pub struct TracingLogger {
    dispatch: Dispatch,
    context: Vec<(String, String)>,
}

impl TracingLogger {
    /// Logger writing to any `MakeWriter`.
    pub fn with_writer<W>(writer: W, options: &LogOptions) -> Self
    where
        W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
    {
        let subscriber = tracing_subscriber::fmt()
            .with_writer(writer)
            .with_ansi(false)
            .with_target(false)
            .with_env_filter(options.filter())
            .with_thread_ids(options.verbose)
            .finish();

        Self {
            dispatch: Dispatch::new(subscriber),
            context: Vec::new(),
        }
    }

    // Stderr logger used until the handler environment is known
    pub fn bootstrap(options: &LogOptions) -> Self {
        Self::with_writer(io::stderr, options)
    }

    /// Logger appending to `handler.log` inside `log_folder`.
    ///
    /// Falls back to stderr if the file cannot be opened.
    pub fn to_folder(log_folder: &Path, options: &LogOptions) -> Self {
        match open_log_file(log_folder) {
            Ok(file) if options.verbose => {
                Self::with_writer(Mutex::new(file).and(io::stderr), options)
            }
            Ok(file) => Self::with_writer(Mutex::new(file), options),
            Err(e) => {
                let logger = Self::bootstrap(options);
                logger.event_error(
                    "failed to open log file, logging to stderr",
                    &format!("{e:#}"),
                );
                logger
            }
        }
    }

    // None until `with` has been called, so the field is left out
    fn render_context(&self) -> Option<String> {
        if self.context.is_empty() {
            return None;
        }
        let rendered = self
            .context
            .iter()
            .map(|(key, value)| format!("{key}={value}"))
            .collect::<Vec<_>>()
            .join(" ");
        Some(rendered)
    }
}

impl ExtensionLogger for TracingLogger {
    fn with(&mut self, key: &str, value: &str) {
        self.context.push((key.to_string(), value.to_string()));
    }

    fn event(&self, message: &str) {
        let context = self.render_context();
        tracing::dispatcher::with_default(&self.dispatch, || {
            tracing::info!(context = context.as_deref().map(display), "{message}");
        });
    }

    fn debug(&self, message: &str) {
        let context = self.render_context();
        tracing::dispatcher::with_default(&self.dispatch, || {
            tracing::debug!(context = context.as_deref().map(display), "{message}");
        });
    }

    fn event_error(&self, message: &str, error: &dyn Display) {
        let context = self.render_context();
        tracing::dispatcher::with_default(&self.dispatch, || {
            tracing::error!(
                context = context.as_deref().map(display),
                error = %error,
                "{message}"
            );
        });
    }

    fn custom_log(&self, key: &str, value: &str) {
        let context = self.render_context();
        tracing::dispatcher::with_default(&self.dispatch, || {
            tracing::info!(
                context = context.as_deref().map(display),
                key = key,
                value = value
            );
        });
    }
}

/// Discards everything; handy in tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct NopLogger;

impl ExtensionLogger for NopLogger {
    fn with(&mut self, _key: &str, _value: &str) {}

    fn event(&self, _message: &str) {}

    fn debug(&self, _message: &str) {}

    fn event_error(&self, _message: &str, _error: &dyn Display) {}

    fn custom_log(&self, _key: &str, _value: &str) {}
}

fn open_log_file(log_folder: &Path) -> Result<File> {
    fs::create_dir_all(log_folder)
        .with_context(|| format!("failed to create log folder {}", log_folder.display()))?;
    let path = log_folder.join(LOG_FILE_NAME);
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("failed to open log file {}", path.display()))
}
