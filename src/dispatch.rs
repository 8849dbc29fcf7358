use anyhow::{Context, Result};
use std::path::Path;

use crate::command::{Command, FAILURE_CODE, SUCCESS_CODE};
use crate::config::TELEMETRY_SCENARIO;
use crate::handler_env::{self, HandlerEnvironment};
use crate::logger::{ExtensionLogger, LogOptions, TracingLogger};
use crate::status::{StatusReport, StatusType};
use crate::telemetry::{self, TelemetryEvent};

/// Platform collaborators the dispatcher talks to.
pub trait Host {
    fn load_environment(&self) -> Result<HandlerEnvironment>;

    fn find_seq_num(&self, config_folder: &Path) -> Result<u64>;

    fn open_logger(
        &self,
        env: &HandlerEnvironment,
        options: &LogOptions,
    ) -> Box<dyn ExtensionLogger>;

    fn report_status(
        &self,
        env: &HandlerEnvironment,
        seq: u64,
        cmd: Command,
        status: StatusType,
        message: &str,
    ) -> Result<()>;

    fn send_telemetry(
        &self,
        env: &HandlerEnvironment,
        logger: &dyn ExtensionLogger,
        event: &TelemetryEvent,
    ) -> Result<()>;
}

/// Behavior behind each lifecycle command.
pub trait CommandHandler {
    fn pre_check(
        &self,
        cmd: Command,
        logger: &dyn ExtensionLogger,
        env: &HandlerEnvironment,
        seq: u64,
    ) -> Result<()>;

    fn execute(
        &self,
        cmd: Command,
        logger: &dyn ExtensionLogger,
        env: &HandlerEnvironment,
        seq: u64,
    ) -> Result<()>;
}

// Host backed by the real filesystem layout of an Azure VM
#[derive(Debug, Default, Clone, Copy)]
pub struct AzureHost;

impl Host for AzureHost {
    fn load_environment(&self) -> Result<HandlerEnvironment> {
        HandlerEnvironment::load()
    }

    fn find_seq_num(&self, config_folder: &Path) -> Result<u64> {
        handler_env::find_seq_num(config_folder)
    }

    fn open_logger(
        &self,
        env: &HandlerEnvironment,
        options: &LogOptions,
    ) -> Box<dyn ExtensionLogger> {
        Box::new(TracingLogger::to_folder(&env.handler.log_folder, options))
    }

    fn report_status(
        &self,
        env: &HandlerEnvironment,
        seq: u64,
        cmd: Command,
        status: StatusType,
        message: &str,
    ) -> Result<()> {
        StatusReport::new(&env.name, cmd, status, message)
            .save(&env.handler.status_folder, seq)
            .map(|_| ())
    }

    fn send_telemetry(
        &self,
        env: &HandlerEnvironment,
        logger: &dyn ExtensionLogger,
        event: &TelemetryEvent,
    ) -> Result<()> {
        logger.custom_log("telemetry", &event.message);
        match &env.handler.events_folder {
            Some(folder) => telemetry::write_event(folder, &env.name, event)
                .map(|_| ())
                .context("failed to emit telemetry event"),
            None => Ok(()),
        }
    }
}

/// Run one lifecycle command end to end and return the process exit code.
pub fn run<H, C>(
    host: &H,
    handler: &C,
    cmd: Command,
    bootstrap: &dyn ExtensionLogger,
    options: &LogOptions,
) -> i32
where
    H: Host + ?Sized,
    C: CommandHandler + ?Sized,
{
    let env = match host.load_environment() {
        Ok(env) => env,
        Err(e) => {
            bootstrap.event_error("failed to parse handlerEnv", &format!("{e:#}"));
            return FAILURE_CODE;
        }
    };

    let mut logger = host.open_logger(&env, options);
    logger.with("operation", cmd.name());
    logger.custom_log("command", cmd.name());
    let logger: &dyn ExtensionLogger = &*logger;
    logger.debug(&format!(
        "handler environment: name={} version={} root={}",
        env.name,
        env.version,
        env.root.display()
    ));

    logger.debug(&format!(
        "looking up sequence number in {}",
        env.handler.config_folder.display()
    ));
    let seq = match host.find_seq_num(&env.handler.config_folder) {
        Ok(seq) => seq,
        Err(e) => {
            logger.event_error("failed to find sequence number", &format!("{e:#}"));
            // install may run before the platform writes any settings
            if cmd != Command::Install {
                return cmd.fail_exit_code();
            }
            0
        }
    };
    logger.event(&format!("seqNum: {seq}"));

    logger.event("start operation");
    if cmd.has_pre_check() {
        logger.event("pre-check");
        if let Err(e) = handler.pre_check(cmd, logger, &env, seq) {
            let reason = format!("{e:#}");
            logger.event_error("pre-check failed", &reason);
            emit(
                host,
                &env,
                logger,
                format!("{cmd} pre-check failed: {reason}"),
                false,
                cmd.fail_exit_code(),
            );
            return cmd.fail_exit_code();
        }
        logger.debug("pre-check passed");
    }

    logger.event("reporting status");
    report(host, &env, logger, seq, cmd, StatusType::Transitioning, "Transitioning");

    logger.debug(&format!("executing {cmd} for seqNum {seq}"));
    if let Err(e) = handler.execute(cmd, logger, &env, seq) {
        let reason = format!("{e:#}");
        logger.event_error("command failed", &reason);
        report(host, &env, logger, seq, cmd, StatusType::Error, &reason);
        emit(
            host,
            &env,
            logger,
            format!("{cmd} failed: {reason}"),
            false,
            cmd.fail_exit_code(),
        );
        return cmd.fail_exit_code();
    }
    report(host, &env, logger, seq, cmd, StatusType::Success, "");

    emit(host, &env, logger, format!("{cmd} succeeded"), true, SUCCESS_CODE);
    logger.event(&format!("{cmd} end"));

    SUCCESS_CODE
}

// Status is best effort; a failed write only gets logged
fn report<H: Host + ?Sized>(
    host: &H,
    env: &HandlerEnvironment,
    logger: &dyn ExtensionLogger,
    seq: u64,
    cmd: Command,
    status: StatusType,
    message: &str,
) {
    logger.debug(&format!("status {status:?}: {message:?}"));
    if let Err(e) = host.report_status(env, seq, cmd, status, message) {
        logger.event_error("failed to report status", &format!("{e:#}"));
    }
}

fn emit<H: Host + ?Sized>(
    host: &H,
    env: &HandlerEnvironment,
    logger: &dyn ExtensionLogger,
    message: String,
    success: bool,
    code: i32,
) {
    let event = TelemetryEvent::new(TELEMETRY_SCENARIO, message, success, code);
    if let Err(e) = host.send_telemetry(env, logger, &event) {
        logger.event_error("failed to send telemetry", &format!("{e:#}"));
    }
}
