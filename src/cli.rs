use clap::error::ErrorKind;
use clap::builder::BoolishValueParser;
use clap::{ArgAction, Parser};

use vmext_handler::command::INVALID_CMD_CODE;
use vmext_handler::{
    parse_command, run, usage, AzureHost, LifecycleHandler, LogOptions, TracingLogger,
    UsageError,
};

const PROGRAM: &str = env!("CARGO_PKG_NAME");

// CLI arguments parsing structure
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None, disable_help_subcommand = true)]
pub struct Cli {
    /// Return a detailed report
    #[arg(
        long,
        num_args = 0..=1,
        require_equals = true,
        default_value_t = false,
        default_missing_value = "true",
        action = ArgAction::Set,
        value_parser = BoolishValueParser::new()
    )]
    pub verbose: bool,

    /// Return a debug report
    #[arg(
        long,
        num_args = 0..=1,
        require_equals = true,
        default_value_t = false,
        default_missing_value = "true",
        action = ArgAction::Set,
        value_parser = BoolishValueParser::new()
    )]
    pub debug: bool,

    /// Lifecycle command to run
    pub args: Vec<String>,
}

// The agent passes flags with a single dash, optionally as -flag=value
fn normalize_flag(arg: &str) -> String {
    let name = arg.split('=').next().unwrap_or(arg);
    match name {
        "-verbose" | "-debug" => format!("-{arg}"),
        _ => arg.to_string(),
    }
}

// Flags end at the first positional or at "--"; everything after is positional
fn split_flags(args: &[String]) -> (&[String], &[String]) {
    let end = args
        .iter()
        .position(|arg| arg == "--" || arg == "-" || !arg.starts_with('-'))
        .unwrap_or(args.len());
    let (flags, rest) = args.split_at(end);
    match rest.split_first() {
        Some((first, tail)) if first == "--" => (flags, tail),
        _ => (flags, rest),
    }
}

// Parse raw process arguments, returning the exit code on failure
pub fn parse_args<I>(raw: I) -> Result<Cli, i32>
where
    I: IntoIterator<Item = String>,
{
    let mut raw = raw.into_iter();
    let program = raw.next().unwrap_or_else(|| PROGRAM.to_string());
    let rest: Vec<String> = raw.collect();
    let (flags, positionals) = split_flags(&rest);

    let argv = std::iter::once(program)
        .chain(flags.iter().map(|flag| normalize_flag(flag)))
        .chain(std::iter::once("--".to_string()))
        .chain(positionals.iter().cloned());

    match Cli::try_parse_from(argv) {
        Ok(cli) => Ok(cli),
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            e.exit()
        }
        Err(e) => {
            println!("{}", e.kind());
            println!("{}", usage(PROGRAM));
            Err(INVALID_CMD_CODE)
        }
    }
}

// Print usage plus the diagnostic, in the order the agent logs expect
fn report_usage_error(error: &UsageError) {
    match error {
        UsageError::UnknownCommand(_) => {
            println!("{}", usage(PROGRAM));
            println!("{error}");
        }
        UsageError::NotEnoughArguments { .. } | UsageError::TooManyArguments { .. } => {
            println!("{error}");
            println!("{}", usage(PROGRAM));
        }
    }
}

// Execute the selected command and return the process exit code
pub fn execute_command(cli: &Cli) -> i32 {
    let cmd = match parse_command(&cli.args) {
        Ok(cmd) => cmd,
        Err(e) => {
            report_usage_error(&e);
            return INVALID_CMD_CODE;
        }
    };

    let options = LogOptions {
        verbose: cli.verbose,
        debug: cli.debug,
    };
    let bootstrap = TracingLogger::bootstrap(&options);

    run(&AzureHost, &LifecycleHandler, cmd, &bootstrap, &options)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        std::iter::once(PROGRAM)
            .chain(list.iter().copied())
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn test_single_dash_flags_are_accepted() {
        let cli = parse_args(args(&["-verbose", "-debug", "enable"])).expect("valid args");
        assert!(cli.verbose);
        assert!(cli.debug);
        assert_eq!(cli.args, vec!["enable".to_string()]);
    }

    #[test]
    fn test_double_dash_flags_are_accepted() {
        let cli = parse_args(args(&["--debug", "install"])).expect("valid args");
        assert!(!cli.verbose);
        assert!(cli.debug);
    }

    #[test]
    fn test_flags_after_command_stay_positional() {
        let cli = parse_args(args(&["enable", "-debug"])).expect("valid args");
        assert!(!cli.debug);
        assert_eq!(cli.args, vec!["enable".to_string(), "-debug".to_string()]);
        // Two positionals left over, so the command is rejected
        assert_eq!(execute_command(&cli), INVALID_CMD_CODE);
    }

    #[test]
    fn test_flags_accept_explicit_values() {
        let cli = parse_args(args(&["-debug=true", "-verbose=false", "enable"]))
            .expect("valid args");
        assert!(cli.debug);
        assert!(!cli.verbose);
        assert_eq!(cli.args, vec!["enable".to_string()]);

        let cli = parse_args(args(&["--verbose=1", "install"])).expect("valid args");
        assert!(cli.verbose);
    }

    #[test]
    fn test_double_dash_ends_flags() {
        let cli = parse_args(args(&["-debug", "--", "-verbose"])).expect("valid args");
        assert!(cli.debug);
        assert!(!cli.verbose);
        assert_eq!(cli.args, vec!["-verbose".to_string()]);
    }

    #[test]
    fn test_unknown_flag_is_a_usage_error() {
        assert_eq!(parse_args(args(&["-frob", "enable"])).err(), Some(INVALID_CMD_CODE));
    }

    #[test]
    fn test_invalid_command_never_dispatches() {
        for list in [&[][..], &["enable", "disable"][..], &["frobnicate"][..]] {
            let cli = parse_args(args(list)).expect("flags parse");
            assert_eq!(execute_command(&cli), INVALID_CMD_CODE);
        }
    }
}
