use std::fmt;

// Exit codes shared by every command
pub const SUCCESS_CODE: i32 = 0;
pub const FAILURE_CODE: i32 = 1;
pub const INVALID_CMD_CODE: i32 = 2;

/// Lifecycle sub-commands the guest agent can invoke.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    Install,
    Enable,
    Disable,
    Update,
    Uninstall,
}

impl Command {
    pub const ALL: [Command; 5] = [
        Command::Install,
        Command::Enable,
        Command::Disable,
        Command::Update,
        Command::Uninstall,
    ];

    // Registry key, always lower case
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Command::Install => "install",
            Command::Enable => "enable",
            Command::Disable => "disable",
            Command::Update => "update",
            Command::Uninstall => "uninstall",
        }
    }

    // Operation name as it appears in the status document
    #[must_use]
    pub fn operation(self) -> &'static str {
        match self {
            Command::Install => "Install",
            Command::Enable => "Enable",
            Command::Disable => "Disable",
            Command::Update => "Update",
            Command::Uninstall => "Uninstall",
        }
    }

    #[must_use]
    pub fn fail_exit_code(self) -> i32 {
        match self {
            Command::Install => 52,
            Command::Enable => 53,
            Command::Disable => 54,
            Command::Update => 55,
            Command::Uninstall => 56,
        }
    }

    #[must_use]
    pub fn has_pre_check(self) -> bool {
        matches!(self, Command::Enable)
    }

    /// Look up a command by name, ignoring case.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Command> {
        let lowered = name.to_lowercase();
        Self::ALL.into_iter().find(|cmd| cmd.name() == lowered)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// Reasons the positional arguments do not name exactly one command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UsageError {
    NotEnoughArguments { count: usize, args: Vec<String> },
    TooManyArguments { count: usize },
    UnknownCommand(String),
}

impl fmt::Display for UsageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UsageError::NotEnoughArguments { count, args } => {
                write!(f, "Not enough arguments, {count}\n{args:?}")
            }
            UsageError::TooManyArguments { count } => {
                write!(f, "Too many arguments, {count}")
            }
            UsageError::UnknownCommand(token) => write!(f, "Incorrect command: {token:?}"),
        }
    }
}

impl std::error::Error for UsageError {}

/// Resolve the positional arguments to a single command.
///
/// # Errors
///
/// Returns a [`UsageError`] unless `args` holds exactly one registered
/// command name.
pub fn parse_command(args: &[String]) -> Result<Command, UsageError> {
    match args {
        [] => Err(UsageError::NotEnoughArguments {
            count: 0,
            args: Vec::new(),
        }),
        [token] => {
            Command::from_name(token).ok_or_else(|| UsageError::UnknownCommand(token.clone()))
        }
        _ => Err(UsageError::TooManyArguments { count: args.len() }),
    }
}

/// Usage text listing every registered command and the optional flags.
#[must_use]
pub fn usage(program: &str) -> String {
    let names: Vec<&str> = Command::ALL.iter().map(|cmd| cmd.name()).collect();
    format!(
        "Usage: {program} {}\nOptional flags: verbose | debug",
        names.join(" | ")
    )
}
