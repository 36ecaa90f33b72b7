//! Structured errors for the watch shell.

/// Errors from parsing a shell command line.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ShellError {
    /// The first word is not a known command.
    #[error("UNKNOWN_COMMAND: {0} (type `help` for the list)")]
    UnknownCommand(String),

    /// A command that needs a URL was given none.
    #[error("INVALID_INPUT: `{0}` needs a URL")]
    MissingArgument(&'static str),

    /// A command was given more words than it takes.
    #[error("INVALID_INPUT: `{0}` takes no extra arguments")]
    UnexpectedArgument(&'static str),
}
