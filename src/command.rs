use crate::env::ShellState;
use std::io::Write;

/// Conventional process exit code type used by this crate.
///
/// A value of 0 indicates success; any non-zero value indicates failure.
/// This mirrors the convention used by POSIX shells and many command-line tools.
pub type ExitCode = i32;

/// Output streams handed to an in-process command.
///
/// `out` is either the inherited standard output, a redirection target or,
/// inside a forked pipeline stage, the stage's pipe.
pub struct CommandIo<'a> {
    pub out: &'a mut dyn Write,
    pub err: &'a mut dyn Write,
}

/// Object-safe trait for any command that runs inside the interpreter.
pub trait ExecutableCommand {
    /// Executes the command and returns its status.
    fn execute(self: Box<Self>, io: &mut CommandIo<'_>, state: &mut ShellState) -> ExitCode;
}

/// Factory that tries to create a command from a name and its arguments.
///
/// Returns `None` when the factory doesn't recognize the `name`.
pub trait CommandFactory {
    /// The command name this factory answers to.
    fn name(&self) -> &'static str;

    /// Attempt to create a command instance for the provided name and arguments.
    fn try_create(&self, name: &str, args: &[String]) -> Option<Box<dyn ExecutableCommand>>;
}
