use argh::FromArgs;

/// Prompt shown when none is given on the command line.
pub const DEFAULT_PROMPT: &str = "minishell$ ";

#[derive(FromArgs, Debug)]
/// A small interactive shell with pipes, redirections and heredocs.
pub struct CliArgs {
    /// run the given command line (newlines separate commands) and exit
    #[argh(option, short = 'c')]
    pub command: Option<String>,

    /// text displayed before each interactive command line
    #[argh(option, default = "String::from(DEFAULT_PROMPT)")]
    pub prompt: String,
}

/// Runtime settings of an [`Interpreter`](crate::Interpreter).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellConfig {
    pub prompt: String,
    /// Enables the signal windows and the `exit` echo.
    pub interactive: bool,
}

impl ShellConfig {
    /// Settings for a shell started with `args`. Only a shell reading
    /// commands from a terminal is interactive.
    pub fn from_args(args: &CliArgs, stdin_is_terminal: bool) -> Self {
        Self {
            prompt: args.prompt.clone(),
            interactive: args.command.is_none() && stdin_is_terminal,
        }
    }
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            prompt: DEFAULT_PROMPT.to_string(),
            interactive: false,
        }
    }
}
