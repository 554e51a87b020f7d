use crate::SHELL_NAME;
use crate::builtin::Builtins;
use crate::command::ExitCode;
use crate::config::ShellConfig;
use crate::env::ShellState;
use crate::error::describe;
use crate::executor::run_pipeline;
use crate::input::{Line, LineSource};
use crate::parser::{ParseError, parse_line};
use crate::process::{ProcessControl, UnixProcess};
use crate::signals::{self, SignalGuard};
use log::{debug, warn};

/// A shell that reads command lines from a [`LineSource`] and runs them.
///
/// The interpreter owns the [`ShellState`], the builtin table and the
/// [`ProcessControl`] used to start pipelines.
///
/// Example
/// ```
/// use minishell::{Interpreter, ScriptInput, ShellConfig};
/// let mut sh = Interpreter::new(ShellConfig::default());
/// let code = sh.run(&mut ScriptInput::new("export GREETING=hello\nexit 3"));
/// assert_eq!(code, 3);
/// assert_eq!(sh.state().get_var("GREETING"), Some("hello"));
/// ```
pub struct Interpreter<P: ProcessControl = UnixProcess> {
    state: ShellState,
    builtins: Builtins,
    process: P,
    config: ShellConfig,
}

impl Interpreter<UnixProcess> {
    /// An interpreter over the current process environment and directory.
    pub fn new(config: ShellConfig) -> Self {
        Self::with_parts(
            config,
            ShellState::from_process(),
            Builtins::default(),
            UnixProcess,
        )
    }
}

impl<P: ProcessControl> Interpreter<P> {
    pub fn with_parts(
        config: ShellConfig,
        state: ShellState,
        builtins: Builtins,
        process: P,
    ) -> Self {
        Self {
            state,
            builtins,
            process,
            config,
        }
    }

    pub fn state(&self) -> &ShellState {
        &self.state
    }

    /// Read and run lines until end of input or `exit`.
    ///
    /// Returns the status the shell process should exit with.
    pub fn run(&mut self, input: &mut dyn LineSource) -> ExitCode {
        let _session = self.window(signals::prompt_window);
        loop {
            signals::take_interrupt();
            match input.read_line(&self.config.prompt) {
                Ok(Line::Text(line)) => {
                    self.run_line(&line, input);
                }
                Ok(Line::Interrupted) => self.state.last_status = 130,
                Ok(Line::Eof) => break,
                Err(err) => {
                    eprintln!("{SHELL_NAME}: {}", describe(&err));
                    self.state.last_status = 1;
                    break;
                }
            }
            if self.state.exit_request.is_some() {
                break;
            }
        }

        if self.config.interactive {
            eprintln!("exit");
        }
        let status = self.state.exit_request.unwrap_or(self.state.last_status);
        debug!("leaving with status {status}");
        status
    }

    /// Parse and run one command line. Heredoc bodies are pulled from `input`.
    ///
    /// Updates and returns the last status; an empty line leaves it unchanged.
    pub fn run_line(&mut self, line: &str, input: &mut dyn LineSource) -> ExitCode {
        let parsed = {
            let _heredoc = self.window(signals::heredoc_window);
            parse_line(line, input)
        };

        let status = match parsed {
            Ok(None) => return self.state.last_status,
            Ok(Some(pipeline)) => run_pipeline(
                &mut self.state,
                &self.builtins,
                &mut self.process,
                &pipeline,
            ),
            Err(ParseError::Syntax(err)) => {
                eprintln!("{SHELL_NAME}: {err}");
                2
            }
            Err(ParseError::Interrupted) => 130,
            Err(ParseError::Input(err)) => {
                eprintln!("{SHELL_NAME}: {}", describe(&err));
                1
            }
        };
        self.state.last_status = status;
        status
    }

    /// Install a signal window, but only for an interactive session.
    fn window(&self, open: fn() -> nix::Result<SignalGuard>) -> Option<SignalGuard> {
        if !self.config.interactive {
            return None;
        }
        open()
            .map_err(|err| warn!("cannot install signal handlers: {err}"))
            .ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::ScriptInput;
    use crate::process::Termination;
    use crate::process::fake::FakeProcess;

    fn interpreter(process: FakeProcess) -> Interpreter<FakeProcess> {
        let mut state = ShellState::new("/");
        state.set_var("PATH", "/usr/bin:/bin");
        Interpreter::with_parts(
            ShellConfig::default(),
            state,
            Builtins::default(),
            process,
        )
    }

    #[test]
    fn test_syntax_error_sets_status_2_and_runs_nothing() {
        let mut sh = interpreter(FakeProcess::default());
        let mut input = ScriptInput::default();
        assert_eq!(sh.run_line("echo \"a", &mut input), 2);
        assert_eq!(sh.run_line("ls |", &mut input), 2);
        assert_eq!(sh.run_line("cat <", &mut input), 2);
        assert!(sh.process.spawned.is_empty());
    }

    #[test]
    fn test_empty_line_keeps_status() {
        let mut sh = interpreter(FakeProcess::default().script(0, Termination::Exited(7)));
        let mut input = ScriptInput::default();
        assert_eq!(sh.run_line("ls", &mut input), 7);
        assert_eq!(sh.run_line("   ", &mut input), 7);
        assert_eq!(sh.state().last_status, 7);
    }

    #[test]
    fn test_status_is_visible_to_the_next_line() {
        let mut sh = interpreter(FakeProcess::default());
        let mut input = ScriptInput::default();
        sh.run_line("no_such_command_xyz", &mut input);
        sh.run_line("export LAST=$?", &mut input);
        assert_eq!(sh.state().get_var("LAST"), Some("127"));
    }

    #[test]
    fn test_run_stops_at_exit() {
        let mut sh = interpreter(FakeProcess::default());
        let status = sh.run(&mut ScriptInput::new("export A=1\nexit 9\nexport B=2"));
        assert_eq!(status, 9);
        assert_eq!(sh.state().get_var("A"), Some("1"));
        assert!(!sh.state().contains("B"));
    }

    #[test]
    fn test_run_returns_last_status_at_end_of_input() {
        let mut sh = interpreter(FakeProcess::default().script(0, Termination::Exited(4)));
        assert_eq!(sh.run(&mut ScriptInput::new("ls")), 4);
    }

    #[test]
    fn test_heredoc_lines_are_taken_from_the_script() {
        let mut sh = interpreter(FakeProcess::default());
        let status = sh.run(&mut ScriptInput::new("cat <<END\nbody\nEND\nexport AFTER=1"));
        assert_eq!(status, 0);
        assert_eq!(sh.process.spawned.len(), 1);
        assert!(sh.process.spawned[0].stdin);
        assert_eq!(sh.state().get_var("AFTER"), Some("1"));
    }
}
