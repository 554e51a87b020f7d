use crate::SHELL_NAME;
use crate::command::{CommandFactory, CommandIo, ExecutableCommand, ExitCode};
use crate::env::ShellState;
use crate::error::describe;
use anyhow::{Result, anyhow, bail};
use regex::Regex;
use std::fs;
use std::io::Write;
use std::marker::PhantomData;
use std::sync::LazyLock;

static IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid identifier regex"));

static ECHO_NO_NEWLINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^-n+$").expect("valid echo flag regex"));

/// Built-in commands known to the shell at compile time.
///
/// Builtins parse their own arguments and run inside the interpreter process
/// (or inside a forked pipeline stage) without an `execve`.
pub(crate) trait BuiltinCommand: Sized {
    /// Canonical name of the command, e.g. "echo" or "cd".
    fn name() -> &'static str;

    /// Turn raw arguments (without the command name) into the command.
    fn parse(args: &[String]) -> Result<Self, Usage>;

    /// Executes the command against `state`.
    ///
    /// Return value should follow shell conventions: 0 for success, non-zero for error.
    /// An `Err` is reported as `minishell: <name>: <error>` with status 1.
    fn execute(self, io: &mut CommandIo<'_>, state: &mut ShellState) -> Result<ExitCode>;
}

impl<T: BuiltinCommand> ExecutableCommand for T {
    fn execute(self: Box<Self>, io: &mut CommandIo<'_>, state: &mut ShellState) -> ExitCode {
        match <T as BuiltinCommand>::execute(*self, io, state) {
            Ok(code) => code,
            Err(e) => {
                let _ = writeln!(io.err, "{SHELL_NAME}: {}: {e:#}", T::name());
                1
            }
        }
    }
}

/// Rejected arguments: the message is printed and `status` returned without
/// running the command.
#[derive(Debug)]
pub(crate) struct Usage {
    message: String,
    status: ExitCode,
}

impl Usage {
    fn new(message: impl Into<String>, status: ExitCode) -> Self {
        Self {
            message: message.into(),
            status,
        }
    }
}

struct InvalidArgs {
    name: &'static str,
    usage: Usage,
}

impl ExecutableCommand for InvalidArgs {
    fn execute(self: Box<Self>, io: &mut CommandIo<'_>, _state: &mut ShellState) -> ExitCode {
        let _ = writeln!(io.err, "{SHELL_NAME}: {}: {}", self.name, self.usage.message);
        self.usage.status
    }
}

/// Factory allows creating instances of a [`BuiltinCommand`].
pub(crate) struct Factory<T> {
    _phantom: PhantomData<T>,
}

impl<T> Default for Factory<T> {
    fn default() -> Self {
        Self {
            _phantom: PhantomData,
        }
    }
}

impl<T: BuiltinCommand + 'static> CommandFactory for Factory<T> {
    fn name(&self) -> &'static str {
        T::name()
    }

    fn try_create(&self, name: &str, args: &[String]) -> Option<Box<dyn ExecutableCommand>> {
        if name != T::name() {
            return None;
        }
        Some(match T::parse(args) {
            Ok(cmd) => Box::new(cmd),
            Err(usage) => Box::new(InvalidArgs {
                name: T::name(),
                usage,
            }),
        })
    }
}

/// The builtin table consulted before any `PATH` lookup.
pub struct Builtins {
    factories: Vec<Box<dyn CommandFactory>>,
}

impl Builtins {
    pub fn new(factories: Vec<Box<dyn CommandFactory>>) -> Self {
        Self { factories }
    }

    pub fn is_builtin(&self, name: &str) -> bool {
        self.factories.iter().any(|f| f.name() == name)
    }

    /// Create the builtin called `name`, or `None` if there is no such builtin.
    pub fn create(&self, name: &str, args: &[String]) -> Option<Box<dyn ExecutableCommand>> {
        self.factories
            .iter()
            .find_map(|factory| factory.try_create(name, args))
    }
}

impl Default for Builtins {
    /// `cd`, `pwd`, `echo`, `export`, `unset`, `env` and `exit`.
    fn default() -> Self {
        Self::new(vec![
            Box::new(Factory::<Cd>::default()),
            Box::new(Factory::<Pwd>::default()),
            Box::new(Factory::<Echo>::default()),
            Box::new(Factory::<Export>::default()),
            Box::new(Factory::<Unset>::default()),
            Box::new(Factory::<Env>::default()),
            Box::new(Factory::<Exit>::default()),
        ])
    }
}

/// Print the current working directory to standard output.
pub struct Pwd;

impl BuiltinCommand for Pwd {
    fn name() -> &'static str {
        "pwd"
    }

    fn parse(_args: &[String]) -> Result<Self, Usage> {
        Ok(Pwd)
    }

    fn execute(self, io: &mut CommandIo<'_>, state: &mut ShellState) -> Result<ExitCode> {
        writeln!(io.out, "{}", state.current_dir.to_string_lossy())?;
        Ok(0)
    }
}

/// Where `cd` should go.
#[derive(Debug, PartialEq, Eq)]
pub enum CdTarget {
    Home,
    Previous,
    Dir(String),
}

/// Change the current working directory.
/// If no target is provided, changes to the directory specified by the HOME variable.
pub struct Cd {
    pub target: CdTarget,
}

impl BuiltinCommand for Cd {
    fn name() -> &'static str {
        "cd"
    }

    fn parse(args: &[String]) -> Result<Self, Usage> {
        let target = match args {
            [] => CdTarget::Home,
            [dash] if dash == "-" => CdTarget::Previous,
            [dir] => CdTarget::Dir(dir.clone()),
            _ => return Err(Usage::new("too many arguments", 1)),
        };
        Ok(Cd { target })
    }

    fn execute(self, io: &mut CommandIo<'_>, state: &mut ShellState) -> Result<ExitCode> {
        let (target, announce) = match self.target {
            CdTarget::Home => match state.get_var("HOME") {
                Some(home) => (home.to_string(), false),
                None => bail!("HOME not set"),
            },
            CdTarget::Previous => match state.get_var("OLDPWD") {
                Some(old) => (old.to_string(), true),
                None => bail!("OLDPWD not set"),
            },
            CdTarget::Dir(dir) => (dir, false),
        };
        if target.is_empty() {
            return Ok(0);
        }

        let new_dir = state.current_dir.join(&target);
        let canonical = fs::canonicalize(&new_dir).map_err(|e| anyhow!("{target}: {}", describe(&e)))?;
        if !canonical.is_dir() {
            bail!("{target}: Not a directory");
        }

        let previous = std::mem::replace(&mut state.current_dir, canonical);
        state.set_var("OLDPWD", previous.to_string_lossy().into_owned());
        state.set_var("PWD", state.current_dir.to_string_lossy().into_owned());
        if announce {
            writeln!(io.out, "{}", state.current_dir.to_string_lossy())?;
        }
        Ok(0)
    }
}

/// Request the shell to terminate.
///
/// No argument reuses the last status; a numeric one is truncated to a byte.
pub struct Exit {
    pub args: Vec<String>,
}

impl BuiltinCommand for Exit {
    fn name() -> &'static str {
        "exit"
    }

    fn parse(args: &[String]) -> Result<Self, Usage> {
        Ok(Exit {
            args: args.to_vec(),
        })
    }

    fn execute(self, io: &mut CommandIo<'_>, state: &mut ShellState) -> Result<ExitCode> {
        let code = match self.args.as_slice() {
            [] => state.last_status,
            [arg, rest @ ..] => match arg.trim().parse::<i64>() {
                Err(_) => {
                    writeln!(io.err, "{SHELL_NAME}: exit: {arg}: numeric argument required")?;
                    2
                }
                Ok(_) if !rest.is_empty() => bail!("too many arguments"),
                Ok(n) => (n & 0xff) as ExitCode,
            },
        };
        state.exit_request = Some(code);
        Ok(code)
    }
}

/// Write the arguments to standard output, separated by spaces.
/// By default, a trailing newline is printed.
pub struct Echo {
    pub no_newline: bool,
    pub args: Vec<String>,
}

impl BuiltinCommand for Echo {
    fn name() -> &'static str {
        "echo"
    }

    fn parse(args: &[String]) -> Result<Self, Usage> {
        let flags = args
            .iter()
            .take_while(|arg| ECHO_NO_NEWLINE.is_match(arg))
            .count();
        Ok(Echo {
            no_newline: flags > 0,
            args: args[flags..].to_vec(),
        })
    }

    fn execute(self, io: &mut CommandIo<'_>, _state: &mut ShellState) -> Result<ExitCode> {
        let s = self.args.join(" ");
        if self.no_newline {
            write!(io.out, "{s}")?;
        } else {
            writeln!(io.out, "{s}")?;
        }
        io.out.flush()?;
        Ok(0)
    }
}

/// One `export` operand.
#[derive(Debug, PartialEq, Eq)]
pub enum Assignment {
    Set(String, String),
    Append(String, String),
    Declare(String),
    Invalid(String),
}

impl Assignment {
    fn parse(arg: &str) -> Self {
        let (name, value, append) = match arg.split_once('=') {
            Some((name, value)) => match name.strip_suffix('+') {
                Some(name) => (name, Some(value), true),
                None => (name, Some(value), false),
            },
            None => (arg, None, false),
        };
        if !IDENTIFIER.is_match(name) {
            return Assignment::Invalid(arg.to_string());
        }
        match value {
            None => Assignment::Declare(name.to_string()),
            Some(value) if append => Assignment::Append(name.to_string(), value.to_string()),
            Some(value) => Assignment::Set(name.to_string(), value.to_string()),
        }
    }
}

/// Set, append to, or mark variables for export. Without operands, list them.
pub struct Export {
    pub assignments: Vec<Assignment>,
}

impl BuiltinCommand for Export {
    fn name() -> &'static str {
        "export"
    }

    fn parse(args: &[String]) -> Result<Self, Usage> {
        Ok(Export {
            assignments: args.iter().map(|a| Assignment::parse(a)).collect(),
        })
    }

    fn execute(self, io: &mut CommandIo<'_>, state: &mut ShellState) -> Result<ExitCode> {
        if self.assignments.is_empty() {
            let mut vars: Vec<_> = state.variables().iter().collect();
            vars.sort_by(|a, b| a.name.cmp(&b.name));
            for var in vars {
                match &var.value {
                    Some(value) => writeln!(io.out, "declare -x {}=\"{}\"", var.name, quote(value))?,
                    None => writeln!(io.out, "declare -x {}", var.name)?,
                }
            }
            return Ok(0);
        }

        let mut status = 0;
        for assignment in self.assignments {
            match assignment {
                Assignment::Set(name, value) => state.set_var(name, value),
                Assignment::Append(name, value) => {
                    let joined = format!("{}{value}", state.get_var(&name).unwrap_or_default());
                    state.set_var(name, joined);
                }
                Assignment::Declare(name) => state.declare(name),
                Assignment::Invalid(arg) => {
                    writeln!(io.err, "{SHELL_NAME}: export: `{arg}': not a valid identifier")?;
                    status = 1;
                }
            }
        }
        Ok(status)
    }
}

/// Escape a value for the `declare -x NAME="value"` listing.
fn quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '"' | '\\' | '$' | '`') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Remove variables.
pub struct Unset {
    pub names: Vec<String>,
}

impl BuiltinCommand for Unset {
    fn name() -> &'static str {
        "unset"
    }

    fn parse(args: &[String]) -> Result<Self, Usage> {
        Ok(Unset {
            names: args.to_vec(),
        })
    }

    fn execute(self, io: &mut CommandIo<'_>, state: &mut ShellState) -> Result<ExitCode> {
        let mut status = 0;
        for name in self.names {
            if IDENTIFIER.is_match(&name) {
                state.unset_var(&name);
            } else {
                writeln!(io.err, "{SHELL_NAME}: unset: `{name}': not a valid identifier")?;
                status = 1;
            }
        }
        Ok(status)
    }
}

/// Print the environment handed to child processes.
pub struct Env;

impl BuiltinCommand for Env {
    fn name() -> &'static str {
        "env"
    }

    fn parse(args: &[String]) -> Result<Self, Usage> {
        match args.first() {
            None => Ok(Env),
            Some(arg) => Err(Usage::new(
                format!("{arg}: options and arguments are not supported"),
                2,
            )),
        }
    }

    fn execute(self, io: &mut CommandIo<'_>, state: &mut ShellState) -> Result<ExitCode> {
        for (name, value) in state.exported() {
            writeln!(io.out, "{name}={value}")?;
        }
        Ok(0)
    }
}
