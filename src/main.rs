use minishell::{CliArgs, Interpreter, PipedInput, SHELL_NAME, ScriptInput, ShellConfig, TerminalInput};
use std::fs::File;
use std::io::{IsTerminal, Write};
use std::os::fd::AsFd;

fn main() {
    env_logger::init();
    let args: CliArgs = argh::from_env();
    let config = ShellConfig::from_args(&args, std::io::stdin().is_terminal());
    log::debug!("starting with {config:?}");

    let interactive = config.interactive;
    let mut shell = Interpreter::new(config);
    let status = match args.command {
        Some(script) => shell.run(&mut ScriptInput::new(&script)),
        None if interactive => match TerminalInput::new() {
            Ok(mut input) => shell.run(&mut input),
            Err(err) => {
                eprintln!("{SHELL_NAME}: cannot open terminal: {err}");
                1
            }
        },
        // Unbuffered, so children see the input the shell has not consumed.
        None => match std::io::stdin().as_fd().try_clone_to_owned() {
            Ok(fd) => shell.run(&mut PipedInput::new(File::from(fd))),
            Err(err) => {
                eprintln!("{SHELL_NAME}: cannot read standard input: {err}");
                1
            }
        },
    };

    let _ = std::io::stdout().flush();
    std::process::exit(status);
}
