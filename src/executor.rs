//! Process orchestrator: runs one parsed pipeline and reports its status.

use crate::SHELL_NAME;
use crate::builtin::Builtins;
use crate::command::{CommandIo, ExecutableCommand, ExitCode};
use crate::env::ShellState;
use crate::error::ExecError;
use crate::expand::{ExpandedCommand, expand_command};
use crate::external::{self, find_command_path};
use crate::parser::Pipeline;
use crate::plan::{StageIo, apply_redirects, build_plan};
use crate::process::{ProcessControl, Termination};
use log::debug;
use nix::sys::signal::Signal;
use nix::unistd::Pid;
use std::io::Write;
use std::os::fd::RawFd;

/// What became of a stage once the spawn loop moved past it.
enum Outcome {
    Running(Pid),
    Done(ExitCode),
}

fn report(err: &ExecError) {
    eprintln!("{SHELL_NAME}: {err}");
}

/// Expand and run `pipeline`, returning the status of its rightmost command.
///
/// A lone builtin runs in the shell itself so it can change `state`; every
/// other command gets its own child process.
pub fn run_pipeline<P: ProcessControl>(
    state: &mut ShellState,
    builtins: &Builtins,
    process: &mut P,
    pipeline: &Pipeline,
) -> ExitCode {
    let commands: Vec<ExpandedCommand> = pipeline
        .commands()
        .iter()
        .map(|command| expand_command(pipeline, command, state))
        .collect();
    debug!("expanded pipeline: {commands:?}");

    if let [command] = commands.as_slice() {
        let Some(name) = command.argv.first() else {
            return run_redirections_only(command, state);
        };
        if let Some(builtin) = builtins.create(name, &command.argv[1..]) {
            return run_in_shell(builtin, command, state);
        }
    }

    match run_stages(state, builtins, process, commands) {
        Ok(status) => status,
        Err(err) => {
            report(&err);
            err.status()
        }
    }
}

/// `> file` alone: the files are opened (and created) and nothing runs.
fn run_redirections_only(command: &ExpandedCommand, state: &ShellState) -> ExitCode {
    let mut io = StageIo::default();
    match apply_redirects(&command.redirects, &state.current_dir, &mut io) {
        Ok(()) => 0,
        Err(err) => {
            report(&err);
            1
        }
    }
}

fn run_in_shell(
    builtin: Box<dyn ExecutableCommand>,
    command: &ExpandedCommand,
    state: &mut ShellState,
) -> ExitCode {
    let mut io = StageIo::default();
    if let Err(err) = apply_redirects(&command.redirects, &state.current_dir, &mut io) {
        report(&err);
        return 1;
    }

    let mut out: Box<dyn Write> = match io.into_output() {
        Some(file) => Box::new(file),
        None => Box::new(std::io::stdout()),
    };
    let mut err = std::io::stderr();
    let status = builtin.execute(
        &mut CommandIo {
            out: &mut *out,
            err: &mut err,
        },
        state,
    );
    let _ = out.flush();
    debug!("builtin {:?} returned {status}", command.argv[0]);
    status
}

fn run_stages<P: ProcessControl>(
    state: &ShellState,
    builtins: &Builtins,
    process: &mut P,
    commands: Vec<ExpandedCommand>,
) -> Result<ExitCode, ExecError> {
    let mut stages = build_plan(commands, &state.current_dir)?.stages;
    let _foreground = process.foreground()?;

    let mut outcomes = Vec::with_capacity(stages.len());
    for i in 0..stages.len() {
        let io = std::mem::take(&mut stages[i].io);
        if let Some(err) = stages[i].failure.take() {
            report(&err);
            outcomes.push(Outcome::Done(err.status()));
            continue;
        }

        let stray: Vec<RawFd> = stages[i + 1..]
            .iter()
            .flat_map(|stage| stage.io.raw_fds())
            .collect();
        let argv = &stages[i].argv;
        let Some(name) = argv.first() else {
            outcomes.push(Outcome::Done(0));
            continue;
        };

        let body: Box<dyn FnOnce() -> ExitCode + '_> =
            match builtins.create(name, &argv[1..]) {
                Some(builtin) => Box::new(move || {
                    // Changes die with the child.
                    let mut snapshot = state.clone();
                    let (mut out, mut err) = (std::io::stdout(), std::io::stderr());
                    builtin.execute(
                        &mut CommandIo {
                            out: &mut out,
                            err: &mut err,
                        },
                        &mut snapshot,
                    )
                }),
                None => match find_command_path(state.get_var("PATH"), &state.current_dir, name) {
                    Ok(path) => Box::new(move || {
                        let err = external::exec(&path, argv, state);
                        report(&err);
                        err.status()
                    }),
                    Err(err) => {
                        let err = ExecError::from(err);
                        report(&err);
                        outcomes.push(Outcome::Done(err.status()));
                        continue;
                    }
                },
            };

        match process.spawn(io, &stray, body) {
            Ok(pid) => {
                debug!("stage {i} {argv:?} started as {pid}");
                outcomes.push(Outcome::Running(pid));
            }
            Err(err) => {
                report(&err);
                outcomes.push(Outcome::Done(err.status()));
            }
        }
    }

    let last = outcomes.len().saturating_sub(1);
    let mut status = 0;
    for (i, outcome) in outcomes.into_iter().enumerate() {
        status = match outcome {
            Outcome::Done(code) => code,
            Outcome::Running(pid) => match process.wait(pid) {
                Ok(termination) => {
                    debug!("{pid} ended: {termination:?}");
                    if i == last {
                        announce(termination);
                    }
                    termination.status()
                }
                Err(err) => {
                    report(&err);
                    err.status()
                }
            },
        };
    }
    Ok(status)
}

/// Tell the user about a terminal signal that killed the rightmost command.
fn announce(termination: Termination) {
    match termination {
        Termination::Signaled {
            signal: Signal::SIGINT,
            ..
        } => eprintln!(),
        Termination::Signaled {
            signal: Signal::SIGQUIT,
            core_dumped,
        } => {
            if core_dumped {
                eprintln!("Quit (core dumped)");
            } else {
                eprintln!("Quit");
            }
        }
        _ => {}
    }
}
