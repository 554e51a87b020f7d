//! Process control: forking stages, reaping them, and the foreground window.
//!
//! The orchestrator only talks to [`ProcessControl`], so its logic can be
//! exercised without creating a single process.

use crate::command::ExitCode;
use crate::error::ExecError;
use crate::plan::StageIo;
use crate::signals::{self, SignalGuard};
use log::debug;
use nix::errno::Errno;
use nix::sys::signal::Signal;
use nix::sys::wait::{WaitStatus, waitpid};
use nix::unistd::{ForkResult, Pid, close, fork};
use std::io::Write;
use std::os::fd::RawFd;

/// How a child process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    Exited(ExitCode),
    Signaled { signal: Signal, core_dumped: bool },
}

impl Termination {
    /// Shell status: the exit code, or 128 plus the signal number.
    pub fn status(&self) -> ExitCode {
        match *self {
            Termination::Exited(code) => code,
            Termination::Signaled { signal, .. } => 128 + signal as i32,
        }
    }
}

/// The syscalls the orchestrator needs.
pub trait ProcessControl {
    /// Kept alive while foreground children run.
    type Guard;

    /// Start a child that installs `io` on its standard descriptors, closes
    /// `stray` and runs `body`, exiting with its result. `io` is consumed, so
    /// the parent keeps none of the stage's descriptors.
    fn spawn(
        &mut self,
        io: StageIo,
        stray: &[RawFd],
        body: Box<dyn FnOnce() -> ExitCode + '_>,
    ) -> Result<Pid, ExecError>;

    /// Block until `pid` terminates.
    fn wait(&mut self, pid: Pid) -> Result<Termination, ExecError>;

    /// Enter the window during which children own the terminal signals.
    fn foreground(&mut self) -> Result<Self::Guard, ExecError>;
}

/// [`ProcessControl`] backed by `fork(2)` and `waitpid(2)`.
#[derive(Debug, Default)]
pub struct UnixProcess;

impl ProcessControl for UnixProcess {
    type Guard = SignalGuard;

    fn spawn(
        &mut self,
        io: StageIo,
        stray: &[RawFd],
        body: Box<dyn FnOnce() -> ExitCode + '_>,
    ) -> Result<Pid, ExecError> {
        // Buffered output would otherwise be written twice.
        let _ = std::io::stdout().flush();
        let _ = std::io::stderr().flush();

        match unsafe { fork() }.map_err(ExecError::Fork)? {
            ForkResult::Parent { child } => {
                debug!("spawned {child}");
                drop(io);
                Ok(child)
            }
            ForkResult::Child => {
                signals::reset_for_child();
                if let Err(errno) = io.install() {
                    eprintln!("{}: dup2: {}", crate::SHELL_NAME, errno.desc());
                    std::process::exit(1);
                }
                for &fd in stray {
                    let _ = close(fd);
                }
                let code = body();
                let _ = std::io::stdout().flush();
                let _ = std::io::stderr().flush();
                std::process::exit(code)
            }
        }
    }

    fn wait(&mut self, pid: Pid) -> Result<Termination, ExecError> {
        loop {
            match waitpid(pid, None) {
                Ok(WaitStatus::Exited(_, code)) => return Ok(Termination::Exited(code)),
                Ok(WaitStatus::Signaled(_, signal, core_dumped)) => {
                    return Ok(Termination::Signaled {
                        signal,
                        core_dumped,
                    });
                }
                // Stopped and continued children are still running.
                Ok(_) => continue,
                Err(Errno::EINTR) => continue,
                Err(errno) => return Err(ExecError::Wait(errno)),
            }
        }
    }

    fn foreground(&mut self) -> Result<SignalGuard, ExecError> {
        signals::foreground_window().map_err(ExecError::Signal)
    }
}

#[cfg(test)]
pub(crate) mod fake {
    use super::*;
    use std::collections::HashMap;

    /// One recorded call to [`ProcessControl::spawn`].
    #[derive(Debug)]
    pub struct Spawned {
        pub pid: Pid,
        pub stdin: bool,
        pub stdout: bool,
    }

    /// Never runs the bodies: every spawn succeeds and ends the way it was
    /// scripted, `Exited(0)` by default.
    #[derive(Debug, Default)]
    pub struct FakeProcess {
        pub spawned: Vec<Spawned>,
        pub scripted: HashMap<usize, Termination>,
        pub foreground_entered: usize,
        results: HashMap<Pid, Termination>,
    }

    impl FakeProcess {
        /// Make the `index`-th spawn end with `termination`.
        pub fn script(mut self, index: usize, termination: Termination) -> Self {
            self.scripted.insert(index, termination);
            self
        }
    }

    impl ProcessControl for FakeProcess {
        type Guard = ();

        fn spawn(
            &mut self,
            io: StageIo,
            _stray: &[RawFd],
            _body: Box<dyn FnOnce() -> ExitCode + '_>,
        ) -> Result<Pid, ExecError> {
            let index = self.spawned.len();
            let pid = Pid::from_raw(1000 + index as i32);
            let termination = self
                .scripted
                .get(&index)
                .copied()
                .unwrap_or(Termination::Exited(0));
            self.results.insert(pid, termination);
            self.spawned.push(Spawned {
                pid,
                stdin: io.stdin.is_some(),
                stdout: io.stdout.is_some(),
            });
            Ok(pid)
        }

        fn wait(&mut self, pid: Pid) -> Result<Termination, ExecError> {
            self.results.remove(&pid).ok_or(ExecError::Wait(Errno::ECHILD))
        }

        fn foreground(&mut self) -> Result<(), ExecError> {
            self.foreground_entered += 1;
            Ok(())
        }
    }
}
