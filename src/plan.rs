//! Pipeline builder: pipes, redirection files and heredoc buffers for every
//! stage, decided before anything is started.

use crate::error::ExecError;
use crate::expand::{ExpandedCommand, ExpandedRedirect, RedirectTarget};
use crate::parser::RedirectKind;
use log::debug;
use nix::fcntl::{FcntlArg, FdFlag, OFlag, fcntl};
use nix::libc;
use nix::unistd::{dup2, pipe2};
use std::fs::{File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::os::fd::{AsRawFd, IntoRawFd, OwnedFd, RawFd};
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;

/// Descriptors a stage gets on its standard input and output.
/// `None` means the shell's own descriptor is inherited.
#[derive(Debug, Default)]
pub struct StageIo {
    pub stdin: Option<OwnedFd>,
    pub stdout: Option<OwnedFd>,
}

impl StageIo {
    pub fn raw_fds(&self) -> impl Iterator<Item = RawFd> + '_ {
        self.stdin
            .iter()
            .chain(self.stdout.iter())
            .map(|fd| fd.as_raw_fd())
    }

    /// Move the descriptors onto 0 and 1, closing the originals.
    /// Only meant to run in a forked child.
    pub fn install(self) -> nix::Result<()> {
        install_fd(self.stdin, libc::STDIN_FILENO)?;
        install_fd(self.stdout, libc::STDOUT_FILENO)
    }

    /// A writer for an in-process builtin: the redirected file or pipe, or
    /// `None` for the inherited standard output.
    pub fn into_output(self) -> Option<File> {
        self.stdout.map(File::from)
    }
}

fn install_fd(fd: Option<OwnedFd>, target: RawFd) -> nix::Result<()> {
    let Some(fd) = fd else {
        return Ok(());
    };
    if fd.as_raw_fd() == target {
        // Already in place: keep it, and keep it across exec.
        let raw = fd.into_raw_fd();
        fcntl(raw, FcntlArg::F_SETFD(FdFlag::empty()))?;
    } else {
        dup2(fd.as_raw_fd(), target)?;
    }
    Ok(())
}

/// One command of the plan.
#[derive(Debug)]
pub struct Stage {
    pub argv: Vec<String>,
    pub io: StageIo,
    /// Set when the stage cannot start; its descriptors are already closed.
    pub failure: Option<ExecError>,
}

/// A pipeline turned into concrete descriptors.
#[derive(Debug, Default)]
pub struct ExecPlan {
    pub stages: Vec<Stage>,
}

/// Allocate the pipes between `commands` and open their redirections.
///
/// Relative redirection targets are resolved against `cwd`. A redirection
/// failure only fails its own stage.
pub fn build_plan(commands: Vec<ExpandedCommand>, cwd: &Path) -> Result<ExecPlan, ExecError> {
    let count = commands.len();
    let mut pipes = Vec::with_capacity(count.saturating_sub(1));
    for _ in 1..count {
        pipes.push(pipe2(OFlag::O_CLOEXEC).map_err(ExecError::Pipe)?);
    }
    debug!("planning {count} stage(s) with {} pipe(s)", pipes.len());

    let mut pipes = pipes.into_iter();
    let mut prev_read = None;
    let mut stages = Vec::with_capacity(count);
    for command in commands {
        let (next_read, write) = match pipes.next() {
            Some((read, write)) => (Some(read), Some(write)),
            None => (None, None),
        };
        let mut io = StageIo {
            stdin: prev_read.take(),
            stdout: write,
        };
        prev_read = next_read;

        let failure = apply_redirects(&command.redirects, cwd, &mut io).err();
        if failure.is_some() {
            // Neighbours see a closed pipe.
            io = StageIo::default();
        }
        stages.push(Stage {
            argv: command.argv,
            io,
            failure,
        });
    }

    Ok(ExecPlan { stages })
}

/// Open `redirects` left to right on top of `io`. Later redirections of the
/// same descriptor replace earlier ones, which are still opened (and created).
pub fn apply_redirects(
    redirects: &[ExpandedRedirect],
    cwd: &Path,
    io: &mut StageIo,
) -> Result<(), ExecError> {
    for redirect in redirects {
        let fd = open_target(redirect, cwd)?;
        match redirect.kind {
            RedirectKind::Input | RedirectKind::Heredoc => io.stdin = Some(fd),
            RedirectKind::Output | RedirectKind::Append => io.stdout = Some(fd),
        }
    }
    Ok(())
}

fn open_target(redirect: &ExpandedRedirect, cwd: &Path) -> Result<OwnedFd, ExecError> {
    let path = match &redirect.target {
        RedirectTarget::Path(path) => path,
        RedirectTarget::Heredoc(body) => return spool(body).map_err(ExecError::Io),
        RedirectTarget::Ambiguous(word) => return Err(ExecError::AmbiguousRedirect(word.clone())),
    };

    let mut options = OpenOptions::new();
    match redirect.kind {
        RedirectKind::Input | RedirectKind::Heredoc => options.read(true),
        RedirectKind::Output => options.write(true).create(true).truncate(true).mode(0o644),
        RedirectKind::Append => options.append(true).create(true).mode(0o644),
    };
    options
        .open(cwd.join(path))
        .map(OwnedFd::from)
        .map_err(|source| ExecError::Redirect {
            path: path.clone(),
            source,
        })
}

/// Write a heredoc body to an unlinked temporary file and rewind it, so a
/// body of any size can be read without a writer process.
fn spool(body: &str) -> std::io::Result<OwnedFd> {
    let mut file = tempfile::tempfile()?;
    file.write_all(body.as_bytes())?;
    file.seek(SeekFrom::Start(0))?;
    Ok(OwnedFd::from(file))
}
