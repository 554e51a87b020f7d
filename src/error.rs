//! Error taxonomy shared by the lexer, parser and execution engine.

use nix::errno::Errno;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Malformed input. Aborts the current line only; the interpreter reports it
/// and sets the status to 2.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyntaxError {
    /// End of input reached while a quote was still open.
    #[error("unexpected EOF while looking for matching `{0}'")]
    UnclosedQuote(char),
    /// An operator appeared where a command or a word was required.
    #[error("syntax error near unexpected token `{0}'")]
    UnexpectedToken(String),
    /// A redirection operator was the last token of the line.
    #[error("syntax error: unexpected end of file")]
    UnexpectedEof,
}

/// Failure to turn a command name into an executable path.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("{0}: command not found")]
    NotFound(String),
    #[error("{0}: No such file or directory")]
    NoSuchFile(String),
    #[error("{0}: Is a directory")]
    IsDirectory(String),
    #[error("{0}: Permission denied")]
    PermissionDenied(String),
}

impl ResolveError {
    /// Status reported for a stage that failed to resolve.
    pub fn status(&self) -> i32 {
        match self {
            ResolveError::NotFound(_) | ResolveError::NoSuchFile(_) => 127,
            ResolveError::IsDirectory(_) | ResolveError::PermissionDenied(_) => 126,
        }
    }
}

/// Errors raised while realizing a pipeline as processes.
#[derive(Debug, Error)]
pub enum ExecError {
    #[error("pipe: {}", .0.desc())]
    Pipe(Errno),
    #[error("fork: {}", .0.desc())]
    Fork(Errno),
    #[error("wait: {}", .0.desc())]
    Wait(Errno),
    #[error("sigaction: {}", .0.desc())]
    Signal(Errno),
    #[error("{}: {}", .path.display(), describe(.source))]
    Redirect { path: PathBuf, source: io::Error },
    #[error("{0}: ambiguous redirect")]
    AmbiguousRedirect(String),
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    #[error("{}: {}", .path.display(), .errno.desc())]
    Exec { path: PathBuf, errno: Errno },
    #[error("{}", describe(.0))]
    Io(#[from] io::Error),
}

impl ExecError {
    /// Status reported for a stage that could not be started.
    pub fn status(&self) -> i32 {
        match self {
            ExecError::Resolve(err) => err.status(),
            ExecError::Exec { errno, .. } if *errno == Errno::ENOENT => 127,
            ExecError::Exec { .. } => 126,
            _ => 1,
        }
    }
}

/// Render an I/O error the way C shells print `strerror`, without Rust's
/// "(os error N)" suffix.
pub fn describe(err: &io::Error) -> String {
    match err.raw_os_error() {
        Some(code) => Errno::from_raw(code).desc().to_string(),
        None => err.to_string(),
    }
}
