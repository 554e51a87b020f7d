use crate::env::ShellState;
use crate::error::{ExecError, ResolveError};
use nix::errno::Errno;
use nix::unistd::{AccessFlags, access, chdir, execve};
use std::ffi::{CString, OsStr};
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};

/// Resolve a command name the way a typical shell would.
///
/// Behavior:
/// - Name containing a `/` (absolute, `./foo`, `bin/sh`): used literally,
///   relative names are taken from `cwd`.
/// - Plain name: each directory of `search_paths` (PATH) is tried in order; the
///   first executable regular file wins. An empty PATH entry means `cwd`.
/// - Empty name: not found.
///
/// A plain name that only matches non-executable files is reported as
/// [`ResolveError::PermissionDenied`].
pub fn find_command_path(
    search_paths: Option<&str>,
    cwd: &Path,
    name: &str,
) -> Result<PathBuf, ResolveError> {
    if name.is_empty() {
        return Err(ResolveError::NotFound(name.to_string()));
    }

    if name.contains('/') {
        let path = cwd.join(name);
        return match check_executable(&path) {
            Candidate::Executable => Ok(path),
            Candidate::Missing => Err(ResolveError::NoSuchFile(name.to_string())),
            Candidate::Directory => Err(ResolveError::IsDirectory(name.to_string())),
            Candidate::NotExecutable => Err(ResolveError::PermissionDenied(name.to_string())),
        };
    }

    let Some(search_paths) = search_paths else {
        return Err(ResolveError::NoSuchFile(name.to_string()));
    };
    find_in_path(search_paths, cwd, name)
}

fn find_in_path(search_paths: &str, cwd: &Path, name: &str) -> Result<PathBuf, ResolveError> {
    let mut denied = false;
    for dir in search_paths.split(':') {
        let dir = if dir.is_empty() { cwd } else { Path::new(dir) };
        let path = cwd.join(dir).join(name);
        match check_executable(&path) {
            Candidate::Executable => return Ok(path),
            Candidate::NotExecutable => denied = true,
            Candidate::Missing | Candidate::Directory => {}
        }
    }
    if denied {
        Err(ResolveError::PermissionDenied(name.to_string()))
    } else {
        Err(ResolveError::NotFound(name.to_string()))
    }
}

enum Candidate {
    Executable,
    NotExecutable,
    Directory,
    Missing,
}

fn check_executable(path: &Path) -> Candidate {
    match path.metadata() {
        Err(_) => Candidate::Missing,
        Ok(meta) if meta.is_dir() => Candidate::Directory,
        Ok(_) if access(path, AccessFlags::X_OK).is_ok() => Candidate::Executable,
        Ok(_) => Candidate::NotExecutable,
    }
}

fn to_cstring(bytes: &[u8]) -> CString {
    // Interior NULs cannot come from the tokenizer's input lines; drop them anyway.
    CString::new(bytes.iter().copied().filter(|b| *b != 0).collect::<Vec<_>>())
        .unwrap_or_default()
}

/// Replace the current process image with `path`. Only returns on failure.
///
/// Meant to run in a forked child: the working directory is switched to the
/// shell's `current_dir` and the exported variables become the environment.
pub fn exec(path: &Path, argv: &[String], state: &ShellState) -> ExecError {
    if let Err(errno) = chdir(&state.current_dir) {
        return ExecError::Exec {
            path: state.current_dir.clone(),
            errno,
        };
    }

    let program = to_cstring(path.as_os_str().as_bytes());
    let args: Vec<CString> = argv.iter().map(|a| to_cstring(a.as_bytes())).collect();
    let envp: Vec<CString> = state
        .exported()
        .map(|(k, v)| to_cstring(format!("{k}={v}").as_bytes()))
        .collect();

    let errno = match execve(&program, &args, &envp) {
        Ok(never) => match never {},
        Err(errno) => errno,
    };
    ExecError::Exec {
        path: PathBuf::from(OsStr::new(&argv[0])),
        errno: if errno == Errno::ENOEXEC { Errno::EACCES } else { errno },
    }
}
