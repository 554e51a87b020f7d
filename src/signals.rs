//! Signal dispositions for the three windows of an interactive session:
//! reading a command line, reading a heredoc, and waiting for children.
//!
//! Every window is a guard that restores the previous dispositions on drop,
//! so windows nest naturally (a foreground wait inside the prompt loop).

use log::{debug, warn};
use nix::libc;
use nix::sys::signal::{SaFlags, SigAction, SigHandler, SigSet, Signal, sigaction};
use std::sync::atomic::{AtomicBool, Ordering};

/// Set by the handler, consumed by the reader that was interrupted.
static INTERRUPTED: AtomicBool = AtomicBool::new(false);

extern "C" fn on_interrupt(_: libc::c_int) {
    INTERRUPTED.store(true, Ordering::SeqCst);
    // write(2) is async-signal-safe; the result is irrelevant here.
    unsafe {
        libc::write(libc::STDOUT_FILENO, b"\n".as_ptr().cast(), 1);
    }
}

/// Returns whether an interrupt arrived since the last call, and clears it.
pub fn take_interrupt() -> bool {
    INTERRUPTED.swap(false, Ordering::SeqCst)
}

/// Saved dispositions, restored when the guard goes out of scope.
#[must_use = "dispositions are restored as soon as the guard is dropped"]
pub struct SignalGuard {
    saved: Vec<(Signal, SigAction)>,
}

impl SignalGuard {
    fn install(actions: &[(Signal, SigHandler, SaFlags)]) -> nix::Result<Self> {
        let mut guard = SignalGuard { saved: Vec::new() };
        for &(signal, handler, flags) in actions {
            let action = SigAction::new(handler, flags, SigSet::empty());
            // Handlers only touch an atomic and call write(2).
            let previous = unsafe { sigaction(signal, &action) }?;
            guard.saved.push((signal, previous));
        }
        Ok(guard)
    }
}

impl Drop for SignalGuard {
    fn drop(&mut self) {
        for (signal, previous) in self.saved.drain(..).rev() {
            if let Err(err) = unsafe { sigaction(signal, &previous) } {
                warn!("restoring {signal} disposition: {err}");
            }
        }
    }
}

/// While a command line is read: `SIGINT` starts a fresh prompt, `SIGQUIT`
/// is ignored.
pub fn prompt_window() -> nix::Result<SignalGuard> {
    debug!("entering prompt window");
    SignalGuard::install(&[
        (
            Signal::SIGINT,
            SigHandler::Handler(on_interrupt),
            SaFlags::SA_RESTART,
        ),
        (Signal::SIGQUIT, SigHandler::SigIgn, SaFlags::empty()),
    ])
}

/// While a heredoc body is read: `SIGINT` interrupts the blocked read so the
/// capture can be abandoned.
pub fn heredoc_window() -> nix::Result<SignalGuard> {
    debug!("entering heredoc window");
    SignalGuard::install(&[
        (
            Signal::SIGINT,
            SigHandler::Handler(on_interrupt),
            SaFlags::empty(),
        ),
        (Signal::SIGQUIT, SigHandler::SigIgn, SaFlags::empty()),
    ])
}

/// While foreground children run: the shell itself ignores terminal signals
/// and learns about them from the children's termination status.
pub fn foreground_window() -> nix::Result<SignalGuard> {
    debug!("entering foreground window");
    SignalGuard::install(&[
        (Signal::SIGINT, SigHandler::SigIgn, SaFlags::empty()),
        (Signal::SIGQUIT, SigHandler::SigIgn, SaFlags::empty()),
    ])
}

/// In a freshly forked child: default dispositions for terminal signals.
///
/// Ignored dispositions survive `execve`, so they must be reset explicitly.
pub fn reset_for_child() {
    let default = SigAction::new(SigHandler::SigDfl, SaFlags::empty(), SigSet::empty());
    for signal in [Signal::SIGINT, Signal::SIGQUIT, Signal::SIGPIPE] {
        let _ = unsafe { sigaction(signal, &default) };
    }
}
