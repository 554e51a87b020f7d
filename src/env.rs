use crate::command::ExitCode;
use log::warn;
use std::env as stdenv;
use std::path::PathBuf;

/// A shell variable. `value` is `None` for names that were exported without
/// ever being assigned (`export NAME`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variable {
    pub name: String,
    pub value: Option<String>,
}

/// Process-wide interpreter state.
///
/// The state contains:
/// - the variables, in insertion order (this is the order `env` prints them);
/// - `last_status`: the status of the last pipeline, exposed as `$?`;
/// - `current_dir`: the working directory commands are started in;
/// - `exit_request`: set by the `exit` builtin when it runs in the shell itself.
///
/// Every variable is exported to child processes.
#[derive(Debug, Clone)]
pub struct ShellState {
    vars: Vec<Variable>,
    pub last_status: ExitCode,
    pub current_dir: PathBuf,
    pub exit_request: Option<ExitCode>,
}

impl ShellState {
    /// Create a state with no variables, rooted at `current_dir`.
    pub fn new(current_dir: impl Into<PathBuf>) -> Self {
        Self {
            vars: Vec::new(),
            last_status: 0,
            current_dir: current_dir.into(),
            exit_request: None,
        }
    }

    /// Capture the current process environment and working directory.
    ///
    /// `PWD` is refreshed from the real working directory and `SHLVL` is
    /// incremented, as login shells do.
    pub fn from_process() -> Self {
        let current_dir = stdenv::current_dir().unwrap_or_else(|_| PathBuf::from("/"));
        let mut state = Self::new(current_dir);
        for (k, v) in stdenv::vars_os() {
            match (k.into_string(), v.into_string()) {
                (Ok(k), Ok(v)) => state.set_var(k, v),
                (k, _) => warn!("skipping non UTF-8 environment variable {k:?}"),
            }
        }
        state.set_var("PWD", state.current_dir.to_string_lossy().into_owned());

        let level = match state.get_var("SHLVL").map(str::trim) {
            None | Some("") => 0,
            Some(raw) => raw.parse::<i64>().unwrap_or_else(|_| {
                warn!("ignoring malformed SHLVL {raw:?}");
                0
            }),
        };
        state.set_var("SHLVL", (level.max(0) + 1).to_string());
        state
    }

    /// Get the value of a variable. Exported-but-unset names have no value.
    pub fn get_var(&self, key: &str) -> Option<&str> {
        self.vars
            .iter()
            .find(|v| v.name == key)
            .and_then(|v| v.value.as_deref())
    }

    /// Whether `key` is known at all, with or without a value.
    pub fn contains(&self, key: &str) -> bool {
        self.vars.iter().any(|v| v.name == key)
    }

    /// Set or override a variable. A new name is appended at the end.
    pub fn set_var(&mut self, key: impl Into<String>, val: impl Into<String>) {
        let key = key.into();
        let val = Some(val.into());
        match self.vars.iter_mut().find(|v| v.name == key) {
            Some(var) => var.value = val,
            None => self.vars.push(Variable {
                name: key,
                value: val,
            }),
        }
    }

    /// Declare `key` without touching an existing value.
    pub fn declare(&mut self, key: impl Into<String>) {
        let key = key.into();
        if !self.contains(&key) {
            self.vars.push(Variable {
                name: key,
                value: None,
            });
        }
    }

    /// Remove a variable. Returns whether it existed.
    pub fn unset_var(&mut self, key: &str) -> bool {
        let before = self.vars.len();
        self.vars.retain(|v| v.name != key);
        before != self.vars.len()
    }

    /// All variables in insertion order, including value-less ones.
    pub fn variables(&self) -> &[Variable] {
        &self.vars
    }

    /// `NAME=value` pairs handed to child processes, in insertion order.
    pub fn exported(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars
            .iter()
            .filter_map(|v| v.value.as_deref().map(|val| (v.name.as_str(), val)))
    }
}
