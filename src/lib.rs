//! A small interactive shell.
//!
//! A command line goes through a fixed sequence of stages:
//! [`lexer`] splits it into tokens, [`parser`] builds a [`parser::Pipeline`]
//! (capturing heredoc bodies on the way), the expander substitutes `$NAME`
//! and `$?` and removes quotes, [`plan`] wires pipes and redirections, and
//! the executor starts every stage through [`process::ProcessControl`].
//!
//! The main entry point is [`Interpreter`], which owns the shell state and
//! reads lines from any [`input::LineSource`].

pub mod builtin;
pub mod command;
pub mod config;
pub mod env;
pub mod error;
mod executor;
mod expand;
mod external;
pub mod input;
mod interpreter;
pub mod lexer;
pub mod parser;
pub mod plan;
pub mod process;
pub mod signals;

/// Name used as the prefix of every diagnostic and as `$0`.
pub const SHELL_NAME: &str = "minishell";

pub use config::{CliArgs, ShellConfig};
pub use input::{PipedInput, ScriptInput, TerminalInput};
pub use interpreter::Interpreter;
