//! Sources of input lines: the interactive terminal, a piped stdin, or an
//! in-memory script. The parser pulls heredoc bodies from the same source the
//! interpreter reads commands from.

use crate::signals;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::collections::VecDeque;
use std::io::{self, Read};

/// Outcome of asking a source for one more line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Line {
    /// A line without its terminating newline.
    Text(String),
    /// The source is exhausted.
    Eof,
    /// The user pressed Ctrl-C while the line was being read.
    Interrupted,
}

/// Something that can produce input lines on demand.
pub trait LineSource {
    /// Read one line, displaying `prompt` if the source is interactive.
    fn read_line(&mut self, prompt: &str) -> io::Result<Line>;
}

/// Interactive terminal input backed by `rustyline`, with in-memory history.
pub struct TerminalInput {
    editor: DefaultEditor,
}

impl TerminalInput {
    pub fn new() -> rustyline::Result<Self> {
        Ok(Self {
            editor: DefaultEditor::new()?,
        })
    }
}

impl LineSource for TerminalInput {
    fn read_line(&mut self, prompt: &str) -> io::Result<Line> {
        match self.editor.readline(prompt) {
            Ok(line) => {
                if !line.trim().is_empty() {
                    let _ = self.editor.add_history_entry(line.as_str());
                }
                Ok(Line::Text(line))
            }
            Err(ReadlineError::Interrupted) => Ok(Line::Interrupted),
            Err(ReadlineError::Eof) => Ok(Line::Eof),
            Err(ReadlineError::Io(err)) => Err(err),
            Err(err) => Err(io::Error::other(err)),
        }
    }
}

/// Line-by-line reader over a non-terminal stream, usually stdin.
///
/// Reads one byte at a time and stops at the newline, so whatever follows the
/// current line is still unread when a child inherits the stream.
pub struct PipedInput<R> {
    reader: R,
}

impl<R: Read> PipedInput<R> {
    pub fn new(reader: R) -> Self {
        Self { reader }
    }
}

impl<R: Read> LineSource for PipedInput<R> {
    fn read_line(&mut self, _prompt: &str) -> io::Result<Line> {
        let mut bytes = Vec::new();
        let mut byte = [0u8; 1];
        loop {
            match self.reader.read(&mut byte) {
                Ok(0) => break,
                Ok(_) if byte[0] == b'\n' => {
                    bytes.push(b'\n');
                    break;
                }
                Ok(_) => bytes.push(byte[0]),
                Err(err) if err.kind() == io::ErrorKind::Interrupted => {
                    if signals::take_interrupt() {
                        return Ok(Line::Interrupted);
                    }
                }
                Err(err) => return Err(err),
            }
        }
        if signals::take_interrupt() {
            return Ok(Line::Interrupted);
        }
        if bytes.is_empty() {
            return Ok(Line::Eof);
        }
        if bytes.last() == Some(&b'\n') {
            bytes.pop();
        }
        Ok(Line::Text(String::from_utf8_lossy(&bytes).into_owned()))
    }
}

/// A fixed script, e.g. the argument of `-c`, served one line at a time.
#[derive(Debug, Clone, Default)]
pub struct ScriptInput {
    lines: VecDeque<String>,
}

impl ScriptInput {
    pub fn new(script: &str) -> Self {
        Self {
            lines: script.lines().map(str::to_owned).collect(),
        }
    }
}

impl LineSource for ScriptInput {
    fn read_line(&mut self, _prompt: &str) -> io::Result<Line> {
        Ok(self.lines.pop_front().map_or(Line::Eof, Line::Text))
    }
}
