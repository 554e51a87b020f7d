//! Recursive-descent parser turning tokens into a [`Pipeline`].
//!
//! Words are stored once in the pipeline's arena and referenced by
//! [`WordId`], so the expander can walk commands without owning them.

use crate::SHELL_NAME;
use crate::error::SyntaxError;
use crate::input::{Line, LineSource};
use crate::lexer::{self, Fragment, QuoteMode, Token, TokenKind};
use log::{debug, warn};
use std::fmt;
use std::io;
use thiserror::Error;

/// Handle of a word inside [`Pipeline::words`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WordId(usize);

/// A shell word: the fragments of one Word token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Word {
    pub fragments: Vec<Fragment>,
}

impl Word {
    pub fn new(fragments: Vec<Fragment>) -> Self {
        Self { fragments }
    }

    /// True if any part of the word was written inside quotes.
    pub fn is_quoted(&self) -> bool {
        self.fragments
            .iter()
            .any(|f| f.quote != QuoteMode::Unquoted)
    }

    /// The word's text with quotes removed and nothing expanded.
    pub fn literal(&self) -> String {
        self.fragments.iter().map(|f| f.text.as_str()).collect()
    }
}

impl fmt::Display for Word {
    /// Render the word back to shell syntax.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for fragment in &self.fragments {
            match fragment.quote.quote_char() {
                Some(q) => write!(f, "{q}{}{q}", fragment.text)?,
                None => f.write_str(&fragment.text)?,
            }
        }
        Ok(())
    }
}

/// Kind of redirection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectKind {
    /// `<`: read standard input from a file.
    Input,
    /// `>`: write standard output to a file, truncating it.
    Output,
    /// `>>`: write standard output to a file, appending to it.
    Append,
    /// `<<`: read standard input from the lines that follow, up to a delimiter.
    Heredoc,
}

/// Lines captured for a `<<` redirection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeredocBody {
    pub lines: Vec<String>,
    /// False when the delimiter was quoted: the body is then taken verbatim.
    pub expand: bool,
}

/// An I/O redirection attached to a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirect {
    pub kind: RedirectKind,
    /// The file name, or the delimiter for a heredoc.
    pub target: WordId,
    pub heredoc: Option<HeredocBody>,
}

/// A simple command: its words and its redirections, both in source order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Command {
    pub argv: Vec<WordId>,
    pub redirects: Vec<Redirect>,
}

/// A non-empty chain of commands connected by `|`, with the arena of words
/// they reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pipeline {
    words: Vec<Word>,
    commands: Vec<Command>,
}

impl Pipeline {
    pub fn word(&self, id: WordId) -> &Word {
        &self.words[id.0]
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    /// The command's words, resolved from the arena.
    pub fn argv<'a>(&'a self, command: &'a Command) -> impl Iterator<Item = &'a Word> + 'a {
        command.argv.iter().map(|id| self.word(*id))
    }
}

/// Errors that can occur while building a pipeline.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error(transparent)]
    Syntax(#[from] SyntaxError),
    /// Heredoc capture was interrupted by the user.
    #[error("interrupted")]
    Interrupted,
    #[error("reading here-document: {0}")]
    Input(#[from] io::Error),
}

struct AstBuilder<'a> {
    tokens: Vec<Token>,
    pos: usize,
    words: Vec<Word>,
    input: &'a mut dyn LineSource,
}

impl<'a> AstBuilder<'a> {
    fn new(tokens: Vec<Token>, input: &'a mut dyn LineSource) -> Self {
        AstBuilder {
            tokens,
            pos: 0,
            words: Vec::new(),
            input,
        }
    }

    fn build_ast(mut self) -> Result<Pipeline, ParseError> {
        let commands = self.parse_pipeline()?;

        if let Some(token) = self.peek() {
            return Err(SyntaxError::UnexpectedToken(token.to_string()).into());
        }

        Ok(Pipeline {
            words: self.words,
            commands,
        })
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn consume(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    /// Parse a pipeline: command ('|' command)*
    fn parse_pipeline(&mut self) -> Result<Vec<Command>, ParseError> {
        let mut commands = vec![self.parse_command()?];

        while let Some(TokenKind::Pipe) = self.peek().map(|t| t.kind) {
            self.consume();
            commands.push(self.parse_command()?);
        }

        Ok(commands)
    }

    /// Parse a command: (word | redirect)+
    fn parse_command(&mut self) -> Result<Command, ParseError> {
        let mut command = Command::default();

        while let Some(token) = self.peek() {
            match token.kind {
                TokenKind::Pipe => break,
                TokenKind::Word => {
                    let word = self.parse_word()?;
                    command.argv.push(word);
                }
                _ => {
                    let redirect = self.parse_redirect()?;
                    command.redirects.push(redirect);
                }
            }
        }

        if command.argv.is_empty() && command.redirects.is_empty() {
            // Nothing before a `|`, after a `|`, or between two of them.
            return Err(SyntaxError::UnexpectedToken("|".to_string()).into());
        }

        Ok(command)
    }

    /// Parse a redirect: ('<' | '>' | '>>' | '<<') word
    fn parse_redirect(&mut self) -> Result<Redirect, ParseError> {
        let kind = match self.consume().map(|t| t.kind) {
            Some(TokenKind::RedirIn) => RedirectKind::Input,
            Some(TokenKind::RedirOut) => RedirectKind::Output,
            Some(TokenKind::AppendOut) => RedirectKind::Append,
            Some(TokenKind::Heredoc) => RedirectKind::Heredoc,
            _ => unreachable!("parse_redirect called on a non-redirection token"),
        };

        let target = self.parse_word()?;
        let heredoc = match kind {
            RedirectKind::Heredoc => Some(self.read_heredoc(target)?),
            _ => None,
        };

        Ok(Redirect {
            kind,
            target,
            heredoc,
        })
    }

    /// Move the next Word token into the arena.
    fn parse_word(&mut self) -> Result<WordId, ParseError> {
        match self.consume() {
            Some(token) if token.is_word() => {
                self.words.push(Word::new(token.fragments));
                Ok(WordId(self.words.len() - 1))
            }
            Some(token) => Err(SyntaxError::UnexpectedToken(token.to_string()).into()),
            None => Err(SyntaxError::UnexpectedEof.into()),
        }
    }

    /// Collect heredoc lines up to the delimiter right away, so the body is
    /// fixed before anything runs.
    fn read_heredoc(&mut self, delimiter: WordId) -> Result<HeredocBody, ParseError> {
        let word = &self.words[delimiter.0];
        let expand = !word.is_quoted();
        let delimiter = word.literal();

        let mut lines = Vec::new();
        loop {
            match self.input.read_line("> ")? {
                Line::Text(line) if line == delimiter => break,
                Line::Text(line) => lines.push(line),
                Line::Eof => {
                    warn!("heredoc closed by end of input, wanted {delimiter:?}");
                    eprintln!(
                        "{SHELL_NAME}: warning: here-document delimited by end-of-file (wanted `{delimiter}')"
                    );
                    break;
                }
                Line::Interrupted => return Err(ParseError::Interrupted),
            }
        }

        Ok(HeredocBody { lines, expand })
    }
}

/// Constructs a [`Pipeline`] from a vector of tokens.
///
/// Returns `Ok(None)` for an empty token list. Heredoc bodies are read from
/// `input` as their `<<` operators are reached.
pub fn construct_ast(
    tokens: Vec<Token>,
    input: &mut dyn LineSource,
) -> Result<Option<Pipeline>, ParseError> {
    if tokens.is_empty() {
        return Ok(None);
    }
    let pipeline = AstBuilder::new(tokens, input).build_ast()?;
    debug!("pipeline: {pipeline:?}");
    Ok(Some(pipeline))
}

/// Tokenize and parse one line of input.
pub fn parse_line(line: &str, input: &mut dyn LineSource) -> Result<Option<Pipeline>, ParseError> {
    let tokens = lexer::split_into_tokens(line)?;
    construct_ast(tokens, input)
}
