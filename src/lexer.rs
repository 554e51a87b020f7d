//! Lexical analysis (tokenization) of one input line.
//!
//! Quoting is tracked per fragment: `a"b c"'d'` is a single word made of an
//! unquoted, a double-quoted and a single-quoted fragment, so the expander
//! knows exactly which parts are eligible for substitution and splitting.

use crate::error::SyntaxError;
use log::debug;
use std::fmt;

/// Quote state of the scanner, and quote mode of the text it produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuoteMode {
    Unquoted,
    Single,
    Double,
}

/// What a single character means in the current quote state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Part of the current fragment's text.
    Literal(char),
    /// An opening quote; the new state is the quote mode.
    OpenQuote,
    /// The closing quote of the current fragment.
    CloseQuote,
    /// Unquoted blank, separates words.
    Blank,
    /// Unquoted `|`, `<` or `>`.
    Operator(char),
}

impl QuoteMode {
    /// Pure transition function of the quote state machine.
    pub fn step(self, ch: char) -> (QuoteMode, Step) {
        match (self, ch) {
            (QuoteMode::Unquoted, '\'') => (QuoteMode::Single, Step::OpenQuote),
            (QuoteMode::Unquoted, '"') => (QuoteMode::Double, Step::OpenQuote),
            (QuoteMode::Unquoted, ' ' | '\t' | '\n') => (QuoteMode::Unquoted, Step::Blank),
            (QuoteMode::Unquoted, '|' | '<' | '>') => (QuoteMode::Unquoted, Step::Operator(ch)),
            (QuoteMode::Single, '\'') | (QuoteMode::Double, '"') => {
                (QuoteMode::Unquoted, Step::CloseQuote)
            }
            (mode, c) => (mode, Step::Literal(c)),
        }
    }

    /// The quote character that closes this mode.
    pub fn quote_char(self) -> Option<char> {
        match self {
            QuoteMode::Unquoted => None,
            QuoteMode::Single => Some('\''),
            QuoteMode::Double => Some('"'),
        }
    }
}

/// A run of word text scanned in one quote mode. Quote characters are not part
/// of `text`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    pub text: String,
    pub quote: QuoteMode,
}

impl Fragment {
    pub fn new(text: impl Into<String>, quote: QuoteMode) -> Self {
        Self {
            text: text.into(),
            quote,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Word,
    /// `|`
    Pipe,
    /// `<`
    RedirIn,
    /// `>`
    RedirOut,
    /// `>>`
    AppendOut,
    /// `<<`
    Heredoc,
}

/// Represents a token resulting from lexical analysis.
///
/// Only `Word` tokens carry fragments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub fragments: Vec<Fragment>,
}

impl Token {
    pub fn operator(kind: TokenKind) -> Self {
        Self {
            kind,
            fragments: Vec::new(),
        }
    }

    pub fn word(fragments: Vec<Fragment>) -> Self {
        Self {
            kind: TokenKind::Word,
            fragments,
        }
    }

    pub fn is_word(&self) -> bool {
        self.kind == TokenKind::Word
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            TokenKind::Pipe => f.write_str("|"),
            TokenKind::RedirIn => f.write_str("<"),
            TokenKind::RedirOut => f.write_str(">"),
            TokenKind::AppendOut => f.write_str(">>"),
            TokenKind::Heredoc => f.write_str("<<"),
            TokenKind::Word => {
                for fragment in &self.fragments {
                    match fragment.quote.quote_char() {
                        Some(q) => write!(f, "{q}{}{q}", fragment.text)?,
                        None => f.write_str(&fragment.text)?,
                    }
                }
                Ok(())
            }
        }
    }
}

struct LexingFSM {
    input: Vec<char>,
    pos: usize,
    state: QuoteMode,
    current_word: Vec<Fragment>,
    buffer: String,
    in_word: bool,
}

impl LexingFSM {
    fn new(line: &str) -> Self {
        LexingFSM {
            input: line.chars().collect(),
            pos: 0,
            state: QuoteMode::Unquoted,
            current_word: Vec::new(),
            buffer: String::new(),
            in_word: false,
        }
    }

    /// Runs the state machine over the whole input.
    fn make_tokens(&mut self) -> Result<Vec<Token>, SyntaxError> {
        let mut out = Vec::new();

        while let Some(ch) = self.read_char() {
            let (next, step) = self.state.step(ch);
            match step {
                Step::Literal(c) => {
                    self.buffer.push(c);
                    self.in_word = true;
                }
                Step::OpenQuote => {
                    self.finalize_fragment(QuoteMode::Unquoted);
                    self.in_word = true;
                }
                Step::CloseQuote => {
                    // Kept even when empty: `""` is still an argument.
                    let text = std::mem::take(&mut self.buffer);
                    self.current_word.push(Fragment::new(text, self.state));
                }
                Step::Blank => self.finalize_word(&mut out),
                Step::Operator(op) => {
                    self.finalize_word(&mut out);
                    out.push(Token::operator(self.operator_kind(op)));
                }
            }
            self.state = next;
        }

        if let Some(q) = self.state.quote_char() {
            return Err(SyntaxError::UnclosedQuote(q));
        }
        self.finalize_word(&mut out);
        debug!("tokens: {out:?}");
        Ok(out)
    }

    fn read_char(&mut self) -> Option<char> {
        let ch = self.input.get(self.pos).copied();
        if ch.is_some() {
            self.pos += 1;
        }
        ch
    }

    fn peek_char(&self) -> Option<char> {
        self.input.get(self.pos).copied()
    }

    /// Classify an operator, consuming the second character of `<<` and `>>`.
    fn operator_kind(&mut self, op: char) -> TokenKind {
        let doubled = op != '|' && self.peek_char() == Some(op);
        if doubled {
            self.read_char();
        }
        match (op, doubled) {
            ('<', false) => TokenKind::RedirIn,
            ('<', true) => TokenKind::Heredoc,
            ('>', false) => TokenKind::RedirOut,
            ('>', true) => TokenKind::AppendOut,
            _ => TokenKind::Pipe,
        }
    }

    fn finalize_fragment(&mut self, quote: QuoteMode) {
        if !self.buffer.is_empty() {
            let text = std::mem::take(&mut self.buffer);
            self.current_word.push(Fragment::new(text, quote));
        }
    }

    fn finalize_word(&mut self, out: &mut Vec<Token>) {
        self.finalize_fragment(QuoteMode::Unquoted);
        if self.in_word {
            out.push(Token::word(std::mem::take(&mut self.current_word)));
            self.in_word = false;
        }
    }
}

/// The main entry point function to perform lexical analysis.
///
/// Returns the tokens in input order, or a [`SyntaxError`] naming the quote
/// character that was left open.
pub fn split_into_tokens(line: &str) -> Result<Vec<Token>, SyntaxError> {
    LexingFSM::new(line).make_tokens()
}
