//! Parameter expansion, quote removal and word splitting.

use crate::SHELL_NAME;
use crate::env::ShellState;
use crate::lexer::QuoteMode;
use crate::parser::{Command, Pipeline, RedirectKind, Word};
use log::trace;
use std::path::PathBuf;

/// Where an expanded redirection points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedirectTarget {
    /// A file, not yet resolved against the working directory.
    Path(PathBuf),
    /// The body of a heredoc, ready to be fed to the command.
    Heredoc(String),
    /// The target expanded to zero or several fields; carries the source text.
    Ambiguous(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpandedRedirect {
    pub kind: RedirectKind,
    pub target: RedirectTarget,
}

/// A command ready to be planned: final argv strings and redirections.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExpandedCommand {
    pub argv: Vec<String>,
    pub redirects: Vec<ExpandedRedirect>,
}

/// A `$` reference recognized in word text.
enum Param<'a> {
    Status,
    Name(&'a str),
    Positional(u8),
}

/// Recognize the parameter starting right after a `$` in `rest`.
///
/// Returns the parameter and the number of bytes it spans, or `None` when the
/// `$` is literal.
fn scan_param(rest: &str) -> Option<(Param<'_>, usize)> {
    let first = rest.chars().next()?;
    match first {
        '?' => Some((Param::Status, 1)),
        '0'..='9' => Some((Param::Positional(first as u8 - b'0'), 1)),
        '{' => {
            let close = rest.find('}')?;
            let name = &rest[1..close];
            is_name(name).then_some((Param::Name(name), close + 1))
        }
        c if c == '_' || c.is_ascii_alphabetic() => {
            let len = rest
                .find(|c: char| c != '_' && !c.is_ascii_alphanumeric())
                .unwrap_or(rest.len());
            Some((Param::Name(&rest[..len]), len))
        }
        _ => None,
    }
}

fn is_name(s: &str) -> bool {
    let mut chars = s.chars();
    chars
        .next()
        .is_some_and(|c| c == '_' || c.is_ascii_alphabetic())
        && chars.all(|c| c == '_' || c.is_ascii_alphanumeric())
}

fn lookup(param: &Param<'_>, state: &ShellState) -> String {
    match param {
        Param::Status => state.last_status.to_string(),
        Param::Name(name) => state.get_var(name).unwrap_or_default().to_string(),
        Param::Positional(0) => SHELL_NAME.to_string(),
        Param::Positional(_) => String::new(),
    }
}

/// A piece of word text after substitution.
enum Piece<'a> {
    Literal(&'a str),
    Value(String),
}

/// Walk `text`, emitting literal runs and parameter values in order.
fn substitute(text: &str, state: &ShellState, mut emit: impl FnMut(Piece<'_>)) {
    let mut rest = text;
    while let Some(dollar) = rest.find('$') {
        emit(Piece::Literal(&rest[..dollar]));
        let after = &rest[dollar + 1..];
        match scan_param(after) {
            Some((param, len)) => {
                let expanded = lookup(&param, state);
                trace!("${} -> {expanded:?}", &after[..len]);
                emit(Piece::Value(expanded));
                rest = &after[len..];
            }
            None => {
                emit(Piece::Literal("$"));
                rest = after;
            }
        }
    }
    emit(Piece::Literal(rest));
}

/// Expand `text` the way a double-quoted string is expanded: parameters are
/// substituted, nothing is split.
pub fn expand_text(text: &str, state: &ShellState) -> String {
    let mut out = String::with_capacity(text.len());
    substitute(text, state, |piece| match piece {
        Piece::Literal(s) => out.push_str(s),
        Piece::Value(v) => out.push_str(&v),
    });
    out
}

/// Accumulates fields while a word is expanded.
#[derive(Default)]
struct Fields {
    done: Vec<String>,
    current: String,
    started: bool,
}

impl Fields {
    fn push_str(&mut self, s: &str) {
        self.current.push_str(s);
        self.started = true;
    }

    /// Quoted text always starts a field, even when empty.
    fn push_quoted(&mut self, s: &str) {
        self.push_str(s);
    }

    /// Unquoted expansion result: blanks separate fields.
    fn push_split(&mut self, s: &str) {
        for c in s.chars() {
            if matches!(c, ' ' | '\t' | '\n') {
                self.end_field();
            } else {
                self.current.push(c);
                self.started = true;
            }
        }
    }

    fn end_field(&mut self) {
        if self.started {
            self.done.push(std::mem::take(&mut self.current));
            self.started = false;
        }
    }

    fn finish(mut self) -> Vec<String> {
        self.end_field();
        self.done
    }
}

/// Expand one word into zero or more fields.
///
/// Single-quoted fragments are copied verbatim, double-quoted ones are
/// substituted without splitting, unquoted ones are substituted and the
/// substituted values are split on blanks.
pub fn expand_word(word: &Word, state: &ShellState) -> Vec<String> {
    let mut fields = Fields::default();
    for fragment in &word.fragments {
        match fragment.quote {
            QuoteMode::Single => fields.push_quoted(&fragment.text),
            QuoteMode::Double => fields.push_quoted(&expand_text(&fragment.text, state)),
            QuoteMode::Unquoted => {
                substitute(&fragment.text, state, |piece| match piece {
                    Piece::Literal("") => {}
                    Piece::Literal(s) => fields.push_str(s),
                    Piece::Value(v) => fields.push_split(&v),
                });
            }
        }
    }
    fields.finish()
}

/// Expand a command's words and redirections against `state`.
pub fn expand_command(pipeline: &Pipeline, command: &Command, state: &ShellState) -> ExpandedCommand {
    let argv = pipeline
        .argv(command)
        .flat_map(|word| expand_word(word, state))
        .collect();

    let redirects = command
        .redirects
        .iter()
        .map(|redirect| {
            let word = pipeline.word(redirect.target);
            let target = match &redirect.heredoc {
                Some(body) => {
                    let mut text = String::new();
                    for line in &body.lines {
                        if body.expand {
                            text.push_str(&expand_text(line, state));
                        } else {
                            text.push_str(line);
                        }
                        text.push('\n');
                    }
                    RedirectTarget::Heredoc(text)
                }
                None => {
                    let mut fields = expand_word(word, state);
                    if fields.len() == 1 {
                        RedirectTarget::Path(PathBuf::from(fields.remove(0)))
                    } else {
                        RedirectTarget::Ambiguous(word.to_string())
                    }
                }
            };
            ExpandedRedirect {
                kind: redirect.kind,
                target,
            }
        })
        .collect();

    ExpandedCommand { argv, redirects }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::ScriptInput;
    use crate::lexer::Fragment;
    use crate::parser::parse_line;

    fn state_with(vars: &[(&str, &str)]) -> ShellState {
        let mut state = ShellState::new("/");
        for (k, v) in vars {
            state.set_var(*k, *v);
        }
        state
    }

    fn expand_line(line: &str, state: &ShellState) -> Vec<String> {
        let pipeline = parse_line(line, &mut ScriptInput::default()).unwrap().unwrap();
        expand_command(&pipeline, &pipeline.commands()[0], state).argv
    }

    #[test]
    fn test_quotes_are_removed() {
        let state = ShellState::new("/");
        assert_eq!(expand_line(r#"echo "a b" c"#, &state), ["echo", "a b", "c"]);
    }

    #[test]
    fn test_double_quoted_variable_is_one_field() {
        let state = state_with(&[("NAME", "two  words ")]);
        assert_eq!(expand_line(r#"printf "$NAME""#, &state), ["printf", "two  words "]);
    }

    #[test]
    fn test_unquoted_variable_is_split() {
        let state = state_with(&[("NAME", " two  words ")]);
        assert_eq!(expand_line("printf $NAME", &state), ["printf", "two", "words"]);
        assert_eq!(
            expand_line("printf a$NAME.b", &state),
            ["printf", "a", "two", "words", ".b"]
        );
    }

    #[test]
    fn test_single_quotes_are_literal_under_any_environment() {
        for state in [
            ShellState::new("/"),
            state_with(&[("text", "X"), ("HOME", "/root")]),
        ] {
            assert_eq!(expand_line("echo 'text'", &state), ["echo", "text"]);
            assert_eq!(expand_line("echo '$HOME $?'", &state), ["echo", "$HOME $?"]);
        }
    }

    #[test]
    fn test_status_parameter() {
        let mut state = ShellState::new("/");
        state.last_status = 127;
        assert_eq!(expand_line("echo $? \"$?\"", &state), ["echo", "127", "127"]);
    }

    #[test]
    fn test_unset_unquoted_word_is_dropped() {
        let state = ShellState::new("/");
        assert_eq!(expand_line("echo $NOPE x", &state), ["echo", "x"]);
        assert_eq!(expand_line("$NOPE", &state), Vec::<String>::new());
    }

    #[test]
    fn test_quoted_empty_word_is_kept() {
        let state = ShellState::new("/");
        assert_eq!(expand_line(r#"echo "" '' "$NOPE""#, &state), ["echo", "", "", ""]);
    }

    #[test]
    fn test_lone_dollar_is_literal() {
        let state = ShellState::new("/");
        assert_eq!(expand_line("echo $ a$ $-x \"$\"", &state), ["echo", "$", "a$", "$-x", "$"]);
    }

    #[test]
    fn test_braced_and_positional_parameters() {
        let state = state_with(&[("USER", "ann")]);
        assert_eq!(expand_line("echo ${USER}x $USERx", &state), ["echo", "annx"]);
        assert_eq!(expand_line("echo $0 $1", &state), ["echo", "minishell"]);
        assert_eq!(expand_line("echo ${1A}", &state), ["echo", "${1A}"]);
    }

    #[test]
    fn test_name_stops_at_non_name_character() {
        let state = state_with(&[("A", "1")]);
        assert_eq!(expand_line("echo $A-$A/$A", &state), ["echo", "1-1/1"]);
    }

    #[test]
    fn test_expand_word_on_handmade_fragments() {
        let state = state_with(&[("X", "a b")]);
        let word = Word::new(vec![
            Fragment::new("$X", QuoteMode::Unquoted),
            Fragment::new("$X", QuoteMode::Double),
            Fragment::new("$X", QuoteMode::Single),
        ]);
        assert_eq!(expand_word(&word, &state), ["a", "ba b$X"]);
    }

    #[test]
    fn test_redirect_targets() {
        let state = state_with(&[("OUT", "out.txt"), ("TWO", "a b")]);
        let pipeline = parse_line("cat < $OUT > $TWO >> \"$TWO\"", &mut ScriptInput::default())
            .unwrap()
            .unwrap();
        let expanded = expand_command(&pipeline, &pipeline.commands()[0], &state);
        let targets: Vec<_> = expanded.redirects.into_iter().map(|r| r.target).collect();
        assert_eq!(
            targets,
            [
                RedirectTarget::Path(PathBuf::from("out.txt")),
                RedirectTarget::Ambiguous("$TWO".into()),
                RedirectTarget::Path(PathBuf::from("a b")),
            ]
        );
    }

    #[test]
    fn test_heredoc_body_expansion() {
        let state = state_with(&[("WHO", "world")]);
        let mut input = ScriptInput::new("hello $WHO\n'$WHO'\nEOF\n$WHO\nEOF");
        let pipeline = parse_line("cat <<EOF", &mut input).unwrap().unwrap();
        let expanded = expand_command(&pipeline, &pipeline.commands()[0], &state);
        assert_eq!(
            expanded.redirects[0].target,
            RedirectTarget::Heredoc("hello world\n'world'\n".into())
        );

        let pipeline = parse_line("cat <<\"EOF\"", &mut input).unwrap().unwrap();
        let expanded = expand_command(&pipeline, &pipeline.commands()[0], &state);
        assert_eq!(
            expanded.redirects[0].target,
            RedirectTarget::Heredoc("$WHO\n".into())
        );
    }
}
