//! Command-file parser.
//!
//! One line holds one command: `Name(key1="value1",key2=value2)`. Quoted
//! values may contain commas, `=` and parentheses; unquoted values are
//! trimmed. Blank lines and `#` comments become inert commands so the file
//! can be regenerated, and lines between `/*` and `*/` are comments too.

use indexmap::IndexMap;
use log::{debug, warn};
use thiserror::Error;

use crate::command::{Command, CommandKind};
use crate::config::COMMENT_MARKER;
use crate::registry::CommandRegistry;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseErrorKind {
    #[error("invalid command name `{0}`")]
    InvalidCommandName(String),

    #[error("expected `(` after command name")]
    MissingOpenParen,

    #[error("missing closing `)`")]
    MissingCloseParen,

    #[error("unexpected text after `)`: `{0}`")]
    TrailingText(String),

    #[error("parameter `{0}` has no `=`")]
    MissingEquals(String),

    #[error("empty parameter name")]
    EmptyParameterName,

    #[error("unterminated quoted value for `{0}`")]
    UnterminatedQuote(String),

    #[error("expected `,` or `)` after value of `{0}`")]
    ExpectedSeparator(String),

    #[error("unquoted value of `{0}` contains `\"`")]
    QuoteInUnquotedValue(String),

    #[error("parameter `{0}` is given more than once")]
    DuplicateParameter(String),
}

/// A malformed line. Parsing of other lines is unaffected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("line {line_number}: {kind}")]
pub struct ParseError {
    pub line_number: usize,
    pub kind: ParseErrorKind,
}

/// Parse one line of a command file.
///
/// Unknown command names are not an error: they produce an `Unknown`
/// placeholder that fails validation when run.
///
/// # Errors
///
/// Returns a [`ParseError`] if the line is not `Name(...)` syntax.
pub fn parse_line(
    line: &str,
    line_number: usize,
    registry: &CommandRegistry,
) -> Result<Command, ParseError> {
    let trimmed = line.trim();

    if trimmed.is_empty() {
        return Ok(Command::inert(line_number, line, CommandKind::Blank));
    }

    if trimmed.starts_with(COMMENT_MARKER) {
        return Ok(Command::inert(line_number, line, CommandKind::Comment));
    }

    let error = |kind| ParseError { line_number, kind };

    let Some(open) = trimmed.find('(') else {
        let name = trimmed.split_whitespace().next().unwrap_or(trimmed);
        return Err(error(if is_valid_name(name) {
            ParseErrorKind::MissingOpenParen
        } else {
            ParseErrorKind::InvalidCommandName(name.to_string())
        }));
    };

    let name = trimmed[..open].trim();
    if !is_valid_name(name) {
        return Err(error(ParseErrorKind::InvalidCommandName(name.to_string())));
    }

    let (parameters, consumed) = parse_parameter_list(&trimmed[open + 1..]).map_err(error)?;

    let trailing = trimmed[open + 1 + consumed..].trim();
    if !trailing.is_empty() {
        return Err(error(ParseErrorKind::TrailingText(trailing.to_string())));
    }

    let kind = match registry.lookup(name) {
        Some(entry) => CommandKind::Known {
            definition: entry.definition().clone(),
            behavior: entry.create(),
        },
        None => CommandKind::Unknown {
            suggestion: registry.suggest(name).map(ToString::to_string),
        },
    };

    let command = Command::parsed(line_number, line, name, parameters, kind);
    for problem in command.parse_warnings() {
        warn!("Line {line_number}: {problem}");
    }
    Ok(command)
}

/// Parse a whole command file.
///
/// Malformed lines become `Malformed` placeholders carrying the parse error
/// so the rest of the file is still available.
#[must_use]
pub fn parse_text(text: &str, registry: &CommandRegistry) -> Vec<Command> {
    let mut commands = Vec::new();
    let mut in_block_comment = false;

    for (index, line) in text.lines().enumerate() {
        let line_number = index + 1;
        let trimmed = line.trim();

        if trimmed.starts_with("/*") {
            in_block_comment = !(trimmed.len() >= 4 && trimmed.ends_with("*/"));
            commands.push(Command::inert(line_number, line, CommandKind::Comment));
            continue;
        }

        if in_block_comment {
            if trimmed.starts_with("*/") {
                in_block_comment = false;
            }
            commands.push(Command::inert(line_number, line, CommandKind::Comment));
            continue;
        }

        match parse_line(line, line_number, registry) {
            Ok(command) => commands.push(command),
            Err(e) => {
                warn!("Could not parse {e}");
                let name = trimmed
                    .split(|c: char| c == '(' || c.is_whitespace())
                    .next()
                    .unwrap_or_default();
                commands.push(Command::parsed(
                    line_number,
                    line,
                    name,
                    IndexMap::new(),
                    CommandKind::Malformed {
                        reason: e.kind.to_string(),
                    },
                ));
            }
        }
    }

    debug!("Parsed {} command file lines", commands.len());
    commands
}

fn is_valid_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Parse `key=value,...)` and return the parameters plus the number of bytes
/// consumed, including the closing parenthesis.
fn parse_parameter_list(
    input: &str,
) -> Result<(IndexMap<String, String>, usize), ParseErrorKind> {
    let mut parameters = IndexMap::new();
    let bytes = input.as_bytes();
    let mut pos = skip_whitespace(input, 0);

    if bytes.get(pos) == Some(&b')') {
        return Ok((parameters, pos + 1));
    }

    loop {
        // Key runs up to `=`; hitting `,` or `)` first means the `=` is missing.
        let key_start = pos;
        while pos < bytes.len() && !matches!(bytes[pos], b'=' | b',' | b')') {
            pos += 1;
        }
        let key = input[key_start..pos].trim();

        match bytes.get(pos) {
            None => return Err(ParseErrorKind::MissingCloseParen),
            Some(b'=') => {}
            Some(_) if key.is_empty() => return Err(ParseErrorKind::EmptyParameterName),
            Some(_) => return Err(ParseErrorKind::MissingEquals(key.to_string())),
        }
        if key.is_empty() {
            return Err(ParseErrorKind::EmptyParameterName);
        }
        pos = skip_whitespace(input, pos + 1);

        let value = if bytes.get(pos) == Some(&b'"') {
            let value_start = pos + 1;
            let Some(length) = input[value_start..].find('"') else {
                return Err(ParseErrorKind::UnterminatedQuote(key.to_string()));
            };
            pos = skip_whitespace(input, value_start + length + 1);
            input[value_start..value_start + length].to_string()
        } else {
            let value_start = pos;
            while pos < bytes.len() && !matches!(bytes[pos], b',' | b')') {
                pos += 1;
            }
            let value = input[value_start..pos].trim();
            if value.contains('"') {
                return Err(ParseErrorKind::QuoteInUnquotedValue(key.to_string()));
            }
            value.to_string()
        };

        if parameters.insert(key.to_string(), value).is_some() {
            return Err(ParseErrorKind::DuplicateParameter(key.to_string()));
        }

        match bytes.get(pos) {
            Some(b',') => pos = skip_whitespace(input, pos + 1),
            Some(b')') => return Ok((parameters, pos + 1)),
            None => return Err(ParseErrorKind::MissingCloseParen),
            Some(_) => return Err(ParseErrorKind::ExpectedSeparator(key.to_string())),
        }
    }
}

fn skip_whitespace(input: &str, mut pos: usize) -> usize {
    let bytes = input.as_bytes();
    while pos < bytes.len() && bytes[pos].is_ascii_whitespace() {
        pos += 1;
    }
    pos
}
