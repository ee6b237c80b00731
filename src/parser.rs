use std::collections::HashMap;
use std::io::BufRead;
use std::path::Path;

use crate::error::{Error, ParseError, ParseErrorKind};
use crate::model::{Entry, ParseMode};

/// Parse a single `.env` line into a `(key, value)` pair.
///
/// Blank lines, comments and malformed lines all yield `None`; use
/// [`parse_line`] to tell them apart. Both slices borrow from `line`, since
/// values are never unescaped.
///
/// ```
/// assert_eq!(envline::parse_key_value("export A = b # note"), Some(("A", "b")));
/// assert_eq!(envline::parse_key_value("A=\"b c\""), Some(("A", "b c")));
/// assert_eq!(envline::parse_key_value("\"A\"=b"), None);
/// ```
pub fn parse_key_value(line: &str) -> Option<(&str, &str)> {
    parse_line(line).ok().flatten()
}

/// Parse a single `.env` line, reporting why a malformed line was rejected.
///
/// Returns `Ok(None)` for blank and comment-only lines.
pub fn parse_line(line: &str) -> Result<Option<(&str, &str)>, ParseErrorKind> {
    let mut working = strip_comment(line).trim_start();
    if working.is_empty() {
        return Ok(None);
    }

    if let Some(rest) = working.strip_prefix("export")
        && rest.starts_with(char::is_whitespace)
    {
        working = rest.trim_start();
        if working.is_empty() {
            return Err(ParseErrorKind::MissingKey);
        }
    }

    let Some((key, value)) = working.split_once('=') else {
        return Err(ParseErrorKind::InvalidSyntax);
    };

    let key = key.trim_end();
    if key.is_empty() {
        return Err(ParseErrorKind::MissingKey);
    }
    if !key.bytes().all(is_key_byte) {
        return Err(ParseErrorKind::InvalidKey);
    }

    Ok(Some((key, parse_value(value)?)))
}

/// Parse dotenv entries from UTF-8 text, skipping malformed lines.
pub fn parse_str(input: &str) -> Result<Vec<Entry>, Error> {
    parse_str_with_mode(input, ParseMode::Lenient)
}

/// Parse dotenv entries from UTF-8 text using a specific parse mode.
pub fn parse_str_with_mode(input: &str, parse_mode: ParseMode) -> Result<Vec<Entry>, Error> {
    parse_bytes_with_mode(input.as_bytes(), parse_mode)
}

/// Parse dotenv entries from bytes, skipping malformed lines.
///
/// Lines that are not valid UTF-8 count as malformed.
pub fn parse_bytes(input: &[u8]) -> Result<Vec<Entry>, Error> {
    parse_bytes_with_mode(input, ParseMode::Lenient)
}

/// Parse dotenv entries from bytes using a specific parse mode.
pub fn parse_bytes_with_mode(input: &[u8], parse_mode: ParseMode) -> Result<Vec<Entry>, Error> {
    let parsed = parse_input(input, None, parse_mode)?;
    Ok(parsed.entries)
}

/// Parse dotenv entries from a buffered reader, skipping malformed lines.
pub fn parse_reader<R: BufRead>(reader: R) -> Result<Vec<Entry>, Error> {
    parse_reader_with_mode(reader, ParseMode::Lenient)
}

/// Parse dotenv entries from a buffered reader using a specific parse mode.
pub fn parse_reader_with_mode<R: BufRead>(
    mut reader: R,
    parse_mode: ParseMode,
) -> Result<Vec<Entry>, Error> {
    let mut buf = Vec::new();
    reader.read_to_end(&mut buf)?;
    parse_bytes_with_mode(&buf, parse_mode)
}

/// Entries of one input, deduplicated by key, plus the lines skipped as
/// malformed.
#[derive(Debug, Default)]
pub(crate) struct ParsedInput {
    pub(crate) entries: Vec<Entry>,
    pub(crate) invalid: Vec<ParseError>,
}

pub(crate) fn parse_input(
    input: &[u8],
    source: Option<&Path>,
    parse_mode: ParseMode,
) -> Result<ParsedInput, ParseError> {
    let mut parsed = ParsedInput::default();
    let mut by_key = HashMap::<String, usize>::new();
    let mut line_num = 0u32;

    for raw in Lines::new(input) {
        line_num += 1;

        let result = std::str::from_utf8(raw)
            .map_err(|_| ParseErrorKind::InvalidUtf8)
            .and_then(parse_line);
        let (key, value) = match result {
            Ok(Some(pair)) => pair,
            Ok(None) => continue,
            Err(kind) => {
                let err = ParseError::new(source.map(Path::to_path_buf), line_num, kind);
                if parse_mode == ParseMode::Strict {
                    return Err(err);
                }
                tracing::debug!(
                    path = ?source,
                    line = line_num,
                    %kind,
                    "skipping malformed line"
                );
                parsed.invalid.push(err);
                continue;
            }
        };

        let entry = Entry {
            key: key.to_owned(),
            value: value.to_owned(),
            source: source.map(Path::to_path_buf),
            line: line_num,
        };
        if let Some(existing_idx) = by_key.get(key).copied() {
            parsed.entries[existing_idx] = entry;
        } else {
            by_key.insert(entry.key.clone(), parsed.entries.len());
            parsed.entries.push(entry);
        }
    }

    Ok(parsed)
}

/// Splits on `\n`, `\r\n` and lone `\r`.
struct Lines<'a> {
    rest: &'a [u8],
}

impl<'a> Lines<'a> {
    fn new(input: &'a [u8]) -> Self {
        Self { rest: input }
    }
}

impl<'a> Iterator for Lines<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<Self::Item> {
        if self.rest.is_empty() {
            return None;
        }

        let Some(idx) = self
            .rest
            .iter()
            .position(|byte| *byte == b'\n' || *byte == b'\r')
        else {
            let line = self.rest;
            self.rest = &[];
            return Some(line);
        };

        let line = &self.rest[..idx];
        let terminator_len = if self.rest[idx..].starts_with(b"\r\n") {
            2
        } else {
            1
        };
        self.rest = &self.rest[idx + terminator_len..];
        Some(line)
    }
}

/// Cut the line at the first `#` that is not inside a quoted value.
///
/// Only a quote that opens the value starts a quoted region. An unterminated
/// quote leaves the line untouched for [`parse_value`] to reject.
fn strip_comment(line: &str) -> &str {
    let Some(idx) = line.find(['#', '=']) else {
        return line;
    };
    if line.as_bytes()[idx] == b'#' {
        return &line[..idx];
    }

    let value = line[idx + 1..].trim_start();
    let mut scan_from = line.len() - value.len();
    if let Some(quote) = value.chars().next().filter(|ch| is_quote(*ch)) {
        match value[1..].find(quote) {
            Some(close) => scan_from += close + 2,
            None => return line,
        }
    }

    match line[scan_from..].find('#') {
        Some(hash) => &line[..scan_from + hash],
        None => line,
    }
}

fn parse_value(input: &str) -> Result<&str, ParseErrorKind> {
    let input = input.trim_start();
    match input.chars().next() {
        None => Ok(""),
        Some(quote) if is_quote(quote) => parse_quoted(input, quote),
        Some(_) => parse_unquoted(input),
    }
}

fn parse_quoted(input: &str, quote: char) -> Result<&str, ParseErrorKind> {
    let body = &input[quote.len_utf8()..];
    let Some(end) = body.find(quote) else {
        return Err(ParseErrorKind::UnterminatedQuote);
    };

    if !body[end + quote.len_utf8()..].trim().is_empty() {
        return Err(ParseErrorKind::InvalidSyntax);
    }

    Ok(&body[..end])
}

fn parse_unquoted(input: &str) -> Result<&str, ParseErrorKind> {
    let token = input
        .split_once(char::is_whitespace)
        .map_or(input, |(head, _)| head);
    // quotes may only delimit a whole value
    if token.contains(is_quote) {
        return Err(ParseErrorKind::InvalidSyntax);
    }
    Ok(token)
}

fn is_quote(ch: char) -> bool {
    ch == '"' || ch == '\''
}

fn is_key_byte(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || byte == b'_' || byte == b'-'
}
