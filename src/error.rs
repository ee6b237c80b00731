use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Parse(#[from] ParseError),
}

/// A rejected line, located by file and line number.
///
/// The offending text is not stored: `.env` values are often secrets.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{}: {kind}", location(.path, .line))]
pub struct ParseError {
    pub path: Option<PathBuf>,
    pub line: u32,
    pub kind: ParseErrorKind,
}

impl ParseError {
    pub(crate) fn new(path: Option<PathBuf>, line: u32, kind: ParseErrorKind) -> Self {
        Self { path, line, kind }
    }
}

fn location(path: &Option<PathBuf>, line: &u32) -> String {
    match path {
        Some(path) => format!("{}:{line}", path.display()),
        None => format!("parse error at line {line}"),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ParseErrorKind {
    #[error("invalid syntax")]
    InvalidSyntax,
    #[error("missing key")]
    MissingKey,
    #[error("invalid key")]
    InvalidKey,
    #[error("unterminated quote")]
    UnterminatedQuote,
    #[error("invalid UTF-8")]
    InvalidUtf8,
}
