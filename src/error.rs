use std::fmt;
use std::ops::Range;
use std::path::PathBuf;

use thiserror::Error;

/// All errors produced while parsing a scene.
#[derive(Debug)]
pub struct SceneError {
    pub kind: ErrorKind,
    pub span: Option<Range<usize>>,
    /// Source file the span refers to, when it is not the top-level input.
    pub file: Option<PathBuf>,
}

#[derive(Debug, Error)]
pub enum ErrorKind {
    /// Lexer encountered an unrecognized character/sequence.
    #[error("unrecognized token: {0}")]
    UnrecognizedToken(String),
    /// Parser expected one thing, got another.
    #[error("expected {expected}, got {got}")]
    UnexpectedToken { expected: String, got: String },
    /// Parser reached end of input unexpectedly.
    #[error("unexpected end of file, expected {expected}")]
    UnexpectedEof { expected: String },
    #[error("undeclared identifier '{0}'")]
    Undeclared(String),
    /// Fatal parse error with a user-facing message.
    #[error("{0}")]
    Parse(String),
    /// Hard math domain error (log/sqrt of a negative number, atan2(0,0)).
    #[error("{0}")]
    Domain(String),
    /// Reference-count or symbol-table invariant violation.
    #[error("{0}")]
    Internal(String),
    #[error("cannot read '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// Raised by `#error`.
    #[error("{0}")]
    User(String),
}

impl fmt::Display for SceneError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;

        if let Some(span) = &self.span {
            match &self.file {
                Some(file) => write!(f, " (in {} at byte {}..{})", file.display(), span.start, span.end)?,
                None => write!(f, " (at byte {}..{})", span.start, span.end)?,
            }
        }

        Ok(())
    }
}

impl std::error::Error for SceneError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &self.kind {
            ErrorKind::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<ErrorKind> for SceneError {
    fn from(kind: ErrorKind) -> Self {
        Self {
            kind,
            span: None,
            file: None,
        }
    }
}

pub type Result<T> = std::result::Result<T, SceneError>;

/// Shorthand constructors.
impl SceneError {
    pub fn unexpected_token(expected: &str, got: &str, span: Range<usize>) -> Self {
        Self {
            kind: ErrorKind::UnexpectedToken {
                expected: expected.to_string(),
                got: got.to_string(),
            },
            span: Some(span),
            file: None,
        }
    }

    pub fn unexpected_eof(expected: &str) -> Self {
        ErrorKind::UnexpectedEof {
            expected: expected.to_string(),
        }
        .into()
    }

    pub fn undeclared(name: &str) -> Self {
        ErrorKind::Undeclared(name.to_string()).into()
    }

    /// General parse error with a message.
    pub fn parse(msg: &str) -> Self {
        ErrorKind::Parse(msg.to_string()).into()
    }

    pub fn domain(msg: &str) -> Self {
        ErrorKind::Domain(msg.to_string()).into()
    }

    pub fn internal(msg: &str) -> Self {
        ErrorKind::Internal(msg.to_string()).into()
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ErrorKind::Io {
            path: path.into(),
            source,
        }
        .into()
    }

    /// Attach a span unless one is already set. Errors raised deep inside the
    /// evaluator get the span of the token the parser was looking at.
    pub fn with_span(mut self, span: Range<usize>) -> Self {
        if self.span.is_none() {
            self.span = Some(span);
        }
        self
    }

    pub fn in_file(mut self, file: Option<PathBuf>) -> Self {
        if self.file.is_none() {
            self.file = file;
        }
        self
    }

    /// The bare message without location, used by tests and `#debug` output.
    pub fn message(&self) -> String {
        self.kind.to_string()
    }
}
