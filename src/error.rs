//! Error types and Result alias for the engine.
//!
//! The engine's failure surface is closed and enumerable: every fallible
//! operation fails with one of the [`ErrorCode`] variants, optionally
//! carrying a message or a byte offset for context.

use std::fmt;

/// Result type alias used throughout the engine.
pub type Result<T> = std::result::Result<T, Error>;

/// The closed set of ways an engine operation can fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// An append would exceed the store's configured `max_size`.
    StorageLimit,
    /// A record's payload does not match its stored CRC32.
    ChecksumMismatch,
    /// `from_data` was given bytes with the wrong file magic.
    BadMagic,
    /// `from_data` was given a file header with an unsupported version.
    UnsupportedVersion,
    /// A key's tag does not match the B-tree's configured key type, or a
    /// predicate literal is incompatible with its column's declared type.
    TypeMismatch,
    /// A query or DDL referenced a table the schema does not define.
    UnknownTable,
    /// A query referenced a column the resolved table does not define.
    UnknownColumn,
    /// A schema or SQL document could not be parsed.
    SyntaxError,
    /// A schema document parsed but defined no tables.
    EmptySchema,
    /// A schema document used a primitive type the parser does not support.
    InvalidType,
    /// An append succeeded but a derived index insert failed; the database
    /// can no longer be trusted to reflect the log and must be rebuilt.
    Poisoned,
    /// Wraps an `std::io::Error` encountered while handling engine input.
    Io,
    /// A byte sequence that was expected to be UTF-8 was not.
    Utf8,
}

impl ErrorCode {
    fn describe(self) -> &'static str {
        match self {
            ErrorCode::StorageLimit => "append would exceed the configured storage limit",
            ErrorCode::ChecksumMismatch => "record checksum does not match its payload",
            ErrorCode::BadMagic => "file header magic does not match the stacked-record format",
            ErrorCode::UnsupportedVersion => "file header version is not supported",
            ErrorCode::TypeMismatch => "value tag does not match the expected type",
            ErrorCode::UnknownTable => "no such table",
            ErrorCode::UnknownColumn => "no such column",
            ErrorCode::SyntaxError => "syntax error",
            ErrorCode::EmptySchema => "schema defines no tables",
            ErrorCode::InvalidType => "unsupported column type",
            ErrorCode::Poisoned => "database is poisoned after a partial write",
            ErrorCode::Io => "i/o error",
            ErrorCode::Utf8 => "invalid utf-8",
        }
    }
}

/// An engine error: a code plus optional context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Error {
    code: ErrorCode,
    message: Option<String>,
    /// Byte offset into the source (SQL text, schema text, or log buffer)
    /// the error relates to, when known.
    position: Option<usize>,
}

impl Error {
    /// Build an error carrying only a code.
    pub fn new(code: ErrorCode) -> Self {
        Error {
            code,
            message: None,
            position: None,
        }
    }

    /// Build an error with an explanatory message.
    pub fn with_message(code: ErrorCode, message: impl Into<String>) -> Self {
        Error {
            code,
            message: Some(message.into()),
            position: None,
        }
    }

    /// Attach a source position to an existing error.
    pub fn at(mut self, position: usize) -> Self {
        self.position = Some(position);
        self
    }

    pub fn code(&self) -> ErrorCode {
        self.code
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn position(&self) -> Option<usize> {
        self.position
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.message, self.position) {
            (Some(msg), Some(pos)) => write!(f, "{}: {} (at {})", self.code.describe(), msg, pos),
            (Some(msg), None) => write!(f, "{}: {}", self.code.describe(), msg),
            (None, Some(pos)) => write!(f, "{} (at {})", self.code.describe(), pos),
            (None, None) => write!(f, "{}", self.code.describe()),
        }
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::with_message(ErrorCode::Io, err.to_string())
    }
}

impl From<std::str::Utf8Error> for Error {
    fn from(err: std::str::Utf8Error) -> Self {
        Error::with_message(ErrorCode::Utf8, err.to_string())
    }
}

impl From<std::string::FromUtf8Error> for Error {
    fn from(err: std::string::FromUtf8Error) -> Self {
        Error::with_message(ErrorCode::Utf8, err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_message_and_position() {
        let err = Error::with_message(ErrorCode::SyntaxError, "unexpected token").at(12);
        assert_eq!(err.to_string(), "syntax error: unexpected token (at 12)");
    }

    #[test]
    fn display_bare_code() {
        let err = Error::new(ErrorCode::UnknownTable);
        assert_eq!(err.to_string(), "no such table");
    }
}
