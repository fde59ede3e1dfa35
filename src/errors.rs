//! Library error type
// (c) 2025 Ross Younger

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Shorthand result type used throughout the library
pub type Result<T> = std::result::Result<T, Error>;

/// The coarse classification of a failure.
///
/// `NotFound` is expected and recoverable; callers commonly treat it as
/// "try the next dialect". A syntax error aborts the scan of the file it
/// occurred in, but the resolution engine continues with other sources.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ErrorKind {
    /// The requested record (or a required file or keyword) does not exist
    #[error("not found")]
    NotFound,
    /// A malformed configuration line
    #[error("syntax error: {0}")]
    Syntax(String),
    /// A known keyword was given the wrong number of arguments
    #[error("`{keyword}` takes {expected} argument(s), got {got}")]
    BadArgCount {
        /// the offending keyword
        keyword: String,
        /// human description of the acceptable count
        expected: String,
        /// what was actually supplied
        got: usize,
    },
    /// A boolean argument was neither a yes nor a no spelling
    #[error("`{0}` is not a boolean (expected yes/no/true/false)")]
    BadBoolean(String),
    /// A numeric argument failed strict validation
    #[error("`{0}` is not a valid number")]
    BadNumber(String),
    /// A time expression could not be parsed
    #[error("bad time expression `{0}`")]
    BadTime(String),
    /// A work grade was not in `0-9A-Za-z`
    #[error("`{0}` is not a valid grade")]
    BadGrade(String),
    /// An operating system error, with errno attached
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A failure, optionally annotated with the file and line it arose from.
///
/// `Display` only renders the parts that are present; an error with no
/// line number never prints "line 0".
#[derive(Debug)]
pub struct Error {
    /// What went wrong
    pub kind: ErrorKind,
    /// The configuration file being read, if any
    pub file: Option<PathBuf>,
    /// The first physical line of the offending logical line, if any
    pub line: Option<u32>,
}

impl Error {
    /// Attaches a file name, unless one is already present
    #[must_use]
    pub fn in_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        if self.file.is_none() {
            self.file = Some(path.as_ref().to_path_buf());
        }
        self
    }

    /// Attaches a line number, unless one is already present
    #[must_use]
    pub fn at_line(mut self, line: u32) -> Self {
        if self.line.is_none() {
            self.line = Some(line);
        }
        self
    }

    /// Convenience check for the recoverable case
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self.kind, ErrorKind::NotFound)
    }

    pub(crate) fn syntax<S: Into<String>>(message: S) -> Self {
        ErrorKind::Syntax(message.into()).into()
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Self {
            kind,
            file: None,
            line: None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::from(ErrorKind::from(e))
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.kind)?;
        if let Some(file) = &self.file {
            write!(f, " in {}", file.display())?;
        }
        if let Some(line) = self.line {
            write!(f, " at line {line}")?;
        }
        Ok(())
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &self.kind {
            ErrorKind::Io(e) => Some(e),
            _ => None,
        }
    }
}

#[cfg(test)]
mod test {
    use super::{Error, ErrorKind};
    use pretty_assertions::assert_eq;

    #[test]
    fn renders_only_present_parts() {
        let e = Error::from(ErrorKind::NotFound);
        assert_eq!(e.to_string(), "not found");

        let e = Error::syntax("unexpected token").in_file("/etc/uucp/sys");
        assert_eq!(e.to_string(), "syntax error: unexpected token in /etc/uucp/sys");

        let e = Error::syntax("unexpected token")
            .in_file("/etc/uucp/sys")
            .at_line(12);
        assert_eq!(
            e.to_string(),
            "syntax error: unexpected token in /etc/uucp/sys at line 12"
        );
        assert!(!e.to_string().contains("line 0"));
    }

    #[test]
    fn annotations_do_not_overwrite() {
        let e = Error::syntax("x").at_line(3).at_line(99);
        assert_eq!(e.line, Some(3));
        let e = Error::syntax("x").in_file("a").in_file("b");
        assert_eq!(e.file.as_deref(), Some(std::path::Path::new("a")));
    }

    #[test]
    fn io_carries_errno() {
        let io = std::io::Error::from_raw_os_error(2);
        let e = Error::from(io).in_file("Systems");
        assert!(matches!(e.kind, ErrorKind::Io(_)));
        assert!(e.to_string().contains("Systems"));
    }
}
