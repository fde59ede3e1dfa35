//! Logical line reading and field splitting
// (c) 2025 Ross Younger

use std::io::BufRead;

use crate::errors::Result;

/// One logical line of a configuration file.
///
/// Physical lines ending in `\<newline>` are joined with their successor
/// (the backslash and newline removed) until a physical line does not end
/// that way. `number` is the **first** physical line of the sequence, so
/// error messages point at where the construct started.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogicalLine {
    /// The joined text, without any trailing newline
    pub text: String,
    /// 1-based number of the first physical line
    pub number: u32,
}

/// Reads logical lines from a buffered stream, tracking physical line
/// numbers across continuations.
#[derive(Debug)]
pub struct LogicalLines<B> {
    reader: B,
    next_physical: u32,
}

impl<B: BufRead> LogicalLines<B> {
    /// Constructor
    pub fn new(reader: B) -> Self {
        Self {
            reader,
            next_physical: 1,
        }
    }

    /// Returns the next logical line, or `None` at end of file.
    pub fn next_line(&mut self) -> Result<Option<LogicalLine>> {
        let mut text = String::new();
        let first = self.next_physical;
        loop {
            let mut physical = String::new();
            let n = self.reader.read_line(&mut physical)?;
            if n == 0 {
                // EOF. A dangling continuation still yields what we have.
                if text.is_empty() {
                    return Ok(None);
                }
                return Ok(Some(LogicalLine {
                    text,
                    number: first,
                }));
            }
            self.next_physical += 1;
            if physical.ends_with('\n') {
                let _ = physical.pop();
                if physical.ends_with('\r') {
                    let _ = physical.pop();
                }
            }
            if physical.ends_with('\\') {
                let _ = physical.pop();
                text.push_str(&physical);
                continue;
            }
            text.push_str(&physical);
            return Ok(Some(LogicalLine {
                text,
                number: first,
            }));
        }
    }
}

/// Splits a line into fields.
///
/// With `separator == None`, splits on runs of whitespace and skips leading
/// whitespace, shell-style; empty input yields no fields. With a separator
/// character, splits on each exact occurrence, preserving empty fields
/// (`"a::b"` with `':'` yields three fields).
#[must_use]
pub fn split_fields(line: &str, separator: Option<char>) -> Vec<&str> {
    match separator {
        None => line.split_whitespace().collect(),
        Some(c) => line.split(c).collect(),
    }
}
