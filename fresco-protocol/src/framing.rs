//! Line framing
//!
//! Turns the raw byte stream coming off the transport into complete lines.
//! Bytes are appended with [`LineFramer::push`]; complete lines are pulled
//! by iterating the framer. A partial trailing line stays buffered until its
//! delimiter arrives.

use std::fmt;

use bytes::{Buf, BytesMut};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::ProtocolError;

/// Default upper bound on a single line, in bytes
pub const DEFAULT_MAX_LINE_LENGTH: usize = 4096;

/// Line terminator used by the controller
///
/// Exactly one delimiter is in effect per framer; it is never auto-detected.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Delimiter {
    #[default]
    Newline,
    CarriageReturn,
}

impl Delimiter {
    pub fn as_byte(self) -> u8 {
        match self {
            Self::Newline => b'\n',
            Self::CarriageReturn => b'\r',
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Newline => "\n",
            Self::CarriageReturn => "\r",
        }
    }
}

impl fmt::Display for Delimiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Newline => "\\n",
            Self::CarriageReturn => "\\r",
        })
    }
}

impl TryFrom<String> for Delimiter {
    type Error = ProtocolError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::try_from(value.as_str())
    }
}

impl TryFrom<&str> for Delimiter {
    type Error = ProtocolError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "\n" => Ok(Self::Newline),
            "\r" => Ok(Self::CarriageReturn),
            other => Err(ProtocolError::InvalidDelimiter(other.to_string())),
        }
    }
}

impl From<Delimiter> for String {
    fn from(value: Delimiter) -> Self {
        value.as_str().to_string()
    }
}

/// Splits a byte stream into delimiter-terminated lines
///
/// Lines are yielded without their delimiter and decoded as UTF-8, replacing
/// invalid sequences. Empty lines are yielded as empty strings. A line longer
/// than the configured maximum is dropped in full, however it was chunked.
///
/// # Example
///
/// ```rust
/// use fresco_protocol::{Delimiter, LineFramer};
///
/// let mut framer = LineFramer::new(Delimiter::Newline);
/// framer.push(b"scene 1 100 0 A\nsce");
/// assert_eq!(framer.next().as_deref(), Some("scene 1 100 0 A"));
/// assert_eq!(framer.next(), None);
///
/// framer.push(b"ne 2 50 0 B\n");
/// assert_eq!(framer.next().as_deref(), Some("scene 2 50 0 B"));
/// ```
#[derive(Debug)]
pub struct LineFramer {
    buffer: BytesMut,
    delimiter: Delimiter,
    max_line_length: usize,
    /// Dropping the remainder of an over-long line
    discarding: bool,
}

impl LineFramer {
    pub fn new(delimiter: Delimiter) -> Self {
        Self::with_max_line_length(delimiter, DEFAULT_MAX_LINE_LENGTH)
    }

    pub fn with_max_line_length(delimiter: Delimiter, max_line_length: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(1024),
            delimiter,
            max_line_length,
            discarding: false,
        }
    }

    pub fn delimiter(&self) -> Delimiter {
        self.delimiter
    }

    /// Append received bytes
    pub fn push(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Number of buffered bytes not yet yielded
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Drop everything buffered, e.g. after a reconnect
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.discarding = false;
    }
}

impl Iterator for LineFramer {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        let delimiter = self.delimiter.as_byte();
        loop {
            let Some(pos) = self.buffer.iter().position(|&b| b == delimiter) else {
                if self.buffer.len() > self.max_line_length {
                    if !self.discarding {
                        warn!(
                            max = self.max_line_length,
                            "Line exceeds maximum length, discarding"
                        );
                    }
                    self.discarding = true;
                    self.buffer.clear();
                }
                return None;
            };

            let line = self.buffer.split_to(pos);
            self.buffer.advance(1);

            if self.discarding {
                self.discarding = false;
                continue;
            }
            if line.len() > self.max_line_length {
                warn!(
                    max = self.max_line_length,
                    len = line.len(),
                    "Line exceeds maximum length, discarding"
                );
                continue;
            }
            return Some(String::from_utf8_lossy(&line).into_owned());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(framer: &mut LineFramer) -> Vec<String> {
        framer.collect()
    }

    #[test]
    fn test_lines_simple() {
        let mut framer = LineFramer::new(Delimiter::Newline);
        framer.push(b"Hello\nWorld\n");
        assert_eq!(drain(&mut framer), vec!["Hello", "World"]);
        assert_eq!(framer.buffered(), 0);
    }

    #[test]
    fn test_partial_line_buffered() {
        let mut framer = LineFramer::new(Delimiter::Newline);
        framer.push(b"Hel");
        assert!(framer.next().is_none());
        assert_eq!(framer.buffered(), 3);

        framer.push(b"lo\nWor");
        assert_eq!(drain(&mut framer), vec!["Hello"]);
        assert_eq!(framer.buffered(), 3);
    }

    #[test]
    fn test_empty_lines_emitted() {
        let mut framer = LineFramer::new(Delimiter::Newline);
        framer.push(b"\n\nA\n");
        assert_eq!(drain(&mut framer), vec!["", "", "A"]);
    }

    #[test]
    fn test_carriage_return_only() {
        // \n is ordinary data when the delimiter is \r
        let mut framer = LineFramer::new(Delimiter::CarriageReturn);
        framer.push(b"one\rtwo\nthree\r");
        assert_eq!(drain(&mut framer), vec!["one", "two\nthree"]);
    }

    #[test]
    fn test_crlf_keeps_carriage_return() {
        let mut framer = LineFramer::new(Delimiter::Newline);
        framer.push(b"Test\r\n");
        assert_eq!(drain(&mut framer), vec!["Test\r"]);
    }

    #[test]
    fn test_invalid_utf8_is_lossy() {
        let mut framer = LineFramer::new(Delimiter::Newline);
        framer.push(b"a\xffb\n");
        assert_eq!(drain(&mut framer), vec!["a\u{fffd}b"]);
    }

    #[test]
    fn test_overlong_line_discarded_across_chunks() {
        let mut framer = LineFramer::with_max_line_length(Delimiter::Newline, 8);
        framer.push(b"0123456789");
        assert!(framer.next().is_none());
        assert_eq!(framer.buffered(), 0);

        framer.push(b"abc\nok\n");
        assert_eq!(drain(&mut framer), vec!["ok"]);
    }

    #[test]
    fn test_overlong_line_discarded_whole() {
        let mut framer = LineFramer::with_max_line_length(Delimiter::Newline, 4);
        framer.push(b"toolong\nfine\n");
        assert_eq!(drain(&mut framer), vec!["fine"]);
    }

    #[test]
    fn test_reset() {
        let mut framer = LineFramer::new(Delimiter::Newline);
        framer.push(b"stale");
        framer.reset();
        framer.push(b"fresh\n");
        assert_eq!(drain(&mut framer), vec!["fresh"]);
    }

    #[test]
    fn test_delimiter_from_config() {
        assert_eq!(Delimiter::try_from("\r").unwrap(), Delimiter::CarriageReturn);
        assert!(matches!(
            Delimiter::try_from("\r\n"),
            Err(ProtocolError::InvalidDelimiter(_))
        ));

        let d: Delimiter = serde_json::from_str(r#""\n""#).unwrap();
        assert_eq!(d, Delimiter::Newline);
        assert!(serde_json::from_str::<Delimiter>(r#""x""#).is_err());
        assert_eq!(serde_json::to_string(&Delimiter::CarriageReturn).unwrap(), r#""\r""#);
    }
}
