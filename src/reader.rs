//! Incremental line scanning over a growing file.

use crate::channel::CancellableSender;
use crate::error::{Error, Result};
use std::borrow::Cow;
use std::fmt;
use tokio::io::{AsyncRead, AsyncReadExt};

/// One line of the tailed file, without its `\n` or `\r\n` terminator.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Line(Vec<u8>);

impl Line {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    /// Decodes the line, replacing invalid UTF-8 sequences.
    pub fn to_string_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.0)
    }

    /// Decodes the line, failing on invalid UTF-8.
    pub fn into_string(self) -> Result<String> {
        Ok(String::from_utf8(self.0)?)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<u8>> for Line {
    fn from(bytes: Vec<u8>) -> Self {
        Line(bytes)
    }
}

impl From<&[u8]> for Line {
    fn from(bytes: &[u8]) -> Self {
        Line(bytes.to_vec())
    }
}

impl From<&str> for Line {
    fn from(s: &str) -> Self {
        Line(s.as_bytes().to_vec())
    }
}

impl PartialEq<str> for Line {
    fn eq(&self, other: &str) -> bool {
        self.0 == other.as_bytes()
    }
}

impl PartialEq<&str> for Line {
    fn eq(&self, other: &&str) -> bool {
        self.0 == other.as_bytes()
    }
}

impl fmt::Display for Line {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_string_lossy())
    }
}

impl fmt::Debug for Line {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Line({:?})", self.to_string_lossy())
    }
}

/// How a scan ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Scan {
    /// The reader reported end of data; more may arrive later.
    Drained,
    /// The session was cancelled while a line was being delivered.
    Cancelled,
}

/// Turns a byte stream into lines, keeping the unterminated tail between calls.
///
/// `buf[..len]` always holds the bytes read but not yet emitted as a line.
/// The buffer only grows, doubling whenever it is full.
#[derive(Debug)]
pub(crate) struct LineScanner {
    buf: Vec<u8>,
    len: usize,
}

impl LineScanner {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: vec![0; capacity.max(1)],
            len: 0,
        }
    }

    /// Reads until `reader` reports end of data, delivering every complete line.
    pub(crate) async fn scan<R>(
        &mut self,
        reader: &mut R,
        lines: &CancellableSender<Line>,
    ) -> Result<Scan>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        loop {
            if self.len == self.buf.len() {
                self.grow();
            }

            let scanned = self.len;
            let n = match reader.read(&mut self.buf[scanned..]).await {
                Ok(0) => return Ok(Scan::Drained),
                Ok(n) => n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(Error::Read(e)),
            };
            self.len += n;

            let mut line_start = 0;
            for i in scanned..self.len {
                if self.buf[i] != b'\n' {
                    continue;
                }
                let end = if i > line_start && self.buf[i - 1] == b'\r' {
                    i - 1
                } else {
                    i
                };
                let line = Line::from(&self.buf[line_start..end]);
                line_start = i + 1;
                if !lines.send(line).await {
                    return Ok(Scan::Cancelled);
                }
            }

            if line_start > 0 {
                self.buf.copy_within(line_start..self.len, 0);
                self.len -= line_start;
            }
        }
    }

    /// Removes the unterminated remainder, if any, as a line of its own.
    pub(crate) fn take_partial(&mut self) -> Option<Line> {
        if self.len == 0 {
            return None;
        }
        let line = Line::from(&self.buf[..self.len]);
        self.len = 0;
        Some(line)
    }

    #[cfg(test)]
    pub(crate) fn pending(&self) -> usize {
        self.len
    }

    #[cfg(test)]
    pub(crate) fn capacity(&self) -> usize {
        self.buf.len()
    }

    fn grow(&mut self) {
        let capacity = self.buf.len() * 2;
        self.buf.resize(capacity, 0);
    }
}
