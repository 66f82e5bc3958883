//! Delimiter framing.
//!
//! Every message on the wire is terminated by a single delimiter character.
//! The tail after the last delimiter is never a complete message: it is kept
//! as residue and prefixed to the next read.

use bytes::{Buf, Bytes, BytesMut};
use memchr::memmem;

use crate::error::{ErrorCode, IpcError, Result};

/// Default delimiter: form feed.
pub const DEFAULT_DELIMITER: char = '\u{000C}';

/// Output of [`split`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Chunks {
    /// Complete messages, delimiter stripped, in arrival order.
    pub chunks: Vec<String>,
    /// Unterminated tail.
    pub residue: String,
}

/// Split `data` on every occurrence of `delimiter`.
///
/// With no delimiter present the whole input is returned as residue.
pub fn split(data: &str, delimiter: char) -> Chunks {
    let mut parts: Vec<&str> = data.split(delimiter).collect();
    // `str::split` always yields at least one item: the tail.
    let residue = parts.pop().unwrap_or_default().to_owned();
    Chunks {
        chunks: parts.into_iter().map(str::to_owned).collect(),
        residue,
    }
}

/// A validated single-character delimiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delimiter {
    ch: char,
    utf8: [u8; 4],
    len: usize,
}

impl Delimiter {
    pub fn new(ch: char) -> Self {
        let mut utf8 = [0u8; 4];
        let len = ch.encode_utf8(&mut utf8).len();
        Self { ch, utf8, len }
    }

    /// Parse a configured delimiter; it must be exactly one character.
    pub fn parse(s: &str) -> Result<Self> {
        let mut chars = s.chars();
        match (chars.next(), chars.next()) {
            (None, _) => Err(IpcError::usage(
                ErrorCode::InvalidDelimiter,
                "delimiter must be a non-empty string",
            )),
            (Some(ch), None) => Ok(Self::new(ch)),
            (Some(_), Some(_)) => Err(IpcError::usage(
                ErrorCode::InvalidDelimiterNotChar,
                format!("delimiter must be a single character, got {s:?}"),
            )),
        }
    }

    pub fn as_char(&self) -> char {
        self.ch
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.utf8[..self.len]
    }
}

impl Default for Delimiter {
    fn default() -> Self {
        Self::new(DEFAULT_DELIMITER)
    }
}

/// Per-connection receive buffer.
///
/// Splitting operates on raw bytes: UTF-8 is self-synchronizing, so the
/// encoded delimiter can never match inside another character, and a
/// multi-byte character cut by a read boundary simply waits in the residue.
#[derive(Debug)]
pub struct FrameBuffer {
    delimiter: Delimiter,
    buf: BytesMut,
    /// Prefix of `buf` already known to hold no delimiter.
    scanned: usize,
}

impl FrameBuffer {
    pub fn new(delimiter: Delimiter) -> Self {
        Self {
            delimiter,
            buf: BytesMut::with_capacity(4096),
            scanned: 0,
        }
    }

    /// Append received bytes.
    pub fn extend(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Mutable access for reads straight into the buffer.
    pub fn buf_mut(&mut self) -> &mut BytesMut {
        &mut self.buf
    }

    /// Remove and return every complete message; the residue stays buffered.
    ///
    /// Only bytes appended since the last call are searched, so a message
    /// arriving in many small reads is scanned once overall.
    pub fn drain_frames(&mut self) -> Vec<Bytes> {
        let delimiter = self.delimiter;
        let delim = delimiter.as_bytes();
        let finder = memmem::Finder::new(delim);
        let mut frames = Vec::new();

        loop {
            // Back off so a delimiter cut by the previous read is still found.
            let start = self.scanned.min(self.buf.len()).saturating_sub(delim.len() - 1);
            let Some(offset) = finder.find(&self.buf[start..]) else {
                self.scanned = self.buf.len();
                break;
            };
            let frame = self.buf.split_to(start + offset).freeze();
            self.buf.advance(delim.len());
            self.scanned = 0;
            frames.push(frame);
        }
        frames
    }

    /// Bytes waiting for a delimiter.
    pub fn residue(&self) -> &[u8] {
        &self.buf
    }
}
