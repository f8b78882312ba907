//! Netstring framing.
//!
//! Every message exchanged with the proxy is a netstring frame:
//!
//! ```text
//! <length>:<command>[ <payload>],
//! ```
//!
//! `length` counts the command digits, plus the separating space and the
//! payload when the payload is not empty. A frame with command `0` is a
//! composite frame, its payload is the concatenation of other serialized
//! frames.
//!
//! - [`Frame`]
//! - [`SubFrames`]
//! - [`FrameReader`]
use bytes::{BufMut, Bytes, BytesMut};
use std::{fmt, ops::Range};

use crate::ext::{BufMutExt, DecimalLen, FmtExt};

mod reader;

pub use reader::{FrameReader, ReadError};

/// Command of a composite frame.
pub const SUBCOMMAND: u32 = 0;

const COLON: u8 = b':';
const SPACE: u8 = b' ';
const COMMA: u8 = b',';

/// A single netstring frame.
///
/// Frame is immutable and cheaply cloneable, the payload is a slice of the
/// serialized form.
#[derive(Clone, PartialEq, Eq)]
pub struct Frame {
    cmd: u32,
    payload: Bytes,
    serialized: Bytes,
}

impl Frame {
    /// Encode command and payload into a frame.
    pub fn new(cmd: u32, payload: impl Into<Bytes>) -> Frame {
        let payload: Bytes = payload.into();

        let len = match payload.is_empty() {
            true => cmd.decimal_len(),
            false => cmd.decimal_len() + 1 + payload.len(),
        };

        let mut buf = BytesMut::with_capacity(len.decimal_len() + 1 + len + 1);
        buf.put_decimal(len);
        buf.put_u8(COLON);
        buf.put_decimal(cmd);
        if !payload.is_empty() {
            buf.put_u8(SPACE);
            buf.put_slice(&payload);
        }
        buf.put_u8(COMMA);

        let serialized = buf.freeze();
        let end = serialized.len() - 1;
        let payload = serialized.slice(end - payload.len()..end);

        Frame { cmd, payload, serialized }
    }

    /// Encode a frame without payload.
    pub fn command(cmd: u32) -> Frame {
        Frame::new(cmd, Bytes::new())
    }

    /// Pack frames into one composite frame, preserving order.
    pub fn composite<'a>(frames: impl IntoIterator<Item = &'a Frame>) -> Frame {
        let mut payload = BytesMut::new();
        for frame in frames {
            payload.put_slice(&frame.serialized);
        }
        Frame::new(SUBCOMMAND, payload.freeze())
    }

    /// Decode one frame from the front of `buf`.
    ///
    /// Returns `None` if `buf` does not contain a complete frame yet, in which
    /// case `buf` is left untouched.
    pub fn decode(buf: &mut BytesMut) -> Result<Option<Frame>, FrameError> {
        let Some(header) = Header::parse(buf)? else {
            return Ok(None);
        };
        let serialized = buf.split_to(header.total).freeze();
        Ok(Some(header.into_frame(serialized)))
    }

    /// Same as [`decode`][Frame::decode] for an already frozen buffer.
    pub fn decode_bytes(buf: &mut Bytes) -> Result<Option<Frame>, FrameError> {
        let Some(header) = Header::parse(buf)? else {
            return Ok(None);
        };
        let serialized = buf.split_to(header.total);
        Ok(Some(header.into_frame(serialized)))
    }

    /// Returns the frame command.
    pub const fn cmd(&self) -> u32 {
        self.cmd
    }

    /// Returns the frame payload.
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Returns the exact bytes written to the wire.
    pub fn serialized(&self) -> &Bytes {
        &self.serialized
    }

    /// Returns `true` if this frame embeds other frames.
    pub const fn is_composite(&self) -> bool {
        self.cmd == SUBCOMMAND
    }

    /// Iterate the frames embedded in the payload, in their original order.
    pub fn children(&self) -> SubFrames {
        SubFrames { rest: self.payload.clone() }
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("cmd", &self.cmd)
            .field("payload", &self.payload.truncated())
            .finish()
    }
}

/// An [`Iterator`] over frames embedded in a composite frame.
///
/// Iteration stops after the first error.
#[derive(Debug, Clone)]
pub struct SubFrames {
    rest: Bytes,
}

impl Iterator for SubFrames {
    type Item = Result<Frame, FrameError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.rest.is_empty() {
            return None;
        }
        match Frame::decode_bytes(&mut self.rest) {
            Ok(Some(frame)) => Some(Ok(frame)),
            Ok(None) => {
                self.rest.clear();
                Some(Err(FrameError::Truncated))
            }
            Err(err) => {
                self.rest.clear();
                Some(Err(err))
            }
        }
    }
}

/// Location of a complete frame within a buffer.
struct Header {
    cmd: u32,
    payload: Range<usize>,
    total: usize,
}

impl Header {
    fn parse(buf: &[u8]) -> Result<Option<Header>, FrameError> {
        let mut len = 0usize;
        let mut colon = 0;

        loop {
            match buf.get(colon) {
                None => return Ok(None),
                Some(&COLON) => break,
                Some(b @ b'0'..=b'9') => {
                    len = len
                        .checked_mul(10)
                        .and_then(|len| len.checked_add((b - b'0') as usize))
                        .ok_or(FrameError::MalformedLength)?;
                    colon += 1;
                }
                Some(_) => return Err(FrameError::MalformedLength),
            }
        }

        if colon == 0 {
            return Err(FrameError::MalformedLength);
        }

        let body = colon + 1;
        let total = body
            .checked_add(len)
            .and_then(|e| e.checked_add(1))
            .ok_or(FrameError::MalformedLength)?;

        if buf.len() < total {
            return Ok(None);
        }

        if buf[total - 1] != COMMA {
            return Err(FrameError::MissingTerminator);
        }

        let end = total - 1;
        let mut cmd = 0u32;
        let mut next = body;

        while next < end && buf[next] != SPACE {
            let b = buf[next];
            if !b.is_ascii_digit() {
                return Err(FrameError::MalformedCommand);
            }
            cmd = cmd
                .checked_mul(10)
                .and_then(|cmd| cmd.checked_add((b - b'0') as u32))
                .ok_or(FrameError::MalformedCommand)?;
            next += 1;
        }

        if next == body {
            return Err(FrameError::MalformedCommand);
        }

        // skip the separator
        if next < end {
            next += 1;
        }

        Ok(Some(Header { cmd, payload: next..end, total }))
    }

    fn into_frame(self, serialized: Bytes) -> Frame {
        Frame {
            cmd: self.cmd,
            payload: serialized.slice(self.payload),
            serialized,
        }
    }
}

/// An error when decoding a frame.
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum FrameError {
    /// A non digit appears before the length delimiter.
    MalformedLength,
    /// A non digit appears in the command.
    MalformedCommand,
    /// The declared length does not end at the trailing delimiter.
    MissingTerminator,
    /// A composite payload ends in the middle of an embedded frame.
    Truncated,
}

impl std::error::Error for FrameError { }

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MalformedLength => f.write_str("expected digit reading length"),
            Self::MalformedCommand => f.write_str("expected digit reading command"),
            Self::MissingTerminator => f.write_str("frame is not terminated by a comma"),
            Self::Truncated => f.write_str("embedded frame is incomplete"),
        }
    }
}

impl fmt::Debug for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{self}\"")
    }
}
