//! Hera backend replies.
use bytes::Bytes;

use crate::netstring::Frame;

/// Reply code of `SqlError`.
pub const SQL_ERROR: u32 = 1;
/// Reply code of `Error`.
pub const ERROR: u32 = 2;
/// Reply code of `Value`.
pub const VALUE: u32 = 3;
/// Reply code of `Hello`.
pub const HELLO: u32 = 4;
/// Reply code of `Ok`.
pub const OK: u32 = 5;
/// Reply code of `NoMoreData`.
pub const NO_MORE_DATA: u32 = 6;
/// Reply code of `StillExecuting`.
pub const STILL_EXECUTING: u32 = 7;

/// A reply from the proxy.
///
/// `Value` carries column count, row count or a column value depending on
/// its position in the reply sequence.
#[derive(Debug, Clone)]
pub enum Reply {
    /// The database rejected the statement, payload is the message.
    SqlError(Bytes),
    /// The proxy failed internally, payload is the message.
    Error(Bytes),
    Value(Bytes),
    Hello(Bytes),
    Ok(Bytes),
    NoMoreData(Bytes),
    /// The proxy is still working, keep reading.
    StillExecuting,
    /// Reply code unknown to this client.
    Unknown(Frame),
}

impl Reply {
    /// Returns the reply code.
    pub fn code(&self) -> u32 {
        match self {
            Self::SqlError(_) => SQL_ERROR,
            Self::Error(_) => ERROR,
            Self::Value(_) => VALUE,
            Self::Hello(_) => HELLO,
            Self::Ok(_) => OK,
            Self::NoMoreData(_) => NO_MORE_DATA,
            Self::StillExecuting => STILL_EXECUTING,
            Self::Unknown(frame) => frame.cmd(),
        }
    }

    /// Returns the reply payload.
    pub fn payload(&self) -> &[u8] {
        match self {
            Self::SqlError(b)
            | Self::Error(b)
            | Self::Value(b)
            | Self::Hello(b)
            | Self::Ok(b)
            | Self::NoMoreData(b) => &b[..],
            Self::StillExecuting => &[],
            Self::Unknown(frame) => &frame.payload()[..],
        }
    }
}

impl From<Frame> for Reply {
    fn from(frame: Frame) -> Self {
        match frame.cmd() {
            SQL_ERROR => Self::SqlError(frame.payload().clone()),
            ERROR => Self::Error(frame.payload().clone()),
            VALUE => Self::Value(frame.payload().clone()),
            HELLO => Self::Hello(frame.payload().clone()),
            OK => Self::Ok(frame.payload().clone()),
            NO_MORE_DATA => Self::NoMoreData(frame.payload().clone()),
            STILL_EXECUTING => Self::StillExecuting,
            _ => Self::Unknown(frame),
        }
    }
}
