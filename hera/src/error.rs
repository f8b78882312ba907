//! `hera` error types.
use std::{backtrace::Backtrace, fmt, io};

use crate::{
    common::unit_error,
    connection::{Canceled, ClientInfoError, ParseError},
    netstring::FrameError,
    protocol::{InternalError, ProtocolError, SqlError},
    query::StillExecutingExceeded,
    row::DecodeError,
    rows::CursorUnderflow,
    transaction::TransactionFailed,
    value::UnsupportedParameterType,
};

/// A specialized [`Result`] type for `hera` operation.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// All possible error from `hera` library.
pub struct Error {
    context: String,
    backtrace: Backtrace,
    kind: ErrorKind,
}

impl Error {
    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    pub fn backtrace(&self) -> &Backtrace {
        &self.backtrace
    }

    pub(crate) fn context(mut self, context: impl Into<String>) -> Self {
        self.context = context.into();
        self
    }

    /// Returns `true` if the connection must not be used after this error.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self.kind,
            ErrorKind::Frame(_)
                | ErrorKind::TransportRead(_)
                | ErrorKind::TransportWrite(_)
                | ErrorKind::Protocol(_)
                | ErrorKind::Canceled(_)
                | ErrorKind::Closed(_)
                | ErrorKind::StillExecuting(_)
        )
    }
}

/// All possible error kind from `hera` library.
pub enum ErrorKind {
    Config(ParseError),
    Io(io::Error),
    Frame(FrameError),
    TransportRead(TransportRead),
    TransportWrite(TransportWrite),
    Protocol(ProtocolError),
    Sql(SqlError),
    Internal(InternalError),
    UnsupportedParameter(UnsupportedParameterType),
    InvalidTransaction(InvalidTransaction),
    TransactionFailed(TransactionFailed),
    CursorUnderflow(CursorUnderflow),
    NotImplemented(NotImplemented),
    Canceled(Canceled),
    Closed(Closed),
    ClientInfo(ClientInfoError),
    StillExecuting(StillExecutingExceeded),
    Decode(DecodeError),
}

unit_error! {
    /// Failed to receive a complete frame.
    ///
    /// The underlying cause is logged, not exposed.
    pub struct TransportRead("failed to read response");
}

unit_error! {
    /// Failed to write a frame.
    pub struct TransportWrite("failed to send request");
}

unit_error! {
    /// The transaction was already committed or rolled back.
    pub struct InvalidTransaction("transaction already finished");
}

unit_error! {
    /// The connection was closed.
    pub struct Closed("connection closed");
}

/// An operation this protocol version does not support.
pub struct NotImplemented(pub(crate) &'static str);

impl std::error::Error for NotImplemented { }

impl fmt::Display for NotImplemented {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} is not implemented", self.0)
    }
}

impl fmt::Debug for NotImplemented {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{self}\"")
    }
}

macro_rules! from {
    (<$ty:ty>$pat:pat => $body:expr) => {
        impl From<$ty> for Error {
            fn from($pat: $ty) -> Self {
                let backtrace = std::backtrace::Backtrace::capture();
                Self { context: String::new(), backtrace, kind: $body }
            }
        }
    };
}

from!(<ErrorKind>e => e);
from!(<ParseError>e => ErrorKind::Config(e));
from!(<io::Error>e => ErrorKind::Io(e));
from!(<FrameError>e => ErrorKind::Frame(e));
from!(<TransportRead>e => ErrorKind::TransportRead(e));
from!(<TransportWrite>e => ErrorKind::TransportWrite(e));
from!(<ProtocolError>e => ErrorKind::Protocol(e));
from!(<SqlError>e => ErrorKind::Sql(e));
from!(<InternalError>e => ErrorKind::Internal(e));
from!(<UnsupportedParameterType>e => ErrorKind::UnsupportedParameter(e));
from!(<InvalidTransaction>e => ErrorKind::InvalidTransaction(e));
from!(<TransactionFailed>e => ErrorKind::TransactionFailed(e));
from!(<CursorUnderflow>e => ErrorKind::CursorUnderflow(e));
from!(<NotImplemented>e => ErrorKind::NotImplemented(e));
from!(<Canceled>e => ErrorKind::Canceled(e));
from!(<Closed>e => ErrorKind::Closed(e));
from!(<ClientInfoError>e => ErrorKind::ClientInfo(e));
from!(<StillExecutingExceeded>e => ErrorKind::StillExecuting(e));
from!(<DecodeError>e => ErrorKind::Decode(e));

impl std::error::Error for Error { }

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.context.is_empty() {
            write!(f, "{}: ", self.context)?;
        }

        fmt::Display::fmt(&self.kind, f)?;

        if let std::backtrace::BacktraceStatus::Captured = self.backtrace.status() {
            let mut backtrace = self.backtrace.to_string();
            write!(f, "\n\n")?;
            writeln!(f, "Stack backtrace:")?;
            backtrace.truncate(backtrace.trim_end().len());
            write!(f, "{}", backtrace)?;
        }

        Ok(())
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{self}\"")
    }
}

impl std::error::Error for ErrorKind { }

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(e) => e.fmt(f),
            Self::Io(e) => e.fmt(f),
            Self::Frame(e) => e.fmt(f),
            Self::TransportRead(e) => e.fmt(f),
            Self::TransportWrite(e) => e.fmt(f),
            Self::Protocol(e) => e.fmt(f),
            Self::Sql(e) => e.fmt(f),
            Self::Internal(e) => e.fmt(f),
            Self::UnsupportedParameter(e) => e.fmt(f),
            Self::InvalidTransaction(e) => e.fmt(f),
            Self::TransactionFailed(e) => e.fmt(f),
            Self::CursorUnderflow(e) => e.fmt(f),
            Self::NotImplemented(e) => e.fmt(f),
            Self::Canceled(e) => e.fmt(f),
            Self::Closed(e) => e.fmt(f),
            Self::ClientInfo(e) => e.fmt(f),
            Self::StillExecuting(e) => e.fmt(f),
            Self::Decode(e) => e.fmt(f),
        }
    }
}

impl fmt::Debug for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{self}\"")
    }
}
