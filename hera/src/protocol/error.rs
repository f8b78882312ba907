use bytes::Bytes;
use std::fmt;

use super::Reply;
use crate::ext::FmtExt;

/// The proxy sent a reply that is not valid at the current phase.
pub struct ProtocolError {
    code: u32,
    payload: Bytes,
    phase: &'static str,
}

impl ProtocolError {
    pub(crate) fn unexpected(reply: Reply, phase: &'static str) -> Self {
        let payload = Bytes::copy_from_slice(reply.payload());
        Self { code: reply.code(), payload, phase }
    }

    /// A reply with the right code but an unparsable payload.
    pub(crate) fn invalid(code: u32, payload: Bytes, phase: &'static str) -> Self {
        Self { code, payload, phase }
    }

    /// Returns the offending reply code.
    pub fn code(&self) -> u32 {
        self.code
    }

    /// Returns the offending reply payload.
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }
}

impl std::error::Error for ProtocolError { }

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unexpected reply in {}, code: {}, data: {}",
            self.phase,
            self.code,
            self.payload.truncated()
        )
    }
}

impl fmt::Debug for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{self}\"")
    }
}

macro_rules! message_error {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        pub struct $name {
            message: String,
        }

        impl $name {
            pub(crate) fn new(payload: &[u8]) -> Self {
                Self { message: String::from_utf8_lossy(payload).into_owned() }
            }

            /// Returns the message sent by the proxy.
            pub fn message(&self) -> &str {
                &self.message
            }
        }

        impl std::error::Error for $name { }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, ": {}"), self.message)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "\"{self}\"")
            }
        }
    };
}

message_error! {
    /// The database rejected the statement.
    SqlError, "SQL error"
}

message_error! {
    /// The proxy reported an internal failure.
    InternalError, "internal hera error"
}
