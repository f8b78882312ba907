//! Hera protocol.
//!
//! Requests are sent as [`frontend`] messages, replies are received as
//! [`backend::Reply`]. Both travel as [`Frame`][crate::netstring::Frame].
pub mod frontend;
pub mod backend;
mod error;

pub use frontend::{Command, FrontendProtocol};
pub use backend::Reply;
pub use error::{InternalError, ProtocolError, SqlError};
