//! Hera frontend commands.
use bytes::{BufMut, Bytes, BytesMut};

use crate::{ext::BufMutExt, netstring::Frame};

/// Request command identifier.
#[repr(u32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    /// Embeds other commands.
    SubCommand = 0,
    BindName = 2,
    BindValue = 3,
    Execute = 4,
    Fetch = 7,
    Commit = 8,
    Rollback = 9,
    ClientInfo = 11,
    /// Prepare with `:name` placeholders.
    PrepareV2 = 25,
    ShardKey = 27,
    GetNumShards = 28,
    SetShardId = 29,
    ClientCorrelationId = 2006,
}

impl Command {
    pub const fn code(self) -> u32 {
        self as u32
    }
}

/// A type which can be encoded into a frontend frame.
pub trait FrontendProtocol: Sized {
    /// The command identifier.
    const COMMAND: Command;

    /// Returns the frame payload, which may be empty.
    fn payload(self) -> Bytes;

    /// Encode self as a frame.
    fn into_frame(self) -> Frame {
        Frame::new(Self::COMMAND.code(), self.payload())
    }
}

macro_rules! empty {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug)]
        pub struct $name;

        impl FrontendProtocol for $name {
            const COMMAND: Command = Command::$name;

            fn payload(self) -> Bytes {
                Bytes::new()
            }
        }
    };
}

macro_rules! bytes {
    ($(#[$meta:meta])* $name:ident, $field:ident) => {
        $(#[$meta])*
        #[derive(Debug)]
        pub struct $name {
            pub $field: Bytes,
        }

        impl FrontendProtocol for $name {
            const COMMAND: Command = Command::$name;

            fn payload(self) -> Bytes {
                self.$field
            }
        }
    };
}

empty! {
    /// Execute the prepared statement with the bound values.
    Execute
}

empty! {
    /// Commit the current transaction.
    Commit
}

empty! {
    /// Rollback the current transaction.
    Rollback
}

empty! {
    /// Request the number of shards.
    GetNumShards
}

bytes! {
    /// Name of the next bound parameter, without the leading colon.
    BindName, name
}

bytes! {
    /// Value of the previously named parameter.
    BindValue, value
}

bytes! {
    /// Shard routing payload, e.g. `account_id=123`.
    ShardKey, payload
}

bytes! {
    /// Request a page of rows, the size is decimal ascii where `0` means all.
    Fetch, size
}

bytes! {
    /// Client identity announcement.
    ClientInfo, info
}

/// Prepare a statement.
#[derive(Debug)]
pub struct Prepare<'a> {
    /// Sql with `:name` placeholders.
    pub sql: &'a str,
}

impl FrontendProtocol for Prepare<'_> {
    const COMMAND: Command = Command::PrepareV2;

    fn payload(self) -> Bytes {
        Bytes::copy_from_slice(self.sql.as_bytes())
    }
}

/// Route subsequent statements to a shard, `-1` resets the routing.
#[derive(Debug)]
pub struct SetShardId {
    pub shard: i32,
}

impl FrontendProtocol for SetShardId {
    const COMMAND: Command = Command::SetShardId;

    fn payload(self) -> Bytes {
        let mut buf = BytesMut::with_capacity(11);
        buf.put_decimal(self.shard);
        buf.freeze()
    }
}

/// Correlation id, attached to the next statement.
#[derive(Debug)]
pub struct CorrelationId<'a> {
    pub id: &'a str,
}

impl CorrelationId<'_> {
    /// Payload sent when no correlation id was set.
    pub const UNSET: &'static str = "NotSet";
}

impl FrontendProtocol for CorrelationId<'_> {
    const COMMAND: Command = Command::ClientCorrelationId;

    fn payload(self) -> Bytes {
        let mut buf = BytesMut::with_capacity(7 + self.id.len());
        buf.put_slice(b"CorrId=");
        buf.put_slice(self.id.as_bytes());
        buf.freeze()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_frames() {
        assert_eq!(&Execute.into_frame().serialized()[..], b"1:4,");
        assert_eq!(&SetShardId { shard: -1 }.into_frame().serialized()[..], b"5:29 -1,");
        assert_eq!(
            &CorrelationId { id: CorrelationId::UNSET }.into_frame().serialized()[..],
            b"18:2006 CorrId=NotSet,"
        );
        assert_eq!(
            &Prepare { sql: "select 1" }.into_frame().serialized()[..],
            b"11:25 select 1,"
        );
    }

    #[test]
    fn test_command_codes() {
        assert_eq!(Command::SubCommand.code(), 0);
        assert_eq!(Commit.into_frame().cmd(), 8);
        assert_eq!(Rollback.into_frame().cmd(), 9);
        assert_eq!(GetNumShards.into_frame().cmd(), 28);
        assert_eq!(ShardKey { payload: Bytes::from_static(b"id=1") }.into_frame().cmd(), 27);
        assert_eq!(Command::ClientCorrelationId.code(), 2006);
    }
}
