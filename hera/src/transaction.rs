//! The [`Transaction`] type.
use bytes::Bytes;
use std::{
    fmt,
    task::{Context, Poll},
};

use crate::{
    Connection, Result,
    common::{debug, warning},
    error::InvalidTransaction,
    ext::FmtExt,
    netstring::Frame,
    protocol::{
        Reply,
        frontend::{self, FrontendProtocol},
    },
    transport::{HeraTransport, HeraTransportExt},
};

/// A single use transaction handle.
///
/// To begin a transaction, use [`Connection::begin`].
///
/// Either [`commit`][Transaction::commit] or [`rollback`][Transaction::rollback]
/// spends the handle, any further use fails with [`InvalidTransaction`].
/// If dropped while still active, a rollback is sent with the next request
/// on the connection.
///
/// # Example
///
/// ```no_run
/// # async fn app(mut conn: hera::Connection) -> hera::Result<()> {
/// let stmt = conn.prepare("INSERT INTO post(name) VALUES(?)");
/// let mut tx = conn.begin()?;
///
/// hera::query(&stmt, &mut tx).bind("foo").execute().await?;
///
/// tx.commit().await?;
/// # Ok(())
/// # }
/// ```
pub struct Transaction<'c> {
    conn: Option<&'c mut Connection>,
}

impl<'c> Transaction<'c> {
    pub(crate) fn new(conn: &'c mut Connection) -> Self {
        Self { conn: Some(conn) }
    }

    /// Returns `true` if neither commit nor rollback was called.
    pub fn is_active(&self) -> bool {
        self.conn.is_some()
    }

    /// Commit transaction.
    pub async fn commit(&mut self) -> Result<()> {
        self.end(frontend::Commit.into_frame(), "commit").await
    }

    /// Rollback transaction.
    pub async fn rollback(&mut self) -> Result<()> {
        self.end(frontend::Rollback.into_frame(), "rollback").await
    }

    async fn end(&mut self, frame: Frame, _phase: &'static str) -> Result<()> {
        let Some(conn) = self.conn.take() else {
            return Err(InvalidTransaction.into());
        };

        conn.send(&frame);
        conn.flush().await?;

        match conn.recv().await? {
            Reply::Ok(_) => {
                debug!("{} transaction {_phase}", conn.id());
                Ok(())
            }
            reply => Err(TransactionFailed {
                code: reply.code(),
                payload: Bytes::copy_from_slice(reply.payload()),
            }
            .into()),
        }
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        let Some(conn) = self.conn.take() else {
            return;
        };
        if conn.is_closed() {
            return;
        }
        warning!("{} transaction dropped while active, rolling back", conn.id());
        conn.send(&frontend::Rollback.into_frame());
        conn.discard_reply();
    }
}

impl HeraTransport for Transaction<'_> {
    fn poll_flush(&mut self, cx: &mut Context) -> Poll<Result<()>> {
        match self.conn.as_mut() {
            Some(conn) => conn.poll_flush(cx),
            None => Poll::Ready(Err(InvalidTransaction.into())),
        }
    }

    fn poll_recv(&mut self, cx: &mut Context) -> Poll<Result<Reply>> {
        match self.conn.as_mut() {
            Some(conn) => conn.poll_recv(cx),
            None => Poll::Ready(Err(InvalidTransaction.into())),
        }
    }

    fn send(&mut self, frame: &Frame) {
        if let Some(conn) = self.conn.as_mut() {
            conn.send(frame);
        }
    }

    fn take_correlation_id(&mut self) -> Option<Frame> {
        self.conn.as_mut()?.take_correlation_id()
    }

    fn shard_key_payload(&self) -> Bytes {
        match self.conn.as_ref() {
            Some(conn) => conn.session().shard_key_payload().clone(),
            None => Bytes::new(),
        }
    }
}

impl fmt::Debug for Transaction<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transaction")
            .field("active", &self.is_active())
            .finish()
    }
}

/// The proxy did not acknowledge commit or rollback.
pub struct TransactionFailed {
    code: u32,
    payload: Bytes,
}

impl TransactionFailed {
    /// Returns the reply code.
    pub fn code(&self) -> u32 {
        self.code
    }

    /// Returns the reply payload.
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }
}

impl std::error::Error for TransactionFailed { }

impl fmt::Display for TransactionFailed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "transaction failed, code: {}, data: {}", self.code, self.payload.truncated())
    }
}

impl fmt::Debug for TransactionFailed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{self}\"")
    }
}
