//! Server paginated row cursor.
use bytes::Bytes;
use futures_core::Stream;
use std::{
    fmt,
    future::poll_fn,
    pin::Pin,
    task::{Context, Poll, ready},
};

use crate::{
    Result, Row,
    common::verbose,
    error::NotImplemented,
    protocol::{
        ProtocolError, Reply,
        frontend::{self, FrontendProtocol},
    },
    transport::HeraTransport,
};

/// A cursor over rows of a query.
///
/// Only one page of values is buffered, when it is consumed the next page
/// is requested with the statement fetch size.
///
/// The cursor must be read until the end, otherwise remaining replies
/// will disturb subsequent requests on the same connection.
pub struct Rows<IO> {
    io: IO,
    columns: usize,
    values: Vec<Bytes>,
    position: usize,
    exhausted: bool,
    fetch_size: Bytes,
    phase: Phase,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Ready,
    Load,
}

impl<IO: HeraTransport> Rows<IO> {
    pub(crate) fn new(io: IO, columns: usize, fetch_size: Bytes) -> Self {
        Self {
            io,
            columns,
            values: Vec::new(),
            position: 0,
            exhausted: false,
            fetch_size,
            phase: Phase::Ready,
        }
    }

    /// Receive values until the page is complete.
    pub(crate) async fn load_page(&mut self) -> Result<()> {
        poll_fn(|cx| self.poll_load_page(cx)).await
    }

    fn poll_load_page(&mut self, cx: &mut Context) -> Poll<Result<()>> {
        loop {
            match ready!(self.io.poll_recv(cx)) {
                Ok(Reply::Value(value)) => self.values.push(value),
                Ok(Reply::Ok(_)) => break,
                Ok(Reply::NoMoreData(_)) => {
                    self.exhausted = true;
                    break;
                }
                Ok(
                    reply @ (Reply::SqlError(_)
                    | Reply::Error(_)
                    | Reply::Hello(_)
                    | Reply::StillExecuting
                    | Reply::Unknown(_)),
                ) => {
                    self.suspend();
                    return Poll::Ready(Err(ProtocolError::unexpected(reply, "fetch").into()));
                }
                Err(err) => {
                    self.suspend();
                    return Poll::Ready(Err(err));
                }
            }
        }

        verbose!(columns = self.columns, values = self.values.len(), exhausted = self.exhausted, "page loaded");
        Poll::Ready(Ok(()))
    }

    /// Stop yielding rows after a failure.
    fn suspend(&mut self) {
        self.exhausted = true;
        self.values.clear();
        self.position = 0;
        self.phase = Phase::Ready;
    }

    fn is_page_consumed(&self) -> bool {
        self.position * self.columns == self.values.len()
    }

    /// Poll for the next row, `None` signals the end of data.
    pub fn poll_next_row(&mut self, cx: &mut Context) -> Poll<Result<Option<Row>>> {
        if self.columns == 0 {
            return Poll::Ready(Ok(None));
        }

        loop {
            match self.phase {
                Phase::Ready if self.is_page_consumed() => {
                    if self.exhausted {
                        return Poll::Ready(Ok(None));
                    }
                    self.io.send(&frontend::Fetch { size: self.fetch_size.clone() }.into_frame());
                    self.values.clear();
                    self.position = 0;
                    self.phase = Phase::Load;
                }
                Phase::Ready => {
                    let start = self.position * self.columns;
                    let end = start + self.columns;
                    if end > self.values.len() {
                        return Poll::Ready(Err(CursorUnderflow {
                            available: self.values.len() - start,
                            columns: self.columns,
                        }
                        .into()));
                    }
                    self.position += 1;
                    return Poll::Ready(Ok(Some(Row::new(self.values[start..end].to_vec()))));
                }
                Phase::Load => {
                    ready!(self.poll_load_page(cx))?;
                    self.phase = Phase::Ready;
                    if self.values.is_empty() {
                        self.exhausted = true;
                        return Poll::Ready(Ok(None));
                    }
                }
            }
        }
    }

    /// Returns the next row, `None` signals the end of data.
    pub async fn next_row(&mut self) -> Result<Option<Row>> {
        poll_fn(|cx| self.poll_next_row(cx)).await
    }

    /// Copy the next row values into `dest`.
    ///
    /// Returns `false` at the end of data. A `dest` shorter than the column
    /// count fails without advancing the cursor.
    pub async fn next_into(&mut self, dest: &mut [Bytes]) -> Result<bool> {
        if dest.len() < self.columns {
            return Err(CursorUnderflow { available: dest.len(), columns: self.columns }.into());
        }
        let Some(row) = self.next_row().await? else {
            return Ok(false);
        };
        for (dest, value) in dest.iter_mut().zip(row.into_values()) {
            *dest = value;
        }
        Ok(true)
    }
}

impl<IO> Rows<IO> {
    /// Returns the number of columns.
    pub fn column_count(&self) -> usize {
        self.columns
    }

    /// Returns empty names for each column.
    ///
    /// The proxy does not send column names in this protocol version.
    pub fn column_names(&self) -> Vec<String> {
        vec![String::new(); self.columns]
    }

    /// Returns `true` if the proxy signaled that no more pages exist.
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Cursor close is not supported by the proxy.
    pub fn close(self) -> Result<()> {
        Err(NotImplemented("rows close").into())
    }
}

impl<IO: HeraTransport> Stream for Rows<IO> {
    type Item = Result<Row>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().poll_next_row(cx).map(Result::transpose)
    }
}

impl<IO> fmt::Debug for Rows<IO> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rows")
            .field("columns", &self.columns)
            .field("buffered", &self.values.len())
            .field("position", &self.position)
            .field("exhausted", &self.exhausted)
            .finish()
    }
}

/// A page holds fewer values than a row requires.
pub struct CursorUnderflow {
    available: usize,
    columns: usize,
}

impl CursorUnderflow {
    /// Returns the number of values available.
    pub fn available(&self) -> usize {
        self.available
    }

    /// Returns the number of values required.
    pub fn columns(&self) -> usize {
        self.columns
    }
}

impl std::error::Error for CursorUnderflow { }

impl fmt::Display for CursorUnderflow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cursor underflow, {} values available for {} columns", self.available, self.columns)
    }
}

impl fmt::Debug for CursorUnderflow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{self}\"")
    }
}
