//! Query API types.
use bytes::Bytes;
use std::{fmt, mem, str::FromStr, time::Duration};

#[cfg(feature = "verbose")]
use crate::ext::FmtExt;
use crate::{
    FromRow, Result,
    common::{debug, info, verbose},
    netstring::Frame,
    protocol::{
        InternalError, ProtocolError, Reply, SqlError, backend,
        frontend::{self, FrontendProtocol},
    },
    rows::Rows,
    statement::Statement,
    transport::{HeraTransport, HeraTransportExt},
    value::{Param, Value},
};

/// Entrypoint of the query API.
///
/// `io` can be a [`Connection`][crate::Connection] or a
/// [`Transaction`][crate::transaction::Transaction].
///
/// # Example
///
/// ```no_run
/// # async fn app(mut conn: hera::Connection) -> hera::Result<()> {
/// let stmt = conn.prepare("UPDATE post SET name = ? WHERE id = ?");
/// let res = hera::query(&stmt, &mut conn)
///     .bind("foo")
///     .bind(42)
///     .execute()
///     .await?;
///
/// assert_eq!(res.rows_affected, 1);
/// # Ok(())
/// # }
/// ```
pub fn query<IO: HeraTransport>(stmt: &Statement, io: IO) -> Query<'_, IO> {
    Query { stmt, io, params: Vec::new() }
}

/// The query API.
#[derive(Debug)]
#[must_use = "query does nothing unless executed or fetched"]
pub struct Query<'s, IO> {
    stmt: &'s Statement,
    io: IO,
    params: Vec<Param>,
}

impl<IO> Query<'_, IO> {
    /// Bind positional parameter, named `p<N>` where `N` is its 1-based position.
    pub fn bind(mut self, value: impl Into<Value>) -> Self {
        self.params.push(Param::positional(value));
        self
    }

    /// Bind named parameter.
    pub fn bind_named(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.push(Param::named(name, value));
        self
    }

    /// Bind prebuilt parameter.
    pub fn bind_param(mut self, param: Param) -> Self {
        self.params.push(param);
        self
    }
}

impl<IO: HeraTransport> Query<'_, IO> {
    /// Pack the whole command sequence into one composite frame.
    ///
    /// Parameters are encoded before any session state is consumed.
    fn build(&mut self, fetch: bool) -> Result<()> {
        let mut binds = Vec::with_capacity(self.params.len());
        let mut buf = itoa::Buffer::new();

        for (i, param) in mem::take(&mut self.params).into_iter().enumerate() {
            let position = i + 1;
            let value = param.value.encode(position)?;
            let name = match param.name {
                Some(name) => name.into_bytes(),
                None => {
                    let mut name = String::with_capacity(4);
                    name.push('p');
                    name.push_str(buf.format(position));
                    Bytes::from(name)
                }
            };
            verbose!(name = %name.lossy(), value = %value.truncated(), "bind");
            binds.push((name, value));
        }

        let mut frames = Vec::with_capacity(binds.len() * 2 + 5);

        if let Some(correlation) = self.io.take_correlation_id() {
            frames.push(correlation);
        }

        frames.push(frontend::Prepare { sql: self.stmt.sql() }.into_frame());

        for (name, value) in binds {
            frames.push(frontend::BindName { name }.into_frame());
            frames.push(frontend::BindValue { value }.into_frame());
        }

        let shard_key = self.io.shard_key_payload();
        if !shard_key.is_empty() {
            frames.push(frontend::ShardKey { payload: shard_key }.into_frame());
        }

        frames.push(frontend::Execute.into_frame());

        if fetch {
            frames.push(frontend::Fetch { size: self.stmt.fetch_size().clone() }.into_frame());
        }

        self.io.send(&Frame::composite(&frames));
        Ok(())
    }

    /// Execute statement and return number of rows affected.
    pub async fn execute(mut self) -> Result<RowResult> {
        verbose!(sql = self.stmt.sql(), "execute");
        self.build(false)?;
        self.io.flush().await?;

        match self.io.recv().await? {
            // column count, irrelevant for dml
            Reply::Value(_) => {}
            Reply::SqlError(msg) => return Err(SqlError::new(&msg).into()),
            Reply::Error(msg) => return Err(InternalError::new(&msg).into()),
            reply @ (Reply::Hello(_)
            | Reply::Ok(_)
            | Reply::NoMoreData(_)
            | Reply::StillExecuting
            | Reply::Unknown(_)) => return Err(ProtocolError::unexpected(reply, "execute").into()),
        }

        let rows_affected = match self.io.recv().await? {
            Reply::Value(rows) => parse_decimal(backend::VALUE, &rows, "execute row count")?,
            reply @ (Reply::SqlError(_)
            | Reply::Error(_)
            | Reply::Hello(_)
            | Reply::Ok(_)
            | Reply::NoMoreData(_)
            | Reply::StillExecuting
            | Reply::Unknown(_)) => return Err(ProtocolError::unexpected(reply, "execute row count").into()),
        };

        debug!("dml successful, rows affected: {rows_affected}");
        Ok(RowResult { rows_affected })
    }

    /// Execute statement and return a cursor over its rows.
    ///
    /// The first page is loaded before returning.
    pub async fn fetch(mut self) -> Result<Rows<IO>> {
        verbose!(sql = self.stmt.sql(), "fetch");
        self.build(true)?;
        self.io.flush().await?;

        let policy = self.stmt.still_executing();
        let mut polls = 0u32;

        let columns = loop {
            match self.io.recv().await? {
                Reply::Value(columns) => break parse_decimal::<usize>(backend::VALUE, &columns, "query columns")?,
                Reply::StillExecuting => {
                    polls += 1;
                    info!("still executing, poll {polls}");
                    if policy.max_polls.is_some_and(|max| polls > max) {
                        return Err(StillExecutingExceeded { polls }.into());
                    }
                    if let Some(backoff) = policy.backoff {
                        tokio::time::sleep(backoff).await;
                    }
                }
                Reply::SqlError(msg) => return Err(SqlError::new(&msg).into()),
                Reply::Error(msg) => return Err(InternalError::new(&msg).into()),
                reply @ (Reply::Hello(_)
                | Reply::Ok(_)
                | Reply::NoMoreData(_)
                | Reply::Unknown(_)) => return Err(ProtocolError::unexpected(reply, "query").into()),
            }
        };

        // row count hint is ignored
        let _rows: u64 = match self.io.recv().await? {
            Reply::Value(rows) => parse_decimal(backend::VALUE, &rows, "query row count")?,
            reply @ (Reply::SqlError(_)
            | Reply::Error(_)
            | Reply::Hello(_)
            | Reply::Ok(_)
            | Reply::NoMoreData(_)
            | Reply::StillExecuting
            | Reply::Unknown(_)) => return Err(ProtocolError::unexpected(reply, "query row count").into()),
        };

        debug!("query successful, columns: {columns}");

        let mut rows = Rows::new(self.io, columns, self.stmt.fetch_size().clone());
        rows.load_page().await?;
        Ok(rows)
    }

    /// Fetch all rows into [`Vec`].
    pub async fn fetch_all<R: FromRow>(self) -> Result<Vec<R>> {
        let mut rows = self.fetch().await?;
        let mut output = vec![];
        while let Some(row) = rows.next_row().await? {
            output.push(R::from_row(row)?);
        }
        Ok(output)
    }

    /// Fetch only the first row, remaining rows are drained.
    pub async fn fetch_optional<R: FromRow>(self) -> Result<Option<R>> {
        let mut rows = self.fetch().await?;
        let mut first = None;
        while let Some(row) = rows.next_row().await? {
            if first.is_none() {
                first = Some(row);
            }
        }
        match first {
            Some(row) => Ok(Some(R::from_row(row)?)),
            None => Ok(None),
        }
    }
}

/// Parse a decimal reply payload.
pub(crate) fn parse_decimal<T: FromStr>(
    code: u32,
    payload: &Bytes,
    phase: &'static str,
) -> Result<T, ProtocolError> {
    std::str::from_utf8(payload)
        .ok()
        .and_then(|e| e.parse().ok())
        .ok_or_else(|| ProtocolError::invalid(code, payload.clone(), phase))
}

/// Query result with its rows affected.
#[derive(Debug)]
pub struct RowResult {
    pub rows_affected: u64,
}

/// How to wait while the proxy replies still executing.
///
/// Defaults to waiting indefinitely without delay, use a
/// [`Signal`][crate::connection::Signal] deadline to bound it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StillExecutingPolicy {
    pub(crate) backoff: Option<Duration>,
    pub(crate) max_polls: Option<u32>,
}

impl StillExecutingPolicy {
    /// Sleep `backoff` after each still executing reply.
    pub fn backoff(mut self, backoff: Duration) -> Self {
        self.backoff = Some(backoff);
        self
    }

    /// Fail after more than `max` still executing replies.
    pub fn max_polls(mut self, max: u32) -> Self {
        self.max_polls = Some(max);
        self
    }
}

/// The proxy replied still executing more than allowed.
///
/// The connection is unusable afterwards, the final reply is never read.
pub struct StillExecutingExceeded {
    polls: u32,
}

impl StillExecutingExceeded {
    /// Number of still executing replies received.
    pub fn polls(&self) -> u32 {
        self.polls
    }
}

impl std::error::Error for StillExecutingExceeded { }

impl fmt::Display for StillExecutingExceeded {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "statement still executing after {} polls", self.polls)
    }
}

impl fmt::Debug for StillExecutingExceeded {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{self}\"")
    }
}
