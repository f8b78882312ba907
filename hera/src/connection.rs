//! Hera connection.
use bytes::{Bytes, BytesMut};
use std::{
    fmt,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll, ready},
};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio_util::sync::WaitForCancellationFutureOwned;

#[cfg(any(feature = "log", feature = "verbose"))]
use crate::ext::FmtExt;
use crate::{
    Result,
    common::{ByteStr, debug, info, verbose, warning},
    error::{Closed, Error, TransportRead, TransportWrite},
    net::{self, Socket},
    netstring::{Frame, FrameReader},
    protocol::{
        InternalError, ProtocolError, Reply,
        frontend::{self, FrontendProtocol},
    },
    query::StillExecutingPolicy,
    statement::Statement,
    transaction::Transaction,
    transport::{HeraTransport, HeraTransportExt},
};

mod config;
mod watcher;

pub use config::{Config, ParseError};
pub use watcher::{Canceled, Signal};
use watcher::{Closer, Watcher};

const DEFAULT_BUF_CAPACITY: usize = 1024;

/// State sticky to one connection.
#[derive(Debug)]
pub struct Session {
    id: String,
    correlation: Option<Frame>,
    shard_key: Bytes,
    client_info: Option<Frame>,
}

impl Session {
    fn new(id: String) -> Self {
        Self {
            id,
            correlation: Some(frontend::CorrelationId { id: frontend::CorrelationId::UNSET }.into_frame()),
            shard_key: Bytes::new(),
            client_info: None,
        }
    }

    /// Diagnostic identity, the remote address.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Correlation id frame that will be attached to the next statement.
    pub fn correlation_id(&self) -> Option<&Frame> {
        self.correlation.as_ref()
    }

    /// Sticky shard routing payload, empty if not set.
    pub fn shard_key_payload(&self) -> &Bytes {
        &self.shard_key
    }

    /// Last announced client identity.
    pub fn client_info(&self) -> Option<&Frame> {
        self.client_info.as_ref()
    }
}

/// A single connection to the proxy.
///
/// The protocol is half duplex, only one request may be outstanding at a time.
pub struct Connection {
    stream: Option<FrameReader<Socket>>,
    write_buf: BytesMut,
    session: Session,
    closer: Arc<Closer>,
    closed: Pin<Box<WaitForCancellationFutureOwned>>,
    watcher: Watcher,
    still_executing: StillExecutingPolicy,
    discard: usize,
}

impl Connection {
    /// Connect using url, see [`Config::parse`].
    pub async fn connect(url: &str) -> Result<Self> {
        Self::connect_with(&Config::parse(url)?).await
    }

    /// Connect using config from environment variables, see [`Config::from_env`].
    pub async fn connect_env() -> Result<Self> {
        Self::connect_with(&Config::from_env()).await
    }

    pub async fn connect_with(config: &Config) -> Result<Self> {
        let socket = match &config.socket {
            #[cfg(unix)]
            Some(path) => Socket::connect_unix(path)
                .await
                .map_err(|e| Error::from(e).context(format!("failed to connect {path}")))?,
            #[cfg(not(unix))]
            Some(path) => {
                let err = std::io::Error::from(std::io::ErrorKind::Unsupported);
                return Err(Error::from(err).context(format!("failed to connect {path}")));
            }
            None => Socket::connect_tcp(&config.host, config.port)
                .await
                .map_err(|e| Error::from(e).context(format!("failed to connect {}:{}", config.host, config.port)))?,
        };
        Self::from_socket(socket, config).await
    }

    /// Perform the handshake over an already connected socket.
    pub async fn from_socket(socket: impl Into<Socket>, config: &Config) -> Result<Self> {
        let socket = socket.into();
        let closer = Arc::new(Closer::default());
        let closed = Box::pin(closer.token().clone().cancelled_owned());

        let mut conn = Connection {
            session: Session::new(socket.peer_id()),
            stream: Some(FrameReader::new(socket)),
            write_buf: BytesMut::with_capacity(DEFAULT_BUF_CAPACITY),
            closer,
            closed,
            watcher: Watcher::default(),
            still_executing: config.still_executing,
            discard: 0,
        };

        conn.handshake(&config.app_name)
            .await
            .map_err(|e| e.context("handshake failed"))?;

        info!("{} create driver connection", conn.session.id);
        Ok(conn)
    }

    async fn handshake(&mut self, name: &ByteStr) -> Result<()> {
        let info = init_info(std::process::id(), &net::hostname(), name);
        self.send(&frontend::ClientInfo { info: info.into() }.into_frame());
        self.flush().await?;
        let _reply = self.recv().await?;
        debug!("{} handshake acknowledged: {}", self.session.id, _reply.payload().truncated());
        Ok(())
    }

    /// Returns the session state.
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Diagnostic identity, the remote address.
    pub fn id(&self) -> &str {
        &self.session.id
    }

    /// Prepare a statement.
    ///
    /// This does not communicate with the proxy, positional placeholders are
    /// rewritten to named placeholders locally.
    pub fn prepare(&self, sql: &str) -> Statement {
        let stmt = Statement::new(sql).with_still_executing(self.still_executing);
        debug!("{} prepare sql: {}", self.session.id, stmt.sql());
        stmt
    }

    /// Begin a transaction.
    pub fn begin(&mut self) -> Result<Transaction<'_>> {
        self.ensure_open()?;
        debug!("{} begin transaction", self.session.id);
        Ok(Transaction::new(self))
    }

    /// Route subsequent statements to shard `shard`.
    pub async fn set_shard_id(&mut self, shard: i32) -> Result<()> {
        self.ensure_open()?;
        self.send(&frontend::SetShardId { shard }.into_frame());
        self.flush().await?;
        match self.recv().await? {
            Reply::Ok(_) => Ok(()),
            Reply::Error(msg) => Err(InternalError::new(&msg).into()),
            reply @ (Reply::SqlError(_)
            | Reply::Value(_)
            | Reply::Hello(_)
            | Reply::NoMoreData(_)
            | Reply::StillExecuting
            | Reply::Unknown(_)) => Err(ProtocolError::unexpected(reply, "set shard id").into()),
        }
    }

    /// Restore default shard routing.
    pub async fn reset_shard_id(&mut self) -> Result<()> {
        self.set_shard_id(-1).await
    }

    /// Returns the number of shards behind the proxy.
    pub async fn get_num_shards(&mut self) -> Result<u32> {
        self.ensure_open()?;
        self.send(&frontend::GetNumShards.into_frame());
        self.flush().await?;
        match self.recv().await? {
            Reply::Ok(payload) => Ok(crate::query::parse_decimal(crate::protocol::backend::OK, &payload, "get num shards")?),
            Reply::Error(msg) => Err(InternalError::new(&msg).into()),
            reply @ (Reply::SqlError(_)
            | Reply::Value(_)
            | Reply::Hello(_)
            | Reply::NoMoreData(_)
            | Reply::StillExecuting
            | Reply::Unknown(_)) => Err(ProtocolError::unexpected(reply, "get num shards").into()),
        }
    }

    /// Set the sticky shard routing payload, sent with every subsequent statement.
    pub fn set_shard_key_payload(&mut self, payload: impl Into<Bytes>) {
        self.session.shard_key = payload.into();
    }

    /// Clear the sticky shard routing payload.
    pub fn reset_shard_key_payload(&mut self) {
        self.session.shard_key = Bytes::new();
    }

    /// Attach a correlation id to the next statement only.
    pub fn set_correlation_id(&mut self, id: &str) {
        self.session.correlation = Some(frontend::CorrelationId { id }.into_frame());
    }

    /// Announce client identity to the proxy.
    ///
    /// Does nothing if both `pool_name` and `host` are empty.
    pub async fn set_client_info(&mut self, pool_name: &str, host: &str) -> Result<()> {
        if pool_name.is_empty() && host.is_empty() {
            return Ok(());
        }
        let info = format!(
            "PID: {}, HOST: {host}, Poolname: {pool_name}, Command: SetClientInfo,",
            std::process::id()
        );
        self.announce(info).await
    }

    /// Same as [`set_client_info`][Connection::set_client_info] with the pool stack.
    pub async fn set_client_info_with_pool_stack(
        &mut self,
        pool_name: &str,
        host: &str,
        pool_stack: &str,
    ) -> Result<()> {
        if pool_name.is_empty() && host.is_empty() && pool_stack.is_empty() {
            return Ok(());
        }
        let info = format!(
            "PID: {}, HOST: {host}, Poolname: {pool_name}, PoolStack: {pool_stack}, Command: SetClientInfo,",
            std::process::id()
        );
        self.announce(info).await
    }

    async fn announce(&mut self, info: String) -> Result<()> {
        self.ensure_open()?;

        let frame = frontend::ClientInfo { info: info.into() }.into_frame();
        self.send(&frame);

        if let Err(_err) = self.flush().await {
            warning!("{} failed to send client info: {_err}", self.session.id);
            return Err(ClientInfoError::Send.into());
        }

        match self.recv().await {
            Ok(_reply) => {
                debug!("{} server info: {}", self.session.id, _reply.payload().truncated());
            }
            Err(_err) => {
                warning!("{} failed to read server info: {_err}", self.session.id);
                return Err(ClientInfoError::ReadAck.into());
            }
        }

        self.session.client_info = Some(frame);
        Ok(())
    }

    /// Watch `signal`, force closing this connection when it fires.
    ///
    /// If `signal` already fired, the connection is closed and the reason is
    /// returned. Call [`finish`][Connection::finish] when the operation completes.
    pub fn watch(&mut self, signal: &Signal) -> Result<()> {
        self.watcher.watch(signal, &self.closer)?;
        Ok(())
    }

    /// Stop watching the current signal, if any.
    pub fn finish(&mut self) {
        self.watcher.finish();
    }

    /// Returns `true` if a signal is being watched.
    pub fn is_watching(&self) -> bool {
        self.watcher.is_watching()
    }

    /// Returns `true` if the connection is closed, locally or by a signal.
    pub fn is_closed(&self) -> bool {
        self.stream.is_none() || self.closer.is_closed()
    }

    /// Close the connection.
    pub async fn close(mut self) -> Result<()> {
        info!("{} close driver connection", self.session.id);
        self.watcher.finish();
        self.closer.close(None);
        if let Some(mut stream) = self.stream.take() {
            let _ = stream.get_mut().shutdown().await;
        }
        Ok(())
    }

    /// Ignore the next reply, the request was sent when no one can await it.
    pub(crate) fn discard_reply(&mut self) {
        self.discard += 1;
    }

    fn ensure_open(&self) -> Result<()> {
        match self.is_closed() {
            true => Err(self.closed_error()),
            false => Ok(()),
        }
    }

    fn closed_error(&self) -> Error {
        match self.closer.reason() {
            Some(reason) => reason.into(),
            None => Closed.into(),
        }
    }

    /// Returns `true` if closed out of band, registering for wakeup otherwise.
    fn poll_closed(&mut self, cx: &mut Context) -> bool {
        self.closer.is_closed() || self.closed.as_mut().poll(cx).is_ready()
    }

    fn teardown(&mut self) {
        self.stream = None;
        self.write_buf.clear();
        self.closer.close(None);
    }
}

/// Client info payload of the open handshake.
fn init_info(pid: u32, host: &str, name: &str) -> String {
    format!("PID: {pid},HOST: {host}, EXEC: {pid}@{host}, Poolname: unset, Command: init, null, Name: {name}")
}

impl HeraTransport for Connection {
    fn poll_flush(&mut self, cx: &mut Context) -> Poll<Result<()>> {
        if self.poll_closed(cx) {
            let err = self.closed_error();
            self.teardown();
            return Poll::Ready(Err(err));
        }

        let Some(stream) = self.stream.as_mut() else {
            return Poll::Ready(Err(self.closed_error()));
        };

        while !self.write_buf.is_empty() {
            match ready!(tokio_util::io::poll_write_buf(Pin::new(stream.get_mut()), cx, &mut self.write_buf)) {
                Ok(0) => {
                    warning!("{} failed to send request: connection closed by peer", self.session.id);
                    self.teardown();
                    return Poll::Ready(Err(TransportWrite.into()));
                }
                Ok(_) => {}
                Err(_err) => {
                    warning!("{} failed to send request: {_err}", self.session.id);
                    self.teardown();
                    return Poll::Ready(Err(TransportWrite.into()));
                }
            }
        }

        if let Err(_err) = ready!(Pin::new(stream.get_mut()).poll_flush(cx)) {
            warning!("{} failed to flush request: {_err}", self.session.id);
            self.teardown();
            return Poll::Ready(Err(TransportWrite.into()));
        }

        Poll::Ready(Ok(()))
    }

    fn poll_recv(&mut self, cx: &mut Context) -> Poll<Result<Reply>> {
        if !self.write_buf.is_empty() {
            ready!(self.poll_flush(cx)?);
        }

        loop {
            if self.poll_closed(cx) && self.stream.is_some() {
                warning!("{} connection closed while reading response", self.session.id);
                self.teardown();
                return Poll::Ready(Err(TransportRead.into()));
            }

            let Some(stream) = self.stream.as_mut() else {
                return Poll::Ready(Err(self.closed_error()));
            };

            let frame = match ready!(Pin::new(stream).poll_next_frame(cx)) {
                Ok(frame) => frame,
                Err(_err) => {
                    warning!("{} failed to read response: {_err}", self.session.id);
                    self.teardown();
                    return Poll::Ready(Err(TransportRead.into()));
                }
            };

            verbose!(id = %self.session.id, cmd = frame.cmd(), payload = %frame.payload().truncated(), "recv");

            if self.discard > 0 {
                self.discard -= 1;
                continue;
            }

            return Poll::Ready(Ok(Reply::from(frame)));
        }
    }

    fn send(&mut self, frame: &Frame) {
        verbose!(id = %self.session.id, cmd = frame.cmd(), payload = %frame.payload().truncated(), "send");
        self.write_buf.extend_from_slice(frame.serialized());
    }

    fn take_correlation_id(&mut self) -> Option<Frame> {
        self.session.correlation.take()
    }

    fn shard_key_payload(&self) -> Bytes {
        self.session.shard_key.clone()
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("session", &self.session)
            .field("closed", &self.is_closed())
            .field("watching", &self.watcher.is_watching())
            .finish()
    }
}

/// Failed to announce client identity.
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum ClientInfoError {
    /// The announcement could not be written.
    Send,
    /// The acknowledgement could not be read.
    ReadAck,
}

impl std::error::Error for ClientInfoError { }

impl fmt::Display for ClientInfoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Send => f.write_str("failed custom auth, failed to send client info"),
            Self::ReadAck => f.write_str("failed to read server info"),
        }
    }
}

impl fmt::Debug for ClientInfoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{self}\"")
    }
}
