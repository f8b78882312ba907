//! Socket used by [`Connection`][crate::Connection].
use std::{
    io,
    pin::Pin,
    task::{Context, Poll},
};
use tokio::io::{AsyncRead, AsyncWrite, DuplexStream, ReadBuf};

/// Either a `TcpStream`, a `UnixStream` or an in memory pipe, which implement
/// `AsyncRead` and `AsyncWrite` transparently.
pub struct Socket {
    kind: Kind,
}

enum Kind {
    Tcp(tokio::net::TcpStream),
    #[cfg(unix)]
    Unix(tokio::net::UnixStream),
    Memory(DuplexStream),
}

impl Socket {
    pub async fn connect_tcp(host: &str, port: u16) -> io::Result<Socket> {
        let socket = tokio::net::TcpStream::connect((host, port)).await?;
        socket.set_nodelay(true)?;
        Ok(Socket { kind: Kind::Tcp(socket) })
    }

    #[cfg(unix)]
    pub async fn connect_unix(path: &str) -> io::Result<Socket> {
        let socket = tokio::net::UnixStream::connect(path).await?;
        Ok(Socket { kind: Kind::Unix(socket) })
    }

    /// Diagnostic identity of the remote end.
    pub fn peer_id(&self) -> String {
        match &self.kind {
            Kind::Tcp(tcp) => match tcp.peer_addr() {
                Ok(addr) => addr.to_string(),
                Err(_) => "tcp".into(),
            },
            #[cfg(unix)]
            Kind::Unix(unix) => match unix.peer_addr().ok().and_then(|e| e.as_pathname().map(|p| p.display().to_string())) {
                Some(path) => path,
                None => "unix".into(),
            },
            Kind::Memory(_) => "memory".into(),
        }
    }
}

/// Name of the local host announced to the proxy.
///
/// Reads the kernel hostname on unix, then falls back to the `HOSTNAME` and
/// `COMPUTERNAME` variables, and finally to `localhost`.
pub(crate) fn hostname() -> String {
    #[cfg(unix)]
    for path in ["/proc/sys/kernel/hostname", "/etc/hostname"] {
        if let Some(host) = std::fs::read_to_string(path).ok().and_then(non_empty) {
            return host;
        }
    }

    ["HOSTNAME", "COMPUTERNAME"]
        .into_iter()
        .find_map(|key| std::env::var(key).ok().and_then(non_empty))
        .unwrap_or_else(|| "localhost".into())
}

fn non_empty(host: String) -> Option<String> {
    let host = host.trim();
    (!host.is_empty()).then(|| host.to_owned())
}

impl From<DuplexStream> for Socket {
    fn from(value: DuplexStream) -> Self {
        Self { kind: Kind::Memory(value) }
    }
}

impl AsyncRead for Socket {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match &mut self.kind {
            Kind::Tcp(t) => Pin::new(t).poll_read(cx, buf),
            #[cfg(unix)]
            Kind::Unix(u) => Pin::new(u).poll_read(cx, buf),
            Kind::Memory(m) => Pin::new(m).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for Socket {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match &mut self.kind {
            Kind::Tcp(t) => Pin::new(t).poll_write(cx, buf),
            #[cfg(unix)]
            Kind::Unix(u) => Pin::new(u).poll_write(cx, buf),
            Kind::Memory(m) => Pin::new(m).poll_write(cx, buf),
        }
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match &mut self.kind {
            Kind::Tcp(t) => Pin::new(t).poll_flush(cx),
            #[cfg(unix)]
            Kind::Unix(u) => Pin::new(u).poll_flush(cx),
            Kind::Memory(m) => Pin::new(m).poll_flush(cx),
        }
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match &mut self.kind {
            Kind::Tcp(t) => Pin::new(t).poll_shutdown(cx),
            #[cfg(unix)]
            Kind::Unix(u) => Pin::new(u).poll_shutdown(cx),
            Kind::Memory(m) => Pin::new(m).poll_shutdown(cx),
        }
    }
}

impl std::fmt::Debug for Socket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            Kind::Tcp(tcp) => std::fmt::Debug::fmt(tcp, f),
            #[cfg(unix)]
            Kind::Unix(unix) => std::fmt::Debug::fmt(unix, f),
            Kind::Memory(mem) => std::fmt::Debug::fmt(mem, f),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_hostname() {
        let host = hostname();
        assert!(!host.is_empty());
        assert_eq!(host.trim(), host);
    }

    #[test]
    fn test_non_empty() {
        assert_eq!(non_empty("db-7\n".into()).as_deref(), Some("db-7"));
        assert_eq!(non_empty(" \n".into()), None);
    }
}
