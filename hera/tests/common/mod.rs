#![allow(dead_code)]
use bytes::BytesMut;
use hera::{Config, Connection, Frame};
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};

pub const SQL_ERROR: u32 = 1;
pub const ERROR: u32 = 2;
pub const VALUE: u32 = 3;
pub const OK: u32 = 5;
pub const NO_MORE_DATA: u32 = 6;
pub const STILL_EXECUTING: u32 = 7;

/// Scripted proxy end of an in memory connection.
pub struct Proxy {
    io: DuplexStream,
    buf: BytesMut,
}

impl Proxy {
    /// Read one frame as sent by the client, composite frames are not split.
    pub async fn read(&mut self) -> Frame {
        loop {
            if let Some(frame) = Frame::decode(&mut self.buf).unwrap() {
                return frame;
            }
            let n = self.io.read_buf(&mut self.buf).await.unwrap();
            assert_ne!(n, 0, "client closed connection");
        }
    }

    pub async fn reply(&mut self, frames: &[Frame]) {
        for frame in frames {
            self.io.write_all(frame.serialized()).await.unwrap();
        }
    }

    /// Assert the client sent nothing else before closing.
    pub async fn finish(mut self) {
        let mut rest = vec![];
        self.io.read_to_end(&mut rest).await.unwrap();
        assert!(self.buf.is_empty(), "unread frames: {:?}", self.buf);
        assert!(rest.is_empty(), "unread bytes: {:?}", String::from_utf8_lossy(&rest));
    }
}

pub fn value(payload: &'static str) -> Frame {
    Frame::new(VALUE, payload)
}

pub fn ok() -> Frame {
    Frame::command(OK)
}

pub fn no_more_data() -> Frame {
    Frame::command(NO_MORE_DATA)
}

pub fn still_executing() -> Frame {
    Frame::command(STILL_EXECUTING)
}

pub async fn connect() -> (Connection, Proxy) {
    connect_with(Config::new("localhost", 10101)).await
}

pub async fn connect_with(config: Config) -> (Connection, Proxy) {
    let (client, server) = tokio::io::duplex(64 * 1024);
    let mut proxy = Proxy { io: server, buf: BytesMut::new() };

    let handshake = async {
        let hello = proxy.read().await;
        proxy.reply(&[Frame::new(OK, "hera proxy")]).await;
        hello
    };

    let (conn, hello) = tokio::join!(Connection::from_socket(client, &config), handshake);

    assert_eq!(hello.cmd(), 11);
    let hello = String::from_utf8(hello.payload().to_vec()).unwrap();
    assert!(hello.starts_with("PID: "), "{hello}");
    assert!(hello.contains("Poolname: unset, Command: init, null, Name: "), "{hello}");

    let pid = std::process::id();
    let host = hello
        .split(", ")
        .find_map(|e| e.strip_prefix(&format!("EXEC: {pid}@")))
        .unwrap_or_else(|| panic!("missing exec field: {hello}"));
    assert!(hello.starts_with(&format!("PID: {pid},HOST: {host}, ")), "{hello}");

    (conn.unwrap(), proxy)
}

/// Returns `(cmd, payload)` of each embedded frame.
pub fn children(frame: &Frame) -> Vec<(u32, String)> {
    assert!(frame.is_composite(), "not a composite frame: {frame:?}");
    frame
        .children()
        .map(|e| {
            let e = e.unwrap();
            (e.cmd(), String::from_utf8(e.payload().to_vec()).unwrap())
        })
        .collect()
}
