use bytes::BytesMut;
use futures_core::Stream;
use std::{
    fmt, io,
    pin::Pin,
    task::{Context, Poll, ready},
};
use tokio::io::AsyncRead;

use super::{Frame, FrameError, SubFrames};

const DEFAULT_BUF_CAPACITY: usize = 1024;

pin_project_lite::pin_project! {
    /// Read frames from an [`AsyncRead`], flattening composite frames.
    ///
    /// Caller never see a composite frame, embedded frames are delivered one
    /// by one in their original order, followed by any frame after it.
    #[derive(Debug)]
    pub struct FrameReader<R> {
        #[pin]
        io: R,
        read_buf: BytesMut,
        children: Vec<SubFrames>,
    }
}

impl<R> FrameReader<R> {
    pub fn new(io: R) -> Self {
        Self {
            io,
            read_buf: BytesMut::with_capacity(DEFAULT_BUF_CAPACITY),
            children: Vec::new(),
        }
    }

    pub fn get_ref(&self) -> &R {
        &self.io
    }

    pub fn get_mut(&mut self) -> &mut R {
        &mut self.io
    }

    pub fn get_pin_mut(self: Pin<&mut Self>) -> Pin<&mut R> {
        self.project().io
    }

    /// Returns `true` if there are frames already read but not yet delivered.
    pub fn has_pending(&self) -> bool {
        !self.children.is_empty() || !self.read_buf.is_empty()
    }

    pub fn into_inner(self) -> R {
        self.io
    }
}

impl<R: AsyncRead> FrameReader<R> {
    /// Poll for the next non composite frame.
    pub fn poll_next_frame(self: Pin<&mut Self>, cx: &mut Context) -> Poll<Result<Frame, ReadError>> {
        let mut me = self.project();

        loop {
            if let Some(children) = me.children.last_mut() {
                match children.next() {
                    Some(Ok(frame)) if frame.is_composite() => {
                        me.children.push(frame.children());
                    }
                    Some(Ok(frame)) => return Poll::Ready(Ok(frame)),
                    Some(Err(err)) => {
                        me.children.clear();
                        return Poll::Ready(Err(err.into()));
                    }
                    None => {
                        me.children.pop();
                    }
                }
                continue;
            }

            match Frame::decode(&mut *me.read_buf)? {
                Some(frame) if frame.is_composite() => {
                    me.children.push(frame.children());
                    continue;
                }
                Some(frame) => return Poll::Ready(Ok(frame)),
                None => {}
            }

            me.read_buf.reserve(DEFAULT_BUF_CAPACITY);
            let n = ready!(tokio_util::io::poll_read_buf(me.io.as_mut(), cx, &mut *me.read_buf)?);

            if n == 0 {
                return Poll::Ready(Err(match me.read_buf.is_empty() {
                    true => ReadError::Eof,
                    false => ReadError::Io(io::ErrorKind::UnexpectedEof.into()),
                }));
            }
        }
    }

    /// Read the next non composite frame.
    pub async fn read_next(&mut self) -> Result<Frame, ReadError>
    where
        R: Unpin,
    {
        std::future::poll_fn(|cx| Pin::new(&mut *self).poll_next_frame(cx)).await
    }
}

impl<R: AsyncRead> Stream for FrameReader<R> {
    type Item = Result<Frame, ReadError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        match ready!(self.poll_next_frame(cx)) {
            Ok(frame) => Poll::Ready(Some(Ok(frame))),
            Err(ReadError::Eof) => Poll::Ready(None),
            Err(err) => Poll::Ready(Some(Err(err))),
        }
    }
}

/// An error when reading a frame.
pub enum ReadError {
    /// Malformed frame.
    Frame(FrameError),
    /// Underlying io error.
    Io(io::Error),
    /// End of stream at a frame boundary.
    Eof,
}

impl From<FrameError> for ReadError {
    fn from(value: FrameError) -> Self {
        Self::Frame(value)
    }
}

impl From<io::Error> for ReadError {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

impl std::error::Error for ReadError { }

impl fmt::Display for ReadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Frame(e) => e.fmt(f),
            Self::Io(e) => e.fmt(f),
            Self::Eof => f.write_str("end of stream"),
        }
    }
}

impl fmt::Debug for ReadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{self}\"")
    }
}

#[cfg(test)]
mod test {
    use tokio::io::AsyncWriteExt;

    use super::*;

    const STREAM: &[u8] = b"54:0 16:502 xyzwx*abcdef,1:5,24:25 1234567890*1234567890,,\
                            55:0 17:502 xyzwx*WWWWWWW,1:5,24:25 1234567890*1234567890,,";

    async fn read_all<R: AsyncRead + Unpin>(reader: &mut FrameReader<R>) -> Vec<(u32, Vec<u8>)> {
        let mut frames = vec![];
        loop {
            match reader.read_next().await {
                Ok(frame) => frames.push((frame.cmd(), frame.payload().to_vec())),
                Err(ReadError::Eof) => break frames,
                Err(err) => panic!("{err}"),
            }
        }
    }

    #[tokio::test]
    async fn test_flatten_composite() {
        let mut reader = FrameReader::new(STREAM);
        let frames = read_all(&mut reader).await;
        assert_eq!(frames, vec![
            (502, b"xyzwx*abcdef".to_vec()),
            (5, vec![]),
            (25, b"1234567890*1234567890".to_vec()),
            (502, b"xyzwx*WWWWWWW".to_vec()),
            (5, vec![]),
            (25, b"1234567890*1234567890".to_vec()),
        ]);
    }

    #[tokio::test]
    async fn test_composite_then_simple() {
        let input = [
            Frame::composite(&[Frame::new(502, "abc"), Frame::command(5), Frame::new(25, "123")])
                .serialized()
                .clone(),
            Frame::new(7, "x").serialized().clone(),
        ]
        .concat();

        let mut reader = FrameReader::new(&input[..]);
        let frames = read_all(&mut reader).await;
        assert_eq!(frames, vec![
            (502, b"abc".to_vec()),
            (5, vec![]),
            (25, b"123".to_vec()),
            (7, b"x".to_vec()),
        ]);
    }

    #[tokio::test]
    async fn test_nested_composite() {
        let inner = Frame::composite(&[Frame::new(3, "a"), Frame::new(3, "b")]);
        let outer = Frame::composite(&[Frame::new(3, "first"), inner, Frame::command(6)]);

        let mut reader = FrameReader::new(&outer.serialized()[..]);
        let frames = read_all(&mut reader).await;
        assert_eq!(frames, vec![
            (3, b"first".to_vec()),
            (3, b"a".to_vec()),
            (3, b"b".to_vec()),
            (6, vec![]),
        ]);
    }

    #[tokio::test]
    async fn test_small_chunks() {
        let (mut tx, rx) = tokio::io::duplex(3);
        tokio::spawn(async move {
            for chunk in STREAM.chunks(2) {
                tx.write_all(chunk).await.unwrap();
            }
        });

        let mut reader = FrameReader::new(rx);
        assert_eq!(read_all(&mut reader).await.len(), 6);
    }

    #[tokio::test]
    async fn test_incomplete() {
        let mut reader = FrameReader::new(&b"54:0 16:502 "[..]);
        assert!(matches!(reader.read_next().await, Err(ReadError::Io(_))));
    }

    #[tokio::test]
    async fn test_incomplete_embedded() {
        let mut reader = FrameReader::new(
            &b"55:0 16:502 xyzwx*abcdef,50:5,24:25 1234567890*1234567890,,"[..],
        );
        assert!(reader.read_next().await.is_ok());
        assert!(matches!(
            reader.read_next().await,
            Err(ReadError::Frame(FrameError::Truncated))
        ));
    }
}
