//! The [`HeraTransport`] trait.
use bytes::Bytes;
use std::task::{Context, Poll};

use crate::{Result, netstring::Frame, protocol::Reply};

/// A buffered stream which can send frames to and receive replies from the proxy.
pub trait HeraTransport: Unpin {
    /// Poll to flush the buffered frames.
    fn poll_flush(&mut self, cx: &mut Context) -> Poll<Result<()>>;

    /// Poll to receive a reply.
    ///
    /// Calling `poll_recv` will also try to [`poll_flush`][1] if there is buffered frame.
    ///
    /// Composite frames are never returned, their embedded frames are returned
    /// one by one instead.
    ///
    /// [1]: HeraTransport::poll_flush
    fn poll_recv(&mut self, cx: &mut Context) -> Poll<Result<Reply>>;

    /// Send a frame to the proxy.
    ///
    /// Note that this send is buffered, caller must also call
    /// [`poll_flush`][1] or [`flush`][2] afterwards.
    ///
    /// [1]: HeraTransport::poll_flush
    /// [2]: HeraTransportExt::flush
    fn send(&mut self, frame: &Frame);

    /// Take the pending correlation id frame, leaving none.
    fn take_correlation_id(&mut self) -> Option<Frame>;

    /// Returns the sticky shard routing payload, empty if not set.
    fn shard_key_payload(&self) -> Bytes;
}

impl<P> HeraTransport for &mut P where P: HeraTransport {
    fn poll_flush(&mut self, cx: &mut Context) -> Poll<Result<()>> {
        P::poll_flush(self, cx)
    }

    fn poll_recv(&mut self, cx: &mut Context) -> Poll<Result<Reply>> {
        P::poll_recv(self, cx)
    }

    fn send(&mut self, frame: &Frame) {
        P::send(self, frame);
    }

    fn take_correlation_id(&mut self) -> Option<Frame> {
        P::take_correlation_id(self)
    }

    fn shard_key_payload(&self) -> Bytes {
        P::shard_key_payload(self)
    }
}

/// An extension trait to provide `Future` API for [`HeraTransport`].
pub trait HeraTransportExt: HeraTransport {
    /// Flush the buffered frames.
    fn flush(&mut self) -> impl Future<Output = Result<()>> {
        std::future::poll_fn(|cx|self.poll_flush(cx))
    }

    /// Receive a reply.
    fn recv(&mut self) -> impl Future<Output = Result<Reply>> {
        std::future::poll_fn(|cx|self.poll_recv(cx))
    }
}

impl<T> HeraTransportExt for T where T: HeraTransport { }
