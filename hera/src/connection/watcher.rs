//! Cancellation watcher.
//!
//! A [`Signal`] is an external cancellation source, an explicit cancel through
//! [`CancellationToken`] and/or a deadline. While a connection watches a
//! signal, a background task waits for it and force closes the connection
//! when it fires.
use std::{
    fmt,
    sync::{Arc, OnceLock},
    time::Duration,
};
use tokio::{
    sync::oneshot,
    task::JoinHandle,
    time::Instant,
};
use tokio_util::sync::CancellationToken;

use crate::common::{debug, warning};

/// Cancellation or timeout source.
///
/// Clones share identity, watching a clone of the active signal is a no-op.
#[derive(Clone)]
pub struct Signal {
    inner: Arc<Inner>,
}

struct Inner {
    token: Option<CancellationToken>,
    deadline: Option<Instant>,
}

impl Signal {
    /// A signal that never fires.
    pub fn never() -> Signal {
        Self::from_parts(None, None)
    }

    /// Fires when `token` is cancelled.
    pub fn cancellable(token: CancellationToken) -> Signal {
        Self::from_parts(Some(token), None)
    }

    /// Fires at `deadline`.
    pub fn deadline(deadline: Instant) -> Signal {
        Self::from_parts(None, Some(deadline))
    }

    /// Fires after `timeout` from now.
    pub fn timeout(timeout: Duration) -> Signal {
        Self::deadline(Instant::now() + timeout)
    }

    /// Add a deadline to this signal, returning a new signal.
    pub fn with_deadline(&self, deadline: Instant) -> Signal {
        let deadline = match self.inner.deadline {
            Some(current) => current.min(deadline),
            None => deadline,
        };
        Self::from_parts(self.inner.token.clone(), Some(deadline))
    }

    fn from_parts(token: Option<CancellationToken>, deadline: Option<Instant>) -> Signal {
        Signal { inner: Arc::new(Inner { token, deadline }) }
    }

    /// Returns `false` if this signal can never fire.
    pub fn can_fire(&self) -> bool {
        self.inner.token.is_some() || self.inner.deadline.is_some()
    }

    /// Returns the reason if this signal already fired.
    pub fn err(&self) -> Option<Canceled> {
        if self.inner.token.as_ref().is_some_and(CancellationToken::is_cancelled) {
            return Some(Canceled::Canceled);
        }
        if self.inner.deadline.is_some_and(|e| e <= Instant::now()) {
            return Some(Canceled::DeadlineExceeded);
        }
        None
    }

    /// Wait until this signal fires.
    pub async fn fired(&self) -> Canceled {
        let cancel = async {
            match &self.inner.token {
                Some(token) => token.cancelled().await,
                None => std::future::pending().await,
            }
        };
        let timeout = async {
            match self.inner.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            biased;
            _ = cancel => Canceled::Canceled,
            _ = timeout => Canceled::DeadlineExceeded,
        }
    }

    fn same(&self, other: &Signal) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("cancellable", &self.inner.token.is_some())
            .field("deadline", &self.inner.deadline)
            .finish()
    }
}

/// Out of band close of a connection, shared with the watcher task.
#[derive(Debug, Default)]
pub(crate) struct Closer {
    token: CancellationToken,
    reason: OnceLock<Canceled>,
}

impl Closer {
    /// Close the connection, recording why if caused by a signal.
    pub(crate) fn close(&self, reason: Option<Canceled>) {
        if let Some(reason) = reason {
            let _ = self.reason.set(reason);
        }
        self.token.cancel();
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.token.is_cancelled()
    }

    pub(crate) fn reason(&self) -> Option<Canceled> {
        self.reason.get().copied()
    }

    pub(crate) fn token(&self) -> &CancellationToken {
        &self.token
    }
}

/// Watch state of one connection.
#[derive(Debug, Default)]
pub(crate) struct Watcher {
    state: State,
}

#[derive(Debug, Default)]
enum State {
    #[default]
    Idle,
    Watching {
        signal: Signal,
        finish: oneshot::Sender<()>,
        task: JoinHandle<()>,
    },
}

impl Watcher {
    /// Start watching `signal`, closing through `closer` when it fires.
    pub(crate) fn watch(&mut self, signal: &Signal, closer: &Arc<Closer>) -> Result<(), Canceled> {
        if let State::Watching { signal: active, .. } = &self.state {
            if !active.same(signal) {
                warning!("redundant watch while another signal is active, closing connection");
                closer.close(None);
            }
            return Ok(());
        }

        if let Some(reason) = signal.err() {
            closer.close(Some(reason));
            return Err(reason);
        }

        if !signal.can_fire() {
            return Ok(());
        }

        let (finish, finished) = oneshot::channel();
        let task = tokio::spawn({
            let signal = signal.clone();
            let closer = Arc::clone(closer);
            async move {
                tokio::select! {
                    biased;
                    _ = finished => { }
                    reason = signal.fired() => {
                        debug!("signal fired: {reason}, closing connection");
                        closer.close(Some(reason));
                    }
                }
            }
        });

        self.state = State::Watching { signal: signal.clone(), finish, task };
        Ok(())
    }

    /// Stop watching, safe to call when idle.
    pub(crate) fn finish(&mut self) {
        if let State::Watching { finish, .. } = std::mem::take(&mut self.state) {
            let _ = finish.send(());
        }
    }

    pub(crate) fn is_watching(&self) -> bool {
        matches!(self.state, State::Watching { .. })
    }
}

impl Drop for Watcher {
    fn drop(&mut self) {
        if let State::Watching { task, .. } = &self.state {
            task.abort();
        }
    }
}

/// Reason a signal fired.
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum Canceled {
    /// The token was cancelled.
    Canceled,
    /// The deadline passed.
    DeadlineExceeded,
}

impl std::error::Error for Canceled { }

impl fmt::Display for Canceled {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Canceled => f.write_str("operation canceled"),
            Self::DeadlineExceeded => f.write_str("deadline exceeded"),
        }
    }
}

impl fmt::Debug for Canceled {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{self}\"")
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    async fn test_fired_signal_fails_fast() {
        let token = CancellationToken::new();
        token.cancel();
        let closer = Arc::new(Closer::default());
        let mut watcher = Watcher::default();

        let err = watcher.watch(&Signal::cancellable(token), &closer).unwrap_err();
        assert_eq!(err, Canceled::Canceled);
        assert!(closer.is_closed());
        assert_eq!(closer.reason(), Some(Canceled::Canceled));
        assert!(!watcher.is_watching());
    }

    #[tokio::test]
    async fn test_never_is_noop() {
        let closer = Arc::new(Closer::default());
        let mut watcher = Watcher::default();
        watcher.watch(&Signal::never(), &closer).unwrap();
        assert!(!watcher.is_watching());
        assert!(!closer.is_closed());
    }

    #[tokio::test]
    async fn test_cancel_closes() {
        let token = CancellationToken::new();
        let closer = Arc::new(Closer::default());
        let mut watcher = Watcher::default();

        watcher.watch(&Signal::cancellable(token.clone()), &closer).unwrap();
        assert!(watcher.is_watching());

        token.cancel();
        closer.token().cancelled().await;
        assert_eq!(closer.reason(), Some(Canceled::Canceled));
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_closes() {
        let closer = Arc::new(Closer::default());
        let mut watcher = Watcher::default();

        watcher.watch(&Signal::timeout(Duration::from_secs(5)), &closer).unwrap();
        tokio::time::sleep(Duration::from_secs(6)).await;
        closer.token().cancelled().await;
        assert_eq!(closer.reason(), Some(Canceled::DeadlineExceeded));
    }

    #[tokio::test(start_paused = true)]
    async fn test_finish_stops_watch() {
        let closer = Arc::new(Closer::default());
        let mut watcher = Watcher::default();

        watcher.watch(&Signal::timeout(Duration::from_secs(5)), &closer).unwrap();
        watcher.finish();
        assert!(!watcher.is_watching());
        watcher.finish();

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(!closer.is_closed());
    }

    #[tokio::test]
    async fn test_second_watch() {
        let token = CancellationToken::new();
        let signal = Signal::cancellable(token);
        let closer = Arc::new(Closer::default());
        let mut watcher = Watcher::default();

        watcher.watch(&signal, &closer).unwrap();
        watcher.watch(&signal.clone(), &closer).unwrap();
        assert!(!closer.is_closed());

        watcher.watch(&Signal::cancellable(CancellationToken::new()), &closer).unwrap();
        assert!(closer.is_closed());
        assert_eq!(closer.reason(), None);
        assert!(watcher.is_watching());
    }
}
