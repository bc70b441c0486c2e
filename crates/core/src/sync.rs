//! The stop-pipe: a cancellable wakeup primitive shared across every
//! blocking operation a session performs.
//!
//! The design notes call out that a pipe/eventfd/socketpair is one valid
//! implementation strategy, but a selectable handle with explicit re-check
//! is an equivalent one. This crate takes the latter: an `AtomicBool` paired
//! with a `parking_lot::Condvar` wakes both predicate-guarded waits and the
//! TCP connect/recv polling loops used by the session-request exchange.

use std::net::{SocketAddr, TcpStream};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::error::{Result, SessionError};

/// How often a cancelable connect/recv loop checks the stop flag.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// A cancellable wakeup primitive, cloned and shared by every collaborator
/// a session composes (Ctrl, Senkusha, StreamConnection) and by the
/// session-request exchange's connect/recv loops.
#[derive(Clone)]
pub struct StopToken {
    inner: std::sync::Arc<StopInner>,
}

struct StopInner {
    stopped: Mutex<bool>,
    cond: Condvar,
}

impl StopToken {
    pub fn new() -> Self {
        StopToken {
            inner: std::sync::Arc::new(StopInner {
                stopped: Mutex::new(false),
                cond: Condvar::new(),
            }),
        }
    }

    /// Poke the stop pipe. Idempotent, subsequent pokes are harmless.
    pub fn stop(&self) {
        *self.inner.stopped.lock() = true;
        self.inner.cond.notify_all();
    }

    pub fn is_stopped(&self) -> bool {
        *self.inner.stopped.lock()
    }

    /// Block until stopped or `timeout` elapses. Returns `true` if stopped.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let mut guard = self.inner.stopped.lock();
        if *guard {
            return true;
        }
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return *guard;
            }
            let result = self.inner.cond.wait_for(&mut guard, remaining);
            if *guard || !result.timed_out() {
                return *guard;
            }
        }
    }

    /// Open a TCP connection to `addr`, returning `Canceled` if `stop()` is
    /// called before the connection completes.
    ///
    /// Polls the socket's connect progress every [`POLL_INTERVAL`], the same
    /// cadence the reference accept loop uses to notice a shutdown flag.
    /// Plain, if coarse, and cheap enough for a one-shot session setup.
    pub fn connect_cancelable(&self, addr: SocketAddr, timeout: Duration) -> Result<TcpStream> {
        let deadline = Instant::now() + timeout;
        loop {
            if self.is_stopped() {
                return Err(SessionError::Canceled);
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(SessionError::Network(std::io::Error::from(
                    std::io::ErrorKind::TimedOut,
                )));
            }

            let step = remaining.min(POLL_INTERVAL);
            match TcpStream::connect_timeout(&addr, step) {
                Ok(stream) => return Ok(stream),
                Err(e) if e.kind() == std::io::ErrorKind::TimedOut => continue,
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => continue,
                Err(e) if e.kind() == std::io::ErrorKind::ConnectionRefused => {
                    return Err(SessionError::ConnectionRefused);
                }
                Err(e) => return Err(SessionError::Network(e)),
            }
        }
    }
}

impl Default for StopToken {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wait_timeout_returns_promptly_on_stop() {
        let token = StopToken::new();
        let t = token.clone();
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(10));
            t.stop();
        });
        let stopped = token.wait_timeout(Duration::from_secs(5));
        assert!(stopped);
    }

    #[test]
    fn wait_timeout_elapses_without_stop() {
        let token = StopToken::new();
        let stopped = token.wait_timeout(Duration::from_millis(20));
        assert!(!stopped);
    }

    #[test]
    fn connect_cancelable_reports_refused() {
        // Bind a listener, then immediately drop it so the port refuses.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let token = StopToken::new();
        let result = token.connect_cancelable(addr, Duration::from_secs(1));
        assert!(matches!(result, Err(SessionError::ConnectionRefused)));
    }
}
