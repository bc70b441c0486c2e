//! Events delivered to the host application through the session's callback.

use crate::quit::QuitReason;

/// Events emitted by a running [`Session`](crate::session::Session).
///
/// `Quit` is always the last event delivered for a given session (O1) and
/// carries a reason that is never [`QuitReason::None`] (I2).
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// The Ctrl channel requested an interactive PIN.
    ///
    /// `pin_incorrect` is `false` on the first request and `true` on every
    /// subsequent request for the same session (O2).
    LoginPinRequest { pin_incorrect: bool },

    /// Terminal outcome of the session. `reason_str` is populated only for
    /// `QuitReason::StreamConnectionRemoteDisconnected`, carrying the
    /// server-supplied disconnect string.
    Quit {
        reason: QuitReason,
        reason_str: Option<String>,
    },
}

/// A boxed, thread-safe event callback.
pub type EventCallback = Box<dyn Fn(SessionEvent) + Send + Sync>;
