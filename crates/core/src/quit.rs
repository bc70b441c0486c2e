//! The closed taxonomy of terminal session outcomes.

use std::fmt;

/// Terminal outcome of a session, delivered exactly once via
/// [`SessionEvent::Quit`](crate::event::SessionEvent::Quit).
///
/// `None` is the sentinel value meaning "not yet determined", it must never
/// be the reason carried by a delivered `Quit` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuitReason {
    None,
    Stopped,
    SessionRequestUnknown,
    SessionRequestConnectionRefused,
    SessionRequestRpInUse,
    SessionRequestRpCrash,
    SessionRequestRpVersionMismatch,
    CtrlUnknown,
    CtrlConnectionRefused,
    CtrlConnectFailed,
    StreamConnectionUnknown,
    StreamConnectionRemoteDisconnected,
}

impl QuitReason {
    /// Stable human string for this reason, used in logs and the optional
    /// `reason_str` carried alongside a remote disconnect.
    pub fn as_str(self) -> &'static str {
        match self {
            QuitReason::None => "none",
            QuitReason::Stopped => "stopped",
            QuitReason::SessionRequestUnknown => "session request: unknown error",
            QuitReason::SessionRequestConnectionRefused => "session request: connection refused",
            QuitReason::SessionRequestRpInUse => "session request: already in use",
            QuitReason::SessionRequestRpCrash => "session request: remote play crashed",
            QuitReason::SessionRequestRpVersionMismatch => "session request: version mismatch",
            QuitReason::CtrlUnknown => "ctrl: unknown error",
            QuitReason::CtrlConnectionRefused => "ctrl: connection refused",
            QuitReason::CtrlConnectFailed => "ctrl: connect failed",
            QuitReason::StreamConnectionUnknown => "stream connection: unknown error",
            QuitReason::StreamConnectionRemoteDisconnected => {
                "stream connection: remote disconnected"
            }
        }
    }
}

impl fmt::Display for QuitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Default for QuitReason {
    fn default() -> Self {
        QuitReason::None
    }
}

/// Server-side failure code carried hex-encoded in the `RP-Application-Reason`
/// response header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RpApplicationReason {
    RegistFailed,
    InvalidPsnId,
    InUse,
    Crash,
    RpVersion,
    Unknown,
}

impl RpApplicationReason {
    /// Decode the hex value of the `RP-Application-Reason` header.
    ///
    /// Only `RpVersion` (`0x80108b09`) and `InUse` (`0x80108b10`) are
    /// confirmed wire values; `Crash`/`RegistFailed`/`InvalidPsnId` use
    /// placeholder codes in the same `0x80108bxx` family pending
    /// confirmation against real console responses. Unknown/unrecognized
    /// codes map to `Unknown` rather than failing, the session-request
    /// layer still needs a deterministic reason to map to a `QuitReason`.
    pub fn from_code(code: u32) -> Self {
        match code {
            0x80108b09 => RpApplicationReason::RpVersion,
            0x80108b10 => RpApplicationReason::InUse,
            0x80108b15 => RpApplicationReason::Crash,
            0x80108b02 => RpApplicationReason::RegistFailed,
            0x80108b03 => RpApplicationReason::InvalidPsnId,
            _ => RpApplicationReason::Unknown,
        }
    }

    /// The one-to-one mapping from a non-mismatch application reason to a
    /// terminal quit reason. `RpVersion` is handled by the renegotiation
    /// logic in the session-request layer instead, never reaching here.
    pub fn to_quit_reason(self) -> QuitReason {
        match self {
            RpApplicationReason::InUse => QuitReason::SessionRequestRpInUse,
            RpApplicationReason::Crash => QuitReason::SessionRequestRpCrash,
            RpApplicationReason::RpVersion => QuitReason::SessionRequestRpVersionMismatch,
            RpApplicationReason::RegistFailed
            | RpApplicationReason::InvalidPsnId
            | RpApplicationReason::Unknown => QuitReason::SessionRequestUnknown,
        }
    }
}
