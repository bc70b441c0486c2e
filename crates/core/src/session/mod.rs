//! The session orchestrator: composes the session-request exchange, Ctrl,
//! Senkusha, and StreamConnection under one cancellation token.

mod worker;

use std::net::SocketAddr;
use std::sync::Arc;
use std::thread::JoinHandle;

use parking_lot::{Condvar, Mutex};

use crate::connect_info::ConnectInfo;
use crate::crypto::CryptoProvider;
use crate::ctrl::CtrlChannel;
use crate::error::{Result, SessionError};
use crate::event::{EventCallback, SessionEvent};
use crate::quit::QuitReason;
use crate::senkusha::SenkushaProbe;
use crate::stream::{ControllerState, StreamRunner};
use crate::sync::StopToken;
use crate::target::Target;

/// Governs session-request header receive, Ctrl startup, and the post-PIN
/// session-id wait (§5).
pub const SESSION_EXPECT_TIMEOUT_MS: u64 = 5000;

/// A fixed, empirically-motivated settle delay between a successful session
/// request and starting Ctrl. No protocol justification beyond compatibility
/// with observed PS4 behavior, kept as specified, not extended (§9).
pub const SESSION_SETTLE_MS: u64 = 10;

/// Mutable state shared between the worker thread and the caller's thread,
/// guarded by `SessionShared::state` / signaled via `SessionShared::cond`.
pub(crate) struct SessionState {
    pub target: Target,
    pub should_stop: bool,
    pub ctrl_failed: bool,
    /// Specific reason behind `ctrl_failed`, if the failure carried one;
    /// falls back to `QuitReason::CtrlUnknown` when absent (§3's
    /// `CtrlConnectionRefused`/`CtrlConnectFailed`/`CtrlUnknown` triad).
    pub ctrl_fail_reason: Option<QuitReason>,
    pub ctrl_session_id_received: bool,
    pub ctrl_login_pin_requested: bool,
    pub login_pin_entered: bool,
    pub login_pin: Option<Vec<u8>>,
    pub nonce: Option<[u8; 16]>,
    pub handshake_key: Option<[u8; 16]>,
    pub host_addr_selected: Option<SocketAddr>,
    pub mtu_in: u32,
    pub mtu_out: u32,
    pub rtt_us: u32,
    pub quit_reason: QuitReason,
    pub quit_reason_str: Option<String>,
}

impl SessionState {
    fn new(ps5: bool) -> Self {
        SessionState {
            target: Target::base(ps5),
            should_stop: false,
            ctrl_failed: false,
            ctrl_fail_reason: None,
            ctrl_session_id_received: false,
            ctrl_login_pin_requested: false,
            login_pin_entered: false,
            login_pin: None,
            nonce: None,
            handshake_key: None,
            host_addr_selected: None,
            mtu_in: 0,
            mtu_out: 0,
            rtt_us: 0,
            quit_reason: QuitReason::None,
            quit_reason_str: None,
        }
    }

    /// Set `quit_reason` only if it hasn't already been claimed, the
    /// never-overwrite rule (§7). The stream phase's successful-exit reset
    /// is the sole exception and assigns the field directly instead of
    /// going through this helper.
    fn set_quit_reason_if_none(&mut self, reason: QuitReason) {
        if self.quit_reason == QuitReason::None {
            self.quit_reason = reason;
        }
    }
}

/// Everything a running session needs, shared by `Arc` between the caller's
/// thread, the worker thread, and the collaborator handles they hand out.
pub(crate) struct SessionShared {
    pub state: Mutex<SessionState>,
    pub cond: Condvar,
    pub stop: StopToken,
    pub connect_info: ConnectInfo,
    pub event_cb: EventCallback,
    pub ctrl: Arc<dyn CtrlChannel>,
    pub senkusha: Arc<dyn SenkushaProbe>,
    pub stream_runner: Arc<dyn StreamRunner>,
    pub crypto: Arc<dyn CryptoProvider>,
}

impl SessionShared {
    fn emit(&self, event: SessionEvent) {
        (self.event_cb)(event);
    }
}

/// Handle passed to [`CtrlChannel::start`], letting the control channel
/// report progress back into the session's shared state without depending
/// on the orchestrator's internals.
#[derive(Clone)]
pub struct CtrlHandle {
    shared: Arc<SessionShared>,
}

impl CtrlHandle {
    /// Mark the control channel as failed. Wakes any waiter blocked on
    /// `ctrl_failed`.
    pub fn set_failed(&self) {
        let mut state = self.shared.state.lock();
        state.ctrl_failed = true;
        self.shared.cond.notify_all();
    }

    /// Mark that the console has assigned this session a Ctrl session id.
    pub fn set_session_id_received(&self) {
        let mut state = self.shared.state.lock();
        state.ctrl_session_id_received = true;
        self.shared.cond.notify_all();
    }

    /// Request an interactive PIN from the user (re-entrant: called again
    /// after an incorrect PIN).
    pub fn request_login_pin(&self) {
        let mut state = self.shared.state.lock();
        state.ctrl_login_pin_requested = true;
        self.shared.cond.notify_all();
    }

    /// The session's shared cancellation token, for Ctrl's own blocking I/O.
    pub fn stop_token(&self) -> StopToken {
        self.shared.stop.clone()
    }
}

/// A single Remote Play session: resolves a console host, authenticates,
/// optionally prompts for a PIN, measures the network path, and hands off
/// to the A/V stream connection.
///
/// Construct with [`Session::new`], drive with [`Session::start`], observe
/// progress through the event callback given at construction, and end with
/// [`Session::stop`] + [`Session::join`] (or simply drop the `Session`,
/// `Drop` performs the same sequence).
pub struct Session {
    shared: Arc<SessionShared>,
    worker: Option<JoinHandle<()>>,
}

impl Session {
    /// Assemble a new session from immutable connect parameters and its
    /// four external collaborators.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        connect_info: ConnectInfo,
        ctrl: Arc<dyn CtrlChannel>,
        senkusha: Arc<dyn SenkushaProbe>,
        stream_runner: Arc<dyn StreamRunner>,
        crypto: Arc<dyn CryptoProvider>,
        event_cb: EventCallback,
    ) -> Result<Self> {
        let state = SessionState::new(connect_info.ps5);

        let shared = Arc::new(SessionShared {
            state: Mutex::new(state),
            cond: Condvar::new(),
            stop: StopToken::new(),
            connect_info,
            event_cb,
            ctrl,
            senkusha,
            stream_runner,
            crypto,
        });

        Ok(Session {
            shared,
            worker: None,
        })
    }

    /// Spawn the worker thread. Calling this more than once is a no-op.
    pub fn start(&mut self) -> Result<()> {
        if self.worker.is_some() {
            tracing::warn!("Session::start called while already running");
            return Ok(());
        }

        let shared = self.shared.clone();
        let handle = std::thread::Builder::new()
            .name("rp-session-worker".to_string())
            .spawn(move || worker::run(shared))
            .map_err(SessionError::Network)?;

        self.worker = Some(handle);
        Ok(())
    }

    /// Request the session stop. Idempotent; safe to call before `start` or
    /// after the worker has already exited.
    pub fn stop(&self) {
        {
            let mut state = self.shared.state.lock();
            state.should_stop = true;
        }
        self.shared.stop.stop();
        self.shared.cond.notify_all();
        self.shared.stream_runner.stop();
    }

    /// Block until the worker thread exits. A no-op if `start` was never
    /// called or `join` already completed.
    pub fn join(&mut self) {
        if let Some(handle) = self.worker.take() {
            let _ = handle.join();
        }
    }

    /// Replace the current controller state snapshot, forwarding it to the
    /// stream connection's feedback sender immediately if one is active.
    pub fn set_controller_state(&self, state: ControllerState) {
        self.shared.stream_runner.set_controller_state(state);
    }

    /// Supply a PIN entered by the user in response to a
    /// [`SessionEvent::LoginPinRequest`](crate::event::SessionEvent::LoginPinRequest).
    pub fn set_login_pin(&self, pin: &[u8]) {
        let mut state = self.shared.state.lock();
        state.login_pin = Some(pin.to_vec());
        state.login_pin_entered = true;
        self.shared.cond.notify_all();
    }

    pub fn keyboard_set_text(&self, text: &str) -> Result<()> {
        self.shared.ctrl.keyboard_set_text(text)
    }

    pub fn keyboard_accept(&self) -> Result<()> {
        self.shared.ctrl.keyboard_accept()
    }

    pub fn keyboard_reject(&self) -> Result<()> {
        self.shared.ctrl.keyboard_reject()
    }

    pub fn goto_bed(&self) -> Result<()> {
        self.shared.ctrl.goto_bed()
    }
}

impl Drop for Session {
    /// Releases every owned resource on every exit path (I5): stopping and
    /// joining the worker corresponds to the C source's `fini`, the
    /// goto-based unwind that function performs maps here to `Drop` running
    /// once, unconditionally, however the `Session` goes out of scope.
    fn drop(&mut self) {
        self.stop();
        self.join();
    }
}

/// Block on `cond` until `predicate(state)` holds or `timeout` elapses (if
/// given). Returns `true` iff the predicate held when this returned,
/// i.e. `false` means a real timeout, not a spurious wakeup.
pub(crate) fn wait_predicate(
    shared: &SessionShared,
    timeout: Option<std::time::Duration>,
    predicate: impl Fn(&SessionState) -> bool,
) -> bool {
    let mut state = shared.state.lock();
    if predicate(&state) {
        return true;
    }

    match timeout {
        None => loop {
            shared.cond.wait(&mut state);
            if predicate(&state) {
                return true;
            }
        },
        Some(timeout) => {
            let deadline = std::time::Instant::now() + timeout;
            loop {
                if predicate(&state) {
                    return true;
                }
                let remaining = deadline.saturating_duration_since(std::time::Instant::now());
                if remaining.is_zero() {
                    return predicate(&state);
                }
                shared.cond.wait_for(&mut state, remaining);
            }
        }
    }
}
