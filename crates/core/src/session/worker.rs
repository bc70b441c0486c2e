//! The session worker thread: drives the nine-step state machine described
//! in the orchestrator's design (§4.4), from the first session request
//! through stream teardown.

use std::sync::Arc;
use std::time::Duration;

use super::{wait_predicate, CtrlHandle, SessionShared, SESSION_EXPECT_TIMEOUT_MS, SESSION_SETTLE_MS};
use crate::event::SessionEvent;
use crate::quit::QuitReason;
use crate::senkusha::SenkushaContext;
use crate::session_request::{self, SessionRequestResult};
use crate::stream::StreamContext;
use crate::target::Target;

/// Maximum number of session-request attempts: the initial request plus up
/// to two renegotiations.
const MAX_SESSION_REQUEST_ATTEMPTS: u32 = 3;

pub(crate) fn run(shared: Arc<SessionShared>) {
    match request_and_init_crypto(&shared) {
        Ok(()) => run_ctrl_onward(&shared),
        Err(reason) => finish(&shared, reason, None),
    }
}

/// Steps 1-2: negotiate a target and nonce via the session-request exchange,
/// then initialize RPCrypt. Ctrl has not been started yet on any exit path
/// here, so failures go straight to QUIT rather than through Ctrl teardown.
fn request_and_init_crypto(shared: &Arc<SessionShared>) -> Result<(), QuitReason> {
    let ps5 = shared.connect_info.ps5;
    let mut target = Target::base(ps5);
    let mut allow_renegotiation = true;

    let (nonce, host_addr, final_target) = 'negotiate: {
        for attempt in 0..MAX_SESSION_REQUEST_ATTEMPTS {
            if shared.stop.is_stopped() {
                return Err(QuitReason::Stopped);
            }
            if attempt + 1 == MAX_SESSION_REQUEST_ATTEMPTS {
                allow_renegotiation = false;
            }

            tracing::debug!(attempt, ?target, allow_renegotiation, "sending session request");

            let result = session_request::send_session_request(
                &shared.connect_info,
                target,
                allow_renegotiation,
                &shared.stop,
                Duration::from_millis(SESSION_EXPECT_TIMEOUT_MS),
            );

            match result {
                SessionRequestResult::Success { nonce, host_addr } => {
                    tracing::debug!(?target, %host_addr, "session request accepted");
                    break 'negotiate (nonce, host_addr, target);
                }
                SessionRequestResult::Renegotiate(next) => {
                    tracing::debug!(from = ?target, to = ?next, "renegotiating target version");
                    target = next;
                    continue;
                }
                SessionRequestResult::Failed(reason) => {
                    tracing::warn!(?reason, "session request failed");
                    return Err(reason);
                }
            }
        }
        return Err(QuitReason::SessionRequestRpVersionMismatch);
    };

    {
        let mut state = shared.state.lock();
        state.target = final_target;
        state.nonce = Some(nonce);
        state.host_addr_selected = Some(host_addr);
    }

    let morning = shared.connect_info.morning;
    if shared
        .crypto
        .init_rpcrypt(final_target, nonce, morning)
        .is_err()
    {
        return Err(QuitReason::CtrlUnknown);
    }

    if wait_predicate(
        shared,
        Some(Duration::from_millis(SESSION_SETTLE_MS)),
        |s| s.should_stop || s.ctrl_failed,
    ) {
        return Err(QuitReason::Stopped);
    }

    Ok(())
}

/// Steps 3-9: start Ctrl, optionally handle PIN prompts, probe the network
/// path, initialize the stream crypto, and run the stream connection. Ctrl
/// is guaranteed to be stopped and joined before this returns, regardless
/// of which branch below produced the final reason.
fn run_ctrl_onward(shared: &Arc<SessionShared>) {
    tracing::debug!("starting ctrl");
    let handle = CtrlHandle {
        shared: shared.clone(),
    };

    if let Err(e) = shared.ctrl.start(handle) {
        tracing::warn!(error = %e, "ctrl start failed");
        let reason = match e {
            crate::error::SessionError::ConnectionRefused => QuitReason::CtrlConnectionRefused,
            crate::error::SessionError::Network(_) => QuitReason::CtrlConnectFailed,
            _ => QuitReason::CtrlUnknown,
        };
        let mut state = shared.state.lock();
        state.ctrl_failed = true;
        state.ctrl_fail_reason = Some(reason);
    }

    let (reason, reason_str) = run_ctrl_phases(shared);

    tracing::debug!("stopping ctrl");
    shared.ctrl.stop();
    shared.ctrl.join();

    finish(shared, reason, reason_str);
}

fn run_ctrl_phases(shared: &Arc<SessionShared>) -> (QuitReason, Option<String>) {
    wait_predicate(shared, Some(Duration::from_millis(SESSION_EXPECT_TIMEOUT_MS)), |s| {
        s.should_stop || s.ctrl_failed || s.ctrl_session_id_received || s.ctrl_login_pin_requested
    });

    if let Some(reason) = check_stop_or_ctrl_failure(shared) {
        return (reason, None);
    }

    // PIN_WAITING: loop while Ctrl keeps asking for a PIN.
    let mut first_pin_request = true;
    loop {
        let pin_requested = {
            let mut state = shared.state.lock();
            if state.ctrl_login_pin_requested {
                state.ctrl_login_pin_requested = false;
                true
            } else {
                false
            }
        };
        if !pin_requested {
            break;
        }

        tracing::debug!(pin_incorrect = !first_pin_request, "requesting login pin");
        shared.emit(SessionEvent::LoginPinRequest {
            pin_incorrect: !first_pin_request,
        });
        first_pin_request = false;

        wait_predicate(shared, None, |s| {
            s.should_stop || s.ctrl_failed || s.login_pin_entered
        });

        if let Some(reason) = check_stop_or_ctrl_failure(shared) {
            return (reason, None);
        }

        let pin = {
            let mut state = shared.state.lock();
            state.login_pin_entered = false;
            state.login_pin.take()
        };
        if let Some(pin) = pin {
            let _ = shared.ctrl.send_login_pin(&pin);
        }

        wait_predicate(shared, Some(Duration::from_millis(SESSION_EXPECT_TIMEOUT_MS)), |s| {
            s.should_stop
                || s.ctrl_failed
                || s.ctrl_session_id_received
                || s.ctrl_login_pin_requested
        });

        if let Some(reason) = check_stop_or_ctrl_failure(shared) {
            return (reason, None);
        }
    }

    let session_id_received = shared.state.lock().ctrl_session_id_received;
    if !session_id_received {
        return (QuitReason::CtrlUnknown, None);
    }

    // Senkusha: fall back to defaults on any error other than cancellation.
    let target = shared.state.lock().target;
    tracing::debug!(?target, "running senkusha");
    let senkusha_ctx = SenkushaContext {
        target,
        stop: shared.stop.clone(),
    };
    match shared.senkusha.run(senkusha_ctx) {
        Ok(result) => {
            tracing::debug!(
                mtu_in = result.mtu_in,
                mtu_out = result.mtu_out,
                rtt_us = result.rtt_us,
                "senkusha measured path"
            );
            let mut state = shared.state.lock();
            state.mtu_in = result.mtu_in;
            state.mtu_out = result.mtu_out;
            state.rtt_us = result.rtt_us;
        }
        Err(crate::error::SessionError::Canceled) => {
            return (QuitReason::Stopped, None);
        }
        Err(e) => {
            tracing::warn!(error = %e, "senkusha failed, continuing with fallback path measurements");
            let mut state = shared.state.lock();
            state.mtu_in = crate::senkusha::SENKUSHA_FALLBACK.mtu_in;
            state.mtu_out = crate::senkusha::SENKUSHA_FALLBACK.mtu_out;
            state.rtt_us = crate::senkusha::SENKUSHA_FALLBACK.rtt_us;
        }
    }

    if shared.stop.is_stopped() {
        return (QuitReason::Stopped, None);
    }

    let handshake_key = shared.crypto.generate_handshake_key();
    {
        let mut state = shared.state.lock();
        state.handshake_key = Some(handshake_key);
    }
    if shared.crypto.init_ecdh().is_err() {
        return (QuitReason::CtrlUnknown, None);
    }

    if shared.stop.is_stopped() {
        return (QuitReason::Stopped, None);
    }

    let stream_ctx = {
        let state = shared.state.lock();
        StreamContext {
            target: state.target,
            mtu_in: state.mtu_in,
            mtu_out: state.mtu_out,
            rtt_us: state.rtt_us,
            handshake_key,
            video_profile: shared.connect_info.video_profile,
            enable_keyboard: shared.connect_info.enable_keyboard,
            stop: shared.stop.clone(),
        }
    };

    tracing::debug!("starting stream connection");
    match shared.stream_runner.run(stream_ctx) {
        Ok(crate::stream::StreamOutcome::Finished) => (QuitReason::Stopped, None),
        Ok(crate::stream::StreamOutcome::Disconnected { reason }) => {
            tracing::debug!(%reason, "stream connection remote disconnected");
            (QuitReason::StreamConnectionRemoteDisconnected, Some(reason))
        }
        Err(crate::error::SessionError::Canceled) => (QuitReason::Stopped, None),
        Err(e) => {
            tracing::warn!(error = %e, "stream connection failed");
            (QuitReason::StreamConnectionUnknown, None)
        }
    }
}

/// Checks the two conditions that end the Ctrl phase early regardless of
/// where in it we are: an external stop request, or Ctrl reporting failure.
/// Applies the never-overwrite rule (§7) when assigning the reason.
fn check_stop_or_ctrl_failure(shared: &SessionShared) -> Option<QuitReason> {
    let state = shared.state.lock();
    if state.should_stop {
        return Some(QuitReason::Stopped);
    }
    if state.ctrl_failed {
        return Some(state.ctrl_fail_reason.unwrap_or(QuitReason::CtrlUnknown));
    }
    None
}

fn finish(shared: &SessionShared, reason: QuitReason, reason_str: Option<String>) {
    let (reason, reason_str) = {
        let mut state = shared.state.lock();
        state.set_quit_reason_if_none(reason);
        if reason_str.is_some() {
            state.quit_reason_str = reason_str;
        }
        (state.quit_reason, state.quit_reason_str.clone())
    };

    tracing::debug!(?reason, ?reason_str, "session quit");
    shared.emit(SessionEvent::Quit { reason, reason_str });
}
