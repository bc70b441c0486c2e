//! End-to-end session tests against a loopback session-request responder
//! and fake Ctrl/Senkusha/StreamConnection/crypto collaborators.

use std::io::{BufRead, BufReader, Write};
use std::net::{SocketAddr, TcpListener};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use remoteplay_session::connect_info::{ConnectInfo, VideoProfile};
use remoteplay_session::crypto::{CryptoProvider, Ecdh, RpCrypt};
use remoteplay_session::ctrl::CtrlChannel;
use remoteplay_session::error::Result;
use remoteplay_session::event::SessionEvent;
use remoteplay_session::senkusha::{SenkushaContext, SenkushaProbe, SenkushaResult};
use remoteplay_session::stream::{ControllerState, StreamContext, StreamOutcome, StreamRunner};
use remoteplay_session::{CtrlHandle, Session, Target};

fn connect_info_for(addr: SocketAddr, ps5: bool) -> ConnectInfo {
    ConnectInfo {
        ps5,
        host_addrinfos: vec![addr],
        host_addrinfo_selected: None,
        hostname: addr.ip().to_string(),
        regist_key: [0u8; 16],
        morning: [0u8; 16],
        did: [0u8; 32],
        video_profile: VideoProfile::default(),
        video_profile_auto_downgrade: false,
        enable_keyboard: false,
    }
}

/// Serves canned session-request HTTP responses in order, one per accepted
/// connection, holding the last response for any extra connections.
fn spawn_session_request_responder(responses: Vec<&'static str>) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    std::thread::spawn(move || {
        let mut responses = responses.into_iter();
        let mut last = "HTTP/1.1 500 Internal Server Error\r\n\r\n";
        loop {
            let Ok((mut stream, _)) = listener.accept() else {
                break;
            };
            let mut reader = BufReader::new(stream.try_clone().unwrap());
            let mut line = String::new();
            loop {
                line.clear();
                if reader.read_line(&mut line).unwrap_or(0) == 0 {
                    return;
                }
                if line == "\r\n" {
                    break;
                }
            }
            let response = responses.next().unwrap_or(last);
            last = response;
            let _ = stream.write_all(response.as_bytes());
        }
    });
    addr
}

struct NoopRpCrypt;
impl RpCrypt for NoopRpCrypt {}

struct NoopEcdh;
impl Ecdh for NoopEcdh {}

struct FakeCrypto;

impl CryptoProvider for FakeCrypto {
    fn init_rpcrypt(&self, _target: Target, _nonce: [u8; 16], _morning: [u8; 16]) -> Result<Box<dyn RpCrypt>> {
        Ok(Box::new(NoopRpCrypt))
    }

    fn generate_handshake_key(&self) -> [u8; 16] {
        [0x42; 16]
    }

    fn init_ecdh(&self) -> Result<Box<dyn Ecdh>> {
        Ok(Box::new(NoopEcdh))
    }
}

struct FakeStream;

impl StreamRunner for FakeStream {
    fn run(&self, _ctx: StreamContext) -> Result<StreamOutcome> {
        Ok(StreamOutcome::Finished)
    }

    fn stop(&self) {}

    fn set_controller_state(&self, _state: ControllerState) {}
}

struct FakeSenkusha {
    result: SenkushaResult,
}

impl SenkushaProbe for FakeSenkusha {
    fn run(&self, _ctx: SenkushaContext) -> Result<SenkushaResult> {
        Ok(self.result)
    }
}

/// Senkusha fake that blocks until either a fixed duration elapses or the
/// session's stop token fires, whichever is first, used to exercise
/// cancellation mid-probe.
struct CancelableSenkusha;

impl SenkushaProbe for CancelableSenkusha {
    fn run(&self, ctx: SenkushaContext) -> Result<SenkushaResult> {
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while std::time::Instant::now() < deadline {
            if ctx.stop.is_stopped() {
                return Err(remoteplay_session::error::SessionError::Canceled);
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        Ok(SenkushaResult {
            mtu_in: 1454,
            mtu_out: 1454,
            rtt_us: 1000,
        })
    }
}

/// Ctrl fake whose `start` fails outright with a given error, exercising the
/// `ctrl.start()`-error-to-`QuitReason` mapping.
struct FakeCtrlStartFails(remoteplay_session::error::SessionError);

impl CtrlChannel for FakeCtrlStartFails {
    fn start(&self, _handle: CtrlHandle) -> Result<()> {
        match &self.0 {
            remoteplay_session::error::SessionError::ConnectionRefused => {
                Err(remoteplay_session::error::SessionError::ConnectionRefused)
            }
            remoteplay_session::error::SessionError::Network(e) => {
                Err(remoteplay_session::error::SessionError::Network(std::io::Error::new(
                    e.kind(),
                    e.to_string(),
                )))
            }
            _ => Err(remoteplay_session::error::SessionError::Unknown("ctrl start failed".into())),
        }
    }

    fn stop(&self) {}
    fn join(&self) {}
    fn send_login_pin(&self, _pin: &[u8]) -> Result<()> {
        Ok(())
    }
    fn keyboard_set_text(&self, _text: &str) -> Result<()> {
        Ok(())
    }
    fn keyboard_accept(&self) -> Result<()> {
        Ok(())
    }
    fn keyboard_reject(&self) -> Result<()> {
        Ok(())
    }
    fn goto_bed(&self) -> Result<()> {
        Ok(())
    }
}

/// Ctrl fake that reports its session id immediately, with no PIN prompt.
struct FakeCtrlNoPin;

impl CtrlChannel for FakeCtrlNoPin {
    fn start(&self, handle: CtrlHandle) -> Result<()> {
        handle.set_session_id_received();
        Ok(())
    }

    fn stop(&self) {}
    fn join(&self) {}
    fn send_login_pin(&self, _pin: &[u8]) -> Result<()> {
        Ok(())
    }
    fn keyboard_set_text(&self, _text: &str) -> Result<()> {
        Ok(())
    }
    fn keyboard_accept(&self) -> Result<()> {
        Ok(())
    }
    fn keyboard_reject(&self) -> Result<()> {
        Ok(())
    }
    fn goto_bed(&self) -> Result<()> {
        Ok(())
    }
}

/// Ctrl fake that asks for a PIN on start, rejects the first `wrong_attempts`
/// submissions (re-prompting each time), then accepts and reports success.
struct FakeCtrlWithPin {
    wrong_attempts: u32,
    attempts_seen: AtomicU32,
    handle: Mutex<Option<CtrlHandle>>,
}

impl FakeCtrlWithPin {
    fn new(wrong_attempts: u32) -> Self {
        FakeCtrlWithPin {
            wrong_attempts,
            attempts_seen: AtomicU32::new(0),
            handle: Mutex::new(None),
        }
    }
}

impl CtrlChannel for FakeCtrlWithPin {
    fn start(&self, handle: CtrlHandle) -> Result<()> {
        handle.request_login_pin();
        *self.handle.lock().unwrap() = Some(handle);
        Ok(())
    }

    fn stop(&self) {}
    fn join(&self) {}

    fn send_login_pin(&self, _pin: &[u8]) -> Result<()> {
        let attempt = self.attempts_seen.fetch_add(1, Ordering::SeqCst);
        let handle = self.handle.lock().unwrap();
        let handle = handle.as_ref().expect("start must run before send_login_pin");
        if attempt < self.wrong_attempts {
            handle.request_login_pin();
        } else {
            handle.set_session_id_received();
        }
        Ok(())
    }

    fn keyboard_set_text(&self, _text: &str) -> Result<()> {
        Ok(())
    }
    fn keyboard_accept(&self) -> Result<()> {
        Ok(())
    }
    fn keyboard_reject(&self) -> Result<()> {
        Ok(())
    }
    fn goto_bed(&self) -> Result<()> {
        Ok(())
    }
}

fn event_channel() -> (remoteplay_session::EventCallback, Receiver<SessionEvent>) {
    let (tx, rx): (Sender<SessionEvent>, Receiver<SessionEvent>) = mpsc::channel();
    let tx = Mutex::new(tx);
    let cb = Box::new(move |event: SessionEvent| {
        let _ = tx.lock().unwrap().send(event);
    });
    (cb, rx)
}

fn recv_quit(rx: &Receiver<SessionEvent>) -> SessionEvent {
    loop {
        match rx.recv_timeout(Duration::from_secs(5)).expect("event before timeout") {
            event @ SessionEvent::Quit { .. } => return event,
            _ => continue,
        }
    }
}

#[test]
fn happy_path_ps5_session() {
    let addr = spawn_session_request_responder(vec![
        "HTTP/1.1 200 OK\r\nRP-Nonce: AAECAwQFBgcICQoLDA0ODw==\r\n\r\n",
    ]);
    let connect_info = connect_info_for(addr, true);
    let (cb, rx) = event_channel();

    let mut session = Session::new(
        connect_info,
        Arc::new(FakeCtrlNoPin),
        Arc::new(FakeSenkusha {
            result: SenkushaResult { mtu_in: 1454, mtu_out: 1454, rtt_us: 1000 },
        }),
        Arc::new(FakeStream),
        Arc::new(FakeCrypto),
        cb,
    )
    .expect("session construction");

    session.start().expect("session start");
    let quit = recv_quit(&rx);
    match quit {
        SessionEvent::Quit { reason, .. } => {
            assert_eq!(reason, remoteplay_session::QuitReason::Stopped)
        }
        _ => unreachable!(),
    }
    session.join();
}

#[test]
fn renegotiates_to_ps4_v9() {
    let addr = spawn_session_request_responder(vec![
        "HTTP/1.1 403 Forbidden\r\nRP-Application-Reason: 0x80108b09\r\nRP-Version: 9.0\r\n\r\n",
        "HTTP/1.1 200 OK\r\nRP-Nonce: AAECAwQFBgcICQoLDA0ODw==\r\n\r\n",
    ]);
    let connect_info = connect_info_for(addr, false);
    let (cb, rx) = event_channel();

    let mut session = Session::new(
        connect_info,
        Arc::new(FakeCtrlNoPin),
        Arc::new(FakeSenkusha {
            result: SenkushaResult { mtu_in: 1454, mtu_out: 1454, rtt_us: 1000 },
        }),
        Arc::new(FakeStream),
        Arc::new(FakeCrypto),
        cb,
    )
    .expect("session construction");

    session.start().expect("session start");
    let quit = recv_quit(&rx);
    assert!(matches!(
        quit,
        SessionEvent::Quit { reason: remoteplay_session::QuitReason::Stopped, .. }
    ));
    session.join();
}

#[test]
fn bogus_five_dot_zero_is_treated_as_ps4_v9() {
    let addr = spawn_session_request_responder(vec![
        "HTTP/1.1 403 Forbidden\r\nRP-Application-Reason: 0x80108b09\r\nRP-Version: 5.0\r\n\r\n",
        "HTTP/1.1 200 OK\r\nRP-Nonce: AAECAwQFBgcICQoLDA0ODw==\r\n\r\n",
    ]);
    let connect_info = connect_info_for(addr, false);
    let (cb, rx) = event_channel();

    let mut session = Session::new(
        connect_info,
        Arc::new(FakeCtrlNoPin),
        Arc::new(FakeSenkusha {
            result: SenkushaResult { mtu_in: 1454, mtu_out: 1454, rtt_us: 1000 },
        }),
        Arc::new(FakeStream),
        Arc::new(FakeCrypto),
        cb,
    )
    .expect("session construction");

    session.start().expect("session start");
    let quit = recv_quit(&rx);
    assert!(matches!(
        quit,
        SessionEvent::Quit { reason: remoteplay_session::QuitReason::Stopped, .. }
    ));
    session.join();
}

#[test]
fn already_in_use_quits_without_retry() {
    let addr = spawn_session_request_responder(vec![
        "HTTP/1.1 403 Forbidden\r\nRP-Application-Reason: 0x80108b10\r\n\r\n",
    ]);
    let connect_info = connect_info_for(addr, false);
    let (cb, rx) = event_channel();

    let mut session = Session::new(
        connect_info,
        Arc::new(FakeCtrlNoPin),
        Arc::new(FakeSenkusha {
            result: SenkushaResult { mtu_in: 1454, mtu_out: 1454, rtt_us: 1000 },
        }),
        Arc::new(FakeStream),
        Arc::new(FakeCrypto),
        cb,
    )
    .expect("session construction");

    session.start().expect("session start");
    let quit = recv_quit(&rx);
    assert!(matches!(
        quit,
        SessionEvent::Quit {
            reason: remoteplay_session::QuitReason::SessionRequestRpInUse,
            ..
        }
    ));
    session.join();
}

#[test]
fn pin_flow_with_one_incorrect_attempt() {
    let addr = spawn_session_request_responder(vec![
        "HTTP/1.1 200 OK\r\nRP-Nonce: AAECAwQFBgcICQoLDA0ODw==\r\n\r\n",
    ]);
    let connect_info = connect_info_for(addr, true);
    let (cb, rx) = event_channel();

    let mut session = Session::new(
        connect_info,
        Arc::new(FakeCtrlWithPin::new(1)),
        Arc::new(FakeSenkusha {
            result: SenkushaResult { mtu_in: 1454, mtu_out: 1454, rtt_us: 1000 },
        }),
        Arc::new(FakeStream),
        Arc::new(FakeCrypto),
        cb,
    )
    .expect("session construction");

    session.start().expect("session start");

    let first = rx.recv_timeout(Duration::from_secs(5)).expect("first pin prompt");
    match first {
        SessionEvent::LoginPinRequest { pin_incorrect } => assert!(!pin_incorrect),
        other => panic!("expected LoginPinRequest, got {other:?}"),
    }
    session.set_login_pin(b"0000");

    let second = rx.recv_timeout(Duration::from_secs(5)).expect("second pin prompt");
    match second {
        SessionEvent::LoginPinRequest { pin_incorrect } => assert!(pin_incorrect),
        other => panic!("expected LoginPinRequest, got {other:?}"),
    }
    session.set_login_pin(b"1234");

    let quit = recv_quit(&rx);
    assert!(matches!(
        quit,
        SessionEvent::Quit { reason: remoteplay_session::QuitReason::Stopped, .. }
    ));
    session.join();
}

#[test]
fn ctrl_start_connection_refused_maps_to_specific_reason() {
    let addr = spawn_session_request_responder(vec![
        "HTTP/1.1 200 OK\r\nRP-Nonce: AAECAwQFBgcICQoLDA0ODw==\r\n\r\n",
    ]);
    let connect_info = connect_info_for(addr, true);
    let (cb, rx) = event_channel();

    let mut session = Session::new(
        connect_info,
        Arc::new(FakeCtrlStartFails(remoteplay_session::error::SessionError::ConnectionRefused)),
        Arc::new(FakeSenkusha {
            result: SenkushaResult { mtu_in: 1454, mtu_out: 1454, rtt_us: 1000 },
        }),
        Arc::new(FakeStream),
        Arc::new(FakeCrypto),
        cb,
    )
    .expect("session construction");

    session.start().expect("session start");
    let quit = recv_quit(&rx);
    assert!(matches!(
        quit,
        SessionEvent::Quit { reason: remoteplay_session::QuitReason::CtrlConnectionRefused, .. }
    ));
    session.join();
}

#[test]
fn ctrl_start_network_error_maps_to_connect_failed() {
    let addr = spawn_session_request_responder(vec![
        "HTTP/1.1 200 OK\r\nRP-Nonce: AAECAwQFBgcICQoLDA0ODw==\r\n\r\n",
    ]);
    let connect_info = connect_info_for(addr, true);
    let (cb, rx) = event_channel();

    let mut session = Session::new(
        connect_info,
        Arc::new(FakeCtrlStartFails(remoteplay_session::error::SessionError::Network(
            std::io::Error::new(std::io::ErrorKind::Other, "ctrl socket broke"),
        ))),
        Arc::new(FakeSenkusha {
            result: SenkushaResult { mtu_in: 1454, mtu_out: 1454, rtt_us: 1000 },
        }),
        Arc::new(FakeStream),
        Arc::new(FakeCrypto),
        cb,
    )
    .expect("session construction");

    session.start().expect("session start");
    let quit = recv_quit(&rx);
    assert!(matches!(
        quit,
        SessionEvent::Quit { reason: remoteplay_session::QuitReason::CtrlConnectFailed, .. }
    ));
    session.join();
}

#[test]
fn external_stop_during_senkusha_quits_stopped() {
    let addr = spawn_session_request_responder(vec![
        "HTTP/1.1 200 OK\r\nRP-Nonce: AAECAwQFBgcICQoLDA0ODw==\r\n\r\n",
    ]);
    let connect_info = connect_info_for(addr, true);
    let (cb, rx) = event_channel();

    let mut session = Session::new(
        connect_info,
        Arc::new(FakeCtrlNoPin),
        Arc::new(CancelableSenkusha),
        Arc::new(FakeStream),
        Arc::new(FakeCrypto),
        cb,
    )
    .expect("session construction");

    session.start().expect("session start");
    std::thread::sleep(Duration::from_millis(100));
    session.stop();

    let quit = recv_quit(&rx);
    assert!(matches!(
        quit,
        SessionEvent::Quit { reason: remoteplay_session::QuitReason::Stopped, .. }
    ));
    session.join();
}
