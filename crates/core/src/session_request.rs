//! The session-request exchange: a single-shot HTTP/1.1 GET that negotiates
//! protocol version and obtains the crypto nonce that seeds RPCrypt.

use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::time::{Duration, Instant};

use base64::Engine;

use crate::connect_info::ConnectInfo;
use crate::quit::{QuitReason, RpApplicationReason};
use crate::sync::StopToken;
use crate::target::Target;

/// TCP port the session-request exchange connects to.
pub const SESSION_REQUEST_PORT: u16 = 9295;

const USER_AGENT: &str = "remoteplay Windows";
const NONCE_LEN: usize = 16;

/// Outcome of a single session-request attempt.
pub enum SessionRequestResult {
    /// The server accepted the request and handed back a nonce.
    Success {
        nonce: [u8; NONCE_LEN],
        host_addr: SocketAddr,
    },
    /// The server rejected the target version; retry with the given target
    /// (the caller decides whether another renegotiation is still allowed).
    Renegotiate(Target),
    /// Terminal failure, the caller should quit with this reason.
    Failed(QuitReason),
}

/// Run one session-request attempt against every resolved address in
/// `connect_info`, in order, until one connects or the list is exhausted.
///
/// `allow_renegotiation` gates whether a version-mismatch response may
/// produce [`SessionRequestResult::Renegotiate`], the state machine passes
/// `false` on its final, no-more-retries attempt.
pub fn send_session_request(
    connect_info: &ConnectInfo,
    target: Target,
    allow_renegotiation: bool,
    stop: &StopToken,
    timeout: Duration,
) -> SessionRequestResult {
    let Some(version) = target.version_string() else {
        return SessionRequestResult::Failed(QuitReason::SessionRequestUnknown);
    };

    let mut last_failure = QuitReason::SessionRequestConnectionRefused;

    for &addr in &connect_info.host_addrinfos {
        // `SocketAddr` in Rust is always `V4` or `V6`, unlike the C
        // `sockaddr` family byte this filter is translated from, so this
        // check never actually skips anything; kept to mirror the original
        // per-family address iteration faithfully.
        if !matches!(addr, SocketAddr::V4(_) | SocketAddr::V6(_)) {
            continue;
        }

        let deadline = Instant::now() + timeout;
        let stream = match stop.connect_cancelable(addr, timeout) {
            Ok(stream) => stream,
            Err(crate::error::SessionError::Canceled) => {
                return SessionRequestResult::Failed(QuitReason::Stopped);
            }
            Err(crate::error::SessionError::ConnectionRefused) => {
                last_failure = QuitReason::SessionRequestConnectionRefused;
                continue;
            }
            Err(_) => {
                last_failure = QuitReason::SessionRequestConnectionRefused;
                continue;
            }
        };

        let remaining = deadline.saturating_duration_since(Instant::now());
        match run_exchange(
            stream,
            addr,
            connect_info,
            target,
            version,
            allow_renegotiation,
            stop,
            remaining,
        ) {
            ExchangeResult::Outcome(result) => return result,
            ExchangeResult::TryNextAddress(reason) => {
                last_failure = reason;
                continue;
            }
        }
    }

    SessionRequestResult::Failed(last_failure)
}

enum ExchangeResult {
    Outcome(SessionRequestResult),
    TryNextAddress(QuitReason),
}

fn run_exchange(
    mut stream: TcpStream,
    addr: SocketAddr,
    connect_info: &ConnectInfo,
    target: Target,
    version: &str,
    allow_renegotiation: bool,
    stop: &StopToken,
    timeout: Duration,
) -> ExchangeResult {
    let request = build_request(addr, connect_info, target, version);

    if stream.write_all(request.as_bytes()).is_err() {
        return ExchangeResult::TryNextAddress(QuitReason::SessionRequestConnectionRefused);
    }

    let response = match read_response(&mut stream, stop, timeout) {
        Ok(response) => response,
        Err(crate::error::SessionError::Canceled) => {
            return ExchangeResult::Outcome(SessionRequestResult::Failed(QuitReason::Stopped));
        }
        Err(_) => {
            return ExchangeResult::TryNextAddress(QuitReason::SessionRequestUnknown);
        }
    };

    ExchangeResult::Outcome(interpret_response(
        &response,
        connect_info.ps5,
        addr,
        allow_renegotiation,
        version,
    ))
}

fn build_request(addr: SocketAddr, connect_info: &ConnectInfo, target: Target, version: &str) -> String {
    let path = match target {
        Target::Ps4V8 | Target::Ps4V9 => "/sce/rp/session",
        Target::Ps5V1 | Target::Ps5Unknown => "/sie/ps5/rp/sess/init",
        Target::Ps4V10 | Target::Ps4Unknown => "/sie/ps4/rp/sess/init",
    };

    let regist_key_len = connect_info
        .regist_key
        .iter()
        .position(|&b| b == 0)
        .unwrap_or(connect_info.regist_key.len());
    let regist_key_hex = hex_encode(&connect_info.regist_key[..regist_key_len]);
    let host = match addr.ip() {
        std::net::IpAddr::V4(ip) => ip.to_string(),
        std::net::IpAddr::V6(ip) => format!("[{ip}]"),
    };

    format!(
        "GET {path} HTTP/1.1\r\n\
         Host: {host}:{port}\r\n\
         User-Agent: {USER_AGENT}\r\n\
         Connection: close\r\n\
         Content-Length: 0\r\n\
         RP-Registkey: {regist_key_hex}\r\n\
         Rp-Version: {version}\r\n\
         \r\n",
        port = SESSION_REQUEST_PORT,
    )
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

struct RawResponse {
    status_code: u16,
    headers: Vec<(String, String)>,
}

impl RawResponse {
    /// Exact (case-sensitive) header lookup, per §4.3's rule for `RP-Nonce`
    /// and `RP-Application-Reason`.
    fn get_exact(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Case-insensitive header lookup, used only for `RP-Version`.
    fn get_ci(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Read the status line and headers, with cancellation and a deadline.
/// Stops consuming once the blank line terminating the header block has
/// been seen; the session-request response has no body.
fn read_response(
    stream: &mut TcpStream,
    stop: &StopToken,
    timeout: Duration,
) -> crate::error::Result<RawResponse> {
    const POLL: Duration = Duration::from_millis(50);
    stream.set_read_timeout(Some(POLL)).ok();

    let deadline = Instant::now() + timeout;
    let mut buf = Vec::new();
    let mut chunk = [0u8; 512];

    loop {
        if stop.is_stopped() {
            return Err(crate::error::SessionError::Canceled);
        }
        if Instant::now() >= deadline {
            return Err(crate::error::SessionError::Network(std::io::Error::from(
                std::io::ErrorKind::TimedOut,
            )));
        }
        if let Some(pos) = find_header_end(&buf) {
            let text = String::from_utf8_lossy(&buf[..pos]).to_string();
            return parse_headers(&text);
        }

        match stream.read(&mut chunk) {
            Ok(0) => {
                return Err(crate::error::SessionError::Disconnected(
                    "connection closed before headers completed".to_string(),
                ));
            }
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
            Err(e)
                if e.kind() == std::io::ErrorKind::WouldBlock
                    || e.kind() == std::io::ErrorKind::TimedOut =>
            {
                continue;
            }
            Err(e) => return Err(crate::error::SessionError::Network(e)),
        }
    }
}

fn find_header_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n").map(|p| p + 4)
}

fn parse_headers(text: &str) -> crate::error::Result<RawResponse> {
    let mut lines = text.split("\r\n");
    let status_line = lines
        .next()
        .ok_or_else(|| crate::error::SessionError::InvalidData("empty response".to_string()))?;

    let status_code = status_line
        .split_whitespace()
        .nth(1)
        .and_then(|s| s.parse::<u16>().ok())
        .ok_or_else(|| crate::error::SessionError::InvalidData("malformed status line".to_string()))?;

    let mut headers = Vec::new();
    for line in lines {
        if line.is_empty() {
            continue;
        }
        if let Some(colon) = line.find(':') {
            let name = line[..colon].trim().to_string();
            let value = line[colon + 1..].trim().to_string();
            headers.push((name, value));
        }
    }

    Ok(RawResponse { status_code, headers })
}

fn interpret_response(
    response: &RawResponse,
    ps5: bool,
    host_addr: SocketAddr,
    allow_renegotiation: bool,
    our_version: &str,
) -> SessionRequestResult {
    let nonce_b64 = response.get_exact("RP-Nonce");

    if response.status_code == 200 {
        if let Some(nonce_b64) = nonce_b64 {
            return match base64::engine::general_purpose::STANDARD.decode(nonce_b64) {
                Ok(bytes) if bytes.len() == NONCE_LEN => {
                    let mut nonce = [0u8; NONCE_LEN];
                    nonce.copy_from_slice(&bytes);
                    SessionRequestResult::Success { nonce, host_addr }
                }
                _ => SessionRequestResult::Failed(QuitReason::SessionRequestUnknown),
            };
        }
    }

    // Status 200 without RP-Nonce, or any non-200 status: treat as failure
    // and fall through to the application-reason mapping below.
    let error_code = response
        .get_exact("RP-Application-Reason")
        .and_then(|v| u32::from_str_radix(v.trim_start_matches("0x"), 16).ok());

    let reason = error_code.map(RpApplicationReason::from_code);
    let rp_version_header = response.get_ci("RP-Version");

    // RP_APPLICATION_REASON_UNKNOWN is treated as a renegotiation trigger
    // too, whenever an RP-Version header is present, not just RP_VERSION.
    // Whether that's intentional on the server side or just defensive is
    // unclear; kept broad rather than narrowed, flagged here for review.
    let mismatch_candidate = matches!(
        reason,
        Some(RpApplicationReason::RpVersion) | Some(RpApplicationReason::Unknown) | None
    );

    if mismatch_candidate && allow_renegotiation {
        if let Some(server_version) = rp_version_header.filter(|v| *v != our_version) {
            if server_version == "5.0" {
                return SessionRequestResult::Renegotiate(Target::Ps4V9);
            }

            let parsed = Target::version_parse(server_version, ps5);
            if !parsed.is_unknown() {
                return SessionRequestResult::Renegotiate(parsed);
            }
            return SessionRequestResult::Failed(QuitReason::SessionRequestRpVersionMismatch);
        }
    }

    match reason {
        Some(r) => SessionRequestResult::Failed(r.to_quit_reason()),
        None => SessionRequestResult::Failed(QuitReason::SessionRequestUnknown),
    }
}
