//! Immutable connection parameters assembled once, before a session starts.

use std::net::{SocketAddr, ToSocketAddrs};

use rand::RngCore;

use crate::error::{Result, SessionError};

/// 10-byte fixed prefix of the synthesized device id (§6).
const DEVICE_ID_PREFIX: [u8; 10] = [0x00, 0x18, 0x00, 0x00, 0x00, 0x07, 0x00, 0x40, 0x00, 0x80];
const DEVICE_ID_RANDOM_LEN: usize = 16;
const DEVICE_ID_SUFFIX_LEN: usize = 6;
const DEVICE_ID_LEN: usize = DEVICE_ID_PREFIX.len() + DEVICE_ID_RANDOM_LEN + DEVICE_ID_SUFFIX_LEN;

/// A common video resolution preset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoResolutionPreset {
    P360,
    P540,
    P720,
    P1080,
}

/// Target frame rate preset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FpsPreset {
    Fps30,
    Fps60,
}

impl FpsPreset {
    fn as_u32(self) -> u32 {
        match self {
            FpsPreset::Fps30 => 30,
            FpsPreset::Fps60 => 60,
        }
    }
}

/// Negotiated video profile (resolution, bitrate, frame rate).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VideoProfile {
    pub width: u32,
    pub height: u32,
    pub bitrate: u32,
    pub max_fps: u32,
}

impl VideoProfile {
    /// Build a profile from the fixed resolution/bitrate table, combined
    /// with a frame rate preset. Unrecognized presets zero the fields,
    /// there is no "unknown resolution" variant to fall back to, so the
    /// fixed table below is the sole source of truth here.
    pub fn from_presets(resolution: VideoResolutionPreset, fps: FpsPreset) -> Self {
        let (width, height, bitrate) = match resolution {
            VideoResolutionPreset::P360 => (640, 360, 2000),
            VideoResolutionPreset::P540 => (960, 540, 6000),
            VideoResolutionPreset::P720 => (1280, 720, 10000),
            VideoResolutionPreset::P1080 => (1920, 1080, 15000),
        };
        VideoProfile {
            width,
            height,
            bitrate,
            max_fps: fps.as_u32(),
        }
    }
}

/// Immutable configuration for a single session attempt, assembled once at
/// construction time.
#[derive(Debug, Clone)]
pub struct ConnectInfo {
    pub ps5: bool,
    /// Resolved candidate addresses for the console host, in resolution
    /// order. Iterated by the session-request layer until one connects.
    pub host_addrinfos: Vec<SocketAddr>,
    /// Set after a successful TCP connect during the session request.
    pub host_addrinfo_selected: Option<SocketAddr>,
    /// Numeric form of the address used for the current attempt.
    pub hostname: String,
    pub regist_key: [u8; 16],
    pub morning: [u8; 16],
    pub did: [u8; DEVICE_ID_LEN],
    pub video_profile: VideoProfile,
    pub video_profile_auto_downgrade: bool,
    pub enable_keyboard: bool,
}

impl ConnectInfo {
    /// Resolve `host` and assemble the immutable connection parameters.
    ///
    /// Name resolution happens here, up front, failure aborts construction
    /// with `ParseAddr` rather than being deferred to the worker thread.
    pub fn new(
        host: &str,
        ps5: bool,
        regist_key: [u8; 16],
        morning: [u8; 16],
        video_profile: VideoProfile,
        video_profile_auto_downgrade: bool,
        enable_keyboard: bool,
    ) -> Result<Self> {
        let host_addrinfos = resolve_host(host)?;
        let did = synthesize_device_id();

        Ok(ConnectInfo {
            ps5,
            host_addrinfos,
            host_addrinfo_selected: None,
            hostname: host.to_string(),
            regist_key,
            morning,
            did,
            video_profile,
            video_profile_auto_downgrade,
            enable_keyboard,
        })
    }
}

/// Resolve `host` (with the fixed session-request port) into a list of
/// candidate socket addresses, failing with `ParseAddr` if resolution
/// yields nothing.
fn resolve_host(host: &str) -> Result<Vec<SocketAddr>> {
    let addrs: Vec<SocketAddr> = (host, crate::session_request::SESSION_REQUEST_PORT)
        .to_socket_addrs()
        .map_err(|e| SessionError::ParseAddr(e.to_string()))?
        .collect();

    if addrs.is_empty() {
        return Err(SessionError::ParseAddr(format!(
            "no addresses resolved for host {host}"
        )));
    }

    Ok(addrs)
}

/// Synthesize a 32-byte device id: fixed 10-byte prefix, 16 cryptographically
/// random bytes, 6 zero bytes.
fn synthesize_device_id() -> [u8; DEVICE_ID_LEN] {
    let mut did = [0u8; DEVICE_ID_LEN];
    did[..DEVICE_ID_PREFIX.len()].copy_from_slice(&DEVICE_ID_PREFIX);

    let random_range = DEVICE_ID_PREFIX.len()..DEVICE_ID_PREFIX.len() + DEVICE_ID_RANDOM_LEN;
    rand::rng().fill_bytes(&mut did[random_range]);

    // Trailing DEVICE_ID_SUFFIX_LEN bytes are already zero from the array init.
    did
}
