//! Interface to the StreamConnection A/V pipeline.
//!
//! When `run` returns, the session is over, audio/video codecs, input
//! capture, and the wire format for the streaming phase are all out of
//! scope here; this crate only needs the outcome.

use crate::connect_info::VideoProfile;
use crate::error::Result;
use crate::sync::StopToken;
use crate::target::Target;

/// Snapshot of controller input forwarded to the stream connection's
/// feedback sender. Deliberately minimal, input capture and the wire
/// encoding of controller state are out of scope.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ControllerState {
    pub buttons: u32,
    pub left_x: i16,
    pub left_y: i16,
    pub right_x: i16,
    pub right_y: i16,
    pub left_trigger: u8,
    pub right_trigger: u8,
}

/// Everything the stream connection needs to start: the negotiated target,
/// network path measurements, video profile, and a stop token.
pub struct StreamContext {
    pub target: Target,
    pub mtu_in: u32,
    pub mtu_out: u32,
    pub rtt_us: u32,
    pub handshake_key: [u8; 16],
    pub video_profile: VideoProfile,
    pub enable_keyboard: bool,
    pub stop: StopToken,
}

/// Result of a completed (or aborted) stream connection run.
#[derive(Debug, Clone)]
pub enum StreamOutcome {
    /// The stream ran to local stop/cancellation or a clean remote end.
    Finished,
    /// The remote end disconnected, with a server-supplied reason string.
    Disconnected { reason: String },
}

/// The A/V streaming runtime.
pub trait StreamRunner: Send + Sync {
    /// Run the stream connection to completion. Blocking, the orchestrator
    /// calls this with its state mutex released.
    fn run(&self, ctx: StreamContext) -> Result<StreamOutcome>;

    /// Request the stream connection stop. Idempotent.
    fn stop(&self);

    /// Forward a controller state snapshot to the feedback sender, if one
    /// is currently active.
    fn set_controller_state(&self, state: ControllerState);
}
