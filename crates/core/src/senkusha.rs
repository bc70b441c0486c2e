//! Interface to the Senkusha MTU/RTT prober.
//!
//! The probe protocol itself is out of scope; this crate only needs its
//! inputs and outputs to drive the phase described in the state machine.

use crate::error::Result;
use crate::sync::StopToken;
use crate::target::Target;

/// MTU/RTT measurements produced by a successful probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SenkushaResult {
    pub mtu_in: u32,
    pub mtu_out: u32,
    pub rtt_us: u32,
}

/// Fallback values used when the probe fails for any reason other than
/// cancellation, the session continues rather than treating this as fatal.
pub const SENKUSHA_FALLBACK: SenkushaResult = SenkushaResult {
    mtu_in: 1454,
    mtu_out: 1454,
    rtt_us: 1000,
};

/// Context handed to a probe implementation: the target under negotiation
/// and a token it must honor for cancellation.
pub struct SenkushaContext {
    pub target: Target,
    pub stop: StopToken,
}

/// An MTU/RTT probing handshake that precedes the stream phase.
pub trait SenkushaProbe: Send + Sync {
    /// Run the probe to completion. Must return `Err(SessionError::Canceled)`
    /// promptly once `ctx.stop` is signaled.
    fn run(&self, ctx: SenkushaContext) -> Result<SenkushaResult>;
}
