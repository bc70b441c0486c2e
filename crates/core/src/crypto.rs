//! Interface to the session's crypto primitives.
//!
//! RPCrypt, ECDH, and secure random generation are explicitly out of scope
//! for this crate, the actual key derivation and cipher state belong to
//! the console's proprietary wire protocol. What's in scope is the seam:
//! the three points in the state machine (§4.4 steps 2 and 7) where the
//! orchestrator needs crypto state initialized before it can proceed.

use crate::error::Result;
use crate::target::Target;

/// Opaque handle to the session-layer symmetric crypto context, keyed by
/// `(target, nonce, morning)`. Its internals are a collaborator concern.
pub trait RpCrypt: Send + Sync {}

/// Opaque handle to the stream-phase ECDH context.
pub trait Ecdh: Send + Sync {}

/// Factory for the session's crypto contexts and random material.
pub trait CryptoProvider: Send + Sync {
    /// Initialize RPCrypt from the negotiated target, the server-supplied
    /// nonce, and the pre-shared "morning" secret.
    fn init_rpcrypt(
        &self,
        target: Target,
        nonce: [u8; 16],
        morning: [u8; 16],
    ) -> Result<Box<dyn RpCrypt>>;

    /// Generate a fresh handshake key via secure random (consumed by the
    /// stream phase's ECDH context).
    fn generate_handshake_key(&self) -> [u8; 16];

    /// Initialize the stream phase's ECDH context.
    fn init_ecdh(&self) -> Result<Box<dyn Ecdh>>;
}
