//! Interface to the Ctrl control channel.
//!
//! The Ctrl channel implementation itself, the wire protocol that carries
//! session-id delivery, PIN challenges, keyboard events, and controller
//! feedback to the console, is explicitly out of scope for this crate.
//! What *is* in scope is the seam: the trait the orchestrator drives, and
//! the handle Ctrl uses to report back into the session's shared state.

use crate::error::Result;
use crate::session::CtrlHandle;

/// A running (or startable) control channel to the console.
///
/// Implementations run their own thread(s)/socket(s) internally and report
/// progress through the [`CtrlHandle`] passed to [`start`](Self::start).
pub trait CtrlChannel: Send + Sync {
    /// Start the control channel. Non-blocking: spawns whatever background
    /// work is needed and returns once it has been kicked off.
    fn start(&self, handle: CtrlHandle) -> Result<()>;

    /// Request the control channel stop. Idempotent.
    fn stop(&self);

    /// Block until the control channel's background work has exited.
    fn join(&self);

    /// Forward a user-entered PIN to the control channel.
    fn send_login_pin(&self, pin: &[u8]) -> Result<()>;

    /// Forward on-screen-keyboard text.
    fn keyboard_set_text(&self, text: &str) -> Result<()>;

    /// Accept the on-screen-keyboard's current text.
    fn keyboard_accept(&self) -> Result<()>;

    /// Reject/cancel the on-screen keyboard.
    fn keyboard_reject(&self) -> Result<()>;

    /// Ask the console to suspend ("go to bed").
    fn goto_bed(&self) -> Result<()>;
}
