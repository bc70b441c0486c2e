//! Session orchestrator for a PlayStation Remote Play client.
//!
//! This crate owns the control-plane state machine that takes a console
//! hostname and a set of registration secrets, negotiates a Remote Play
//! session over HTTP, brings up the Ctrl control channel, measures the
//! network path with Senkusha, and hands off to an A/V stream connection.
//! The four external protocols it drives, Ctrl, Senkusha, the stream
//! connection, and the session's crypto, are modeled as traits
//! ([`ctrl::CtrlChannel`], [`senkusha::SenkushaProbe`],
//! [`stream::StreamRunner`], [`crypto::CryptoProvider`]) so their wire
//! formats can live in separate crates.

pub mod connect_info;
pub mod crypto;
pub mod ctrl;
pub mod error;
pub mod event;
pub mod quit;
pub mod senkusha;
mod session;
mod session_request;
mod sync;
pub mod target;
pub mod stream;

pub use connect_info::{ConnectInfo, FpsPreset, VideoProfile, VideoResolutionPreset};
pub use error::{Result, SessionError};
pub use event::{EventCallback, SessionEvent};
pub use quit::{QuitReason, RpApplicationReason};
pub use session::{CtrlHandle, Session, SESSION_EXPECT_TIMEOUT_MS, SESSION_SETTLE_MS};
pub use sync::StopToken;
pub use target::Target;
