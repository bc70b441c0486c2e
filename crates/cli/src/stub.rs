//! Placeholder collaborator implementations, for the demo CLI only.
//!
//! None of these speak the real Ctrl, Senkusha, stream-connection, or
//! crypto wire protocols, those are out of scope for this workspace. They
//! exist so `remoteplay-session` has something concrete to run end to end
//! from the command line; a real client swaps every one of them out.

use remoteplay_session::crypto::{CryptoProvider, Ecdh, RpCrypt};
use remoteplay_session::ctrl::CtrlChannel;
use remoteplay_session::error::Result;
use remoteplay_session::senkusha::{SenkushaContext, SenkushaProbe, SenkushaResult, SENKUSHA_FALLBACK};
use remoteplay_session::stream::{ControllerState, StreamContext, StreamOutcome, StreamRunner};
use remoteplay_session::{CtrlHandle, Target};

#[derive(Default)]
pub struct StubCtrl;

impl CtrlChannel for StubCtrl {
    fn start(&self, handle: CtrlHandle) -> Result<()> {
        tracing::warn!("Ctrl has no implementation in this workspace; reporting ready immediately");
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

pub struct StubSenkusha;

impl SenkushaProbe for StubSenkusha {
    fn run(&self, _ctx: SenkushaContext) -> Result<SenkushaResult> {
        tracing::warn!("Senkusha has no implementation in this workspace; using fallback path measurements");
        Ok(SENKUSHA_FALLBACK)
    }
}

pub struct StubRpCrypt;
impl RpCrypt for StubRpCrypt {}

pub struct StubEcdh;
impl Ecdh for StubEcdh {}

pub struct StubCrypto;

impl CryptoProvider for StubCrypto {
    fn init_rpcrypt(&self, _target: Target, _nonce: [u8; 16], _morning: [u8; 16]) -> Result<Box<dyn RpCrypt>> {
        Ok(Box::new(StubRpCrypt))
    }

    fn generate_handshake_key(&self) -> [u8; 16] {
        [0u8; 16]
    }

    fn init_ecdh(&self) -> Result<Box<dyn Ecdh>> {
        Ok(Box::new(StubEcdh))
    }
}

pub struct StubStream;

impl StreamRunner for StubStream {
    fn run(&self, _ctx: StreamContext) -> Result<StreamOutcome> {
        tracing::warn!("stream connection has no implementation in this workspace; ending session immediately");
        Ok(StreamOutcome::Finished)
    }

    fn stop(&self) {}
    fn set_controller_state(&self, _state: ControllerState) {}
}
