//! Command-line driver that assembles a [`Session`] from user-supplied
//! connect parameters and drives it to completion.
//!
//! The four external collaborators (Ctrl, Senkusha, the stream connection,
//! and session crypto) have no implementation in this workspace, their
//! wire protocols are out of scope for the orchestrator crate. The stubs
//! below exist only so this binary has something to run end to end; a real
//! deployment swaps them for crates that actually speak Ctrl/Senkusha/RTP.

mod stub;

use std::io::{self, BufRead};
use std::sync::mpsc;
use std::sync::Arc;

use clap::Parser;
use remoteplay_session::connect_info::{ConnectInfo, FpsPreset, VideoProfile, VideoResolutionPreset};
use remoteplay_session::event::SessionEvent;
use remoteplay_session::Session;

#[derive(Parser)]
#[command(name = "remoteplay-session", about = "Connect to a Remote Play host")]
struct Args {
    /// Console hostname or IP address.
    host: String,

    /// 16-byte registration key, hex-encoded.
    #[arg(long)]
    regist_key: String,

    /// 16-byte "morning" secret, hex-encoded.
    #[arg(long)]
    morning: String,

    /// Target a PS5 instead of a PS4.
    #[arg(long)]
    ps5: bool,

    /// One of 360, 540, 720, 1080.
    #[arg(long, default_value = "720")]
    resolution: u32,

    /// One of 30, 60.
    #[arg(long, default_value = "30")]
    fps: u32,

    /// Enable the on-screen keyboard feature.
    #[arg(long)]
    keyboard: bool,
}

fn resolution_preset(p: u32) -> VideoResolutionPreset {
    match p {
        360 => VideoResolutionPreset::P360,
        540 => VideoResolutionPreset::P540,
        720 => VideoResolutionPreset::P720,
        1080 => VideoResolutionPreset::P1080,
        other => {
            eprintln!("unsupported --resolution {other}, expected one of 360, 540, 720, 1080");
            std::process::exit(1);
        }
    }
}

fn fps_preset(p: u32) -> FpsPreset {
    match p {
        30 => FpsPreset::Fps30,
        60 => FpsPreset::Fps60,
        other => {
            eprintln!("unsupported --fps {other}, expected one of 30, 60");
            std::process::exit(1);
        }
    }
}

fn parse_hex16(label: &str, s: &str) -> [u8; 16] {
    if s.len() != 32 || !s.is_ascii() {
        eprintln!("{label} must be 32 hex characters");
        std::process::exit(1);
    }

    let mut out = [0u8; 16];
    for (i, chunk) in out.iter_mut().enumerate() {
        *chunk = u8::from_str_radix(&s[i * 2..i * 2 + 2], 16).unwrap_or_else(|_| {
            eprintln!("{label} must be 32 hex characters");
            std::process::exit(1);
        });
    }
    out
}

fn main() {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let regist_key = parse_hex16("--regist-key", &args.regist_key);
    let morning = parse_hex16("--morning", &args.morning);
    let video_profile = VideoProfile::from_presets(resolution_preset(args.resolution), fps_preset(args.fps));

    let connect_info = match ConnectInfo::new(
        &args.host,
        args.ps5,
        regist_key,
        morning,
        video_profile,
        true,
        args.keyboard,
    ) {
        Ok(info) => info,
        Err(e) => {
            eprintln!("failed to resolve {}: {e}", args.host);
            std::process::exit(1);
        }
    };

    let (tx, rx) = mpsc::channel::<SessionEvent>();
    let tx = std::sync::Mutex::new(tx);
    let event_cb: remoteplay_session::EventCallback = Box::new(move |event| {
        let _ = tx.lock().unwrap().send(event);
    });

    let mut session = Session::new(
        connect_info,
        Arc::new(stub::StubCtrl::default()),
        Arc::new(stub::StubSenkusha),
        Arc::new(stub::StubStream),
        Arc::new(stub::StubCrypto),
        event_cb,
    )
    .expect("session construction");

    if let Err(e) = session.start() {
        eprintln!("failed to start session: {e}");
        std::process::exit(1);
    }

    for event in rx {
        match event {
            SessionEvent::LoginPinRequest { pin_incorrect } => {
                if pin_incorrect {
                    println!("PIN was incorrect, try again:");
                } else {
                    println!("enter the PIN shown on the console:");
                }
                let mut line = String::new();
                io::stdin().lock().read_line(&mut line).ok();
                session.set_login_pin(line.trim().as_bytes());
            }
            SessionEvent::Quit { reason, reason_str } => {
                match reason_str {
                    Some(s) => println!("session ended: {reason} ({s})"),
                    None => println!("session ended: {reason}"),
                }
                break;
            }
        }
    }

    session.join();
}
