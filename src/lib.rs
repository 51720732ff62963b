//! # screencaster
//!
//! On-demand desktop mirroring with synchronized system audio, delivered to
//! any number of viewers over WebRTC.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                               HOST                                   │
//! │                                                                      │
//! │  ┌────────────┐  hardware callback  ┌───────────────┐               │
//! │  │ Audio HW   │ ───────────────────▶│ Bounded Queue │──┐            │
//! │  │ (loopback) │   s16 blocks        │ (10 blocks)   │  │ pull       │
//! │  └────────────┘                     └───────────────┘  ▼ ≤500ms     │
//! │                                              ┌──────────────────┐   │
//! │  ┌────────────┐  synchronous grab            │   Media Pumps    │   │
//! │  │ Display    │ ────────────────────────────▶│ (one per track)  │   │
//! │  │ (primary)  │   RGB frames @ 60 Hz         └────────┬─────────┘   │
//! │  └────────────┘                                       │ write       │
//! │                                                       ▼             │
//! │  ┌─────────────────┐   POST /offer   ┌────────────────────────────┐ │
//! │  │ Signaling (HTTP)│ ───────────────▶│ WebRTC Engine              │ │
//! │  │ GET / (viewer)  │   SDP answer    │ (encode / ICE / DTLS / RTP)│ │
//! │  └─────────────────┘                 └──────────────┬─────────────┘ │
//! │                                                     │               │
//! └─────────────────────────────────────────────────────┼───────────────┘
//!                                                       ▼
//!                                               viewers (browser)
//! ```
//!
//! Each negotiated viewer gets its own session with its own pair of
//! samplers; sessions share nothing but the host's devices. Connectivity
//! signals from the engine drive the session lifecycle; capture-path
//! failures degrade to silence or blank frames and never end a session.

pub mod audio;
pub mod clock;
pub mod config;
pub mod error;
pub mod media;
pub mod session;
pub mod transport;
pub mod video;
pub mod web;

pub use error::{Error, Result};

/// Application-wide constants
pub mod constants {
    /// Audio capture sample rate
    pub const SAMPLE_RATE: u32 = 44_100;

    /// Stereo capture
    pub const CHANNELS: u16 = 2;

    /// Frames per audio block; one block becomes one transport sample
    pub const BLOCK_FRAMES: u32 = 1024;

    /// Bytes per interleaved s16 sample
    pub const BYTES_PER_SAMPLE: usize = 2;

    /// Depth of the callback-to-pull hand-off queue, in blocks
    pub const QUEUE_BLOCKS: usize = 10;

    /// Upper bound on one audio pull before silence is synthesized
    pub const PULL_TIMEOUT_MS: u64 = 500;

    /// Nominal screen sampling cadence
    pub const FRAME_RATE: u32 = 60;

    /// RTP video clock rate
    pub const VIDEO_CLOCK_RATE: u32 = 90_000;

    /// Default HTTP signaling port
    pub const DEFAULT_HTTP_PORT: u16 = 8080;

    /// STUN server used when none is configured
    pub const DEFAULT_STUN_SERVER: &str = "stun:stun.l.google.com:19302";
}
