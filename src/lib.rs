//! # Soundboard Client
//!
//! Remote control for a soundboard server: trigger sounds over a persistent
//! control connection and upload new sounds after transcoding them locally.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────────┐
//! │                                 CLIENT                                   │
//! │                                                                          │
//! │   play / play-multi / stop                     upload <file>             │
//! │             │                                        │                   │
//! │             ▼                                        ▼                   │
//! │  ┌─────────────────────┐              ┌──────────────────────────────┐   │
//! │  │ protocol            │              │ transcode::Transcoder        │   │
//! │  │ "play|<name>"       │              │  ┌────────────────────────┐  │   │
//! │  │ "play-multi|..."    │              │  │ audio::decode (any fmt)│  │   │
//! │  │ "stop"              │              │  └───────────┬────────────┘  │   │
//! │  └──────────┬──────────┘              │              ▼               │   │
//! │             │                         │  ┌────────────────────────┐  │   │
//! │             ▼                         │  │ resample + interleave  │  │   │
//! │  ┌─────────────────────┐              │  └───────────┬────────────┘  │   │
//! │  │ session::           │              │              ▼               │   │
//! │  │   SessionClient     │              │  ┌────────────────────────┐  │   │
//! │  │ Closed ─▶ Connecting│              │  │ Opus pump ──▶ mpsc     │  │   │
//! │  │   ▲         │       │              │  └───────────┬────────────┘  │   │
//! │  │   └── Open ◀┘       │              │              ▼               │   │
//! │  └──────────┬──────────┘              │  ┌────────────────────────┐  │   │
//! │             │                         │  │ codec::framing::pack   │  │   │
//! │             │                         │  │ [len u16 LE|chunk]...  │  │   │
//! │             │                         │  └───────────┬────────────┘  │   │
//! │             │                         └──────────────┼───────────────┘   │
//! │             │                                        │                   │
//! └─────────────┼────────────────────────────────────────┼───────────────────┘
//!               │ WebSocket text frames                  │ HTTP POST body
//!               ▼ /ws?guild=..&channel=..                ▼ /upload?guild=..
//! ┌──────────────────────────────────────────────────────────────────────────┐
//! │                            SOUNDBOARD SERVER                             │
//! └──────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod audio;
pub mod codec;
pub mod config;
pub mod error;
pub mod protocol;
pub mod session;
pub mod transcode;

pub use error::{Error, Result};

/// Application-wide constants
pub mod constants {
    /// Name used for the platform config directory
    pub const APP_NAME: &str = "soundboard-client";

    /// Default soundboard server
    pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:8081";

    /// Default connect timeout in milliseconds
    pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 10_000;

    /// Default Opus bitrate in bits per second
    pub const DEFAULT_BITRATE: u32 = 128_000;

    /// Default frame size in milliseconds; the server slices sounds in 20 ms steps
    pub const DEFAULT_FRAME_SIZE_MS: f32 = 20.0;

    /// Chunks buffered between the encoder and the collector
    pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;
}
