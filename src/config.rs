//! Application configuration
//!
//! Loaded from a TOML file. Every section has defaults, so a missing file or
//! a partial file is fine.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::constants::*;
use crate::error::{CodecError, Error};
use crate::session::SessionIdentity;

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub session: SessionConfig,
    pub encoder: EncoderConfig,
}

/// Remote soundboard server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Base HTTP URL; the control socket and upload endpoint hang off it
    pub base_url: String,
    /// Connect timeout in milliseconds, 0 waits indefinitely
    pub connect_timeout_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_SERVER_URL.to_string(),
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
        }
    }
}

impl ServerConfig {
    pub fn connect_timeout(&self) -> Option<Duration> {
        (self.connect_timeout_ms > 0).then(|| Duration::from_millis(self.connect_timeout_ms))
    }
}

/// Default guild/channel to address
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub guild_id: Option<String>,
    pub channel_id: Option<String>,
}

impl SessionConfig {
    pub fn identity(&self) -> SessionIdentity {
        SessionIdentity::new(
            self.guild_id.clone().unwrap_or_default(),
            self.channel_id.clone().unwrap_or_default(),
        )
    }
}

/// Opus encoder settings used when transcoding uploads
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EncoderConfig {
    /// Target bitrate in bits per second
    pub bitrate: u32,
    /// Variable bitrate
    pub vbr: bool,
    /// Frame duration in milliseconds
    pub frame_size_ms: f32,
    /// Capacity of the encoder -> collector channel, in chunks
    pub channel_capacity: usize,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            bitrate: DEFAULT_BITRATE,
            vbr: true,
            frame_size_ms: DEFAULT_FRAME_SIZE_MS,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

impl EncoderConfig {
    /// Calculate frame size (samples per channel) from duration
    pub fn frame_size_from_ms(sample_rate: u32, ms: f32) -> usize {
        (sample_rate as f32 * ms / 1000.0).round() as usize
    }

    /// Samples per channel in one frame at `sample_rate`.
    ///
    /// Opus only accepts 2.5, 5, 10, 20, 40 and 60 ms frames.
    pub fn frame_size(&self, sample_rate: u32) -> Result<usize, CodecError> {
        let frame_size = Self::frame_size_from_ms(sample_rate, self.frame_size_ms);
        let valid = [2.5f32, 5.0, 10.0, 20.0, 40.0, 60.0]
            .iter()
            .any(|ms| Self::frame_size_from_ms(sample_rate, *ms) == frame_size);
        if valid && frame_size > 0 {
            Ok(frame_size)
        } else {
            Err(CodecError::InvalidFrameSize(frame_size))
        }
    }
}

impl AppConfig {
    /// Platform config file location, if a home directory is known
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", APP_NAME)
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Load from `path`, or from [`AppConfig::default_path`] when `None`.
    ///
    /// A missing file yields the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, Error> {
        let path = match path.map(Path::to_path_buf).or_else(Self::default_path) {
            Some(path) => path,
            None => {
                tracing::warn!("No config directory available, using defaults");
                return Ok(Self::default());
            }
        };

        if !path.exists() {
            tracing::warn!("Config at {:?} not found, using defaults", path);
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(&path)?;
        let config = Self::from_toml(&contents)?;
        tracing::debug!("Loaded config from {:?}", path);
        Ok(config)
    }

    pub fn from_toml(contents: &str) -> Result<Self, Error> {
        toml::from_str(contents).map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))
    }

    pub fn to_toml(&self) -> Result<String, Error> {
        toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))
    }
}
