//! Application configuration
//!
//! Loaded from `config.toml` under the platform config directory when
//! present, otherwise built from the defaults. Every section and field is
//! optional in the file.

use std::path::PathBuf;
use std::time::Duration;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::audio::queue::OverflowPolicy;
use crate::constants;
use crate::error::{Error, Result};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub audio: AudioConfig,
    pub video: VideoConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_address: String,
    pub http_port: u16,
    pub stun_server: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            http_port: constants::DEFAULT_HTTP_PORT,
            stun_server: constants::DEFAULT_STUN_SERVER.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Exact device name to capture from; unset means prefer a
    /// system-loopback device, falling back to the default input
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,
    pub sample_rate: u32,
    pub channels: u16,
    /// Frames per block, one block per transport sample
    pub block_frames: u32,
    /// Hand-off queue depth, in blocks
    pub queue_blocks: usize,
    /// Upper bound on one pull before silence is synthesized
    pub pull_timeout_ms: u64,
    pub overflow: OverflowPolicy,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            device: None,
            sample_rate: constants::SAMPLE_RATE,
            channels: constants::CHANNELS,
            block_frames: constants::BLOCK_FRAMES,
            queue_blocks: constants::QUEUE_BLOCKS,
            pull_timeout_ms: constants::PULL_TIMEOUT_MS,
            overflow: OverflowPolicy::EvictOldest,
        }
    }
}

impl AudioConfig {
    /// Expected byte length of one interleaved s16 block
    pub fn block_bytes(&self) -> usize {
        self.block_frames as usize * self.channels as usize * constants::BYTES_PER_SAMPLE
    }

    pub fn pull_timeout(&self) -> Duration {
        Duration::from_millis(self.pull_timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoConfig {
    /// Nominal sampling cadence; actual delivery follows the engine's clock
    pub frame_rate: u32,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            frame_rate: constants::FRAME_RATE,
        }
    }
}

impl AppConfig {
    pub fn config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "screencaster").map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Read the config file if one exists, defaults otherwise
    pub fn load() -> Result<Self> {
        let Some(path) = Self::config_path() else {
            return Ok(Self::default());
        };
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(&path)?;
        toml::from_str(&text).map_err(|e| Error::Config(format!("{}: {e}", path.display())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_shipped_sizing() {
        let config = AppConfig::default();
        assert_eq!(config.audio.sample_rate, 44_100);
        assert_eq!(config.audio.channels, 2);
        assert_eq!(config.audio.block_frames, 1024);
        assert_eq!(config.audio.queue_blocks, 10);
        assert_eq!(config.audio.block_bytes(), 4096);
        assert_eq!(config.audio.pull_timeout(), Duration::from_millis(500));
        assert_eq!(config.audio.overflow, OverflowPolicy::EvictOldest);
        assert_eq!(config.video.frame_rate, 60);
        assert_eq!(config.server.http_port, 8080);
    }

    #[test]
    fn partial_file_overrides_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
            [audio]
            overflow = "drop-newest"
            queue_blocks = 4

            [server]
            http_port = 9090
            "#,
        )
        .unwrap();
        assert_eq!(config.audio.overflow, OverflowPolicy::DropNewest);
        assert_eq!(config.audio.queue_blocks, 4);
        assert_eq!(config.server.http_port, 9090);
        // untouched sections keep their defaults
        assert_eq!(config.audio.sample_rate, 44_100);
        assert_eq!(config.video.frame_rate, 60);
    }

    #[test]
    fn round_trips_through_toml() {
        let config = AppConfig::default();
        let text = toml::to_string(&config).unwrap();
        let back: AppConfig = toml::from_str(&text).unwrap();
        assert_eq!(back.audio.block_bytes(), config.audio.block_bytes());
        assert_eq!(back.server.stun_server, config.server.stun_server);
    }
}
