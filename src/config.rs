use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{NvrError, Result};

/// Top-level configuration loaded from a TOML file.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    /// Upstream H.264 capture source.
    pub source: SourceConfig,
    /// Live RTMP egress (optional).
    #[serde(default)]
    pub live: Option<LiveConfig>,
    /// MP4 recording egress (optional).
    #[serde(default)]
    pub record: Option<RecordConfig>,
    /// HTTP status/trigger surface.
    #[serde(default)]
    pub api: ApiConfig,
}

/// Capture source parameters.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SourceConfig {
    /// RTSP URL of the camera stream.
    pub url: String,
    /// Reconnection attempt limit (0 = unlimited).
    #[serde(default)]
    pub max_reconnect_attempts: u32,
}

/// Live RTMP sink parameters.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LiveConfig {
    /// Target RTMP URL, e.g. `rtmp://host/app/stream`.
    pub url: String,
    /// Ring buffer capacity in KiB.
    #[serde(default = "default_ring_kb")]
    pub ring_kb: usize,
    /// Scratch buffer size in KiB; must cover the largest expected NAL unit.
    #[serde(default = "default_scratch_kb")]
    pub scratch_kb: usize,
}

/// MP4 recording sink parameters.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RecordConfig {
    /// Root directory for date-stamped segment directories.
    pub path: PathBuf,
    /// Maximum duration of one segment file in seconds.
    #[serde(default = "default_segment_secs")]
    pub segment_secs: u64,
    /// Record only inside motion-triggered activity windows.
    #[serde(default)]
    pub use_md: bool,
    /// Activity window granted by each motion trigger, in seconds.
    #[serde(default = "default_md_secs")]
    pub md_secs: u64,
    /// Frame geometry passed to the muxer.
    pub width: u32,
    pub height: u32,
    #[serde(default = "default_frame_rate")]
    pub frame_rate: u32,
    /// Ring buffer capacity in KiB.
    #[serde(default = "default_ring_kb")]
    pub ring_kb: usize,
    /// Scratch buffer size in KiB; must cover the largest expected NAL unit.
    #[serde(default = "default_scratch_kb")]
    pub scratch_kb: usize,
}

/// HTTP API configuration.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ApiConfig {
    #[serde(default = "default_api_enabled")]
    pub enabled: bool,
    #[serde(default = "default_api_port")]
    pub port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self { enabled: default_api_enabled(), port: default_api_port() }
    }
}

fn default_api_enabled() -> bool { true }
fn default_api_port() -> u16 { 8080 }
fn default_ring_kb() -> usize { 4096 }
fn default_scratch_kb() -> usize { 1024 }
fn default_segment_secs() -> u64 { 60 }
fn default_md_secs() -> u64 { 30 }
fn default_frame_rate() -> u32 { 25 }

impl Config {
    /// Load configuration from a TOML file at `path`.
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| NvrError::Config(format!("Cannot read config file: {e}")))?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| NvrError::Config(format!("Invalid TOML: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.live.is_none() && self.record.is_none() {
            return Err(NvrError::Config("No sinks defined (need [live] and/or [record])".into()));
        }
        if let Some(live) = &self.live {
            if live.ring_kb == 0 || live.scratch_kb == 0 {
                return Err(NvrError::Config("live ring_kb and scratch_kb must be > 0".into()));
            }
        }
        if let Some(rec) = &self.record {
            if rec.segment_secs == 0 {
                return Err(NvrError::Config("record segment_secs must be > 0".into()));
            }
            if rec.use_md && rec.md_secs == 0 {
                return Err(NvrError::Config("record md_secs must be > 0 when use_md is set".into()));
            }
            if rec.width == 0 || rec.height == 0 || rec.frame_rate == 0 {
                return Err(NvrError::Config("record geometry must be non-zero".into()));
            }
            if rec.ring_kb == 0 || rec.scratch_kb == 0 {
                return Err(NvrError::Config("record ring_kb and scratch_kb must be > 0".into()));
            }
        }
        Ok(())
    }
}
