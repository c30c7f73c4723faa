use anyhow::Result;
use serde::Deserialize;
use std::time::Duration;

use crate::audio::PagerConfig;
use crate::backends::ChatConfig;

#[derive(Debug, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    pub audio: AudioConfig,
    pub chat: ChatConfig,
}

#[derive(Debug, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Pipeline sample rate in Hz (must match what the transport peer expects)
    pub sample_rate: u32,
    /// Paced sub-frame duration in milliseconds
    pub chunk_ms: u64,
    /// Output delay on the `audio_out/delayed` stream in milliseconds
    pub output_delay_ms: u64,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48000,
            chunk_ms: 20,
            output_delay_ms: 400,
        }
    }
}

impl AudioConfig {
    /// Pager configuration for the delayed output stream.
    pub fn pager_config(&self) -> PagerConfig {
        PagerConfig {
            chunk_ms: self.chunk_ms,
            sample_rate: self.sample_rate,
            output_delay: Some(Duration::from_millis(self.output_delay_ms)),
        }
    }
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}
