use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::mpsc;

/// PCM stream description sent ahead of the audio chunks
#[derive(Debug, Clone, Copy)]
pub struct AudioStreamInfo {
    pub sample_rate: u32,
    pub bits_per_sample: u16,
    pub channel_count: u16,
}

impl AudioStreamInfo {
    pub fn mono_16bit(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            bits_per_sample: 16,
            channel_count: 1,
        }
    }
}

/// One facial animation keyframe: blendshape weights at a timecode
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnimationFrame {
    /// Seconds from the start of the animated audio stream
    #[serde(rename = "timeCode")]
    pub time_code: f64,
    /// Blendshape name → weight
    #[serde(rename = "blendShapes")]
    pub blend_shapes: HashMap<String, f32>,
}

/// Streaming facial-animation backend
///
/// Given a stream header and PCM chunks, yields timestamped blendshape
/// keyframes until the audio channel closes.
#[async_trait]
pub trait FaceAnimator: Send + Sync + 'static {
    async fn animate(
        &self,
        info: AudioStreamInfo,
        audio: mpsc::UnboundedReceiver<Vec<u8>>,
        keyframes: mpsc::UnboundedSender<AnimationFrame>,
    ) -> Result<()>;
}
