//! Facial animation bus adapter
//!
//! `AnimationService` streams the undelayed `audio_out` sub-frames into the
//! facial-animation backend and republishes each keyframe to `anim_out`.
//! The transport consumes keyframes alongside the delayed audio stream, so
//! animation and audio stay perceptually in sync at the client.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::info;

use crate::audio::ChunkAssembler;
use crate::backends::{AudioStreamInfo, FaceAnimator};
use crate::bus::{topics, Bus, BusMessage};
use crate::session::SessionService;

/// PCM chunk size fed to the animator, in milliseconds
const ANIM_CHUNK_MS: u64 = 100;

/// Per-session facial animation
pub struct AnimationService {
    animator: Arc<dyn FaceAnimator>,
    sample_rate: u32,
}

impl AnimationService {
    pub fn new(animator: Arc<dyn FaceAnimator>, sample_rate: u32) -> Self {
        Self {
            animator,
            sample_rate,
        }
    }
}

#[async_trait]
impl SessionService for AnimationService {
    fn name(&self) -> &str {
        "animation"
    }

    async fn attach(self: Arc<Self>, bus: Bus, session_id: String) -> Result<()> {
        let mut audio_out = bus.subscribe(&topics::audio_out(&session_id));
        let anim_topic = topics::anim_out(&session_id);

        let (audio_tx, audio_rx) = mpsc::unbounded_channel();
        let (keyframe_tx, mut keyframe_rx) = mpsc::unbounded_channel();

        let animator = Arc::clone(&self.animator);
        let info = AudioStreamInfo::mono_16bit(self.sample_rate);
        let stream = tokio::spawn(async move { animator.animate(info, audio_rx, keyframe_tx).await });

        let mut assembler = ChunkAssembler::new(self.sample_rate, ANIM_CHUNK_MS);

        // Each side owns its channel end: audio_out closing drops audio_tx,
        // which ends the animator, which drops keyframe_tx in turn.
        let feeder = async move {
            while let Some(msg) = audio_out.recv().await {
                let Some(frame) = msg.into_audio() else { continue };
                for chunk in assembler.push(&frame) {
                    if audio_tx.send(chunk).is_err() {
                        return; // animator stopped early
                    }
                }
            }
        };

        let publisher = async move {
            while let Some(keyframe) = keyframe_rx.recv().await {
                bus.publish(&anim_topic, BusMessage::Animation(keyframe)).await;
            }
        };

        tokio::join!(feeder, publisher);

        info!("Animation stream finished for session {}", session_id);

        stream
            .await
            .context("Animator task panicked")?
            .context("Facial animation stream failed")
    }
}
