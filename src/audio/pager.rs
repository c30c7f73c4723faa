use anyhow::{Context, Result};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use super::frame::{slice_frame, AudioFrame};
use crate::bus::{topics, Bus, BusMessage, Subscription};
use crate::session::SessionService;

/// Configuration for the audio output pager
#[derive(Debug, Clone)]
pub struct PagerConfig {
    /// Duration of each emitted sub-frame in milliseconds
    pub chunk_ms: u64,
    /// Pipeline sample rate in Hz
    pub sample_rate: u32,
    /// Fixed output delay, compensating for downstream animation and
    /// transport latency. `None` emits with no delay.
    pub output_delay: Option<Duration>,
}

impl Default for PagerConfig {
    fn default() -> Self {
        Self {
            chunk_ms: 20,
            sample_rate: 48000,
            output_delay: None,
        }
    }
}

/// Real-time audio output pager for one session
///
/// Consumes synthesized frames from `speech_out` (paired 1:1 with generation
/// ids on `speech_out/id`), slices them into fixed-duration sub-frames, and
/// emits them at wall-clock pace to the output topic. A frame carrying a
/// higher generation id supersedes the current utterance: everything still
/// buffered is discarded before it is ever emitted (barge-in).
pub struct AudioPager {
    bus: Bus,
    config: PagerConfig,
    out_topic: String,
    frames: Subscription,
    ids: Subscription,
    buffered: VecDeque<AudioFrame>,
    last_audio_id: u64,
}

impl AudioPager {
    /// Subscribe to the session's synthesis stream, emitting to `out_topic`.
    pub fn new(bus: &Bus, session_id: &str, out_topic: String, config: PagerConfig) -> Self {
        let frames = bus.subscribe(&topics::speech_out(session_id));
        let ids = bus.subscribe(&topics::speech_out_id(session_id));

        Self {
            bus: bus.clone(),
            config,
            out_topic,
            frames,
            ids,
            buffered: VecDeque::new(),
            last_audio_id: 0,
        }
    }

    /// Drive the pager until the session's synthesis stream closes.
    ///
    /// Alternates between buffering (blocking on the input queue while
    /// nothing is buffered) and emitting (one sub-frame, then a real-time
    /// sleep of its duration). Newly arrived frames are drained without
    /// blocking between emissions so a barge-in flushes stale audio
    /// immediately.
    pub async fn run(mut self) -> Result<()> {
        info!("Audio pager started for {}", self.out_topic);

        loop {
            while !self.frames.is_empty() || self.buffered.is_empty() {
                let Some(msg) = self.frames.recv().await else {
                    info!("Synthesis stream closed, audio pager for {} stopping", self.out_topic);
                    return Ok(());
                };
                let frame = msg
                    .into_audio()
                    .context("Non-audio payload on speech_out")?;

                let Some(id_msg) = self.ids.recv().await else {
                    info!("Id stream closed, audio pager for {} stopping", self.out_topic);
                    return Ok(());
                };
                let audio_id = id_msg
                    .into_audio_id()
                    .context("Non-id payload on speech_out/id")?;

                self.ingest(frame, audio_id);
            }

            let Some(sub_frame) = self.buffered.pop_front() else {
                continue;
            };
            let duration = sub_frame.duration();
            self.bus
                .publish(&self.out_topic, BusMessage::Audio(sub_frame))
                .await;
            tokio::time::sleep(duration).await;
        }
    }

    /// Buffer one synthesized frame, handling utterance turnover.
    ///
    /// An id above the last seen starts a new utterance: stale sub-frames
    /// are dropped and, when a delay is configured, a run of silence
    /// sub-frames is prepended at the new frame's timestamp. An id equal to
    /// the last seen continues the current utterance. An id below the last
    /// seen is a straggler from a superseded utterance and is dropped.
    fn ingest(&mut self, mut frame: AudioFrame, audio_id: u64) {
        if audio_id < self.last_audio_id {
            // A cancelled synthesis worker can still publish after its
            // replacement's frames have arrived.
            debug!(
                "Dropping straggler frame from superseded audio id {} (current {})",
                audio_id, self.last_audio_id
            );
            return;
        }

        if audio_id > self.last_audio_id {
            if !self.buffered.is_empty() {
                debug!(
                    "Audio id {} supersedes {}, discarding {} buffered sub-frames",
                    audio_id,
                    self.last_audio_id,
                    self.buffered.len()
                );
            }
            self.buffered.clear();
            self.last_audio_id = audio_id;

            if let Some(delay) = self.config.output_delay {
                let silence = AudioFrame::silence(delay, frame.pts, self.config.sample_rate);
                self.buffered.extend(slice_frame(&silence, self.config.chunk_ms));
            }
        }

        if let Some(delay) = self.config.output_delay {
            frame.pts += (delay.as_secs_f64() * self.config.sample_rate as f64) as u64;
        }

        self.buffered.extend(slice_frame(&frame, self.config.chunk_ms));
    }
}

/// Spawns the per-session audio pagers
///
/// Each session gets two pagers over the same synthesis stream: an undelayed
/// one on `audio_out` (consumed by the animation pipeline) and a delayed one
/// on `audio_out/delayed` (consumed by the transport, so audio reaches the
/// client in sync with the animation it triggered).
pub struct PagerService {
    config: PagerConfig,
}

impl PagerService {
    /// `config.output_delay` applies to the delayed pager only.
    pub fn new(config: PagerConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl SessionService for PagerService {
    fn name(&self) -> &str {
        "audio-pager"
    }

    async fn attach(self: Arc<Self>, bus: Bus, session_id: String) -> Result<()> {
        let plain = AudioPager::new(
            &bus,
            &session_id,
            topics::audio_out(&session_id),
            PagerConfig {
                output_delay: None,
                ..self.config.clone()
            },
        );
        let delayed = AudioPager::new(
            &bus,
            &session_id,
            topics::audio_out_delayed(&session_id),
            self.config.clone(),
        );

        tokio::try_join!(plain.run(), delayed.run())?;
        Ok(())
    }
}
