//! Speech recognition and synthesis bus adapters
//!
//! `SpeechService` bridges the blocking speech backends onto the bus, one
//! handler pair per session:
//! - ASR side: `audio_in` frames → fixed byte chunks → recognizer worker →
//!   final transcripts on `text_in`
//! - TTS side: `text_out` responses → synthesis worker → frames on
//!   `speech_out`, paired 1:1 with generation ids on `speech_out/id`
//!
//! Each new response cancels the previous synthesis through a shared flag
//! and bumps the audio generation id, so downstream consumers can discard
//! audio the new response superseded.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::{error, info};

use crate::audio::{AudioFrame, ChunkAssembler};
use crate::backends::{SpeechRecognizer, SpeechSynthesizer};
use crate::bus::{topics, Bus, BusMessage};
use crate::session::SessionService;

/// PCM chunk size fed to the recognizer, in milliseconds
const ASR_CHUNK_MS: u64 = 100;

/// Per-session speech recognition and synthesis
pub struct SpeechService {
    recognizer: Arc<dyn SpeechRecognizer>,
    synthesizer: Arc<dyn SpeechSynthesizer>,
    sample_rate: u32,
}

impl SpeechService {
    pub fn new(
        recognizer: Arc<dyn SpeechRecognizer>,
        synthesizer: Arc<dyn SpeechSynthesizer>,
        sample_rate: u32,
    ) -> Self {
        Self {
            recognizer,
            synthesizer,
            sample_rate,
        }
    }

    /// Feed inbound audio to the recognizer and republish its transcripts.
    async fn run_asr(&self, bus: Bus, session_id: &str) -> Result<()> {
        let mut audio_in = bus.subscribe(&topics::audio_in(session_id));
        let text_in_topic = topics::text_in(session_id);

        let (chunk_tx, chunk_rx) = mpsc::unbounded_channel();
        let (transcript_tx, mut transcript_rx) = mpsc::unbounded_channel();

        let recognizer = Arc::clone(&self.recognizer);
        let worker =
            tokio::task::spawn_blocking(move || recognizer.transcribe(chunk_rx, transcript_tx));

        let mut assembler = ChunkAssembler::new(self.sample_rate, ASR_CHUNK_MS);

        // Both sides own their channel ends so each stream closes through:
        // audio_in closing drops chunk_tx, which ends the recognizer, which
        // drops transcript_tx, which ends the publisher.
        let feeder = async move {
            while let Some(msg) = audio_in.recv().await {
                let Some(frame) = msg.into_audio() else { continue };
                for chunk in assembler.push(&frame) {
                    if chunk_tx.send(chunk).is_err() {
                        return; // recognizer stopped early
                    }
                }
            }
        };

        let publisher = async move {
            while let Some(transcript) = transcript_rx.recv().await {
                info!("Transcript ({}): {}", session_id, transcript);
                bus.publish(&text_in_topic, BusMessage::Text(transcript))
                    .await;
            }
        };

        tokio::join!(feeder, publisher);

        worker
            .await
            .context("Recognizer worker panicked")?
            .context("Speech recognition failed")
    }

    /// Synthesize each response, pairing frames with a fresh generation id.
    async fn run_tts(&self, bus: Bus, session_id: &str) -> Result<()> {
        let mut text_out = bus.subscribe(&topics::text_out(session_id));
        let speech_topic = topics::speech_out(session_id);
        let id_topic = topics::speech_out_id(session_id);
        let started = Instant::now();

        // Every frame/id pair publishes from this loop, and only this loop.
        // A cancelled utterance's worker can still be producing frames when
        // its replacement starts; funneling both through one channel keeps
        // each frame welded to its own id on the wire.
        let (pair_tx, mut pair_rx) = mpsc::unbounded_channel::<(u64, AudioFrame)>();

        let mut audio_id: u64 = 0;
        let mut cancel: Option<Arc<AtomicBool>> = None;

        loop {
            tokio::select! {
                msg = text_out.recv() => {
                    let Some(msg) = msg else { break };
                    let Some(text) = msg.into_text() else { continue };

                    // Barge-in: stop the utterance still being synthesized.
                    if let Some(flag) = cancel.take() {
                        flag.store(true, Ordering::SeqCst);
                    }
                    audio_id += 1;

                    let flag = Arc::new(AtomicBool::new(false));
                    cancel = Some(Arc::clone(&flag));

                    let start_pts =
                        (started.elapsed().as_secs_f64() * self.sample_rate as f64) as u64;
                    let (frame_tx, mut frame_rx) = mpsc::unbounded_channel();

                    let synthesizer = Arc::clone(&self.synthesizer);
                    let worker = tokio::task::spawn_blocking(move || {
                        synthesizer.synthesize(&text, start_pts, frame_tx, flag)
                    });

                    let pair_tx = pair_tx.clone();
                    let id = audio_id;
                    let session = session_id.to_string();

                    tokio::spawn(async move {
                        while let Some(frame) = frame_rx.recv().await {
                            if pair_tx.send((id, frame)).is_err() {
                                break;
                            }
                        }

                        match worker.await {
                            Ok(Ok(())) => {}
                            Ok(Err(e)) => {
                                error!("Synthesis failed for session {}: {:#}", session, e)
                            }
                            Err(e) => {
                                error!("Synthesis worker panicked for session {}: {}", session, e)
                            }
                        }
                    });
                }

                pair = pair_rx.recv() => {
                    // pair_tx is held above, so the channel cannot close here
                    let Some((id, frame)) = pair else { continue };
                    bus.publish(&speech_topic, BusMessage::Audio(frame)).await;
                    bus.publish(&id_topic, BusMessage::AudioId(id)).await;
                }
            }
        }

        // Forward whatever the final utterance's worker still produces.
        drop(pair_tx);
        while let Some((id, frame)) = pair_rx.recv().await {
            bus.publish(&speech_topic, BusMessage::Audio(frame)).await;
            bus.publish(&id_topic, BusMessage::AudioId(id)).await;
        }

        Ok(())
    }
}

#[async_trait]
impl SessionService for SpeechService {
    fn name(&self) -> &str {
        "speech"
    }

    async fn attach(self: Arc<Self>, bus: Bus, session_id: String) -> Result<()> {
        tokio::try_join!(
            self.run_asr(bus.clone(), &session_id),
            self.run_tts(bus.clone(), &session_id),
        )?;
        Ok(())
    }
}
