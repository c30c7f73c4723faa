use anyhow::Result;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::audio::AudioFrame;

/// Streaming speech-recognition backend
///
/// Implementations block, so the speech service runs them on a worker
/// thread (`spawn_blocking`) and bridges both channels back into the
/// async side. Use `blocking_recv` on `chunks`.
pub trait SpeechRecognizer: Send + Sync + 'static {
    /// Consume fixed-size PCM byte chunks until the channel closes,
    /// emitting each final transcript as it is recognized.
    fn transcribe(
        &self,
        chunks: mpsc::UnboundedReceiver<Vec<u8>>,
        transcripts: mpsc::UnboundedSender<String>,
    ) -> Result<()>;
}

/// Streaming speech-synthesis backend
///
/// Implementations block, so the speech service runs each utterance on a
/// worker thread. Frames must carry timestamps incrementing from
/// `start_pts`.
pub trait SpeechSynthesizer: Send + Sync + 'static {
    /// Synthesize `text`, emitting PCM frames until the utterance completes
    /// or `cancel` is set. The cancel flag is checked between frames; a set
    /// flag means a newer response superseded this one.
    fn synthesize(
        &self,
        text: &str,
        start_pts: u64,
        frames: mpsc::UnboundedSender<AudioFrame>,
        cancel: Arc<AtomicBool>,
    ) -> Result<()>;
}
