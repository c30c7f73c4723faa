use crate::audio::AudioFrame;
use crate::backends::AnimationFrame;

/// Typed payloads carried on the bus.
///
/// Topic naming (see `topics`) decides which variant a stream carries;
/// consumers use the `into_*` accessors to recover the expected payload.
#[derive(Debug, Clone)]
pub enum BusMessage {
    /// Session id of a newly established connection (`session_new`).
    SessionNew(String),
    /// Transcript or response text (`text_in`, `text_out`).
    Text(String),
    /// PCM audio (`audio_in`, `speech_out`, `audio_out`).
    Audio(AudioFrame),
    /// Audio generation id, paired 1:1 with `speech_out` frames.
    AudioId(u64),
    /// Facial animation keyframe (`anim_out`).
    Animation(AnimationFrame),
    /// Raw media bytes (reserved streams such as `video_in`).
    Blob(Vec<u8>),
}

impl BusMessage {
    pub fn into_session_new(self) -> Option<String> {
        match self {
            BusMessage::SessionNew(id) => Some(id),
            _ => None,
        }
    }

    pub fn into_text(self) -> Option<String> {
        match self {
            BusMessage::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn into_audio(self) -> Option<AudioFrame> {
        match self {
            BusMessage::Audio(frame) => Some(frame),
            _ => None,
        }
    }

    pub fn into_audio_id(self) -> Option<u64> {
        match self {
            BusMessage::AudioId(id) => Some(id),
            _ => None,
        }
    }

    pub fn into_animation(self) -> Option<AnimationFrame> {
        match self {
            BusMessage::Animation(frame) => Some(frame),
            _ => None,
        }
    }
}
