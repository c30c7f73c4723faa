//! Session-scoped topic naming convention.
//!
//! Every per-session stream lives under `sessions/<id>/...`; the single
//! well-known `session_new` topic announces new sessions to all subsystems.

/// Carries the session id of each newly established connection.
pub const SESSION_NEW: &str = "session_new";

/// Raw inbound audio from the transport layer.
pub fn audio_in(session_id: &str) -> String {
    format!("sessions/{}/audio_in", session_id)
}

/// Raw inbound video from the transport layer (reserved).
pub fn video_in(session_id: &str) -> String {
    format!("sessions/{}/video_in", session_id)
}

/// Final transcripts from speech recognition.
pub fn text_in(session_id: &str) -> String {
    format!("sessions/{}/text_in", session_id)
}

/// Completed assistant responses from the turn controller.
pub fn text_out(session_id: &str) -> String {
    format!("sessions/{}/text_out", session_id)
}

/// Synthesized audio frames from speech synthesis.
pub fn speech_out(session_id: &str) -> String {
    format!("sessions/{}/speech_out", session_id)
}

/// Audio generation ids, paired 1:1 with `speech_out` frames.
pub fn speech_out_id(session_id: &str) -> String {
    format!("sessions/{}/speech_out/id", session_id)
}

/// Paced sub-frames for the transport layer.
pub fn audio_out(session_id: &str) -> String {
    format!("sessions/{}/audio_out", session_id)
}

/// Paced sub-frames shifted by the configured output delay.
pub fn audio_out_delayed(session_id: &str) -> String {
    format!("sessions/{}/audio_out/delayed", session_id)
}

/// Facial animation keyframes.
pub fn anim_out(session_id: &str) -> String {
    format!("sessions/{}/anim_out", session_id)
}
