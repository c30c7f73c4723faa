//! External collaborator contracts
//!
//! The core depends only on the request/response shape of each backend, not
//! its transport:
//! - `ChatBackend`: streaming language-model completions (with a concrete
//!   OpenAI-compatible client)
//! - `SpeechRecognizer` / `SpeechSynthesizer`: blocking streaming backends
//!   run on worker threads and bridged back over channels
//! - `FaceAnimator`: streaming facial-animation keyframes from PCM audio

mod animation;
mod chat;
mod speech;

pub use animation::{AnimationFrame, AudioStreamInfo, FaceAnimator};
pub use chat::{ChatBackend, ChatConfig, OpenAiChatBackend};
pub use speech::{SpeechRecognizer, SpeechSynthesizer};
