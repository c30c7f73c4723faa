pub mod animation;
pub mod audio;
pub mod backends;
pub mod bus;
pub mod config;
pub mod session;
pub mod speech;
pub mod turn;

pub use animation::AnimationService;
pub use audio::{AudioFrame, AudioPager, ChunkAssembler, PagerConfig, PagerService};
pub use backends::{
    AnimationFrame, AudioStreamInfo, ChatBackend, ChatConfig, FaceAnimator, OpenAiChatBackend,
    SpeechRecognizer, SpeechSynthesizer,
};
pub use bus::{topics, Bus, BusMessage, Subscription};
pub use config::Config;
pub use session::{SessionRegistry, SessionService};
pub use speech::SpeechService;
pub use turn::{ChatMessage, ChatRole, ConversationHistory, TurnController, TurnService};
