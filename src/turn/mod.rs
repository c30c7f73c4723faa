//! Conversational turn management
//!
//! This module drives the text side of a session:
//! - `ConversationHistory`: ordered role-tagged message history
//! - `TurnController`: batches user transcripts into turns, streams the
//!   model response, and abandons it the instant new user input arrives
//!   (barge-in)

mod controller;
mod history;

pub use controller::{TurnController, TurnService};
pub use history::{ChatMessage, ChatRole, ConversationHistory};
