//! Session-scoped event bus
//!
//! This module provides the publish/subscribe backbone that every other
//! subsystem communicates over:
//! - Topic-addressed fan-out with per-subscriber ordered queues
//! - Typed payloads (`BusMessage`) for audio, text, and animation streams
//! - Session-scoped topic naming helpers (`topics`)
//!
//! The bus keeps no history: a subscription only sees messages published
//! after it was registered.

mod bus;
mod message;
pub mod topics;

pub use bus::{Bus, Subscription};
pub use message::BusMessage;
