//! Audio frames and the real-time output pager
//!
//! This module owns the audio side of the pipeline:
//! - `AudioFrame`: mono 16-bit PCM with a sample-accurate presentation
//!   timestamp
//! - Sub-frame slicing and silence generation for paced playback
//! - `ChunkAssembler`: fixed-size byte chunking for streaming backends
//! - `AudioPager`: paces synthesized audio out in real time and discards
//!   stale audio on barge-in

mod frame;
mod pager;

pub use frame::{slice_frame, AudioFrame, ChunkAssembler};
pub use pager::{AudioPager, PagerConfig, PagerService};
