//! # Streaming Decode & Playback Core
//!
//! Streams a remote audio track over HTTP, decodes it, adapts the PCM to
//! whatever the output device actually supports, and writes it in real time,
//! while staying responsive to track switches.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────┐   bytes    ┌─────────────┐
//! │ StreamFetcher (task) ├───────────>│ TrackBuffer │
//! └──────────────────────┘            └──────┬──────┘
//!                                            │ pull (read callback)
//!                                            ▼
//!                              ┌───────────────────────────┐
//!                              │ DecodeEngine (decode task) │
//!                              └─────────────┬─────────────┘
//!                                            │ push (frame callback)
//!                                            ▼
//!                  ┌──────────────────────────────────────────┐
//!                  │ SampleConverter (negotiated rate / width) │
//!                  └─────────────────────┬────────────────────┘
//!                                        ▼
//!                                 ┌────────────┐
//!                                 │ AudioSink  │
//!                                 └────────────┘
//! ```
//!
//! The [`controller::PlaybackController`] wires the pipeline per track and is
//! the only component with mutable cross-session state. Catalog browsing and
//! the terminal UI live behind the `catalog-traits` boundary.

pub mod config;
pub mod controller;
pub mod convert;
pub mod engine;
pub mod error;
pub mod fetch;
pub mod negotiate;
pub mod sink;
pub mod track_buffer;

pub use config::PlaybackConfig;
pub use controller::{PlaybackController, PlaybackEvent, PlayerState};
pub use convert::SampleConverter;
pub use engine::{
    DecodeEngine, FrameSink, MediaInput, PlayOutcome, StreamMetadata, WriteAction,
};
pub use error::{PlaybackError, Result};
pub use negotiate::{negotiate, storage_width, ConversionPlan};
pub use sink::{AudioSink, NullSink, SinkFormat};
pub use track_buffer::{TrackBuffer, TrackBufferReader};
