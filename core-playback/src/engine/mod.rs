//! # Decode Engine Boundary
//!
//! The player does not decode bits. It satisfies the calling convention of an
//! external codec engine: the engine pulls compressed bytes through a read
//! callback and pushes decoded frames back out, and this module is the glue
//! on both sides of that exchange.
//!
//! ## Contract
//!
//! - [`DecodeEngine::probe`] attaches a byte source and drives the engine
//!   through header parsing only. It is a bounded sub-operation, callable
//!   before [`DecodeEngine::play`], and blocks until the first bytes arrive.
//! - [`DecodeEngine::play`] drives full decode. For every decoded frame the
//!   engine bridge interleaves the per-channel integer samples, converts each
//!   to little-endian signed bytes at the stream's storage width, and hands
//!   the span to the sink callback. The callback's [`WriteAction::Abort`]
//!   stops decode promptly; that is a normal outcome, not an error.
//! - [`DecodeEngine::reset`] clears the attached input, buffered bytes, and
//!   parsed metadata without reconstructing the engine. Engines are created
//!   once per container type and reused across tracks; the controller
//!   serializes reset-then-play per engine.
//!
//! A fatal parse or codec error surfaces as
//! [`PlaybackError::DecodeFailure`](crate::error::PlaybackError). Isolated
//! corrupt frames, including a truncated final frame on an interrupted
//! stream, are tolerated.

#[cfg(feature = "decoder-flac")]
pub mod flac;

use crate::error::Result;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::Read;
use std::sync::Arc;

/// Byte source for a decode engine. A read of 0 bytes signals end of stream.
pub trait MediaInput: Read + Send + Sync {}

impl<T: Read + Send + Sync> MediaInput for T {}

/// Return value of the frame sink callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteAction {
    /// Keep decoding.
    Continue,
    /// Stop decoding promptly; playback has moved on.
    Abort,
}

/// How a completed `play` call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayOutcome {
    /// The input was exhausted.
    Finished,
    /// The sink callback requested an abort.
    Aborted,
}

/// Stream parameters parsed from the source's header block.
///
/// Read-only once reported; absent until the probe has parsed the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamMetadata {
    /// Sample rate in Hz (e.g., 44100, 48000)
    pub sample_rate: u32,
    /// Number of audio channels (1 = mono, 2 = stereo, etc.)
    pub channels: u16,
    /// Bits per sample in the source format (e.g., 16, 24)
    pub bits_per_sample: u16,
}

/// Receives one decoded frame's worth of interleaved little-endian signed
/// PCM at the stream's storage width.
pub type FrameSink<'a> = dyn FnMut(&[u8]) -> WriteAction + 'a;

/// One decode engine per supported container type.
pub trait DecodeEngine: Send {
    /// Attach the track's byte source and parse stream headers.
    fn probe(&mut self, input: Box<dyn MediaInput>) -> Result<StreamMetadata>;

    /// Drive decode to end of stream or abort. Requires a prior `probe`.
    fn play(&mut self, sink: &mut FrameSink<'_>) -> Result<PlayOutcome>;

    /// Metadata from the last probe, if any.
    fn metadata(&self) -> Option<StreamMetadata>;

    /// Clear attached input, buffered bytes, and parsed metadata.
    fn reset(&mut self);
}

/// Shared handle to a registered engine. The mutex enforces a single active
/// `play` call per engine.
pub type SharedEngine = Arc<Mutex<Box<dyn DecodeEngine>>>;

/// Wrap an engine for registration with the controller.
pub fn shared(engine: Box<dyn DecodeEngine>) -> SharedEngine {
    Arc::new(Mutex::new(engine))
}

/// The engines compiled into this build, keyed by container tag.
pub fn default_engines() -> HashMap<String, SharedEngine> {
    #[allow(unused_mut)]
    let mut engines: HashMap<String, SharedEngine> = HashMap::new();

    #[cfg(feature = "decoder-flac")]
    engines.insert("flac".to_string(), shared(Box::new(flac::FlacEngine::new())));

    engines
}
