//! # Format Negotiation
//!
//! Devices cannot be trusted to honor a requested format: they accept a
//! request and operate at whatever they actually support. The negotiator
//! therefore works exclusively from the values the sink *reports back* after
//! configuration, never from the values that were requested, and derives the
//! conversion the playback callback must apply.

use crate::engine::StreamMetadata;
use crate::sink::SinkFormat;
use serde::{Deserialize, Serialize};

/// The conversion between decoded stream PCM and device PCM.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionPlan {
    /// Whether a sample-rate conversion step is needed.
    pub resample: bool,
    /// Stream sample rate in Hz.
    pub from_rate: u32,
    /// Device sample rate in Hz.
    pub to_rate: u32,
    /// Stream storage width in bits (16, 24, or 32).
    pub from_width: u16,
    /// Device sample width in bits.
    pub to_width: u16,
}

impl ConversionPlan {
    /// Whether any conversion work is needed at all.
    pub fn is_identity(&self) -> bool {
        !self.resample && self.from_width == self.to_width
    }
}

/// Round a stream's bits-per-sample up to a whole little-endian storage
/// width. A 20-bit stream travels in 24-bit samples.
pub fn storage_width(bits_per_sample: u16) -> u16 {
    if bits_per_sample <= 16 {
        16
    } else if bits_per_sample <= 24 {
        24
    } else {
        32
    }
}

/// Derive the conversion plan from stream metadata and the sink's *actual*
/// negotiated format.
pub fn negotiate(source: &StreamMetadata, actual: &SinkFormat) -> ConversionPlan {
    ConversionPlan {
        resample: source.sample_rate != actual.sample_rate,
        from_rate: source.sample_rate,
        to_rate: actual.sample_rate,
        from_width: storage_width(source.bits_per_sample),
        to_width: actual.bit_width,
    }
}
