//! # Audio Sink Boundary
//!
//! The output device behind a two-method contract: configure for a track,
//! then write fixed-format PCM. Platform adapters (e.g. the ALSA bridge)
//! implement [`AudioSink`]; the controller owns the only handle and
//! guarantees a single writer at a time.

use crate::error::Result;
use serde::{Deserialize, Serialize};

/// The operating parameters of the output device.
///
/// After [`AudioSink::configure`] this holds the *negotiated* values, which
/// may differ from what was requested. Conversion math must only ever use
/// the negotiated values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SinkFormat {
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Channel count.
    pub channels: u16,
    /// Sample width in bits.
    pub bit_width: u16,
}

/// An output device accepting interleaved signed little-endian PCM.
pub trait AudioSink: Send {
    /// (Re)configure the device for the given format and report what the
    /// device actually accepted. Called once per track, before any write.
    ///
    /// # Errors
    ///
    /// [`PlaybackError::DeviceConfigFailure`](crate::error::PlaybackError)
    /// when the device cannot operate anywhere near the requested format.
    fn configure(&mut self, requested: &SinkFormat) -> Result<SinkFormat>;

    /// Write one span of PCM in the configured format. Blocks until the
    /// device has taken the bytes.
    fn write(&mut self, pcm: &[u8]) -> Result<()>;
}

/// A sink that accepts any format and discards all audio.
///
/// Useful for tests and for running the pipeline without an audio device.
#[derive(Debug, Default)]
pub struct NullSink {
    bytes_written: u64,
    configured: Option<SinkFormat>,
}

impl NullSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total PCM bytes accepted since creation.
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// The format of the last `configure` call, if any.
    pub fn configured(&self) -> Option<SinkFormat> {
        self.configured
    }
}

impl AudioSink for NullSink {
    fn configure(&mut self, requested: &SinkFormat) -> Result<SinkFormat> {
        self.configured = Some(*requested);
        Ok(*requested)
    }

    fn write(&mut self, pcm: &[u8]) -> Result<()> {
        self.bytes_written += pcm.len() as u64;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_sink_echoes_requested_format() {
        let mut sink = NullSink::new();
        let requested = SinkFormat { sample_rate: 44100, channels: 2, bit_width: 16 };

        let actual = sink.configure(&requested).unwrap();
        assert_eq!(actual, requested);

        sink.write(&[0u8; 128]).unwrap();
        sink.write(&[0u8; 64]).unwrap();
        assert_eq!(sink.bytes_written(), 192);
    }
}
