//! # Playback Configuration
//!
//! Configuration for the fetch/decode pipeline.

use serde::{Deserialize, Serialize};

/// Playback pipeline configuration.
///
/// Controls network chunking, buffering limits, and event fan-out.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaybackConfig {
    /// Bytes read from the network per fetch iteration.
    ///
    /// Default: 8 KiB.
    #[serde(default = "default_fetch_chunk_bytes")]
    pub fetch_chunk_bytes: usize,

    /// High watermark for bytes held in the track buffer.
    ///
    /// While the buffer holds at least this much undecoded data the fetcher
    /// naps instead of enqueuing, bounding memory when a fast network meets a
    /// slow decode. `0` disables the watermark and buffers without limit.
    ///
    /// Default: 8 MiB.
    #[serde(default = "default_max_buffered_bytes")]
    pub max_buffered_bytes: usize,

    /// Capacity of the playback event broadcast channel.
    ///
    /// Default: 32.
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            fetch_chunk_bytes: default_fetch_chunk_bytes(),
            max_buffered_bytes: default_max_buffered_bytes(),
            event_capacity: default_event_capacity(),
        }
    }
}

impl PlaybackConfig {
    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.fetch_chunk_bytes == 0 {
            return Err("fetch_chunk_bytes must be > 0".to_string());
        }

        if self.max_buffered_bytes > 0 && self.max_buffered_bytes < self.fetch_chunk_bytes {
            return Err("max_buffered_bytes must hold at least one fetch chunk".to_string());
        }

        if self.event_capacity == 0 {
            return Err("event_capacity must be > 0".to_string());
        }

        Ok(())
    }
}

// ============================================================================
// Default Functions (for serde)
// ============================================================================

fn default_fetch_chunk_bytes() -> usize {
    8 * 1024
}

fn default_max_buffered_bytes() -> usize {
    8 * 1024 * 1024
}

fn default_event_capacity() -> usize {
    32
}
