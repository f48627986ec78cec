//! # Playback Error Types
//!
//! Error taxonomy for the streaming decode-and-playback pipeline.
//!
//! Two outcomes that look like errors are deliberately absent:
//!
//! - A network failure during fetch is absorbed at the fetch boundary. The
//!   decode side sees an ordinary end of stream and partial playback is
//!   preferred over a hard stop.
//! - Cancellation (a track switch or stop) is the expected outcome of user
//!   action and is modeled as [`crate::engine::PlayOutcome::Aborted`], never
//!   as an error.

use thiserror::Error;

/// Errors that can occur during playback operations.
#[derive(Error, Debug)]
pub enum PlaybackError {
    /// No media part of the track names a container with a registered engine.
    #[error("No playable part: {0}")]
    UnsupportedContainer(String),

    /// The catalog collaborator failed to open the stream.
    #[error("Failed to open audio source: {0}")]
    SourceError(String),

    /// The engine reported a fatal parse or codec error.
    #[error("Decoding failed: {0}")]
    DecodeFailure(String),

    /// The output device rejected the requested format entirely.
    #[error("Device configuration failed: {0}")]
    DeviceConfigFailure(String),

    /// Writing PCM to the configured device failed.
    #[error("Device write failed: {0}")]
    SinkWriteFailure(String),

    /// Internal error (should not occur in normal operation).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl PlaybackError {
    /// Returns `true` if this error concerns the output device rather than
    /// the stream itself.
    pub fn is_device_error(&self) -> bool {
        matches!(
            self,
            PlaybackError::DeviceConfigFailure(_) | PlaybackError::SinkWriteFailure(_)
        )
    }
}

/// Result type for playback operations.
pub type Result<T> = std::result::Result<T, PlaybackError>;
