//! # FLAC Decode Engine
//!
//! Engine bridge over the Symphonia FLAC stack. Symphonia pulls compressed
//! bytes from the attached [`MediaInput`] and hands back planar per-channel
//! integer samples; this bridge interleaves them, converts to little-endian
//! signed bytes at the stream's storage width, and forwards each frame to
//! the registered sink callback.

use crate::engine::{DecodeEngine, FrameSink, MediaInput, PlayOutcome, StreamMetadata, WriteAction};
use crate::error::{PlaybackError, Result};
use crate::negotiate::storage_width;
use symphonia::core::audio::{AudioBuffer, AudioBufferRef, Signal};
use symphonia::core::codecs::{Decoder, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::conv::FromSample;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::{MediaSourceStream, ReadOnlySource};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::core::sample::Sample;
use tracing::{debug, warn};

/// Consecutive undecodable packets tolerated before giving up on the stream.
const MAX_CONSECUTIVE_ERRORS: usize = 10;

struct ActiveStream {
    reader: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
}

/// FLAC engine handle, created once and reused across tracks via
/// [`DecodeEngine::reset`].
pub struct FlacEngine {
    active: Option<ActiveStream>,
    metadata: Option<StreamMetadata>,
    /// Interleave scratch, reused frame to frame.
    emit: Vec<u8>,
}

impl FlacEngine {
    pub fn new() -> Self {
        Self {
            active: None,
            metadata: None,
            emit: Vec::new(),
        }
    }
}

impl Default for FlacEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl DecodeEngine for FlacEngine {
    fn probe(&mut self, input: Box<dyn MediaInput>) -> Result<StreamMetadata> {
        self.active = None;
        self.metadata = None;

        let source = ReadOnlySource::new(input);
        let mss = MediaSourceStream::new(Box::new(source), Default::default());
        let mut hint = Hint::new();
        hint.with_extension("flac");

        // Parsing the header block is bounded work; full decode happens in
        // `play` only.
        let probed = symphonia::default::get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| {
                PlaybackError::DecodeFailure(format!("Failed to parse stream header: {}", e))
            })?;
        let reader = probed.format;

        let track = reader
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| {
                PlaybackError::DecodeFailure("No decodable track in stream".to_string())
            })?;
        let track_id = track.id;
        let params = track.codec_params.clone();

        let sample_rate = params.sample_rate.ok_or_else(|| {
            PlaybackError::DecodeFailure("Stream header missing sample rate".to_string())
        })?;
        let channels = params.channels.map(|c| c.count() as u16).unwrap_or(2);
        let bits_per_sample = params.bits_per_sample.map(|b| b as u16).unwrap_or(16);

        let decoder = symphonia::default::get_codecs()
            .make(&params, &DecoderOptions::default())
            .map_err(|e| {
                PlaybackError::DecodeFailure(format!("Failed to create decoder: {}", e))
            })?;

        let metadata = StreamMetadata {
            sample_rate,
            channels,
            bits_per_sample,
        };
        debug!(
            "Probed stream: {}Hz, {} channels, {} bits",
            sample_rate, channels, bits_per_sample
        );

        self.active = Some(ActiveStream {
            reader,
            decoder,
            track_id,
        });
        self.metadata = Some(metadata);
        Ok(metadata)
    }

    fn play(&mut self, sink: &mut FrameSink<'_>) -> Result<PlayOutcome> {
        let width = storage_width(
            self.metadata
                .ok_or_else(|| PlaybackError::Internal("play called before probe".to_string()))?
                .bits_per_sample,
        );
        let active = self
            .active
            .as_mut()
            .ok_or_else(|| PlaybackError::Internal("play called before probe".to_string()))?;

        let mut bad_packets = 0usize;
        loop {
            let packet = match active.reader.next_packet() {
                Ok(p) => p,
                Err(SymphoniaError::IoError(e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    return Ok(PlayOutcome::Finished);
                }
                Err(SymphoniaError::DecodeError(e)) => {
                    bad_packets += 1;
                    warn!(
                        "Skipping unreadable packet ({}/{}): {}",
                        bad_packets, MAX_CONSECUTIVE_ERRORS, e
                    );
                    if bad_packets >= MAX_CONSECUTIVE_ERRORS {
                        return Err(PlaybackError::DecodeFailure(format!(
                            "Stream unreadable after {} failed packets: {}",
                            MAX_CONSECUTIVE_ERRORS, e
                        )));
                    }
                    continue;
                }
                Err(e) => {
                    return Err(PlaybackError::DecodeFailure(format!(
                        "Failed to read packet: {}",
                        e
                    )));
                }
            };

            if packet.track_id() != active.track_id {
                continue;
            }

            match active.decoder.decode(&packet) {
                Ok(decoded) => {
                    bad_packets = 0;
                    self.emit.clear();
                    interleave_frame(&decoded, width, &mut self.emit);
                    if let WriteAction::Abort = sink(&self.emit) {
                        return Ok(PlayOutcome::Aborted);
                    }
                }
                Err(SymphoniaError::IoError(e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    // Truncated final frame on an interrupted stream.
                    return Ok(PlayOutcome::Finished);
                }
                Err(SymphoniaError::DecodeError(e)) => {
                    bad_packets += 1;
                    warn!(
                        "Skipping undecodable frame ({}/{}): {}",
                        bad_packets, MAX_CONSECUTIVE_ERRORS, e
                    );
                    if bad_packets >= MAX_CONSECUTIVE_ERRORS {
                        return Err(PlaybackError::DecodeFailure(format!(
                            "Decoder failure after {} failed frames: {}",
                            MAX_CONSECUTIVE_ERRORS, e
                        )));
                    }
                }
                Err(e) => {
                    return Err(PlaybackError::DecodeFailure(format!(
                        "Failed to decode frame: {}",
                        e
                    )));
                }
            }
        }
    }

    fn metadata(&self) -> Option<StreamMetadata> {
        self.metadata
    }

    fn reset(&mut self) {
        self.active = None;
        self.metadata = None;
        self.emit.clear();
    }
}

/// Interleave one decoded frame into little-endian signed bytes of `width`
/// bits per sample.
fn interleave_frame(buffer: &AudioBufferRef<'_>, width: u16, out: &mut Vec<u8>) {
    match buffer {
        AudioBufferRef::U8(buf) => interleave_planes(&**buf, width, out),
        AudioBufferRef::U16(buf) => interleave_planes(&**buf, width, out),
        AudioBufferRef::U24(buf) => interleave_planes(&**buf, width, out),
        AudioBufferRef::U32(buf) => interleave_planes(&**buf, width, out),
        AudioBufferRef::S8(buf) => interleave_planes(&**buf, width, out),
        AudioBufferRef::S16(buf) => interleave_planes(&**buf, width, out),
        AudioBufferRef::S24(buf) => interleave_planes(&**buf, width, out),
        AudioBufferRef::S32(buf) => interleave_planes(&**buf, width, out),
        AudioBufferRef::F32(buf) => interleave_planes(&**buf, width, out),
        AudioBufferRef::F64(buf) => interleave_planes(&**buf, width, out),
    }
}

/// Interleave planar samples of any format, scaled to `width` bits.
///
/// Samples convert through full-scale i32 first, so a 16-bit stream decoded
/// into a wider buffer still emits its original values.
fn interleave_planes<S>(buf: &AudioBuffer<S>, width: u16, out: &mut Vec<u8>)
where
    S: Sample,
    i32: FromSample<S>,
{
    let channels = buf.spec().channels.count();
    let frames = buf.frames();
    let sample_bytes = width as usize / 8;
    out.reserve(frames * channels * sample_bytes);

    for frame in 0..frames {
        for ch in 0..channels {
            let full = i32::from_sample(buf.chan(ch)[frame]);
            let value = full >> (32 - width as u32);
            out.extend_from_slice(&value.to_le_bytes()[..sample_bytes]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use symphonia::core::audio::{Channels, SignalSpec};

    fn stereo_buffer(left: &[i32], right: &[i32]) -> AudioBuffer<i32> {
        let spec = SignalSpec::new(44100, Channels::FRONT_LEFT | Channels::FRONT_RIGHT);
        let mut buf = AudioBuffer::<i32>::new(left.len() as u64, spec);
        buf.render_reserved(Some(left.len()));
        buf.chan_mut(0).copy_from_slice(left);
        buf.chan_mut(1).copy_from_slice(right);
        buf
    }

    #[test]
    fn interleave_emits_channel_pairs_in_frame_order() {
        // Full-scale i32 values for the 16-bit samples 1000 and -2000
        let buf = stereo_buffer(&[1000 << 16, 3000 << 16], &[-2000 << 16, -4000 << 16]);

        let mut out = Vec::new();
        interleave_planes(&buf, 16, &mut out);

        let mut expected = Vec::new();
        for v in [1000i16, -2000, 3000, -4000] {
            expected.extend_from_slice(&v.to_le_bytes());
        }
        assert_eq!(out, expected);
    }

    #[test]
    fn interleave_emits_packed_24_bit_samples() {
        let buf = stereo_buffer(&[0x123456 << 8], &[-(0x123456 << 8)]);

        let mut out = Vec::new();
        interleave_planes(&buf, 24, &mut out);

        assert_eq!(out.len(), 6);
        assert_eq!(&out[..3], &[0x56, 0x34, 0x12]);
    }

    #[test]
    fn play_before_probe_is_an_internal_error() {
        let mut engine = FlacEngine::new();
        let mut sink = |_pcm: &[u8]| WriteAction::Continue;
        assert!(engine.play(&mut sink).is_err());
    }

    #[test]
    fn probe_rejects_garbage_input() {
        let mut engine = FlacEngine::new();
        let garbage: &[u8] = &[0u8; 64];
        let result = engine.probe(Box::new(garbage));
        assert!(matches!(result, Err(PlaybackError::DecodeFailure(_))));
        assert!(engine.metadata().is_none());
    }
}
