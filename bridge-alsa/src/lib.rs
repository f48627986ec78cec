//! # ALSA Output Bridge
//!
//! [`AudioSink`] implementation over an ALSA PCM playback device.
//!
//! Devices rarely honor an arbitrary request: a card may only run at 48 kHz,
//! or refuse 24-bit samples outright. Configuration therefore requests a
//! format, stepping the sample width down until the device accepts one, and
//! then reads back the parameters the hardware actually negotiated. Callers
//! must do all conversion math against the returned values.

use alsa::pcm::{Access, Format, HwParams, PCM};
use alsa::{Direction, ValueOr};
use core_playback::{AudioSink, PlaybackError, Result, SinkFormat};
use tracing::{debug, info};

/// Signed little-endian formats the bridge will request, widest first.
const FORMAT_LADDER: &[(u16, Format)] = &[
    (32, Format::S32LE),
    (24, Format::S243LE),
    (16, Format::S16LE),
    (8, Format::S8),
];

/// Candidate formats at or below the requested width, widest first.
fn ladder(requested_bits: u16) -> impl Iterator<Item = (u16, Format)> {
    FORMAT_LADDER
        .iter()
        .copied()
        .filter(move |(bits, _)| *bits <= requested_bits)
}

fn width_of(format: Format) -> Result<u16> {
    FORMAT_LADDER
        .iter()
        .find(|(_, f)| *f == format)
        .map(|(bits, _)| *bits)
        .ok_or_else(|| {
            PlaybackError::DeviceConfigFailure(format!(
                "Device reported unexpected sample format {:?}",
                format
            ))
        })
}

fn device_error(context: &str) -> impl Fn(alsa::Error) -> PlaybackError + '_ {
    move |e| PlaybackError::DeviceConfigFailure(format!("{}: {}", context, e))
}

/// Playback sink over one named ALSA PCM device (e.g. `"default"`,
/// `"hw:0,0"`).
///
/// The device is opened on `configure` and reopened for every track, which
/// also discards whatever the previous session left queued in the hardware
/// buffer.
pub struct AlsaSink {
    device: String,
    pcm: Option<PCM>,
    format: Option<SinkFormat>,
}

impl AlsaSink {
    pub fn new(device: impl Into<String>) -> Self {
        Self {
            device: device.into(),
            pcm: None,
            format: None,
        }
    }

    /// The format negotiated by the last `configure` call, if any.
    pub fn format(&self) -> Option<SinkFormat> {
        self.format
    }
}

impl AudioSink for AlsaSink {
    fn configure(&mut self, requested: &SinkFormat) -> Result<SinkFormat> {
        // Drop the previous handle first; closing discards stale audio.
        self.pcm = None;
        self.format = None;

        let pcm = PCM::new(&self.device, Direction::Playback, false).map_err(|e| {
            PlaybackError::DeviceConfigFailure(format!(
                "Failed to open PCM device '{}': {}",
                self.device, e
            ))
        })?;

        {
            let hwp = HwParams::any(&pcm).map_err(device_error("Failed to initialize HwParams"))?;
            hwp.set_access(Access::RWInterleaved)
                .map_err(device_error("Interleaved access rejected"))?;

            let mut accepted = None;
            for (bits, format) in ladder(requested.bit_width) {
                if hwp.set_format(format).is_ok() {
                    debug!("Device '{}' accepted {}-bit samples", self.device, bits);
                    accepted = Some(bits);
                    break;
                }
            }
            if accepted.is_none() {
                return Err(PlaybackError::DeviceConfigFailure(format!(
                    "Device '{}' offers no signed LE format at or below {} bits",
                    self.device, requested.bit_width
                )));
            }

            hwp.set_channels(requested.channels as u32)
                .map_err(device_error("Channel count rejected"))?;
            hwp.set_rate_near(requested.sample_rate, ValueOr::Nearest)
                .map_err(device_error("Sample rate rejected"))?;
            pcm.hw_params(&hwp)
                .map_err(device_error("Failed to apply hardware parameters"))?;
        }

        // Read back what was actually negotiated; the request is history.
        let actual = {
            let hwp = pcm
                .hw_params_current()
                .map_err(device_error("Failed to read hardware parameters"))?;
            SinkFormat {
                sample_rate: hwp.get_rate().map_err(device_error("Failed to read rate"))?,
                channels: hwp
                    .get_channels()
                    .map_err(device_error("Failed to read channels"))? as u16,
                bit_width: width_of(
                    hwp.get_format()
                        .map_err(device_error("Failed to read format"))?,
                )?,
            }
        };

        info!(
            "ALSA playback: device={}, rate={}, channels={}, bits={}",
            self.device, actual.sample_rate, actual.channels, actual.bit_width
        );

        self.pcm = Some(pcm);
        self.format = Some(actual);
        Ok(actual)
    }

    fn write(&mut self, pcm_bytes: &[u8]) -> Result<()> {
        let pcm = self
            .pcm
            .as_ref()
            .ok_or_else(|| PlaybackError::Internal("Write before configure".to_string()))?;

        let io = pcm.io_bytes();
        match io.writei(pcm_bytes) {
            Ok(_) => Ok(()),
            Err(e) => {
                // Usually an underrun; recover the stream and retry once.
                pcm.try_recover(e, true)
                    .map_err(|e| PlaybackError::SinkWriteFailure(e.to_string()))?;
                io.writei(pcm_bytes)
                    .map(|_| ())
                    .map_err(|e| PlaybackError::SinkWriteFailure(e.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ladder_steps_down_from_requested_width() {
        let widths: Vec<u16> = ladder(24).map(|(bits, _)| bits).collect();
        assert_eq!(widths, vec![24, 16, 8]);
    }

    #[test]
    fn ladder_never_offers_wider_than_requested() {
        assert!(ladder(16).all(|(bits, _)| bits <= 16));
        assert_eq!(ladder(8).count(), 1);
    }

    #[test]
    fn width_of_maps_known_formats() {
        assert_eq!(width_of(Format::S16LE).unwrap(), 16);
        assert_eq!(width_of(Format::S243LE).unwrap(), 24);
        assert_eq!(width_of(Format::S32LE).unwrap(), 32);
        assert!(width_of(Format::FloatLE).is_err());
    }

    #[test]
    fn write_before_configure_is_an_error() {
        let mut sink = AlsaSink::new("default");
        assert!(sink.write(&[0u8; 4]).is_err());
        assert!(sink.format().is_none());
    }
}
