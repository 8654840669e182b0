//! Full-duplex loopback: play one WAV file while recording the microphone
//! to another, both streams derived from the playback file's format.

use std::path::Path;
use std::time::Instant;

use crate::capture::{CaptureConfig, CaptureStream, CaptureSummary};
use crate::clock::skew_micros;
use crate::error::Result;
use crate::playback::{PlaybackConfig, PlaybackStream, PlaybackSummary};
use crate::wav::{WavDecoder, WavEncoder};

/// Duplex session configuration.
#[derive(Debug, Clone)]
pub struct DuplexConfig {
    pub period_ms: u32,
    pub capture_device: Option<usize>,
    pub playback_device: Option<usize>,
}

impl Default for DuplexConfig {
    fn default() -> Self {
        Self {
            period_ms: 4,
            capture_device: None,
            playback_device: None,
        }
    }
}

/// Totals from both halves of a stopped duplex session.
#[derive(Debug, Clone, Copy)]
pub struct DuplexSummary {
    pub capture: CaptureSummary,
    pub playback: PlaybackSummary,
}

/// A running duplex session.
///
/// Setup order mirrors teardown order in reverse: the decoder and encoder
/// are opened first and handed to the streams, which own them; stopping
/// drops the device streams before the file handles they reference.
pub struct DuplexLoopback {
    capture: Option<CaptureStream>,
    playback: Option<PlaybackStream>,
}

impl std::fmt::Debug for DuplexLoopback {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DuplexLoopback").finish_non_exhaustive()
    }
}

impl DuplexLoopback {
    /// Open `play_path` for playback and `rec_path` for recording, then
    /// start both streams. The recording inherits the playback file's
    /// channel count and sample rate.
    ///
    /// Failure order matches the setup sequence: decoder open, encoder
    /// open, device open, device start. Anything already acquired is
    /// released by drop.
    pub fn start<P: AsRef<Path>>(rec_path: P, play_path: P, config: &DuplexConfig) -> Result<Self> {
        let decoder = WavDecoder::open(play_path)?;
        let channels = decoder.channels();
        let sample_rate = decoder.sample_rate();

        let encoder = WavEncoder::create(rec_path, channels, sample_rate)?;

        let epoch = Instant::now();

        let playback = PlaybackStream::start(
            decoder,
            &PlaybackConfig {
                period_ms: config.period_ms,
                device_index: config.playback_device,
                ring_seconds: 1.0,
            },
            epoch,
        )?;

        let capture = CaptureStream::start(
            encoder,
            &CaptureConfig {
                channels,
                sample_rate,
                period_ms: config.period_ms,
                device_index: config.capture_device,
                ring_seconds: 1.0,
            },
            epoch,
        )?;

        Ok(Self {
            capture: Some(capture),
            playback: Some(playback),
        })
    }

    /// Microseconds between the first capture callback and the first
    /// playback callback, once both have fired. Positive means playback
    /// started later.
    pub fn callback_skew_micros(&self) -> Option<i64> {
        skew_micros(
            self.capture.as_ref()?.first_callback(),
            self.playback.as_ref()?.first_callback(),
        )
    }

    /// True once the playback file has been fully played out.
    pub fn playback_finished(&self) -> bool {
        self.playback
            .as_ref()
            .map(|p| p.is_finished())
            .unwrap_or(true)
    }

    /// Stop both streams and finalize the recording. Capture stops first
    /// so the recording does not tail off with the output already silent.
    pub fn stop(mut self) -> Result<DuplexSummary> {
        let capture = match self.capture.take() {
            Some(stream) => stream.stop()?,
            None => CaptureSummary {
                frames_written: 0,
                dropped_samples: 0,
            },
        };
        let playback = match self.playback.take() {
            Some(stream) => stream.stop()?,
            None => PlaybackSummary {
                frames_played: 0,
                underruns: 0,
            },
        };
        Ok(DuplexSummary { capture, playback })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AudioError;

    #[test]
    fn test_missing_playback_file_fails_before_devices() {
        let dir = tempfile::tempdir().unwrap();
        let rec = dir.path().join("rec.wav");
        let play = dir.path().join("missing.wav");

        let err = DuplexLoopback::start(&rec, &play, &DuplexConfig::default()).unwrap_err();
        assert!(matches!(err, AudioError::DecoderOpen { .. }));
        assert_eq!(err.exit_code(), -2);
        // The recording file must not have been created.
        assert!(!rec.exists());
    }

    #[test]
    fn test_duplex_config_default() {
        let config = DuplexConfig::default();
        assert_eq!(config.period_ms, 4);
        assert!(config.capture_device.is_none());
        assert!(config.playback_device.is_none());
    }
}
