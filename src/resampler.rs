//! Sample-rate conversion with rubato
//!
//! The capture device runs at whatever rate its default config reports; the
//! encoder wants the playback file's rate. This bridges the two. When the
//! rates already match, `process` is a passthrough.

use rubato::{
    Resampler as RubatoResampler, SincFixedIn, SincInterpolationParameters,
    SincInterpolationType, WindowFunction,
};

use crate::error::{AudioError, Result};

/// Converts interleaved f32 audio from one sample rate to another.
pub struct Resampler {
    source_rate: u32,
    target_rate: u32,
    channels: u16,
    inner: Option<SincFixedIn<f32>>,
    chunk_frames: usize,
}

impl Resampler {
    pub fn new(source_rate: u32, target_rate: u32, channels: u16) -> Result<Self> {
        if source_rate == 0 || target_rate == 0 {
            return Err(AudioError::invalid_config("Sample rate cannot be zero"));
        }
        if channels == 0 {
            return Err(AudioError::invalid_config("Channel count cannot be zero"));
        }

        // SincFixedIn wants a fixed input length; 100ms at the source rate.
        let chunk_frames = (source_rate as f32 * 0.1) as usize;

        let inner = if source_rate != target_rate {
            let params = SincInterpolationParameters {
                sinc_len: 256,
                f_cutoff: 0.95,
                interpolation: SincInterpolationType::Linear,
                oversampling_factor: 256,
                window: WindowFunction::BlackmanHarris2,
            };
            let resampler = SincFixedIn::<f32>::new(
                target_rate as f64 / source_rate as f64,
                2.0,
                params,
                chunk_frames,
                channels as usize,
            )
            .map_err(|e| {
                AudioError::ResampleError(format!("Failed to create resampler: {:?}", e))
            })?;
            Some(resampler)
        } else {
            None
        };

        Ok(Self {
            source_rate,
            target_rate,
            channels,
            inner,
            chunk_frames,
        })
    }

    /// True when source and target rates match and `process` just copies.
    pub fn is_passthrough(&self) -> bool {
        self.inner.is_none()
    }

    /// Frames per `process` call when resampling is active. Callers
    /// accumulate input until they have exactly this many frames.
    pub fn chunk_frames(&self) -> usize {
        self.chunk_frames
    }

    /// Resample one chunk of interleaved samples.
    ///
    /// When resampling is active the input must hold exactly
    /// `chunk_frames()` frames; passthrough accepts any length.
    pub fn process(&mut self, input: &[f32]) -> Result<Vec<f32>> {
        let Some(inner) = self.inner.as_mut() else {
            return Ok(input.to_vec());
        };

        if input.is_empty() {
            return Ok(Vec::new());
        }

        // rubato works on planar channel buffers.
        let channels = self.channels as usize;
        let frames = input.len() / channels;
        let mut planar = vec![vec![0.0f32; frames]; channels];
        for (frame_idx, frame) in input.chunks(channels).enumerate() {
            for (ch, &sample) in frame.iter().enumerate() {
                planar[ch][frame_idx] = sample;
            }
        }

        let resampled = inner
            .process(&planar, None)
            .map_err(|e| AudioError::ResampleError(format!("Resampling failed: {:?}", e)))?;

        let out_frames = resampled[0].len();
        let mut interleaved = Vec::with_capacity(out_frames * channels);
        for frame_idx in 0..out_frames {
            for channel in resampled.iter().take(channels) {
                interleaved.push(channel[frame_idx]);
            }
        }

        Ok(interleaved)
    }

    /// Approximate output length for a given input length.
    pub fn expected_output_len(&self, input_len: usize) -> usize {
        if self.inner.is_none() {
            return input_len;
        }
        let frames = input_len / self.channels as usize;
        let out_frames =
            (frames as f64 * self.target_rate as f64 / self.source_rate as f64) as usize;
        out_frames * self.channels as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_passthrough_when_rates_match() {
        let mut resampler = Resampler::new(44100, 44100, 2).unwrap();
        assert!(resampler.is_passthrough());

        let input = vec![0.5, 0.3, 0.1, -0.2];
        let output = resampler.process(&input).unwrap();
        assert_eq!(output, input);
    }

    #[test]
    fn test_48k_to_16k() {
        let mut resampler = Resampler::new(48000, 16000, 1).unwrap();
        assert!(!resampler.is_passthrough());
        assert_eq!(resampler.chunk_frames(), 4800);

        let input: Vec<f32> = (0..4800)
            .map(|i| (i as f32 * 440.0 * 2.0 * std::f32::consts::PI / 48000.0).sin() * 0.5)
            .collect();

        let output = resampler.process(&input).unwrap();
        assert!(
            output.len() > 1500 && output.len() < 1700,
            "output length {} not near expected 1600",
            output.len()
        );
    }

    #[test]
    fn test_expected_output_len() {
        let resampler = Resampler::new(48000, 44100, 2).unwrap();
        let out = resampler.expected_output_len(9600);
        // 4800 frames in, ~4410 frames out, times two channels.
        assert!(out >= 8800 && out <= 8840, "got {}", out);
    }

    #[test]
    fn test_invalid_config() {
        assert!(Resampler::new(0, 16000, 1).is_err());
        assert!(Resampler::new(48000, 0, 1).is_err());
        assert!(Resampler::new(48000, 16000, 0).is_err());
    }
}
