//! WAV file handles: a read-side decoder and a write-side encoder
//!
//! The decoder exposes the file's native channel count and sample rate and
//! yields interleaved f32 frames regardless of the on-disk sample format.
//! The encoder serializes interleaved f32 frames as 16-bit PCM and patches
//! the RIFF header sizes on finalize.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};

use crate::error::{AudioError, Result};

/// Read-side handle for a WAV playback source.
pub struct WavDecoder {
    reader: WavReader<std::io::BufReader<File>>,
    spec: WavSpec,
}

impl std::fmt::Debug for WavDecoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WavDecoder")
            .field("spec", &self.spec)
            .finish_non_exhaustive()
    }
}

impl WavDecoder {
    /// Open a WAV file for reading.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let reader = WavReader::open(path).map_err(|source| AudioError::DecoderOpen {
            path: path.to_path_buf(),
            source,
        })?;
        let spec = reader.spec();
        Ok(Self { reader, spec })
    }

    pub fn channels(&self) -> u16 {
        self.spec.channels
    }

    pub fn sample_rate(&self) -> u32 {
        self.spec.sample_rate
    }

    /// Total frames in the file.
    pub fn duration_frames(&self) -> u32 {
        self.reader.duration()
    }

    /// Fill `output` with interleaved f32 samples, normalized to [-1, 1].
    ///
    /// Returns the number of samples produced; fewer than `output.len()`
    /// means end of file. Integer formats are scaled by their nominal full
    /// scale, float files pass through unchanged.
    pub fn read_samples(&mut self, output: &mut [f32]) -> Result<usize> {
        let mut n = 0;
        match self.spec.sample_format {
            SampleFormat::Float => {
                for sample in self.reader.samples::<f32>().take(output.len()) {
                    output[n] = sample?;
                    n += 1;
                }
            }
            SampleFormat::Int => {
                let scale = (1i64 << (self.spec.bits_per_sample - 1)) as f32;
                for sample in self.reader.samples::<i32>().take(output.len()) {
                    output[n] = sample? as f32 / scale;
                    n += 1;
                }
            }
        }
        Ok(n)
    }
}

/// Write-side handle for the captured recording.
///
/// Always writes 16-bit PCM; input samples are clamped to [-1, 1] before
/// quantization so an overdriven capture clips instead of wrapping.
pub struct WavEncoder {
    writer: Option<WavWriter<BufWriter<File>>>,
    channels: u16,
    sample_rate: u32,
    frames_written: u64,
}

impl std::fmt::Debug for WavEncoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WavEncoder")
            .field("channels", &self.channels)
            .field("sample_rate", &self.sample_rate)
            .field("frames_written", &self.frames_written)
            .finish_non_exhaustive()
    }
}

impl WavEncoder {
    /// Create the output file, truncating any existing one.
    pub fn create<P: AsRef<Path>>(path: P, channels: u16, sample_rate: u32) -> Result<Self> {
        let path = path.as_ref();
        let spec = WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let writer = WavWriter::create(path, spec).map_err(|source| AudioError::EncoderOpen {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self {
            writer: Some(writer),
            channels,
            sample_rate,
            frames_written: 0,
        })
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    /// Append interleaved f32 samples. `samples.len()` must be a whole
    /// number of frames.
    pub fn write_samples(&mut self, samples: &[f32]) -> Result<()> {
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| AudioError::stream("encoder already finalized"))?;
        for &sample in samples {
            let clamped = sample.clamp(-1.0, 1.0);
            writer.write_sample((clamped * i16::MAX as f32) as i16)?;
        }
        self.frames_written += samples.len() as u64 / self.channels as u64;
        Ok(())
    }

    /// Flush sample data and patch the RIFF header. Must be called once;
    /// dropping without finalizing still writes the header but swallows
    /// any error.
    pub fn finalize(mut self) -> Result<u64> {
        if let Some(writer) = self.writer.take() {
            writer.finalize()?;
        }
        Ok(self.frames_written)
    }
}

impl Drop for WavEncoder {
    fn drop(&mut self) {
        if let Some(writer) = self.writer.take() {
            if let Err(e) = writer.finalize() {
                eprintln!("Warning: failed to finalize WAV file: {}", e);
            }
        }
    }
}
