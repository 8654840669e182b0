//! Capture session: input device -> ring -> convert -> WAV encoder
//!
//! The device callback does nothing but stamp its first run and push the
//! raw device samples into a wait-free ring; no file I/O and no heap
//! allocation happen on the real-time thread. A plain thread drains the
//! ring, remaps channels, resamples to the encoder's rate, and writes.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{BufferSize, SampleRate, Stream, StreamConfig};

use crate::buffer::{sample_ring, RingReader, RingWriter};
use crate::clock::CallbackStamp;
use crate::device::{period_frames, select_input_device};
use crate::error::{AudioError, Result};
use crate::resampler::Resampler;
use crate::wav::WavEncoder;

/// How long the drain thread sleeps when the ring is empty.
const DRAIN_IDLE: Duration = Duration::from_millis(10);

/// Capture session configuration. Channels and sample rate describe the
/// encoder side; the device runs at its own native config and is converted.
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    pub channels: u16,
    pub sample_rate: u32,
    pub period_ms: u32,
    pub device_index: Option<usize>,
    /// Ring capacity in seconds of device-rate audio.
    pub ring_seconds: f32,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            channels: 1,
            sample_rate: 48000,
            period_ms: 4,
            device_index: None,
            ring_seconds: 1.0,
        }
    }
}

/// Totals reported when a capture session stops.
#[derive(Debug, Clone, Copy)]
pub struct CaptureSummary {
    pub frames_written: u64,
    pub dropped_samples: usize,
}

/// A running capture stream. Owns the cpal stream and the drain thread;
/// `stop` (or drop) tears the stream down before the encoder it feeds.
pub struct CaptureStream {
    stream: Option<Stream>,
    drain: Option<JoinHandle<Result<u64>>>,
    running: Arc<AtomicBool>,
    dropped: Arc<AtomicUsize>,
    first_callback: CallbackStamp,
}

impl CaptureStream {
    /// Open the input device and start capturing into `encoder`.
    ///
    /// The encoder must be configured before this is called; the session
    /// takes ownership so the stream can never outlive it. `epoch` anchors
    /// the first-callback timestamp so capture and playback sessions can
    /// share a clock.
    pub fn start(encoder: WavEncoder, config: &CaptureConfig, epoch: Instant) -> Result<Self> {
        if config.channels == 0 || config.sample_rate == 0 {
            return Err(AudioError::invalid_config(
                "capture channels and sample rate must be nonzero",
            ));
        }
        debug_assert_eq!(encoder.channels(), config.channels);
        debug_assert_eq!(encoder.sample_rate(), config.sample_rate);

        let host = cpal::default_host();
        let device = select_input_device(&host, config.device_index)?;
        let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());

        let native = device
            .default_input_config()
            .map_err(|e| AudioError::device(format!("Failed to get device config: {}", e)))?;
        let source_rate = native.sample_rate().0;
        let source_channels = native.channels();

        println!(
            "Capture device: {} ({} Hz/{}ch -> {} Hz/{}ch)",
            device_name, source_rate, source_channels, config.sample_rate, config.channels
        );

        // The ring carries raw device samples; conversion happens on the
        // drain side, off the real-time thread.
        let frame_samples = source_channels as usize;
        let ring_capacity =
            ((config.ring_seconds * source_rate as f32) as usize).max(1) * frame_samples;
        let (writer, reader) = sample_ring(ring_capacity);

        let resampler = Resampler::new(source_rate, config.sample_rate, config.channels)?;

        let running = Arc::new(AtomicBool::new(true));
        let dropped = Arc::new(AtomicUsize::new(0));
        let first_callback = CallbackStamp::new();

        let stream_config = StreamConfig {
            channels: source_channels,
            sample_rate: SampleRate(source_rate),
            buffer_size: BufferSize::Fixed(period_frames(source_rate, config.period_ms)),
        };

        let cb_running = Arc::clone(&running);
        let cb_dropped = Arc::clone(&dropped);
        let cb_stamp = first_callback.clone();
        let mut cb_writer = writer;

        let stream = device
            .build_input_stream(
                &stream_config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    if !cb_running.load(Ordering::Relaxed) {
                        return;
                    }
                    cb_stamp.mark(epoch);
                    push_frames(&mut cb_writer, data, frame_samples, &cb_dropped);
                },
                |err| {
                    eprintln!("Audio stream error: {}", err);
                },
                None,
            )
            .map_err(|e| AudioError::stream(format!("Failed to build capture stream: {}", e)))?;

        let drain_running = Arc::clone(&running);
        let target_channels = config.channels as usize;
        let drain = thread::Builder::new()
            .name("wav-writer".to_string())
            .spawn(move || {
                drain_loop(
                    reader,
                    encoder,
                    resampler,
                    drain_running,
                    frame_samples,
                    target_channels,
                )
            })
            .map_err(|e| AudioError::stream(format!("Failed to spawn writer thread: {}", e)))?;

        stream
            .play()
            .map_err(|e| AudioError::start(format!("capture: {}", e)))?;

        Ok(Self {
            stream: Some(stream),
            drain: Some(drain),
            running,
            dropped,
            first_callback,
        })
    }

    /// Stamp of the first device callback, shared with the callback itself.
    pub fn first_callback(&self) -> &CallbackStamp {
        &self.first_callback
    }

    /// Microseconds from the shared epoch to the first device callback,
    /// or None if no callback has fired yet.
    pub fn first_callback_micros(&self) -> Option<u64> {
        self.first_callback.micros()
    }

    pub fn is_active(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Stop the device, drain the ring, finalize the recording.
    pub fn stop(mut self) -> Result<CaptureSummary> {
        self.running.store(false, Ordering::Relaxed);
        drop(self.stream.take());

        let frames_written = match self.drain.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| AudioError::stream("writer thread panicked"))??,
            None => 0,
        };

        Ok(CaptureSummary {
            frames_written,
            dropped_samples: self.dropped.load(Ordering::Relaxed),
        })
    }
}

impl Drop for CaptureStream {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Relaxed);
        drop(self.stream.take());
        if let Some(handle) = self.drain.take() {
            if let Err(e) = handle.join().unwrap_or(Ok(0)) {
                eprintln!("Warning: recording not finalized cleanly: {}", e);
            }
        }
    }
}

/// Drain the ring into the encoder until the stream has stopped and the
/// ring is empty, then finalize. Channel remap and resampling happen here,
/// on the writer thread. A tail shorter than one resampler chunk is
/// discarded, as is anything the ring had to drop on the way in.
fn drain_loop(
    mut reader: RingReader,
    mut encoder: WavEncoder,
    mut resampler: Resampler,
    running: Arc<AtomicBool>,
    source_channels: usize,
    target_channels: usize,
) -> Result<u64> {
    let mut scratch = vec![0.0f32; source_channels * 2048];
    let mut accum: Vec<f32> = Vec::new();
    let chunk_samples = resampler.chunk_frames() * target_channels;
    let passthrough = resampler.is_passthrough();

    loop {
        let n = reader.read(&mut scratch);
        if n > 0 {
            let remapped = remap_channels(&scratch[..n], source_channels, target_channels);
            if passthrough {
                encoder.write_samples(&remapped)?;
            } else {
                accum.extend_from_slice(&remapped);
                while accum.len() >= chunk_samples {
                    let chunk: Vec<f32> = accum.drain(..chunk_samples).collect();
                    let converted = resampler.process(&chunk)?;
                    encoder.write_samples(&converted)?;
                }
            }
        } else if !running.load(Ordering::Relaxed) {
            break;
        } else {
            thread::sleep(DRAIN_IDLE);
        }
    }

    encoder.finalize()
}

/// Remap interleaved audio from `source` to `target` channels.
///
/// Downmix takes the first channel of each frame (averaging halves the
/// level when the mic only drives one channel); upmix duplicates it.
fn remap_channels(data: &[f32], source: usize, target: usize) -> Vec<f32> {
    if source == target {
        return data.to_vec();
    }
    let mut out = Vec::with_capacity(data.len() / source * target);
    for frame in data.chunks(source) {
        for _ in 0..target {
            out.push(frame[0]);
        }
    }
    out
}

/// Push whole frames into the ring, counting anything that had to be
/// dropped. Partial frames are never written so interleaving stays aligned.
fn push_frames(writer: &mut RingWriter, samples: &[f32], channels: usize, dropped: &AtomicUsize) {
    let writable = (writer.free_space() / channels) * channels;
    let take = samples.len().min(writable);
    writer.write(&samples[..take]);
    if take < samples.len() {
        dropped.fetch_add(samples.len() - take, Ordering::Relaxed);
    }
}
