//! Playback session: WAV decoder -> ring -> output device
//!
//! A feeder thread reads decoded frames into a wait-free ring; the output
//! callback pops from it and writes silence on underrun. Once the decoder
//! hits end of file and the ring drains, the session reports itself
//! finished and keeps emitting silence.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{BufferSize, SampleRate, Stream, StreamConfig};

use crate::buffer::{sample_ring, RingWriter};
use crate::clock::CallbackStamp;
use crate::device::{period_frames, select_output_device};
use crate::error::{AudioError, Result};
use crate::wav::WavDecoder;

/// How long the feeder thread sleeps when the ring is full.
const FEED_IDLE: Duration = Duration::from_millis(10);

/// Playback session configuration. Channels and sample rate come from the
/// decoder; the device is asked to run at exactly that config.
#[derive(Debug, Clone)]
pub struct PlaybackConfig {
    pub period_ms: u32,
    pub device_index: Option<usize>,
    /// Ring capacity in seconds of decoded audio.
    pub ring_seconds: f32,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            period_ms: 4,
            device_index: None,
            ring_seconds: 1.0,
        }
    }
}

/// Totals reported when a playback session stops.
#[derive(Debug, Clone, Copy)]
pub struct PlaybackSummary {
    pub frames_played: u64,
    pub underruns: usize,
}

/// A running playback stream.
pub struct PlaybackStream {
    stream: Option<Stream>,
    feeder: Option<JoinHandle<Result<()>>>,
    running: Arc<AtomicBool>,
    finished: Arc<AtomicBool>,
    underruns: Arc<AtomicUsize>,
    frames_played: Arc<AtomicU64>,
    first_callback: CallbackStamp,
}

impl PlaybackStream {
    /// Open the output device at the decoder's native config and start
    /// playing. The ring is pre-filled from the decoder before the stream
    /// starts so the first periods do not underrun.
    pub fn start(mut decoder: WavDecoder, config: &PlaybackConfig, epoch: Instant) -> Result<Self> {
        let channels = decoder.channels();
        let sample_rate = decoder.sample_rate();
        if channels == 0 || sample_rate == 0 {
            return Err(AudioError::invalid_config(
                "playback file has zero channels or sample rate",
            ));
        }

        let host = cpal::default_host();
        let device = select_output_device(&host, config.device_index)?;
        let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());

        println!(
            "Playback device: {} ({} Hz/{}ch)",
            device_name, sample_rate, channels
        );

        let frame_samples = channels as usize;
        let ring_capacity =
            ((config.ring_seconds * sample_rate as f32) as usize).max(1) * frame_samples;
        let (mut writer, mut reader) = sample_ring(ring_capacity);

        // Pre-fill before the device starts pulling.
        let eof = prefill(&mut decoder, &mut writer, frame_samples)?;

        let running = Arc::new(AtomicBool::new(true));
        let finished = Arc::new(AtomicBool::new(false));
        let underruns = Arc::new(AtomicUsize::new(0));
        let frames_played = Arc::new(AtomicU64::new(0));
        let first_callback = CallbackStamp::new();
        let decoder_empty = Arc::new(AtomicBool::new(eof));

        let feeder = spawn_feeder(
            decoder,
            writer,
            Arc::clone(&running),
            Arc::clone(&decoder_empty),
            frame_samples,
        )?;

        let stream_config = StreamConfig {
            channels,
            sample_rate: SampleRate(sample_rate),
            buffer_size: BufferSize::Fixed(period_frames(sample_rate, config.period_ms)),
        };

        let cb_running = Arc::clone(&running);
        let cb_finished = Arc::clone(&finished);
        let cb_underruns = Arc::clone(&underruns);
        let cb_frames = Arc::clone(&frames_played);
        let cb_stamp = first_callback.clone();
        let cb_empty = Arc::clone(&decoder_empty);

        let stream = device
            .build_output_stream(
                &stream_config,
                move |output: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    cb_stamp.mark(epoch);

                    if !cb_running.load(Ordering::Relaxed) {
                        output.fill(0.0);
                        return;
                    }

                    let read = reader.read_or_silence(output);
                    cb_frames.fetch_add((read / frame_samples) as u64, Ordering::Relaxed);

                    if read < output.len() {
                        if cb_empty.load(Ordering::Relaxed) {
                            // Decoder exhausted and ring drained: end of file,
                            // keep the device running on silence.
                            cb_finished.store(true, Ordering::Relaxed);
                        } else {
                            cb_underruns.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                },
                |err| {
                    eprintln!("Audio stream error: {}", err);
                },
                None,
            )
            .map_err(|e| AudioError::stream(format!("Failed to build playback stream: {}", e)))?;

        stream
            .play()
            .map_err(|e| AudioError::start(format!("playback: {}", e)))?;

        Ok(Self {
            stream: Some(stream),
            feeder,
            running,
            finished,
            underruns,
            frames_played,
            first_callback,
        })
    }

    /// Stamp of the first device callback, shared with the callback itself.
    pub fn first_callback(&self) -> &CallbackStamp {
        &self.first_callback
    }

    /// Microseconds from the shared epoch to the first device callback.
    pub fn first_callback_micros(&self) -> Option<u64> {
        self.first_callback.micros()
    }

    /// True once the file has been fully played out.
    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Relaxed)
    }

    /// Stop the device and release the decoder.
    pub fn stop(mut self) -> Result<PlaybackSummary> {
        self.running.store(false, Ordering::Relaxed);
        drop(self.stream.take());

        if let Some(handle) = self.feeder.take() {
            handle
                .join()
                .map_err(|_| AudioError::stream("feeder thread panicked"))??;
        }

        Ok(PlaybackSummary {
            frames_played: self.frames_played.load(Ordering::Relaxed),
            underruns: self.underruns.load(Ordering::Relaxed),
        })
    }
}

impl Drop for PlaybackStream {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Relaxed);
        drop(self.stream.take());
        if let Some(handle) = self.feeder.take() {
            let _ = handle.join();
        }
    }
}

/// Fill the ring from the decoder until it is full or the file ends.
/// Returns true when the decoder hit end of file during the fill.
fn prefill(decoder: &mut WavDecoder, writer: &mut RingWriter, frame_samples: usize) -> Result<bool> {
    let mut scratch = vec![0.0f32; frame_samples * 2048];
    loop {
        let room = (writer.free_space() / frame_samples) * frame_samples;
        if room == 0 {
            return Ok(false);
        }
        let want = room.min(scratch.len());
        let n = decoder.read_samples(&mut scratch[..want])?;
        if n == 0 {
            return Ok(true);
        }
        writer.write(&scratch[..n]);
    }
}

/// Spawn the thread that keeps the ring topped up from the decoder.
///
/// When the prefill already hit end of file there is nothing left to feed,
/// so no thread is spawned at all.
fn spawn_feeder(
    mut decoder: WavDecoder,
    mut writer: RingWriter,
    running: Arc<AtomicBool>,
    decoder_empty: Arc<AtomicBool>,
    frame_samples: usize,
) -> Result<Option<JoinHandle<Result<()>>>> {
    if decoder_empty.load(Ordering::Relaxed) {
        return Ok(None);
    }

    let handle = thread::Builder::new()
        .name("wav-feeder".to_string())
        .spawn(move || -> Result<()> {
            let mut scratch = vec![0.0f32; frame_samples * 2048];
            while running.load(Ordering::Relaxed) {
                let room = (writer.free_space() / frame_samples) * frame_samples;
                if room == 0 {
                    thread::sleep(FEED_IDLE);
                    continue;
                }
                let want = room.min(scratch.len());
                let n = decoder.read_samples(&mut scratch[..want])?;
                if n == 0 {
                    decoder_empty.store(true, Ordering::Relaxed);
                    break;
                }
                writer.write(&scratch[..n]);
            }
            Ok(())
        })
        .map_err(|e| AudioError::stream(format!("Failed to spawn feeder thread: {}", e)))?;

    Ok(Some(handle))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wav::WavEncoder;
    use tempfile::tempdir;

    fn write_test_wav(path: &std::path::Path, frames: usize) {
        let mut encoder = WavEncoder::create(path, 1, 8000).unwrap();
        let samples: Vec<f32> = (0..frames).map(|i| (i % 100) as f32 / 200.0).collect();
        encoder.write_samples(&samples).unwrap();
        encoder.finalize().unwrap();
    }

    #[test]
    fn test_prefill_small_file_hits_eof() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("short.wav");
        write_test_wav(&path, 100);

        let mut decoder = WavDecoder::open(&path).unwrap();
        let (mut writer, mut reader) = sample_ring(1024);

        let eof = prefill(&mut decoder, &mut writer, 1).unwrap();
        assert!(eof);
        assert_eq!(reader.available(), 100);
    }

    #[test]
    fn test_prefill_stops_at_capacity() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("long.wav");
        write_test_wav(&path, 5000);

        let mut decoder = WavDecoder::open(&path).unwrap();
        let (mut writer, mut reader) = sample_ring(256);

        let eof = prefill(&mut decoder, &mut writer, 1).unwrap();
        assert!(!eof);
        assert_eq!(reader.available(), 256);
    }

    #[test]
    fn test_no_feeder_thread_when_prefill_exhausts_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("short.wav");
        write_test_wav(&path, 100);

        let mut decoder = WavDecoder::open(&path).unwrap();
        let (mut writer, _reader) = sample_ring(1024);
        let eof = prefill(&mut decoder, &mut writer, 1).unwrap();
        assert!(eof);

        let feeder = spawn_feeder(
            decoder,
            writer,
            Arc::new(AtomicBool::new(true)),
            Arc::new(AtomicBool::new(eof)),
            1,
        )
        .unwrap();
        assert!(feeder.is_none());
    }

    #[test]
    fn test_feeder_thread_runs_for_longer_files() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("long.wav");
        write_test_wav(&path, 5000);

        let mut decoder = WavDecoder::open(&path).unwrap();
        let (mut writer, mut reader) = sample_ring(256);
        let eof = prefill(&mut decoder, &mut writer, 1).unwrap();
        assert!(!eof);

        let running = Arc::new(AtomicBool::new(true));
        let feeder = spawn_feeder(
            decoder,
            writer,
            Arc::clone(&running),
            Arc::new(AtomicBool::new(eof)),
            1,
        )
        .unwrap()
        .expect("feeder should spawn when the file has more to give");

        // Make room; the feeder refills the ring from the rest of the file.
        let mut sink = vec![0.0; 200];
        reader.read(&mut sink);
        for _ in 0..100 {
            if reader.available() == 256 {
                break;
            }
            thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(reader.available(), 256);

        running.store(false, Ordering::Relaxed);
        feeder.join().unwrap().unwrap();
    }

    #[test]
    fn test_playback_config_default() {
        let config = PlaybackConfig::default();
        assert_eq!(config.period_ms, 4);
        assert!(config.device_index.is_none());
    }
}
