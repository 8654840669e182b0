//! Lock-free sample ring shared between a device callback and a worker thread

use ringbuf::traits::{Consumer, Observer, Producer, Split};
use ringbuf::HeapRb;

/// Create a split SPSC ring holding `capacity` f32 samples.
///
/// The writer half lives inside the real-time callback (capture) or the
/// feeder thread (playback); the reader half lives on the other side. Both
/// operations are wait-free, so the callback never blocks on the worker.
pub fn sample_ring(capacity: usize) -> (RingWriter, RingReader) {
    let rb = HeapRb::<f32>::new(capacity);
    let (producer, consumer) = rb.split();
    (
        RingWriter { inner: producer },
        RingReader { inner: consumer },
    )
}

/// Producer half of the sample ring.
pub struct RingWriter {
    inner: ringbuf::HeapProd<f32>,
}

impl RingWriter {
    /// Append samples, returning how many fit. Samples that do not fit are
    /// dropped by the caller; the ring never blocks to make room.
    pub fn write(&mut self, samples: &[f32]) -> usize {
        self.inner.push_slice(samples)
    }

    /// Samples that can still be written before the ring is full.
    pub fn free_space(&self) -> usize {
        self.inner.vacant_len()
    }

    pub fn is_full(&self) -> bool {
        self.inner.is_full()
    }
}

/// Consumer half of the sample ring.
pub struct RingReader {
    inner: ringbuf::HeapCons<f32>,
}

impl RingReader {
    /// Pop up to `output.len()` samples, returning how many were read.
    pub fn read(&mut self, output: &mut [f32]) -> usize {
        self.inner.pop_slice(output)
    }

    /// Pop samples into `output`, zero-filling whatever the ring could not
    /// provide. Returns the number of real samples; the rest is silence.
    pub fn read_or_silence(&mut self, output: &mut [f32]) -> usize {
        let read = self.inner.pop_slice(output);
        output[read..].fill(0.0);
        read
    }

    /// Drain everything currently buffered into a Vec.
    pub fn read_all(&mut self) -> Vec<f32> {
        let mut output = vec![0.0; self.available()];
        let read = self.read(&mut output);
        output.truncate(read);
        output
    }

    /// Samples currently buffered.
    pub fn available(&self) -> usize {
        self.inner.occupied_len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_then_read() {
        let (mut writer, mut reader) = sample_ring(1024);

        let samples = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(writer.write(&samples), 5);
        assert_eq!(reader.available(), 5);

        let mut output = vec![0.0; 5];
        assert_eq!(reader.read(&mut output), 5);
        assert_eq!(output, samples);
        assert!(reader.is_empty());
    }

    #[test]
    fn test_overflow_drops_excess() {
        let (mut writer, _reader) = sample_ring(5);

        let samples = vec![1.0; 10];
        assert_eq!(writer.write(&samples), 5);
        assert!(writer.is_full());
        assert_eq!(writer.free_space(), 0);
    }

    #[test]
    fn test_underrun_fills_silence() {
        let (mut writer, mut reader) = sample_ring(16);
        writer.write(&[0.5, -0.5]);

        let mut output = vec![1.0; 6];
        let real = reader.read_or_silence(&mut output);
        assert_eq!(real, 2);
        assert_eq!(output, vec![0.5, -0.5, 0.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_wraparound() {
        let (mut writer, mut reader) = sample_ring(10);

        let first: Vec<f32> = (0..10).map(|i| i as f32).collect();
        assert_eq!(writer.write(&first), 10);

        let mut output = vec![0.0; 5];
        assert_eq!(reader.read(&mut output), 5);

        let second: Vec<f32> = (10..15).map(|i| i as f32).collect();
        assert_eq!(writer.write(&second), 5);

        let all = reader.read_all();
        assert_eq!(all.len(), 10);
        assert_eq!(all[0], 5.0);
        assert_eq!(all[9], 14.0);
    }
}
