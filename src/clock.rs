//! First-callback timestamps
//!
//! Each stream records, once, how long after a shared epoch its first
//! device callback fired. The two half-duplex streams compare stamps to
//! report how far apart their devices actually started.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

const UNSET: u64 = u64::MAX;

/// A write-once microsecond timestamp, cheap enough to poke from a
/// real-time callback.
#[derive(Clone)]
pub struct CallbackStamp {
    us: Arc<AtomicU64>,
}

impl CallbackStamp {
    pub fn new() -> Self {
        Self {
            us: Arc::new(AtomicU64::new(UNSET)),
        }
    }

    /// Record the elapsed time since `epoch`. Only the first call sticks.
    pub fn mark(&self, epoch: Instant) {
        let _ = self.us.compare_exchange(
            UNSET,
            epoch.elapsed().as_micros() as u64,
            Ordering::Relaxed,
            Ordering::Relaxed,
        );
    }

    /// Microseconds from the epoch, or None until `mark` has run.
    pub fn micros(&self) -> Option<u64> {
        match self.us.load(Ordering::Relaxed) {
            UNSET => None,
            us => Some(us),
        }
    }
}

impl Default for CallbackStamp {
    fn default() -> Self {
        Self::new()
    }
}

/// Microseconds between two stamps, once both have fired. Positive means
/// `output` fired later than `input`.
pub fn skew_micros(input: &CallbackStamp, output: &CallbackStamp) -> Option<i64> {
    Some(output.micros()? as i64 - input.micros()? as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_unmarked_stamp_is_none() {
        let stamp = CallbackStamp::new();
        assert_eq!(stamp.micros(), None);
    }

    #[test]
    fn test_only_first_mark_sticks() {
        let epoch = Instant::now();
        let stamp = CallbackStamp::new();

        stamp.mark(epoch);
        let first = stamp.micros().unwrap();

        std::thread::sleep(Duration::from_millis(5));
        stamp.mark(epoch);
        assert_eq!(stamp.micros().unwrap(), first);
    }

    #[test]
    fn test_clones_share_the_stamp() {
        let epoch = Instant::now();
        let stamp = CallbackStamp::new();
        let handle = stamp.clone();

        handle.mark(epoch);
        assert_eq!(stamp.micros(), handle.micros());
    }

    #[test]
    fn test_skew_needs_both_stamps() {
        let epoch = Instant::now();
        let input = CallbackStamp::new();
        let output = CallbackStamp::new();

        assert_eq!(skew_micros(&input, &output), None);
        input.mark(epoch);
        assert_eq!(skew_micros(&input, &output), None);

        std::thread::sleep(Duration::from_millis(2));
        output.mark(epoch);
        let skew = skew_micros(&input, &output).unwrap();
        assert!(skew >= 2000, "output marked later, got {}", skew);
    }
}
