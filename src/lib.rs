//! WAV loopback over cpal
//!
//! Glue for two small programs: a full-duplex loopback that records the
//! microphone to a WAV file while playing another WAV file, and a
//! half-duplex variant running independent capture and playback devices.
//! cpal owns device access and callback scheduling; this crate adds the
//! WAV handles, the rings between the callbacks and the file I/O threads,
//! and the sample-rate conversion cpal does not do for you.
//!
//! ```text
//! capture:  input device -> remap/resample -> ring -> drain thread -> WavEncoder
//! playback: WavDecoder -> feeder thread -> ring -> output device
//! duplex:   both at once, format taken from the playback file
//! ```
//!
//! Device callbacks never touch a file or block on a lock; everything
//! crossing the real-time boundary goes through a wait-free SPSC ring.

pub mod buffer;
pub mod capture;
pub mod clock;
pub mod device;
pub mod duplex;
pub mod error;
pub mod playback;
pub mod resampler;
pub mod wav;

pub use capture::{CaptureConfig, CaptureStream, CaptureSummary};
pub use clock::{skew_micros, CallbackStamp};
pub use device::{list_devices, print_devices, DeviceInfo};
pub use duplex::{DuplexConfig, DuplexLoopback, DuplexSummary};
pub use error::{AudioError, Result};
pub use playback::{PlaybackConfig, PlaybackStream, PlaybackSummary};
pub use resampler::Resampler;
pub use wav::{WavDecoder, WavEncoder};

/// Device period used by the duplex loopback program, in milliseconds.
pub const DUPLEX_PERIOD_MS: u32 = 4;

/// Device period used by the half-duplex program, in milliseconds.
pub const HALF_DUPLEX_PERIOD_MS: u32 = 2;
