//! Error types for the loopback sessions

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, AudioError>;

#[derive(Error, Debug)]
pub enum AudioError {
    #[error("Could not load file: {}", path.display())]
    DecoderOpen {
        path: PathBuf,
        #[source]
        source: hound::Error,
    },

    #[error("Failed to initialize output file: {}", path.display())]
    EncoderOpen {
        path: PathBuf,
        #[source]
        source: hound::Error,
    },

    #[error("Audio device error: {0}")]
    DeviceError(String),

    #[error("Audio stream error: {0}")]
    StreamError(String),

    #[error("Failed to start device: {0}")]
    StartError(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Resampling error: {0}")]
    ResampleError(String),

    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AudioError {
    pub fn device<S: Into<String>>(msg: S) -> Self {
        Self::DeviceError(msg.into())
    }

    pub fn stream<S: Into<String>>(msg: S) -> Self {
        Self::StreamError(msg.into())
    }

    pub fn start<S: Into<String>>(msg: S) -> Self {
        Self::StartError(msg.into())
    }

    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Process exit code for this failure.
    ///
    /// Each setup step that can fail gets its own small negative code so a
    /// caller can tell from the exit status alone how far startup got:
    /// decoder open -2, device open -3, device start -4, encoder open -5,
    /// everything else -6. (-1 is reserved for a bad argument count.)
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::DecoderOpen { .. } => -2,
            Self::DeviceError(_) | Self::StreamError(_) => -3,
            Self::StartError(_) => -4,
            Self::EncoderOpen { .. } => -5,
            _ => -6,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes_are_distinct() {
        let errors = [
            AudioError::DecoderOpen {
                path: "in.wav".into(),
                source: hound::Error::Unsupported,
            },
            AudioError::device("no device"),
            AudioError::start("stream refused"),
            AudioError::EncoderOpen {
                path: "out.wav".into(),
                source: hound::Error::Unsupported,
            },
            AudioError::invalid_config("zero rate"),
        ];

        let codes: Vec<i32> = errors.iter().map(|e| e.exit_code()).collect();
        for (i, a) in codes.iter().enumerate() {
            assert!(*a < 0 && *a != -1, "setup failures use codes below -1");
            for b in &codes[i + 1..] {
                assert_ne!(a, b, "exit codes must be distinct");
            }
        }
    }

    #[test]
    fn test_device_and_stream_share_open_code() {
        assert_eq!(
            AudioError::device("x").exit_code(),
            AudioError::stream("x").exit_code()
        );
    }
}
