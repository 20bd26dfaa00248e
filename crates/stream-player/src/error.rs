//! Error types for the streaming player.
//!
//! Sources fail with [`FormatError`] at open time, the output device fails per call with
//! [`DeviceError`], and [`PlayerError`] is what the public API returns.

use thiserror::Error;

/// Malformed or unsupported container/bitstream data.
#[derive(Error, Debug)]
pub enum FormatError {
    /// A fixed RIFF tag did not match.
    #[error("bad chunk tag: expected {expected:?}, found {found:?}")]
    BadTag { expected: &'static str, found: String },

    /// The header ended before all fixed fields were read.
    #[error("header truncated after {read} of {expected} bytes")]
    Truncated { read: usize, expected: usize },

    /// `fmt ` subchunk is not the canonical 16-byte PCM layout.
    #[error("unsupported fmt subchunk size {0} (expected 16)")]
    UnsupportedFmtSize(u32),

    /// Only integer PCM (format code 1) is accepted.
    #[error("unsupported audio format code {0} (expected PCM = 1)")]
    UnsupportedEncoding(u16),

    /// Channel count / bit depth combination the output path cannot carry.
    #[error("unsupported layout: {channels} channel(s) at {bits} bits")]
    UnsupportedLayout { channels: u16, bits: u16 },

    /// Header fields disagree with each other.
    #[error("inconsistent header: {0}")]
    Inconsistent(String),

    /// The bitstream contained no decodable frame.
    #[error("no decodable audio frames")]
    NoFrames,

    /// The container probe or codec setup failed.
    #[error("probe failed: {0}")]
    Probe(String),
}

/// The output device rejected an operation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeviceError {
    /// Handle does not name a live buffer or voice.
    #[error("invalid handle {0}")]
    InvalidHandle(u32),

    /// Upload into a buffer that is still attached to a voice queue.
    #[error("buffer {0} is still queued")]
    BufferInUse(u32),

    /// Sample rate the device cannot play.
    #[error("sample rate {requested} Hz rejected (device runs at {device} Hz)")]
    UnsupportedRate { requested: u32, device: u32 },

    /// Buffer size is not a whole number of sample frames.
    #[error("buffer size {bytes} is not a multiple of the {block_align}-byte frame")]
    MisalignedData { bytes: usize, block_align: usize },

    /// The backend only drives one voice.
    #[error("voice limit reached")]
    VoiceLimit,

    /// Dequeue asked for more buffers than the device reported processed.
    #[error("cannot dequeue {requested} buffers, only {processed} processed")]
    NotProcessed { requested: usize, processed: usize },

    /// Any other backend failure (stream build, poisoned state, ...).
    #[error("backend error: {0}")]
    Backend(String),
}

/// Top-level error returned by sources and the player.
#[derive(Error, Debug)]
pub enum PlayerError {
    #[error("format error: {0}")]
    Format(#[from] FormatError),

    #[error("device error: {0}")]
    Device(#[from] DeviceError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Config(String),
}

impl PlayerError {
    /// Whether the failed operation may succeed on a later tick.
    pub fn is_transient(&self) -> bool {
        matches!(self, PlayerError::Device(_))
    }
}

pub type Result<T> = std::result::Result<T, PlayerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_errors_are_transient() {
        let err = PlayerError::from(DeviceError::BufferInUse(3));
        assert!(err.is_transient());
        let err = PlayerError::from(FormatError::NoFrames);
        assert!(!err.is_transient());
    }

    #[test]
    fn messages_carry_context() {
        let err = FormatError::BadTag {
            expected: "RIFF",
            found: "RIFX".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "bad chunk tag: expected \"RIFF\", found \"RIFX\""
        );
    }
}
