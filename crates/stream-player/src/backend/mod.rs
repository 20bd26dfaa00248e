//! Output device capability.
//!
//! [`AudioBackend`] is the low-level, queue-of-buffers output model the player is written
//! against: create buffers, upload PCM into them, queue them on a voice, and reclaim them
//! once the device reports them processed. Handles are opaque; ownership and cleanup are
//! layered on top by [`BufferPool`](crate::pool::BufferPool) and
//! [`OutputSink`](crate::sink::OutputSink).

mod hardware;
mod simulated;

use std::fmt;
use std::time::Duration;

use serde::Serialize;

use crate::error::DeviceError;
use crate::source::PcmFormat;

pub use hardware::{CpalBackend, CpalBackendConfig};
pub use simulated::SimulatedBackend;
#[cfg(test)]
pub(crate) use simulated::{DequeueTamper, TamperedDequeue};

/// Opaque device buffer handle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BufferId(pub(crate) u32);

/// Opaque playback voice handle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct VoiceId(pub(crate) u32);

impl fmt::Display for BufferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "buffer#{}", self.0)
    }
}

impl fmt::Display for VoiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "voice#{}", self.0)
    }
}

/// Device-side state of a voice.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VoiceState {
    Initial,
    Playing,
    Paused,
    /// Stopped explicitly, or ran out of queued buffers.
    Stopped,
}

/// Queue-of-buffers audio output.
///
/// All calls are synchronous and non-blocking; the device consumes queued buffers
/// asynchronously and strictly in FIFO order.
pub trait AudioBackend {
    fn create_voice(&self) -> Result<VoiceId, DeviceError>;
    fn delete_voice(&self, voice: VoiceId) -> Result<(), DeviceError>;

    fn create_buffer(&self) -> Result<BufferId, DeviceError>;
    fn delete_buffer(&self, buffer: BufferId) -> Result<(), DeviceError>;

    /// Replace the contents of `buffer`. Fails while the buffer is queued on a voice.
    fn upload(
        &self,
        buffer: BufferId,
        pcm: &[u8],
        format: PcmFormat,
        sample_rate: u32,
    ) -> Result<(), DeviceError>;

    /// Append `buffer` to the voice's play queue.
    fn queue(&self, voice: VoiceId, buffer: BufferId) -> Result<(), DeviceError>;

    /// Remove the `count` oldest processed buffers from the voice's queue, oldest first.
    fn dequeue(&self, voice: VoiceId, count: usize) -> Result<Vec<BufferId>, DeviceError>;

    /// Buffers fully played and waiting to be dequeued.
    fn processed_count(&self, voice: VoiceId) -> Result<usize, DeviceError>;

    fn play(&self, voice: VoiceId) -> Result<(), DeviceError>;
    fn pause(&self, voice: VoiceId) -> Result<(), DeviceError>;

    /// Stop the voice; every queued buffer becomes processed.
    fn stop(&self, voice: VoiceId) -> Result<(), DeviceError>;

    fn state(&self, voice: VoiceId) -> Result<VoiceState, DeviceError>;

    /// Linear gain applied when the voice is rendered (1.0 = unity).
    fn set_gain(&self, voice: VoiceId, gain: f32) -> Result<(), DeviceError>;

    /// Human-readable device name.
    fn describe(&self) -> String;

    /// Advance the device clock by `elapsed`.
    ///
    /// Backends driven by a hardware clock ignore this.
    fn advance_clock(&self, _elapsed: Duration) {}
}

/// Convert interleaved integer PCM to `f32` in `[-1.0, 1.0)`.
pub fn pcm_to_f32(pcm: &[u8], format: PcmFormat) -> Vec<f32> {
    match format.bits() {
        8 => pcm.iter().map(|&b| (b as f32 - 128.0) / 128.0).collect(),
        _ => pcm
            .chunks_exact(2)
            .map(|b| i16::from_le_bytes([b[0], b[1]]) as f32 / 32768.0)
            .collect(),
    }
}

/// Reject uploads that are not a whole number of sample frames.
pub(crate) fn check_alignment(pcm: &[u8], format: PcmFormat) -> Result<(), DeviceError> {
    let block_align = format.block_align();
    if pcm.len() % block_align != 0 {
        return Err(DeviceError::MisalignedData {
            bytes: pcm.len(),
            block_align,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pcm_to_f32_scales_both_widths() {
        let s16 = [0x00, 0x80, 0xff, 0x7f, 0x00, 0x00];
        assert_eq!(
            pcm_to_f32(&s16, PcmFormat::Mono16),
            vec![-1.0, 32767.0 / 32768.0, 0.0]
        );
        let u8s = [0u8, 128, 192];
        assert_eq!(pcm_to_f32(&u8s, PcmFormat::Mono8), vec![-1.0, 0.0, 0.5]);
    }

    #[test]
    fn alignment_is_checked_per_frame() {
        assert!(check_alignment(&[0; 8], PcmFormat::Stereo16).is_ok());
        assert_eq!(
            check_alignment(&[0; 6], PcmFormat::Stereo16),
            Err(DeviceError::MisalignedData {
                bytes: 6,
                block_align: 4
            })
        );
    }
}
