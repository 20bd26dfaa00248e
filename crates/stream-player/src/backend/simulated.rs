use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::backend::{AudioBackend, BufferId, VoiceId, VoiceState, check_alignment, pcm_to_f32};
use crate::error::DeviceError;
use crate::queue::{self, DeviceCore, SharedCore};
use crate::source::PcmFormat;

const RENDER_BLOCK_FRAMES: usize = 1024;

/// Output device with no hardware behind it.
///
/// Queued audio is consumed only when the clock is advanced, either explicitly with
/// [`SimulatedBackend::advance_frames`] or by a driver through
/// [`AudioBackend::advance_clock`]. Used for headless playback and tests.
pub struct SimulatedBackend {
    core: SharedCore,
    sample_rate: u32,
    channels: usize,
    capture: Mutex<Option<Vec<f32>>>,
    clock_carry: Mutex<f64>,
    fail_uploads: AtomicUsize,
    fail_pauses: AtomicUsize,
}

impl SimulatedBackend {
    /// A device running at `sample_rate` with `channels` outputs.
    ///
    /// Uploads at any other rate are rejected.
    pub fn new(sample_rate: u32, channels: u16) -> Self {
        Self {
            core: DeviceCore::shared(),
            sample_rate,
            channels: channels.max(1) as usize,
            capture: Mutex::new(None),
            clock_carry: Mutex::new(0.0),
            fail_uploads: AtomicUsize::new(0),
            fail_pauses: AtomicUsize::new(0),
        }
    }

    /// Keep every rendered sample for inspection via [`SimulatedBackend::captured`].
    pub fn with_capture(self) -> Self {
        if let Ok(mut c) = self.capture.lock() {
            *c = Some(Vec::new());
        }
        self
    }

    /// Render `frames` output frames. Returns frames taken from queued buffers.
    pub fn advance_frames(&self, frames: usize) -> usize {
        let mut scratch = vec![0.0f32; RENDER_BLOCK_FRAMES * self.channels];
        let mut remaining = frames;
        let mut consumed = 0;
        while remaining > 0 {
            let block = remaining.min(RENDER_BLOCK_FRAMES);
            let out = &mut scratch[..block * self.channels];
            match queue::lock(&self.core) {
                Ok(mut core) => consumed += core.render(out, self.channels),
                Err(_) => return consumed,
            }
            if let Ok(mut capture) = self.capture.lock() {
                if let Some(c) = capture.as_mut() {
                    c.extend_from_slice(out);
                }
            }
            remaining -= block;
        }
        consumed
    }

    /// Everything rendered since capture was enabled, interleaved.
    pub fn captured(&self) -> Vec<f32> {
        self.capture
            .lock()
            .ok()
            .and_then(|c| c.clone())
            .unwrap_or_default()
    }

    /// Make the next `count` uploads fail with a device error.
    pub fn fail_next_uploads(&self, count: usize) {
        self.fail_uploads.store(count, Ordering::Relaxed);
    }

    /// Make the next `count` pauses fail with a device error.
    pub fn fail_next_pauses(&self, count: usize) {
        self.fail_pauses.store(count, Ordering::Relaxed);
    }

    /// Device buffers currently allocated.
    pub fn live_buffers(&self) -> usize {
        queue::lock(&self.core)
            .map(|c| c.live_buffers())
            .unwrap_or(0)
    }

    /// Frames consumed from voice buffers since the device was created.
    pub fn rendered_frames(&self) -> u64 {
        queue::lock(&self.core)
            .map(|c| c.rendered_frames())
            .unwrap_or(0)
    }

    fn take_injected_failure(counter: &AtomicUsize) -> bool {
        counter
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1))
            .is_ok()
    }
}

impl AudioBackend for SimulatedBackend {
    fn create_voice(&self) -> Result<VoiceId, DeviceError> {
        queue::lock(&self.core)?.create_voice()
    }

    fn delete_voice(&self, voice: VoiceId) -> Result<(), DeviceError> {
        queue::lock(&self.core)?.delete_voice(voice)
    }

    fn create_buffer(&self) -> Result<BufferId, DeviceError> {
        Ok(queue::lock(&self.core)?.create_buffer())
    }

    fn delete_buffer(&self, buffer: BufferId) -> Result<(), DeviceError> {
        queue::lock(&self.core)?.delete_buffer(buffer)
    }

    fn upload(
        &self,
        buffer: BufferId,
        pcm: &[u8],
        format: PcmFormat,
        sample_rate: u32,
    ) -> Result<(), DeviceError> {
        if Self::take_injected_failure(&self.fail_uploads) {
            return Err(DeviceError::Backend("injected upload failure".to_string()));
        }
        check_alignment(pcm, format)?;
        if sample_rate != self.sample_rate {
            return Err(DeviceError::UnsupportedRate {
                requested: sample_rate,
                device: self.sample_rate,
            });
        }
        let samples = pcm_to_f32(pcm, format);
        queue::lock(&self.core)?.store(buffer, samples, format.channels() as usize)
    }

    fn queue(&self, voice: VoiceId, buffer: BufferId) -> Result<(), DeviceError> {
        queue::lock(&self.core)?.queue(voice, buffer)
    }

    fn dequeue(&self, voice: VoiceId, count: usize) -> Result<Vec<BufferId>, DeviceError> {
        queue::lock(&self.core)?.dequeue(voice, count)
    }

    fn processed_count(&self, voice: VoiceId) -> Result<usize, DeviceError> {
        queue::lock(&self.core)?.processed_count(voice)
    }

    fn play(&self, voice: VoiceId) -> Result<(), DeviceError> {
        queue::lock(&self.core)?.play(voice)
    }

    fn pause(&self, voice: VoiceId) -> Result<(), DeviceError> {
        if Self::take_injected_failure(&self.fail_pauses) {
            return Err(DeviceError::Backend("injected pause failure".to_string()));
        }
        queue::lock(&self.core)?.pause(voice)
    }

    fn stop(&self, voice: VoiceId) -> Result<(), DeviceError> {
        queue::lock(&self.core)?.stop(voice)
    }

    fn state(&self, voice: VoiceId) -> Result<VoiceState, DeviceError> {
        queue::lock(&self.core)?.state(voice)
    }

    fn set_gain(&self, voice: VoiceId, gain: f32) -> Result<(), DeviceError> {
        queue::lock(&self.core)?.set_gain(voice, gain)
    }

    fn describe(&self) -> String {
        format!("null output ({} Hz, {} ch)", self.sample_rate, self.channels)
    }

    fn advance_clock(&self, elapsed: Duration) {
        let frames = {
            let Ok(mut carry) = self.clock_carry.lock() else {
                return;
            };
            let exact = elapsed.as_secs_f64() * self.sample_rate as f64 + *carry;
            let whole = exact.floor();
            *carry = exact - whole;
            whole as usize
        };
        self.advance_frames(frames);
    }
}

/// How [`TamperedDequeue`] corrupts what the device hands back.
#[cfg(test)]
#[derive(Clone, Copy, Debug)]
pub(crate) enum DequeueTamper {
    /// Return one buffer fewer than asked for.
    DropLast,
    /// Return the freed buffers newest first.
    Reverse,
}

/// A [`SimulatedBackend`] whose `dequeue` misbehaves.
#[cfg(test)]
pub(crate) struct TamperedDequeue {
    pub inner: SimulatedBackend,
    pub mode: DequeueTamper,
}

#[cfg(test)]
impl AudioBackend for TamperedDequeue {
    fn create_voice(&self) -> Result<VoiceId, DeviceError> {
        self.inner.create_voice()
    }

    fn delete_voice(&self, voice: VoiceId) -> Result<(), DeviceError> {
        self.inner.delete_voice(voice)
    }

    fn create_buffer(&self) -> Result<BufferId, DeviceError> {
        self.inner.create_buffer()
    }

    fn delete_buffer(&self, buffer: BufferId) -> Result<(), DeviceError> {
        self.inner.delete_buffer(buffer)
    }

    fn upload(
        &self,
        buffer: BufferId,
        pcm: &[u8],
        format: PcmFormat,
        sample_rate: u32,
    ) -> Result<(), DeviceError> {
        self.inner.upload(buffer, pcm, format, sample_rate)
    }

    fn queue(&self, voice: VoiceId, buffer: BufferId) -> Result<(), DeviceError> {
        self.inner.queue(voice, buffer)
    }

    fn dequeue(&self, voice: VoiceId, count: usize) -> Result<Vec<BufferId>, DeviceError> {
        let mut freed = self.inner.dequeue(voice, count)?;
        match self.mode {
            DequeueTamper::DropLast => {
                freed.pop();
            }
            DequeueTamper::Reverse => freed.reverse(),
        }
        Ok(freed)
    }

    fn processed_count(&self, voice: VoiceId) -> Result<usize, DeviceError> {
        self.inner.processed_count(voice)
    }

    fn play(&self, voice: VoiceId) -> Result<(), DeviceError> {
        self.inner.play(voice)
    }

    fn pause(&self, voice: VoiceId) -> Result<(), DeviceError> {
        self.inner.pause(voice)
    }

    fn stop(&self, voice: VoiceId) -> Result<(), DeviceError> {
        self.inner.stop(voice)
    }

    fn state(&self, voice: VoiceId) -> Result<VoiceState, DeviceError> {
        self.inner.state(voice)
    }

    fn set_gain(&self, voice: VoiceId, gain: f32) -> Result<(), DeviceError> {
        self.inner.set_gain(voice, gain)
    }

    fn describe(&self) -> String {
        self.inner.describe()
    }
}
