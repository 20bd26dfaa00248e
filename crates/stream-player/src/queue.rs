//! Device-side buffer store and voice queue.
//!
//! [`DeviceCore`] is the state both backends share with their render side:
//! - uploaded buffers, stored as interleaved `f32` at the output rate
//! - the single voice's FIFO of queued buffers and its processed list
//! - the render routine that drains the FIFO into an output slice
//!
//! The render routine is called from the CPAL callback (or the simulated clock), so it
//! never allocates and never blocks beyond the caller's mutex.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::backend::{BufferId, VoiceId, VoiceState};
use crate::error::DeviceError;

struct StoredBuffer {
    samples: Arc<[f32]>,
    channels: usize,
    /// Number of voice queue entries referencing this buffer.
    attached: usize,
}

struct QueuedBuffer {
    id: BufferId,
    samples: Arc<[f32]>,
    channels: usize,
}

impl QueuedBuffer {
    fn frames(&self) -> usize {
        self.samples.len() / self.channels.max(1)
    }
}

struct Voice {
    id: VoiceId,
    state: VoiceState,
    pending: VecDeque<QueuedBuffer>,
    processed: VecDeque<BufferId>,
    /// Frame offset into `pending.front()`.
    pos: usize,
    gain: f32,
}

pub(crate) type SharedCore = Arc<Mutex<DeviceCore>>;

/// Lock the core, mapping a poisoned mutex to a device error.
pub(crate) fn lock(core: &SharedCore) -> Result<MutexGuard<'_, DeviceCore>, DeviceError> {
    core.lock()
        .map_err(|_| DeviceError::Backend("device state poisoned".to_string()))
}

#[derive(Default)]
pub(crate) struct DeviceCore {
    next_id: u32,
    buffers: HashMap<u32, StoredBuffer>,
    voice: Option<Voice>,
    rendered_frames: u64,
}

impl DeviceCore {
    pub(crate) fn shared() -> SharedCore {
        Arc::new(Mutex::new(Self::default()))
    }

    fn alloc_id(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }

    pub(crate) fn create_buffer(&mut self) -> BufferId {
        let id = self.alloc_id();
        self.buffers.insert(
            id,
            StoredBuffer {
                samples: Arc::from(Vec::new()),
                channels: 1,
                attached: 0,
            },
        );
        BufferId(id)
    }

    pub(crate) fn delete_buffer(&mut self, buffer: BufferId) -> Result<(), DeviceError> {
        let stored = self
            .buffers
            .get(&buffer.0)
            .ok_or(DeviceError::InvalidHandle(buffer.0))?;
        if stored.attached > 0 {
            return Err(DeviceError::BufferInUse(buffer.0));
        }
        self.buffers.remove(&buffer.0);
        Ok(())
    }

    /// Replace a buffer's samples (already converted to the output rate).
    pub(crate) fn store(
        &mut self,
        buffer: BufferId,
        samples: Vec<f32>,
        channels: usize,
    ) -> Result<(), DeviceError> {
        let stored = self
            .buffers
            .get_mut(&buffer.0)
            .ok_or(DeviceError::InvalidHandle(buffer.0))?;
        if stored.attached > 0 {
            return Err(DeviceError::BufferInUse(buffer.0));
        }
        stored.samples = Arc::from(samples);
        stored.channels = channels.max(1);
        Ok(())
    }

    /// Fail unless `buffer` exists and is not attached to the voice.
    pub(crate) fn ensure_writable(&self, buffer: BufferId) -> Result<(), DeviceError> {
        match self.buffers.get(&buffer.0) {
            None => Err(DeviceError::InvalidHandle(buffer.0)),
            Some(stored) if stored.attached > 0 => Err(DeviceError::BufferInUse(buffer.0)),
            Some(_) => Ok(()),
        }
    }

    pub(crate) fn live_buffers(&self) -> usize {
        self.buffers.len()
    }

    pub(crate) fn create_voice(&mut self) -> Result<VoiceId, DeviceError> {
        if self.voice.is_some() {
            return Err(DeviceError::VoiceLimit);
        }
        let id = VoiceId(self.alloc_id());
        self.voice = Some(Voice {
            id,
            state: VoiceState::Initial,
            pending: VecDeque::new(),
            processed: VecDeque::new(),
            pos: 0,
            gain: 1.0,
        });
        Ok(id)
    }

    /// Delete the voice, detaching every buffer still on its queue.
    pub(crate) fn delete_voice(&mut self, voice: VoiceId) -> Result<(), DeviceError> {
        self.voice_mut(voice)?;
        if let Some(v) = self.voice.take() {
            let ids = v
                .pending
                .iter()
                .map(|q| q.id)
                .chain(v.processed.iter().copied());
            for id in ids {
                if let Some(stored) = self.buffers.get_mut(&id.0) {
                    stored.attached = stored.attached.saturating_sub(1);
                }
            }
        }
        Ok(())
    }

    fn voice_mut(&mut self, voice: VoiceId) -> Result<&mut Voice, DeviceError> {
        match self.voice.as_mut() {
            Some(v) if v.id == voice => Ok(v),
            _ => Err(DeviceError::InvalidHandle(voice.0)),
        }
    }

    fn voice_ref(&self, voice: VoiceId) -> Result<&Voice, DeviceError> {
        match self.voice.as_ref() {
            Some(v) if v.id == voice => Ok(v),
            _ => Err(DeviceError::InvalidHandle(voice.0)),
        }
    }

    pub(crate) fn queue(&mut self, voice: VoiceId, buffer: BufferId) -> Result<(), DeviceError> {
        self.voice_ref(voice)?;
        let stored = self
            .buffers
            .get_mut(&buffer.0)
            .ok_or(DeviceError::InvalidHandle(buffer.0))?;
        stored.attached += 1;
        let entry = QueuedBuffer {
            id: buffer,
            samples: stored.samples.clone(),
            channels: stored.channels,
        };
        let v = self.voice_mut(voice)?;
        v.pending.push_back(entry);
        Ok(())
    }

    pub(crate) fn dequeue(
        &mut self,
        voice: VoiceId,
        count: usize,
    ) -> Result<Vec<BufferId>, DeviceError> {
        let v = self.voice_mut(voice)?;
        if count > v.processed.len() {
            return Err(DeviceError::NotProcessed {
                requested: count,
                processed: v.processed.len(),
            });
        }
        let freed: Vec<BufferId> = v.processed.drain(..count).collect();
        for id in &freed {
            if let Some(stored) = self.buffers.get_mut(&id.0) {
                stored.attached = stored.attached.saturating_sub(1);
            }
        }
        Ok(freed)
    }

    pub(crate) fn processed_count(&self, voice: VoiceId) -> Result<usize, DeviceError> {
        Ok(self.voice_ref(voice)?.processed.len())
    }

    pub(crate) fn play(&mut self, voice: VoiceId) -> Result<(), DeviceError> {
        let v = self.voice_mut(voice)?;
        v.state = VoiceState::Playing;
        Ok(())
    }

    pub(crate) fn pause(&mut self, voice: VoiceId) -> Result<(), DeviceError> {
        let v = self.voice_mut(voice)?;
        if matches!(v.state, VoiceState::Playing | VoiceState::Initial) {
            v.state = VoiceState::Paused;
        }
        Ok(())
    }

    pub(crate) fn stop(&mut self, voice: VoiceId) -> Result<(), DeviceError> {
        let v = self.voice_mut(voice)?;
        v.state = VoiceState::Stopped;
        v.pos = 0;
        while let Some(done) = v.pending.pop_front() {
            v.processed.push_back(done.id);
        }
        Ok(())
    }

    pub(crate) fn state(&self, voice: VoiceId) -> Result<VoiceState, DeviceError> {
        Ok(self.voice_ref(voice)?.state)
    }

    pub(crate) fn set_gain(&mut self, voice: VoiceId, gain: f32) -> Result<(), DeviceError> {
        let v = self.voice_mut(voice)?;
        v.gain = if gain.is_finite() { gain.max(0.0) } else { 1.0 };
        Ok(())
    }

    /// Total frames consumed from voice buffers since creation.
    pub(crate) fn rendered_frames(&self) -> u64 {
        self.rendered_frames
    }

    /// Fill `out` (interleaved, `out_channels` wide) from the voice queue.
    ///
    /// Returns the number of frames taken from queued buffers; the rest of `out` is
    /// silence. Finishing the last pending buffer stops the voice.
    pub(crate) fn render(&mut self, out: &mut [f32], out_channels: usize) -> usize {
        out.fill(0.0);
        let out_channels = out_channels.max(1);
        let Some(v) = self.voice.as_mut() else {
            return 0;
        };
        if v.state != VoiceState::Playing {
            return 0;
        }

        let frames = out.len() / out_channels;
        let mut frame = 0;
        while frame < frames {
            let Some(front) = v.pending.front() else {
                v.state = VoiceState::Stopped;
                break;
            };
            if v.pos >= front.frames() {
                retire_front(v);
                if v.pending.is_empty() {
                    v.state = VoiceState::Stopped;
                    break;
                }
                continue;
            }
            for ch in 0..out_channels {
                let s = map_sample(&front.samples, front.channels, v.pos, out_channels, ch);
                out[frame * out_channels + ch] = s * v.gain;
            }
            v.pos += 1;
            frame += 1;
        }

        // Report a buffer as processed as soon as its last frame has been rendered.
        while v
            .pending
            .front()
            .is_some_and(|front| v.pos >= front.frames())
        {
            retire_front(v);
            if v.pending.is_empty() {
                v.state = VoiceState::Stopped;
            }
        }

        self.rendered_frames += frame as u64;
        frame
    }
}

fn retire_front(v: &mut Voice) {
    if let Some(done) = v.pending.pop_front() {
        v.processed.push_back(done.id);
    }
    v.pos = 0;
}

/// Read one output sample for `dst_ch` of source frame `frame`.
///
/// Mapping rules:
/// - mono → stereo: duplicate channel 0
/// - stereo → mono: average L/R
/// - same layout: pass-through
/// - other layouts: clamp to the available channels
fn map_sample(
    samples: &[f32],
    src_channels: usize,
    frame: usize,
    dst_channels: usize,
    dst_ch: usize,
) -> f32 {
    let base = frame * src_channels;
    let get = |ch: usize| -> f32 {
        if ch < src_channels {
            samples.get(base + ch).copied().unwrap_or(0.0)
        } else {
            0.0
        }
    };
    match (src_channels, dst_channels) {
        (2, 1) => 0.5 * (get(0) + get(1)),
        (1, _) => get(0),
        _ => get(dst_ch.min(src_channels.saturating_sub(1))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn core_with_voice() -> (DeviceCore, VoiceId) {
        let mut core = DeviceCore::default();
        let voice = core.create_voice().unwrap();
        (core, voice)
    }

    fn filled(core: &mut DeviceCore, samples: &[f32]) -> BufferId {
        let id = core.create_buffer();
        core.store(id, samples.to_vec(), 1).unwrap();
        id
    }

    #[test]
    fn renders_buffers_in_fifo_order_and_reports_processed() {
        let (mut core, voice) = core_with_voice();
        let a = filled(&mut core, &[0.1, 0.2]);
        let b = filled(&mut core, &[0.3, 0.4]);
        core.queue(voice, a).unwrap();
        core.queue(voice, b).unwrap();
        core.play(voice).unwrap();

        let mut out = [0.0; 3];
        assert_eq!(core.render(&mut out, 1), 3);
        assert_eq!(out, [0.1, 0.2, 0.3]);
        assert_eq!(core.processed_count(voice).unwrap(), 1);
        assert_eq!(core.dequeue(voice, 1).unwrap(), vec![a]);
        assert_eq!(core.state(voice).unwrap(), VoiceState::Playing);
    }

    #[test]
    fn finishing_the_queue_stops_the_voice() {
        let (mut core, voice) = core_with_voice();
        let a = filled(&mut core, &[0.5, 0.5]);
        core.queue(voice, a).unwrap();
        core.play(voice).unwrap();

        let mut out = [1.0; 4];
        assert_eq!(core.render(&mut out, 1), 2);
        assert_eq!(out, [0.5, 0.5, 0.0, 0.0]);
        assert_eq!(core.state(voice).unwrap(), VoiceState::Stopped);
        assert_eq!(core.processed_count(voice).unwrap(), 1);
    }

    #[test]
    fn queued_buffers_reject_upload_and_delete() {
        let (mut core, voice) = core_with_voice();
        let a = filled(&mut core, &[0.0]);
        core.queue(voice, a).unwrap();
        assert_eq!(
            core.store(a, vec![1.0], 1),
            Err(DeviceError::BufferInUse(a.0))
        );
        assert_eq!(core.delete_buffer(a), Err(DeviceError::BufferInUse(a.0)));

        core.stop(voice).unwrap();
        core.dequeue(voice, 1).unwrap();
        assert!(core.store(a, vec![1.0], 1).is_ok());
        assert!(core.delete_buffer(a).is_ok());
    }

    #[test]
    fn dequeue_more_than_processed_fails() {
        let (mut core, voice) = core_with_voice();
        let a = filled(&mut core, &[0.0; 4]);
        core.queue(voice, a).unwrap();
        assert_eq!(
            core.dequeue(voice, 1),
            Err(DeviceError::NotProcessed {
                requested: 1,
                processed: 0
            })
        );
    }

    #[test]
    fn stop_marks_everything_processed_and_is_idempotent() {
        let (mut core, voice) = core_with_voice();
        for _ in 0..3 {
            let id = filled(&mut core, &[0.0; 4]);
            core.queue(voice, id).unwrap();
        }
        core.play(voice).unwrap();
        core.stop(voice).unwrap();
        core.stop(voice).unwrap();
        assert_eq!(core.state(voice).unwrap(), VoiceState::Stopped);
        assert_eq!(core.processed_count(voice).unwrap(), 3);
    }

    #[test]
    fn paused_voice_outputs_silence_without_consuming() {
        let (mut core, voice) = core_with_voice();
        let a = filled(&mut core, &[0.7; 4]);
        core.queue(voice, a).unwrap();
        core.play(voice).unwrap();
        core.pause(voice).unwrap();
        let mut out = [1.0; 4];
        assert_eq!(core.render(&mut out, 1), 0);
        assert_eq!(out, [0.0; 4]);
        assert_eq!(core.processed_count(voice).unwrap(), 0);
    }

    #[test]
    fn gain_and_channel_mapping_apply() {
        let (mut core, voice) = core_with_voice();
        let a = filled(&mut core, &[0.5, -0.5]);
        core.queue(voice, a).unwrap();
        core.set_gain(voice, 0.5).unwrap();
        core.play(voice).unwrap();
        let mut out = [0.0; 4];
        core.render(&mut out, 2);
        assert_eq!(out, [0.25, 0.25, -0.25, -0.25]);
    }

    #[test]
    fn map_sample_downmixes_stereo() {
        assert!((map_sample(&[0.2, 0.4], 2, 0, 1, 0) - 0.3).abs() < 1e-6);
        assert_eq!(map_sample(&[0.2, 0.4], 2, 0, 2, 1), 0.4);
    }

    #[test]
    fn second_voice_is_refused() {
        let (mut core, _voice) = core_with_voice();
        assert_eq!(core.create_voice(), Err(DeviceError::VoiceLimit));
    }

    #[test]
    fn deleting_voice_detaches_buffers() {
        let (mut core, voice) = core_with_voice();
        let a = filled(&mut core, &[0.0]);
        core.queue(voice, a).unwrap();
        core.delete_voice(voice).unwrap();
        assert!(core.delete_buffer(a).is_ok());
        assert_eq!(core.live_buffers(), 0);
    }
}
