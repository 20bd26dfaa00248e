//! A single playback voice and its submission bookkeeping.

use std::sync::Arc;

use crate::backend::{AudioBackend, BufferId, VoiceId, VoiceState};
use crate::error::DeviceError;

/// Owns one device voice; deletes it on drop.
pub struct OutputSink<B: AudioBackend + ?Sized> {
    backend: Arc<B>,
    voice: VoiceId,
    queued: u64,
    dequeued: u64,
    volume_percent: u8,
}

impl<B: AudioBackend + ?Sized> OutputSink<B> {
    pub fn new(backend: Arc<B>) -> Result<Self, DeviceError> {
        let voice = backend.create_voice()?;
        Ok(Self {
            backend,
            voice,
            queued: 0,
            dequeued: 0,
            volume_percent: 100,
        })
    }

    pub fn queue_buffer(&mut self, id: BufferId) -> Result<(), DeviceError> {
        self.backend.queue(self.voice, id)?;
        self.queued += 1;
        Ok(())
    }

    pub fn processed_count(&self) -> Result<usize, DeviceError> {
        self.backend.processed_count(self.voice)
    }

    /// Reclaim exactly `count` processed buffers, oldest first.
    ///
    /// # Panics
    /// If the device hands back a different number of buffers.
    pub fn dequeue(&mut self, count: usize) -> Result<Vec<BufferId>, DeviceError> {
        if count == 0 {
            return Ok(Vec::new());
        }
        let freed = self.backend.dequeue(self.voice, count)?;
        assert_eq!(
            freed.len(),
            count,
            "device returned {} buffers for a dequeue of {count}",
            freed.len()
        );
        self.dequeued += count as u64;
        Ok(freed)
    }

    pub fn play(&self) -> Result<(), DeviceError> {
        self.backend.play(self.voice)
    }

    pub fn pause(&self) -> Result<(), DeviceError> {
        self.backend.pause(self.voice)
    }

    /// Stop the voice. Every queued buffer becomes processed; calling again is a no-op.
    pub fn stop(&self) -> Result<(), DeviceError> {
        self.backend.stop(self.voice)
    }

    pub fn state(&self) -> Result<VoiceState, DeviceError> {
        self.backend.state(self.voice)
    }

    /// Buffers submitted and not yet reclaimed.
    pub fn in_flight(&self) -> usize {
        (self.queued - self.dequeued) as usize
    }

    pub fn set_volume_percent(&mut self, percent: u8) -> Result<(), DeviceError> {
        let percent = percent.min(100);
        self.backend.set_gain(self.voice, percent as f32 / 100.0)?;
        self.volume_percent = percent;
        Ok(())
    }

    pub fn volume_percent(&self) -> u8 {
        self.volume_percent
    }
}

impl<B: AudioBackend + ?Sized> Drop for OutputSink<B> {
    fn drop(&mut self) {
        let _ = self.backend.stop(self.voice);
        if let Err(e) = self.backend.delete_voice(self.voice) {
            tracing::warn!(voice = %self.voice, "voice not released: {e}");
        }
    }
}
