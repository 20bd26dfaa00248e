//! Fixed pool of device buffers cycled round-robin.

use std::sync::Arc;

use crate::backend::{AudioBackend, BufferId};
use crate::error::DeviceError;
use crate::source::PcmFormat;

/// A device buffer deleted when dropped.
pub struct DeviceBuffer<B: AudioBackend + ?Sized> {
    backend: Arc<B>,
    id: BufferId,
}

impl<B: AudioBackend + ?Sized> DeviceBuffer<B> {
    pub fn create(backend: Arc<B>) -> Result<Self, DeviceError> {
        let id = backend.create_buffer()?;
        Ok(Self { backend, id })
    }

    pub fn id(&self) -> BufferId {
        self.id
    }
}

impl<B: AudioBackend + ?Sized> Drop for DeviceBuffer<B> {
    fn drop(&mut self) {
        if let Err(e) = self.backend.delete_buffer(self.id) {
            tracing::warn!(buffer = %self.id, "device buffer not released: {e}");
        }
    }
}

/// `N` device buffers, filled and submitted in a fixed rotation.
///
/// Slot `i` always owns the same device buffer. The pool does not know which slots are
/// queued; the device refuses uploads into a queued buffer.
pub struct BufferPool<B: AudioBackend + ?Sized> {
    slots: Vec<DeviceBuffer<B>>,
    next: usize,
}

impl<B: AudioBackend + ?Sized> BufferPool<B> {
    /// Allocate `count` buffers. Buffers created before a failure are released.
    pub fn new(backend: Arc<B>, count: usize) -> Result<Self, DeviceError> {
        let mut slots = Vec::with_capacity(count);
        for _ in 0..count {
            slots.push(DeviceBuffer::create(backend.clone())?);
        }
        Ok(Self { slots, next: 0 })
    }

    /// Upload `data` into `slot` and hand back its device handle.
    pub fn acquire(
        &mut self,
        slot: usize,
        data: &[u8],
        format: PcmFormat,
        sample_rate: u32,
    ) -> Result<BufferId, DeviceError> {
        let buffer = &self.slots[slot];
        buffer.backend.upload(buffer.id, data, format, sample_rate)?;
        Ok(buffer.id)
    }

    /// Slot to fill next.
    pub fn next_slot(&self) -> usize {
        self.next
    }

    /// Move past the slot returned by [`BufferPool::next_slot`] once it is submitted.
    pub fn advance(&mut self) {
        self.next = (self.next + 1) % self.slots.len().max(1);
    }

    pub fn handle(&self, slot: usize) -> BufferId {
        self.slots[slot].id
    }
}
