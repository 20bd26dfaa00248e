use std::sync::Mutex;

use cpal::traits::StreamTrait;

use crate::backend::{AudioBackend, BufferId, VoiceId, VoiceState, check_alignment, pcm_to_f32};
use crate::device::{device_name, pick_buffer_size, pick_device, pick_output_config};
use crate::error::DeviceError;
use crate::playback::build_output_stream;
use crate::queue::{self, DeviceCore, SharedCore};
use crate::resample::BufferResampler;
use crate::source::PcmFormat;

/// Settings for opening the CPAL output.
#[derive(Clone, Debug)]
pub struct CpalBackendConfig {
    /// Substring of the output device name; the host default when unset.
    pub device: Option<String>,
    /// Input frames per resampler call when the stream rate differs from the source.
    pub resample_chunk_frames: usize,
}

impl Default for CpalBackendConfig {
    fn default() -> Self {
        Self {
            device: None,
            resample_chunk_frames: 1024,
        }
    }
}

/// [`AudioBackend`] on a CPAL output stream.
///
/// The stream runs for the backend's whole lifetime and renders the voice queue from
/// the audio thread; when nothing is playing it outputs silence. Uploads at a rate the
/// stream does not run at are resampled before they are stored.
pub struct CpalBackend {
    core: SharedCore,
    name: String,
    stream_rate: u32,
    stream_channels: u16,
    resample_chunk_frames: usize,
    resampler: Mutex<Option<BufferResampler>>,
    _stream: cpal::Stream,
}

impl CpalBackend {
    /// Open the configured device, preferring a stream at `preferred_rate`.
    pub fn open(cfg: &CpalBackendConfig, preferred_rate: Option<u32>) -> Result<Self, DeviceError> {
        let host = cpal::default_host();
        let device = pick_device(&host, cfg.device.as_deref())?;
        let name = device_name(&device);

        let supported = pick_output_config(&device, preferred_rate)?;
        let sample_format = supported.sample_format();
        let mut config: cpal::StreamConfig = supported.config();
        if let Some(buffer_size) = pick_buffer_size(&supported) {
            config.buffer_size = buffer_size;
        }

        let core = DeviceCore::shared();
        let stream = build_output_stream(&device, &config, sample_format, &core)?;
        stream
            .play()
            .map_err(|e| DeviceError::Backend(format!("start output stream: {e}")))?;

        tracing::info!(
            device = %name,
            rate = config.sample_rate,
            channels = config.channels,
            format = ?sample_format,
            "output stream started"
        );

        Ok(Self {
            core,
            name,
            stream_rate: config.sample_rate,
            stream_channels: config.channels,
            resample_chunk_frames: cfg.resample_chunk_frames.max(1),
            resampler: Mutex::new(None),
            _stream: stream,
        })
    }

    fn to_stream_rate(
        &self,
        samples: Vec<f32>,
        channels: usize,
        sample_rate: u32,
    ) -> Result<Vec<f32>, DeviceError> {
        if sample_rate == self.stream_rate {
            return Ok(samples);
        }
        let mut slot = self
            .resampler
            .lock()
            .map_err(|_| DeviceError::Backend("resampler poisoned".to_string()))?;
        if !slot
            .as_ref()
            .is_some_and(|r| r.accepts(sample_rate, channels))
        {
            *slot = Some(BufferResampler::new(
                sample_rate,
                self.stream_rate,
                channels,
                self.resample_chunk_frames,
            )?);
        }
        match slot.as_mut() {
            Some(r) => r.process(&samples),
            None => Ok(samples),
        }
    }
}

impl AudioBackend for CpalBackend {
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
        check_alignment(pcm, format)?;
        // Reject before the resampler consumes the input.
        queue::lock(&self.core)?.ensure_writable(buffer)?;

        let channels = format.channels() as usize;
        let samples = self.to_stream_rate(pcm_to_f32(pcm, format), channels, sample_rate)?;
        queue::lock(&self.core)?.store(buffer, samples, channels)
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
        format!(
            "{} ({} Hz, {} ch)",
            self.name, self.stream_rate, self.stream_channels
        )
    }
}
