//! Upload-time resampling.
//!
//! Uses Rubato to convert uploaded buffers from the source rate to the output stream
//! rate. One resampler lives across uploads so filter state carries over between
//! buffers; input that does not fill a whole resampler chunk is held back and prepended
//! to the next upload.

use audioadapter_buffers::direct::InterleavedSlice;
use rubato::{
    Async, FixedAsync, Indexing, Resampler, SincInterpolationParameters, SincInterpolationType,
    WindowFunction, calculate_cutoff,
};

use crate::error::DeviceError;

/// Streaming sinc resampler over interleaved `f32`.
pub struct BufferResampler {
    resampler: Box<dyn Resampler<f32>>,
    from_rate: u32,
    to_rate: u32,
    channels: usize,
    chunk_frames: usize,
    carry: Vec<f32>,
    out_interleaved: Vec<f32>,
}

impl BufferResampler {
    /// A resampler from `from_rate` to `to_rate` that consumes `chunk_frames` per call.
    pub fn new(
        from_rate: u32,
        to_rate: u32,
        channels: usize,
        chunk_frames: usize,
    ) -> Result<Self, DeviceError> {
        if from_rate == 0 || to_rate == 0 {
            return Err(DeviceError::UnsupportedRate {
                requested: from_rate,
                device: to_rate,
            });
        }
        let channels = channels.max(1);
        let chunk_frames = chunk_frames.max(1);
        let f_ratio = to_rate as f64 / from_rate as f64;

        let sinc_len = 128;
        let window = WindowFunction::BlackmanHarris2;
        let params = SincInterpolationParameters {
            sinc_len,
            f_cutoff: calculate_cutoff(sinc_len, window),
            interpolation: SincInterpolationType::Cubic,
            oversampling_factor: 256,
            window,
        };

        let resampler = Async::<f32>::new_sinc(
            f_ratio,
            1.1,
            &params,
            chunk_frames,
            channels,
            FixedAsync::Input,
        )
        .map_err(|e| DeviceError::Backend(format!("resampler init: {e}")))?;

        let out_frames = (chunk_frames as f64 * f_ratio * 1.2).ceil() as usize + 64;
        tracing::info!(from_rate, to_rate, channels, chunk_frames, "resampling uploads");

        Ok(Self {
            resampler: Box::new(resampler),
            from_rate,
            to_rate,
            channels,
            chunk_frames,
            carry: Vec::with_capacity(chunk_frames * channels),
            out_interleaved: vec![0.0; out_frames * channels],
        })
    }

    /// Whether this resampler can take input at `from_rate` with `channels`.
    pub fn accepts(&self, from_rate: u32, channels: usize) -> bool {
        self.from_rate == from_rate && self.channels == channels
    }

    /// Input frames held back from previous calls.
    #[cfg(test)]
    fn carried_frames(&self) -> usize {
        self.carry.len() / self.channels
    }

    /// Resample `input` (interleaved), returning every output frame it completes.
    pub fn process(&mut self, input: &[f32]) -> Result<Vec<f32>, DeviceError> {
        let channels = self.channels;
        let chunk_samples = self.chunk_frames * channels;
        self.carry.extend_from_slice(input);

        let whole = self.carry.len() / chunk_samples * chunk_samples;
        let mut out = Vec::with_capacity(
            (whole as f64 * self.to_rate as f64 / self.from_rate as f64) as usize + channels,
        );

        let mut indexing = Indexing {
            input_offset: 0,
            output_offset: 0,
            active_channels_mask: None,
            partial_len: None,
        };

        for block in self.carry[..whole].chunks_exact(chunk_samples) {
            let input_adapter = InterleavedSlice::new(block, channels, self.chunk_frames)
                .map_err(|e| DeviceError::Backend(format!("resampler input: {e}")))?;
            let out_capacity_frames = self.out_interleaved.len() / channels;
            let mut output_adapter =
                InterleavedSlice::new_mut(&mut self.out_interleaved, channels, out_capacity_frames)
                    .map_err(|e| DeviceError::Backend(format!("resampler output: {e}")))?;

            indexing.input_offset = 0;
            indexing.output_offset = 0;
            let (_nbr_in, nbr_out) = self
                .resampler
                .process_into_buffer(&input_adapter, &mut output_adapter, Some(&indexing))
                .map_err(|e| DeviceError::Backend(format!("resampler process: {e}")))?;
            out.extend_from_slice(&self.out_interleaved[..nbr_out * channels]);
        }

        self.carry.drain(..whole);
        Ok(out)
    }
}
