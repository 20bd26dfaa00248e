//! CPAL output stream.
//!
//! The real-time callback renders the voice queue held in the shared [`DeviceCore`]:
//! - renders interleaved `f32` into a scratch buffer owned by the callback
//! - applies channel mapping and gain inside [`DeviceCore`]
//! - converts `f32` samples to the device sample format

use cpal::traits::DeviceTrait;

use crate::error::DeviceError;
use crate::queue::SharedCore;

/// Build a CPAL output stream that plays the voice queue in `core`.
///
/// Buffers in `core` must already be at the stream's sample rate.
///
/// ## Real-time constraints
/// The callback holds the core mutex only while rendering and never waits on anything
/// else. If the mutex is poisoned the callback outputs silence.
pub fn build_output_stream(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    sample_format: cpal::SampleFormat,
    core: &SharedCore,
) -> Result<cpal::Stream, DeviceError> {
    match sample_format {
        cpal::SampleFormat::F32 => build_stream::<f32>(device, config, core),
        cpal::SampleFormat::I16 => build_stream::<i16>(device, config, core),
        cpal::SampleFormat::I32 => build_stream::<i32>(device, config, core),
        cpal::SampleFormat::U16 => build_stream::<u16>(device, config, core),
        other => Err(DeviceError::Backend(format!(
            "unsupported sample format: {other:?}"
        ))),
    }
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    core: &SharedCore,
) -> Result<cpal::Stream, DeviceError>
where
    T: cpal::Sample + cpal::SizedSample + cpal::FromSample<f32>,
{
    let channels_out = config.channels.max(1) as usize;
    let core_cb = core.clone();
    let mut scratch: Vec<f32> = Vec::new();

    let err_fn = |err| tracing::warn!("stream error: {err}");

    device
        .build_output_stream(
            config,
            move |data: &mut [T], _| {
                if scratch.len() < data.len() {
                    scratch.resize(data.len(), 0.0);
                }
                let out = &mut scratch[..data.len()];
                match core_cb.lock() {
                    Ok(mut core) => {
                        core.render(out, channels_out);
                    }
                    Err(_) => out.fill(0.0),
                }
                write_converted(data, out);
            },
            err_fn,
            None,
        )
        .map_err(|e| DeviceError::Backend(format!("build output stream: {e}")))
}

fn write_converted<T>(data: &mut [T], src: &[f32])
where
    T: cpal::Sample + cpal::FromSample<f32>,
{
    for (dst, &s) in data.iter_mut().zip(src) {
        *dst = <T as cpal::Sample>::from_sample::<f32>(s.clamp(-1.0, 1.0));
    }
}
