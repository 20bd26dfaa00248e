//! Output device discovery and selection.
//!
//! Thin wrappers around CPAL for:
//! - listing available output devices
//! - selecting either the default device or a device by substring match
//! - choosing a stream config close to the source rate

use cpal::traits::{DeviceTrait, HostTrait};
use serde::Serialize;

use crate::error::DeviceError;

/// Largest fixed hardware buffer requested from the device, in frames.
///
/// Streaming latency lives in the player's buffer pool; a large hardware buffer would
/// only delay pause and stop.
const MAX_HW_BUFFER_FRAMES: u32 = 4_096;

/// Pick the first output device matching `needle` (case-insensitive), or the default device.
pub fn pick_device(host: &cpal::Host, needle: Option<&str>) -> Result<cpal::Device, DeviceError> {
    if let Some(needle) = needle {
        let mut devices = host
            .output_devices()
            .map_err(|e| DeviceError::Backend(format!("no output devices: {e}")))?;
        return devices
            .find(|d| {
                d.description()
                    .ok()
                    .map(|n| matches_device_name(&n.name(), needle))
                    .unwrap_or(false)
            })
            .ok_or_else(|| DeviceError::Backend(format!("no output device matched: {needle}")));
    }

    host.default_output_device()
        .ok_or_else(|| DeviceError::Backend("no default output device".to_string()))
}

/// Human-readable name for `device`.
pub fn device_name(device: &cpal::Device) -> String {
    device
        .description()
        .map(|d| d.to_string())
        .unwrap_or_else(|_| "unknown device".to_string())
}

/// Choose the output config for a source at `target_rate`.
///
/// An exact rate match avoids resampling entirely, so it wins. Otherwise prefer the
/// highest supported rate that is **<= target_rate**; if none are, the lowest rate above
/// it. Ties go to the cheaper sample format.
pub fn pick_output_config(
    device: &cpal::Device,
    target_rate: Option<u32>,
) -> Result<cpal::SupportedStreamConfig, DeviceError> {
    let ranges: Vec<cpal::SupportedStreamConfigRange> = device
        .supported_output_configs()
        .map_err(|e| DeviceError::Backend(format!("output configs unavailable: {e}")))?
        .collect();

    let mut best: Option<(Candidate, cpal::SupportedStreamConfig)> = None;
    for range in ranges {
        if range.channels() == 0 {
            continue;
        }
        let rate = pick_rate_for_range(range.min_sample_rate(), range.max_sample_rate(), target_rate);
        let candidate = Candidate {
            below: target_rate.map(|t| rate <= t).unwrap_or(true),
            rate,
            stereo: range.channels() == 2,
            format_rank: sample_format_rank(range.sample_format()),
        };
        let replace = match &best {
            None => true,
            Some((b, _)) => candidate.is_better_than(b, target_rate),
        };
        if replace {
            best = Some((candidate, range.with_sample_rate(rate)));
        }
    }

    best.map(|(_, cfg)| cfg)
        .ok_or_else(|| DeviceError::Backend("no supported output configs".to_string()))
}

/// Prefer a fixed buffer size if the device advertises a range.
///
/// Returns `None` when the device only supports its default buffer size.
pub fn pick_buffer_size(config: &cpal::SupportedStreamConfig) -> Option<cpal::BufferSize> {
    match config.buffer_size() {
        cpal::SupportedBufferSize::Range { min, max } => {
            let chosen = (*max).min(MAX_HW_BUFFER_FRAMES).max(*min);
            Some(cpal::BufferSize::Fixed(chosen))
        }
        cpal::SupportedBufferSize::Unknown => None,
    }
}

/// Output device metadata for `--list-devices`.
#[derive(Clone, Debug, Serialize)]
pub struct DeviceInfo {
    pub index: usize,
    pub name: String,
    pub min_rate: u32,
    pub max_rate: u32,
    pub is_default: bool,
}

/// Enumerate output devices on `host`.
///
/// Devices that report no usable rate range fall back to their default config; devices
/// with neither are skipped.
pub fn list_devices(host: &cpal::Host) -> Result<Vec<DeviceInfo>, DeviceError> {
    let default_name = host.default_output_device().map(|d| device_name(&d));
    let devices = host
        .output_devices()
        .map_err(|e| DeviceError::Backend(format!("no output devices: {e}")))?;

    let mut out = Vec::new();
    for (index, d) in devices.enumerate() {
        let name = device_name(&d);
        let mut range = d
            .supported_output_configs()
            .ok()
            .and_then(|ranges| merge_rate_ranges(ranges.map(|r| (r.min_sample_rate(), r.max_sample_rate()))));
        if range.is_none() {
            range = d.default_output_config().ok().map(|c| {
                let sr = c.sample_rate();
                (sr, sr)
            });
        }
        let Some((min_rate, max_rate)) = range else {
            tracing::warn!(device = %name, "skipping device with no usable sample rate");
            continue;
        };
        out.push(DeviceInfo {
            index,
            is_default: default_name.as_deref() == Some(name.as_str()),
            name,
            min_rate,
            max_rate,
        });
    }
    Ok(out)
}

#[derive(Clone, Copy, Debug)]
struct Candidate {
    below: bool,
    rate: u32,
    stereo: bool,
    format_rank: u8,
}

impl Candidate {
    fn is_better_than(&self, best: &Candidate, target_rate: Option<u32>) -> bool {
        let exact = target_rate == Some(self.rate);
        let best_exact = target_rate == Some(best.rate);
        if exact != best_exact {
            return exact;
        }
        if self.below != best.below {
            return self.below;
        }
        if self.rate != best.rate {
            // Below the target: the closest (highest). Above it: the closest (lowest).
            return if self.below {
                self.rate > best.rate
            } else {
                self.rate < best.rate
            };
        }
        if self.stereo != best.stereo {
            return self.stereo;
        }
        self.format_rank < best.format_rank
    }
}

fn merge_rate_ranges(ranges: impl Iterator<Item = (u32, u32)>) -> Option<(u32, u32)> {
    ranges
        .filter(|(min, max)| *min > 0 && *max >= *min)
        .fold(None, |acc, (min, max)| match acc {
            None => Some((min, max)),
            Some((a, b)) => Some((a.min(min), b.max(max))),
        })
}

fn pick_rate_for_range(min: u32, max: u32, target_rate: Option<u32>) -> u32 {
    match target_rate {
        Some(t) => t.clamp(min, max.max(min)),
        None => max,
    }
}

fn sample_format_rank(format: cpal::SampleFormat) -> u8 {
    match format {
        cpal::SampleFormat::F32 => 0,
        cpal::SampleFormat::I32 => 1,
        cpal::SampleFormat::I16 => 2,
        cpal::SampleFormat::U16 => 3,
        _ => 10,
    }
}

fn matches_device_name(name: &str, needle: &str) -> bool {
    let needle = needle.trim();
    if needle.is_empty() {
        return false;
    }
    name.to_lowercase().contains(&needle.to_lowercase())
}
