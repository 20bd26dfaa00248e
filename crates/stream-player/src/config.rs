use std::time::Duration;

use crate::error::{PlayerError, Result};

/// Smallest and largest buffer pool the player accepts.
pub const MIN_BUFFER_COUNT: usize = 2;
pub const MAX_BUFFER_COUNT: usize = 8;

const MIN_TICK: Duration = Duration::from_millis(10);
const MAX_TICK: Duration = Duration::from_millis(500);

/// Streaming tuning parameters shared by the player and its driver loop.
#[derive(Clone, Debug)]
pub struct PlayerConfig {
    /// Number of device buffers cycled round-robin.
    pub buffer_count: usize,
    /// Audio held in flight across all buffers, in seconds of source PCM.
    pub buffer_seconds: f32,
    /// Driver tick cadence. Derived from the chunk duration when unset.
    pub tick_interval: Option<Duration>,
}

impl Default for PlayerConfig {
    /// Quad buffering with one second in flight.
    fn default() -> Self {
        Self {
            buffer_count: 4,
            buffer_seconds: 1.0,
            tick_interval: None,
        }
    }
}

impl PlayerConfig {
    /// Reject pool sizes and capacities the player cannot run with.
    pub fn validate(&self) -> Result<()> {
        if !(MIN_BUFFER_COUNT..=MAX_BUFFER_COUNT).contains(&self.buffer_count) {
            return Err(PlayerError::Config(format!(
                "buffer_count {} outside {MIN_BUFFER_COUNT}..={MAX_BUFFER_COUNT}",
                self.buffer_count
            )));
        }
        if !self.buffer_seconds.is_finite() || self.buffer_seconds <= 0.0 {
            return Err(PlayerError::Config(format!(
                "buffer_seconds must be positive, got {}",
                self.buffer_seconds
            )));
        }
        Ok(())
    }

    /// Total in-flight capacity in bytes for a stream with `byte_rate`.
    pub fn capacity_bytes(&self, byte_rate: u32) -> usize {
        (byte_rate as f64 * self.buffer_seconds as f64).ceil() as usize
    }

    /// Pick the driver tick for chunks lasting `chunk_duration`.
    ///
    /// The tick must be strictly shorter than one chunk, otherwise the device drains its
    /// queue between refills and playback stalls.
    pub fn tick_interval(&self, chunk_duration: Duration) -> Result<Duration> {
        let tick = match self.tick_interval {
            Some(t) => t,
            None => (chunk_duration / 4).clamp(MIN_TICK, MAX_TICK),
        };
        if tick >= chunk_duration {
            return Err(PlayerError::Config(format!(
                "tick interval {tick:?} must be shorter than chunk duration {chunk_duration:?}"
            )));
        }
        Ok(tick)
    }
}

/// Chunk size for `capacity` bytes split across `buffer_count` slots.
///
/// `ceil(capacity / buffer_count)`, rounded up to whole sample frames.
pub fn chunk_size(capacity: usize, buffer_count: usize, block_align: usize) -> usize {
    let block_align = block_align.max(1);
    let raw = capacity.div_ceil(buffer_count.max(1)).max(1);
    raw.div_ceil(block_align) * block_align
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_size_splits_one_second_of_mono16() {
        assert_eq!(chunk_size(88_200, 4, 2), 22_050);
    }

    #[test]
    fn chunk_size_rounds_up_to_frames() {
        // ceil(100 / 3) = 34, next multiple of 4 is 36
        assert_eq!(chunk_size(100, 3, 4), 36);
        assert_eq!(chunk_size(0, 4, 2), 2);
    }

    #[test]
    fn validate_rejects_bad_pool_sizes() {
        let cfg = PlayerConfig {
            buffer_count: 1,
            ..PlayerConfig::default()
        };
        assert!(cfg.validate().is_err());
        let cfg = PlayerConfig {
            buffer_seconds: f32::NAN,
            ..PlayerConfig::default()
        };
        assert!(cfg.validate().is_err());
        assert!(PlayerConfig::default().validate().is_ok());
    }

    #[test]
    fn derived_tick_is_quarter_chunk_clamped() {
        let cfg = PlayerConfig::default();
        let tick = cfg.tick_interval(Duration::from_millis(250)).unwrap();
        assert_eq!(tick, Duration::from_millis(62) + Duration::from_micros(500));
        let tick = cfg.tick_interval(Duration::from_secs(4)).unwrap();
        assert_eq!(tick, Duration::from_millis(500));
    }

    #[test]
    fn explicit_tick_must_be_shorter_than_chunk() {
        let cfg = PlayerConfig {
            tick_interval: Some(Duration::from_millis(300)),
            ..PlayerConfig::default()
        };
        assert!(cfg.tick_interval(Duration::from_millis(250)).is_err());
        assert!(cfg.tick_interval(Duration::from_millis(301)).is_ok());
    }

    #[test]
    fn capacity_follows_byte_rate() {
        let cfg = PlayerConfig {
            buffer_seconds: 0.5,
            ..PlayerConfig::default()
        };
        assert_eq!(cfg.capacity_bytes(176_400), 88_200);
    }
}
