use std::path::{Path, PathBuf};
use std::time::Duration;

use stream_player::{CpalBackendConfig, PlayerConfig};

use crate::cli::Args;

/// Where decoded audio goes.
#[derive(Clone, Debug)]
pub enum OutputSelection {
    /// Simulated device advanced by wall-clock time.
    Null,
    Device(CpalBackendConfig),
}

#[derive(Clone, Debug)]
pub struct StreamerPlayConfig {
    pub path: PathBuf,
    pub output: OutputSelection,
    pub player: PlayerConfig,
    pub json: bool,
}

impl StreamerPlayConfig {
    pub fn from_args(args: &Args, path: &Path) -> Self {
        let output = if args.null_output {
            OutputSelection::Null
        } else {
            OutputSelection::Device(CpalBackendConfig {
                device: normalize_device_name(args.device.clone()),
                resample_chunk_frames: args.chunk_frames,
            })
        };
        Self {
            path: path.to_path_buf(),
            output,
            player: PlayerConfig {
                buffer_count: args.buffers,
                buffer_seconds: args.buffer_seconds,
                tick_interval: args.tick_ms.map(Duration::from_millis),
            },
            json: args.json,
        }
    }
}

fn normalize_device_name(device: Option<String>) -> Option<String> {
    device.and_then(|name| {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}
