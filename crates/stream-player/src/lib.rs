//! Streaming ring-buffer audio playback.
//!
//! A [`PcmSource`] (WAV or MP3) is cut into fixed-size chunks that cycle through a
//! small pool of device buffers on one voice of an [`AudioBackend`]. The
//! [`StreamingPlayer`] is driven by periodic [`StreamingPlayer::tick`] calls from a
//! single thread.

pub mod backend;
pub mod config;
pub mod decode;
pub mod device;
pub mod error;
mod playback;
pub mod player;
pub mod pool;
mod queue;
pub mod resample;
pub mod sink;
pub mod source;
pub mod status;
pub mod wav;

pub use backend::{AudioBackend, CpalBackend, CpalBackendConfig, SimulatedBackend};
pub use config::PlayerConfig;
pub use error::{DeviceError, FormatError, PlayerError, Result};
pub use player::{PlaybackCursor, StreamingPlayer, TickReport};
pub use source::{PcmSource, open_source};
pub use status::{PlaybackEndReason, PlayerState, PlayerStatus};
