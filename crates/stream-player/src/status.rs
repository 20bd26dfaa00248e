use serde::Serialize;

use crate::backend::VoiceState;

/// Lifecycle of a [`StreamingPlayer`](crate::player::StreamingPlayer).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayerState {
    /// Filling the pool before the first `play()`.
    Priming,
    /// Reclaiming and refilling buffers each tick.
    Streaming,
    /// Source exhausted; waiting for the last buffers to play out.
    Draining,
    /// Terminal.
    Ended,
}

/// Why playback reached [`PlayerState::Ended`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackEndReason {
    /// Every byte of the stream was played.
    Eof,
    /// Stopped by the caller.
    Stopped,
}

/// Point-in-time snapshot of a player, for status lines and `--json` output.
#[derive(Clone, Debug, Serialize)]
pub struct PlayerStatus {
    pub state: PlayerState,
    /// Device-side voice state; `None` if the device could not be queried.
    pub voice: Option<VoiceState>,
    /// Seconds of audio submitted to the device.
    pub position_secs: f64,
    /// Seconds of audio the device has finished playing.
    pub played_secs: f64,
    pub duration_secs: f64,
    /// Whether `duration_secs` is estimated from the bitrate.
    pub duration_estimated: bool,
    pub buffers_in_flight: usize,
    pub buffer_count: usize,
    pub chunk_bytes: usize,
    pub underruns: u64,
    pub volume_percent: u8,
    pub end_reason: Option<PlaybackEndReason>,
}

impl PlayerStatus {
    /// One-line human summary, e.g. `streaming 1.25/3.00s [3/4] vol 100%`.
    pub fn summary(&self) -> String {
        let mut line = format!(
            "{} {:.2}/{}{:.2}s [{}/{}] vol {}%",
            state_label(self.state),
            self.played_secs,
            if self.duration_estimated { "~" } else { "" },
            self.duration_secs,
            self.buffers_in_flight,
            self.buffer_count,
            self.volume_percent
        );
        if self.voice == Some(VoiceState::Paused) {
            line.push_str(" (paused)");
        }
        if self.underruns > 0 {
            line.push_str(&format!(" underruns {}", self.underruns));
        }
        line
    }
}

fn state_label(state: PlayerState) -> &'static str {
    match state {
        PlayerState::Priming => "priming",
        PlayerState::Streaming => "streaming",
        PlayerState::Draining => "draining",
        PlayerState::Ended => "ended",
    }
}
