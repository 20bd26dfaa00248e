//! Streamer: a small CLI that plays WAV and MP3 files by cycling a fixed pool of
//! device buffers.
//!
//! ## Playback
//! 1. **Source**: the file is parsed (WAV) or decoded frame by frame (MP3) into PCM chunks.
//! 2. **Pool**: chunks are uploaded into `--buffers` device buffers and queued on one voice.
//! 3. **Tick**: every tick the played buffers are reclaimed, refilled, and requeued.
//!
//! `--null-output` swaps the sound card for a simulated device clocked in real time.

use anyhow::{Result, bail};
use clap::Parser;
use streamer::cli::{Args, Command};
use streamer::config::StreamerPlayConfig;
use streamer::runtime;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let args = Args::parse();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("info,streamer=info,stream_player=info")
        }))
        .with_writer(std::io::stderr)
        .init();

    if args.list_devices {
        return runtime::list_devices(args.json);
    }

    match &args.cmd {
        Some(Command::Play { path }) => {
            let config = StreamerPlayConfig::from_args(&args, path);
            let reason = runtime::run_play(config, true)?;
            tracing::info!(reason = ?reason, "playback finished");
        }
        Some(Command::Info { path }) => runtime::run_info(path, args.json)?,
        Some(Command::Decode { input, output }) => {
            runtime::run_decode(input, output)?;
        }
        None => bail!("no command given (try `streamer play <file>` or `--list-devices`)"),
    }
    Ok(())
}
