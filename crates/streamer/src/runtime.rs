//! Streamer runtime.
//!
//! Provides device enumeration, stream inspection, WAV decoding, and the playback
//! driver loop that ticks the player and applies stdin commands.

use std::fs::File;
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result, anyhow};
use crossbeam_channel::{Receiver, select};
use stream_player::wav::{WAV_HEADER_LEN, WavHeader};
use stream_player::{
    AudioBackend, CpalBackend, PcmSource, PlaybackEndReason, PlayerError, PlayerState,
    SimulatedBackend, StreamingPlayer, device, open_source,
};

use crate::config::{OutputSelection, StreamerPlayConfig};
use crate::control::{self, PlayerCommand, VOLUME_STEP};

/// Bytes pulled from the source per write while decoding to WAV.
const DECODE_CHUNK_BYTES: usize = 64 * 1024;

/// List output devices to stdout.
pub fn list_devices(json: bool) -> Result<()> {
    let host = cpal::default_host();
    let devices = device::list_devices(&host)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&devices)?);
        return Ok(());
    }
    for d in devices {
        println!(
            "#{}: {} ({}-{} Hz){}",
            d.index,
            d.name,
            d.min_rate,
            d.max_rate,
            if d.is_default { " [default]" } else { "" }
        );
    }
    Ok(())
}

/// Print the format and header fields of `path`.
pub fn run_info(path: &Path, json: bool) -> Result<()> {
    let source = open_source(path).with_context(|| format!("open {}", path.display()))?;
    let mut out = std::io::stdout().lock();
    write_info(&mut out, path, source.as_ref(), json)
}

fn write_info<W: Write>(out: &mut W, path: &Path, source: &dyn PcmSource, json: bool) -> Result<()> {
    let spec = source.spec();
    let info = source.describe();
    if json {
        let value = serde_json::json!({
            "path": path.display().to_string(),
            "spec": spec,
            "byte_rate": spec.byte_rate(),
            "duration_secs": source.duration().as_secs_f64(),
            "duration_estimated": source.duration_is_estimate(),
            "info": info,
        });
        writeln!(out, "{}", serde_json::to_string_pretty(&value)?)?;
        return Ok(());
    }

    writeln!(out, "{}", path.display())?;
    writeln!(out, "  codec: {}", info.codec)?;
    writeln!(
        out,
        "  format: {} Hz, {} ch, {} bit",
        spec.sample_rate,
        spec.format.channels(),
        spec.format.bits()
    )?;
    if let Some(kbps) = info.bitrate_kbps {
        writeln!(out, "  bitrate: {kbps} kbps")?;
    }
    writeln!(
        out,
        "  duration: {}{:.2}s",
        if source.duration_is_estimate() { "~" } else { "" },
        source.duration().as_secs_f64()
    )?;
    for (name, value) in &info.fields {
        writeln!(out, "  {name}: {value}")?;
    }
    Ok(())
}

/// Decode `input` to a 16-bit (or 8-bit, for 8-bit WAV input) PCM WAV file.
///
/// Returns the number of PCM bytes written.
pub fn run_decode(input: &Path, output: &Path) -> Result<u64> {
    let mut source = open_source(input).with_context(|| format!("open {}", input.display()))?;
    let spec = source.spec();
    let file = File::create(output).with_context(|| format!("create {}", output.display()))?;
    let mut out = BufWriter::new(file);

    out.write_all(&[0u8; WAV_HEADER_LEN])?;
    let max = DECODE_CHUNK_BYTES - DECODE_CHUNK_BYTES % spec.block_align();
    let mut written: u64 = 0;
    while let Some(chunk) = source.next_chunk(max)? {
        out.write_all(&chunk.bytes[..chunk.data_len])?;
        written += chunk.data_len as u64;
    }

    let data_size = u32::try_from(written)
        .map_err(|_| anyhow!("decoded stream too large for WAV ({written} bytes)"))?;
    out.seek(SeekFrom::Start(0))?;
    out.write_all(&WavHeader::for_pcm(spec, data_size).to_bytes())?;
    out.flush()?;

    tracing::info!(
        input = %input.display(),
        output = %output.display(),
        bytes = written,
        secs = spec.bytes_to_secs(written),
        "decoded"
    );
    Ok(written)
}

/// Play one file until it ends or the user quits.
pub fn run_play(config: StreamerPlayConfig, install_ctrlc: bool) -> Result<PlaybackEndReason> {
    let source = open_source(&config.path)
        .with_context(|| format!("open {}", config.path.display()))?;
    let spec = source.spec();
    tracing::info!(
        path = %config.path.display(),
        rate = spec.sample_rate,
        format = ?spec.format,
        duration_secs = source.duration().as_secs_f64(),
        estimated = source.duration_is_estimate(),
        "source"
    );

    let (cmd_tx, cmd_rx) = crossbeam_channel::unbounded();
    if install_ctrlc {
        let tx = cmd_tx.clone();
        let _ = ctrlc::set_handler(move || {
            let _ = tx.send(PlayerCommand::Quit);
        });
    }
    control::spawn_stdin_reader(cmd_tx);

    let mut stdout = std::io::stdout();
    match &config.output {
        OutputSelection::Null => {
            let backend = Arc::new(SimulatedBackend::new(
                spec.sample_rate,
                spec.format.channels(),
            ));
            drive(backend, source, &config, cmd_rx, &mut stdout)
        }
        OutputSelection::Device(cpal_cfg) => {
            let backend = Arc::new(CpalBackend::open(cpal_cfg, Some(spec.sample_rate))?);
            drive(backend, source, &config, cmd_rx, &mut stdout)
        }
    }
}

/// Tick `source` through `backend` at the player's tick interval.
///
/// The backend clock is advanced by wall-clock time before every tick; hardware
/// backends ignore it. Device errors are logged and retried on the next tick.
pub fn drive<B: AudioBackend + ?Sized, W: Write>(
    backend: Arc<B>,
    source: Box<dyn PcmSource>,
    config: &StreamerPlayConfig,
    commands: Receiver<PlayerCommand>,
    out: &mut W,
) -> Result<PlaybackEndReason> {
    let mut player = StreamingPlayer::new(backend.clone(), source, &config.player)?;
    let ticker = crossbeam_channel::tick(player.tick_interval());
    let mut commands = commands;
    let mut last = Instant::now();

    if let Err(e) = player.start() {
        if !e.is_transient() {
            return Err(e.into());
        }
        tracing::warn!("priming failed, retrying on next tick: {e}");
    }

    while player.state() != PlayerState::Ended {
        select! {
            recv(ticker) -> _ => {
                let now = Instant::now();
                backend.advance_clock(now - last);
                last = now;
                match player.tick() {
                    Ok(_) => {}
                    Err(e) if e.is_transient() => tracing::warn!("tick failed: {e}"),
                    Err(e) => return Err(e.into()),
                }
            }
            recv(commands) -> msg => match msg {
                Ok(cmd) => {
                    if let Err(e) = apply_command(&mut player, cmd, config.json, out) {
                        if !is_transient(&e) {
                            return Err(e);
                        }
                        tracing::warn!(command = ?cmd, "command failed: {e}");
                    }
                }
                // stdin closed; keep playing to the end.
                Err(_) => commands = crossbeam_channel::never(),
            },
        }
    }

    print_status(&player, config.json, out)?;
    player
        .end_reason()
        .ok_or_else(|| anyhow!("playback loop exited before the player ended"))
}

fn apply_command<B: AudioBackend + ?Sized, W: Write>(
    player: &mut StreamingPlayer<B>,
    cmd: PlayerCommand,
    json: bool,
    out: &mut W,
) -> Result<()> {
    match cmd {
        PlayerCommand::TogglePause => {
            player.toggle_pause()?;
            tracing::info!(paused = player.is_paused(), "pause toggled");
        }
        PlayerCommand::VolumeUp => {
            let v = player.adjust_volume(VOLUME_STEP)?;
            tracing::info!(volume = v, "volume");
        }
        PlayerCommand::VolumeDown => {
            let v = player.adjust_volume(-VOLUME_STEP)?;
            tracing::info!(volume = v, "volume");
        }
        PlayerCommand::Status => print_status(player, json, out)?,
        PlayerCommand::Quit => player.stop()?,
    }
    Ok(())
}

/// Device errors leave the player usable; everything else ends the session.
fn is_transient(err: &anyhow::Error) -> bool {
    err.downcast_ref::<PlayerError>()
        .is_some_and(PlayerError::is_transient)
}

fn print_status<B: AudioBackend + ?Sized, W: Write>(
    player: &StreamingPlayer<B>,
    json: bool,
    out: &mut W,
) -> Result<()> {
    let status = player.status();
    if json {
        writeln!(out, "{}", serde_json::to_string(&status)?)?;
    } else {
        writeln!(out, "{}", status.summary())?;
    }
    Ok(())
}
