//! Streaming player: source → buffer pool → voice.
//!
//! The player keeps `N` fixed-size device buffers cycling between the source and the
//! device. Each [`StreamingPlayer::tick`]:
//! 1. reclaims every buffer the device reports processed (always the oldest slots)
//! 2. refills the freed slots round-robin from the source and re-queues them
//! 3. switches to draining once the source has handed out its last chunk
//! 4. restarts the voice if it ran dry while audio is still queued
//! 5. ends playback once draining and nothing is left in flight
//!
//! The caller must tick more often than one chunk lasts; see
//! [`StreamingPlayer::tick_interval`].

use std::sync::Arc;
use std::time::Duration;

use crate::backend::{AudioBackend, VoiceState};
use crate::config::{PlayerConfig, chunk_size};
use crate::error::Result;
use crate::pool::BufferPool;
use crate::sink::OutputSink;
use crate::source::{PcmSource, StreamSpec};
use crate::status::{PlaybackEndReason, PlayerState, PlayerStatus};

/// What one [`StreamingPlayer::tick`] did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Processed buffers dequeued.
    pub reclaimed: usize,
    /// Buffers filled and queued.
    pub refilled: usize,
    /// The voice had run dry and was restarted.
    pub underrun_recovered: bool,
    /// Playback reached [`PlayerState::Ended`] during this call.
    pub ended: bool,
}

/// Real stream bytes handed to the device. Only grows, and only on a successful
/// submission.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PlaybackCursor {
    pub delivered_bytes: u64,
}

impl PlaybackCursor {
    fn advance(&mut self, bytes: usize) {
        self.delivered_bytes += bytes as u64;
    }
}

/// Plays one [`PcmSource`] through one voice of an [`AudioBackend`].
pub struct StreamingPlayer<B: AudioBackend + ?Sized> {
    // Field order is drop order: the voice must go before the buffers queued on it.
    sink: OutputSink<B>,
    pool: BufferPool<B>,
    source: Box<dyn PcmSource>,
    spec: StreamSpec,
    buffer_count: usize,
    chunk_size: usize,
    tick: Duration,
    state: PlayerState,
    /// Slot the device will hand back next.
    reclaim_slot: usize,
    /// Real (unpadded) bytes held by each slot while it is in flight.
    slot_data: Vec<usize>,
    /// `source.last_chunk()` still has to be submitted.
    pending_upload: bool,
    source_done: bool,
    queued_bytes: u64,
    cursor: PlaybackCursor,
    played_bytes: u64,
    underruns: u64,
    user_paused: bool,
    end_reason: Option<PlaybackEndReason>,
}

impl<B: AudioBackend + ?Sized> StreamingPlayer<B> {
    /// Allocate the voice and buffer pool for `source`.
    ///
    /// Nothing is queued until [`StreamingPlayer::start`] (or the first tick).
    pub fn new(backend: Arc<B>, source: Box<dyn PcmSource>, config: &PlayerConfig) -> Result<Self> {
        config.validate()?;
        let spec = source.spec();
        let buffer_count = config.buffer_count;
        let capacity = config.capacity_bytes(spec.byte_rate());
        let chunk_size = chunk_size(capacity, buffer_count, spec.block_align());
        let tick = config.tick_interval(spec.bytes_to_duration(chunk_size as u64))?;

        let pool = BufferPool::new(backend.clone(), buffer_count)?;
        let sink = OutputSink::new(backend.clone())?;

        tracing::info!(
            device = %backend.describe(),
            rate = spec.sample_rate,
            format = ?spec.format,
            buffers = buffer_count,
            chunk_bytes = chunk_size,
            tick_ms = tick.as_millis() as u64,
            "player ready"
        );

        Ok(Self {
            sink,
            pool,
            source,
            spec,
            buffer_count,
            chunk_size,
            tick,
            state: PlayerState::Priming,
            reclaim_slot: 0,
            slot_data: vec![0; buffer_count],
            pending_upload: false,
            source_done: false,
            queued_bytes: 0,
            cursor: PlaybackCursor::default(),
            played_bytes: 0,
            underruns: 0,
            user_paused: false,
            end_reason: None,
        })
    }

    /// Fill every slot and start the voice.
    ///
    /// Only acts while priming. A device error leaves the player priming; calling again
    /// continues where it stopped.
    pub fn start(&mut self) -> Result<TickReport> {
        let mut report = TickReport::default();
        if self.state != PlayerState::Priming {
            return Ok(report);
        }

        while self.sink.in_flight() < self.buffer_count {
            if !self.submit_next()? {
                break;
            }
            report.refilled += 1;
        }

        if !self.source_done {
            assert_eq!(
                self.queued_bytes,
                (self.chunk_size * self.buffer_count) as u64,
                "priming must fill the whole pool"
            );
        }

        if self.sink.in_flight() == 0 {
            // Nothing to play at all.
            self.finish(PlaybackEndReason::Eof);
            report.ended = true;
            return Ok(report);
        }

        if !self.user_paused {
            self.sink.play()?;
        }
        let next = if self.source_done {
            PlayerState::Draining
        } else {
            PlayerState::Streaming
        };
        self.enter(next);
        Ok(report)
    }

    /// Advance the stream by one cooperative step.
    ///
    /// A device error aborts the step; the player state is kept and the next call picks
    /// up from the same point, including the chunk whose upload failed.
    pub fn tick(&mut self) -> Result<TickReport> {
        match self.state {
            PlayerState::Ended => return Ok(TickReport::default()),
            PlayerState::Priming => return self.start(),
            PlayerState::Streaming | PlayerState::Draining => {}
        }

        let mut report = TickReport::default();
        report.reclaimed = self.reclaim(true)?;

        if self.state == PlayerState::Streaming {
            while self.sink.in_flight() < self.buffer_count {
                if !self.submit_next()? {
                    break;
                }
                report.refilled += 1;
            }
            if self.source_done && !self.pending_upload {
                self.enter(PlayerState::Draining);
            }
        }

        let in_flight = self.sink.in_flight();
        assert!(
            in_flight <= self.buffer_count,
            "{in_flight} buffers in flight with a pool of {}",
            self.buffer_count
        );
        if self.state == PlayerState::Streaming {
            debug_assert!(self.pending_upload || in_flight == self.buffer_count);
        }

        if !self.user_paused && in_flight > 0 && self.sink.state()? == VoiceState::Stopped {
            // Buffers the device finished since the reclaim above are not pending.
            let pending = in_flight.saturating_sub(self.sink.processed_count()?);
            if pending > 0 {
                self.underruns += 1;
                tracing::warn!(
                    underruns = self.underruns,
                    pending,
                    state = ?self.state,
                    "voice ran dry; restarting"
                );
                self.sink.play()?;
                report.underrun_recovered = true;
            }
        }

        if self.state == PlayerState::Draining && self.sink.in_flight() == 0 {
            self.finish(PlaybackEndReason::Eof);
            report.ended = true;
        }

        tracing::debug!(
            reclaimed = report.reclaimed,
            refilled = report.refilled,
            in_flight = self.sink.in_flight(),
            state = ?self.state,
            "tick"
        );
        Ok(report)
    }

    /// Resume after [`StreamingPlayer::pause`]. Starts playback if still priming.
    pub fn play(&mut self) -> Result<()> {
        self.user_paused = false;
        match self.state {
            PlayerState::Ended => Ok(()),
            PlayerState::Priming => self.start().map(|_| ()),
            PlayerState::Streaming | PlayerState::Draining => Ok(self.sink.play()?),
        }
    }

    pub fn pause(&mut self) -> Result<()> {
        if self.state == PlayerState::Ended {
            return Ok(());
        }
        if self.state != PlayerState::Priming {
            self.sink.pause()?;
        }
        self.user_paused = true;
        Ok(())
    }

    pub fn toggle_pause(&mut self) -> Result<()> {
        if self.user_paused {
            self.play()
        } else {
            self.pause()
        }
    }

    pub fn is_paused(&self) -> bool {
        self.user_paused
    }

    /// Stop immediately and release every queued buffer. Idempotent.
    pub fn stop(&mut self) -> Result<()> {
        if self.state == PlayerState::Ended {
            return Ok(());
        }
        self.sink.stop()?;
        self.reclaim(false)?;
        assert_eq!(self.sink.in_flight(), 0, "stopped voice still holds buffers");
        self.pending_upload = false;
        self.finish(PlaybackEndReason::Stopped);
        Ok(())
    }

    pub fn set_volume_percent(&mut self, percent: u8) -> Result<()> {
        Ok(self.sink.set_volume_percent(percent)?)
    }

    /// Nudge the volume by `delta` percentage points, clamped to 0..=100.
    pub fn adjust_volume(&mut self, delta: i16) -> Result<u8> {
        let next = (self.sink.volume_percent() as i16 + delta).clamp(0, 100) as u8;
        self.set_volume_percent(next)?;
        Ok(next)
    }

    pub fn state(&self) -> PlayerState {
        self.state
    }

    pub fn end_reason(&self) -> Option<PlaybackEndReason> {
        self.end_reason
    }

    /// Audio submitted to the device so far.
    pub fn position(&self) -> Duration {
        self.spec.bytes_to_duration(self.cursor.delivered_bytes)
    }

    /// Audio the device has finished playing.
    pub fn played(&self) -> Duration {
        self.spec.bytes_to_duration(self.played_bytes)
    }

    pub fn duration(&self) -> Duration {
        self.source.duration()
    }

    /// Real bytes submitted so far.
    pub fn cursor(&self) -> PlaybackCursor {
        self.cursor
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_duration(&self) -> Duration {
        self.spec.bytes_to_duration(self.chunk_size as u64)
    }

    /// How often the driver must call [`StreamingPlayer::tick`].
    ///
    /// Always shorter than [`StreamingPlayer::chunk_duration`].
    pub fn tick_interval(&self) -> Duration {
        self.tick
    }

    pub fn buffers_in_flight(&self) -> usize {
        self.sink.in_flight()
    }

    pub fn underruns(&self) -> u64 {
        self.underruns
    }

    pub fn status(&self) -> PlayerStatus {
        PlayerStatus {
            state: self.state,
            voice: self.sink.state().ok(),
            position_secs: self.position().as_secs_f64(),
            played_secs: self.played().as_secs_f64(),
            duration_secs: self.duration().as_secs_f64(),
            duration_estimated: self.source.duration_is_estimate(),
            buffers_in_flight: self.sink.in_flight(),
            buffer_count: self.buffer_count,
            chunk_bytes: self.chunk_size,
            underruns: self.underruns,
            volume_percent: self.sink.volume_percent(),
            end_reason: self.end_reason,
        }
    }

    /// Dequeue every processed buffer. `played` credits their data as heard.
    fn reclaim(&mut self, played: bool) -> Result<usize> {
        let processed = self.sink.processed_count()?;
        let freed = self.sink.dequeue(processed)?;
        for id in &freed {
            let slot = self.reclaim_slot;
            assert_eq!(
                *id,
                self.pool.handle(slot),
                "device returned buffers out of submission order"
            );
            if played {
                self.played_bytes += self.slot_data[slot] as u64;
            }
            self.slot_data[slot] = 0;
            self.reclaim_slot = (slot + 1) % self.buffer_count;
        }
        Ok(freed.len())
    }

    /// Upload and queue the next chunk. `false` once the source has nothing left.
    fn submit_next(&mut self) -> Result<bool> {
        if !self.pending_upload {
            if self.source_done {
                return Ok(false);
            }
            match self.source.next_chunk(self.chunk_size)? {
                None => {
                    self.source_done = true;
                    return Ok(false);
                }
                Some(chunk) => {
                    self.source_done = chunk.is_last;
                    self.pending_upload = true;
                }
            }
        }

        let Some(chunk) = self.source.last_chunk() else {
            self.pending_upload = false;
            return Ok(false);
        };
        let slot = self.pool.next_slot();
        let id = self
            .pool
            .acquire(slot, chunk.bytes, self.spec.format, self.spec.sample_rate)?;
        let (data_len, padded_len) = (chunk.data_len, chunk.bytes.len());
        self.sink.queue_buffer(id)?;

        self.pool.advance();
        self.pending_upload = false;
        self.slot_data[slot] = data_len;
        self.queued_bytes += padded_len as u64;
        self.cursor.advance(data_len);
        tracing::debug!(slot, bytes = data_len, last = self.source_done, "buffer queued");
        Ok(true)
    }

    fn finish(&mut self, reason: PlaybackEndReason) {
        self.end_reason = Some(reason);
        self.enter(PlayerState::Ended);
    }

    fn enter(&mut self, next: PlayerState) {
        if self.state != next {
            tracing::info!(from = ?self.state, to = ?next, underruns = self.underruns, "player state");
            self.state = next;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::backend::{DequeueTamper, SimulatedBackend, TamperedDequeue};
    use crate::error::PlayerError;
    use crate::source::{Mp3Source, PcmFormat, ScriptedDecoder, WavSource, scripted_frame};
    use crate::wav::WavHeader;

    const MONO16: StreamSpec = StreamSpec {
        sample_rate: 44_100,
        format: PcmFormat::Mono16,
    };

    fn wav_source(spec: StreamSpec, data: &[u8]) -> Box<dyn PcmSource> {
        let mut bytes = WavHeader::for_pcm(spec, data.len() as u32).to_bytes().to_vec();
        bytes.extend_from_slice(data);
        Box::new(WavSource::from_reader(Cursor::new(bytes)).unwrap())
    }

    /// Distinct non-silent 16-bit samples so skipped or repeated data shows up.
    fn pattern(len: usize) -> Vec<u8> {
        (0..len / 2)
            .flat_map(|i| (((i % 30_000) as i16) + 1).to_le_bytes())
            .chain((len % 2 == 1).then_some(0))
            .collect()
    }

    fn as_f32(data: &[u8]) -> Vec<f32> {
        crate::backend::pcm_to_f32(data, PcmFormat::Mono16)
    }

    fn config(buffer_count: usize) -> PlayerConfig {
        PlayerConfig {
            buffer_count,
            buffer_seconds: 1.0,
            tick_interval: None,
        }
    }

    fn mono_player(
        data: &[u8],
    ) -> (Arc<SimulatedBackend>, StreamingPlayer<SimulatedBackend>) {
        let backend = Arc::new(SimulatedBackend::new(44_100, 1).with_capture());
        let player = StreamingPlayer::new(backend.clone(), wav_source(MONO16, data), &config(4))
            .unwrap();
        (backend, player)
    }

    /// Advance the device one chunk at a time and tick until playback ends.
    fn run_to_end(
        backend: &SimulatedBackend,
        player: &mut StreamingPlayer<SimulatedBackend>,
        frames_per_tick: usize,
    ) -> Vec<TickReport> {
        let mut reports = Vec::new();
        let mut last_position = player.position();
        for _ in 0..10_000 {
            if player.state() == PlayerState::Ended {
                break;
            }
            backend.advance_frames(frames_per_tick);
            reports.push(player.tick().unwrap());
            assert!(player.position() >= last_position);
            assert!(player.position() <= player.duration());
            assert!(player.buffers_in_flight() <= 4);
            last_position = player.position();
        }
        reports
    }

    #[test]
    fn quad_buffered_wav_plays_every_byte_once() {
        let data = pattern(220_500);
        let (backend, mut player) = mono_player(&data);
        assert_eq!(player.chunk_size(), 22_050);

        player.start().unwrap();
        assert_eq!(player.state(), PlayerState::Streaming);
        assert_eq!(player.cursor().delivered_bytes, 88_200);
        assert_eq!(player.buffers_in_flight(), 4);

        // Six refills bring the cursor to 220500; the tenth chunk carries is_last.
        for i in 1..=6 {
            backend.advance_frames(11_025);
            let report = player.tick().unwrap();
            assert_eq!(report.reclaimed, 1);
            assert_eq!(report.refilled, 1);
            assert_eq!(player.buffers_in_flight(), 4);
            assert_eq!(player.cursor().delivered_bytes, 88_200 + 22_050 * i);
        }
        assert_eq!(player.state(), PlayerState::Draining);

        let reports = run_to_end(&backend, &mut player, 11_025);
        assert_eq!(reports.iter().filter(|r| r.ended).count(), 1);
        assert!(reports.iter().all(|r| r.refilled == 0));
        assert_eq!(player.end_reason(), Some(PlaybackEndReason::Eof));
        assert_eq!(player.played(), Duration::from_secs_f64(2.5));
        assert_eq!(player.underruns(), 0);

        let captured = backend.captured();
        assert_eq!(captured, as_f32(&data));
    }

    #[test]
    fn short_tail_is_padded_with_silence() {
        let data = pattern(221_500);
        let (backend, mut player) = mono_player(&data);
        player.start().unwrap();
        let reports = run_to_end(&backend, &mut player, 11_025);

        assert_eq!(reports.iter().filter(|r| r.ended).count(), 1);
        assert_eq!(player.cursor().delivered_bytes, 221_500);
        assert_eq!(player.position(), player.duration());

        let captured = backend.captured();
        let expected = as_f32(&data);
        assert_eq!(&captured[..expected.len()], expected.as_slice());
        assert!(captured[expected.len()..].iter().all(|&s| s == 0.0));
    }

    #[test]
    fn stream_shorter_than_pool_ends_exactly_once() {
        let data = pattern(30_000);
        let (backend, mut player) = mono_player(&data);
        let report = player.start().unwrap();
        assert_eq!(report.refilled, 2);
        assert_eq!(player.state(), PlayerState::Draining);

        let mut ended = 0;
        for _ in 0..5 {
            backend.advance_frames(11_025);
            let report = player.tick().unwrap();
            assert_eq!(report.refilled, 0);
            ended += report.ended as usize;
        }
        assert_eq!(ended, 1);
        assert_eq!(player.state(), PlayerState::Ended);
        assert_eq!(player.played(), MONO16.bytes_to_duration(30_000));
    }

    #[test]
    fn empty_stream_ends_during_priming() {
        let (_backend, mut player) = mono_player(&[]);
        let report = player.start().unwrap();
        assert!(report.ended);
        assert_eq!(player.state(), PlayerState::Ended);
        assert!(!player.tick().unwrap().ended);
    }

    #[test]
    fn starved_voice_is_restarted_after_refill() {
        let data = pattern(220_500);
        let (backend, mut player) = mono_player(&data);
        player.start().unwrap();

        // The device plays everything queued and stops.
        backend.advance_frames(60_000);
        let report = player.tick().unwrap();
        assert_eq!(report.reclaimed, 4);
        assert_eq!(report.refilled, 4);
        assert!(report.underrun_recovered);
        assert_eq!(player.underruns(), 1);
        assert_eq!(player.status().voice, Some(VoiceState::Playing));
    }

    #[test]
    fn paused_voice_is_not_treated_as_underrun() {
        let data = pattern(220_500);
        let (backend, mut player) = mono_player(&data);
        player.start().unwrap();
        player.pause().unwrap();
        backend.advance_frames(60_000);
        let report = player.tick().unwrap();
        assert_eq!(report.reclaimed, 0);
        assert!(!report.underrun_recovered);
        assert_eq!(player.status().voice, Some(VoiceState::Paused));

        player.toggle_pause().unwrap();
        assert!(!player.is_paused());
        assert_eq!(player.status().voice, Some(VoiceState::Playing));
    }

    #[test]
    fn failed_pause_keeps_playing() {
        let data = pattern(220_500);
        let (backend, mut player) = mono_player(&data);
        player.start().unwrap();

        backend.fail_next_pauses(1);
        assert!(player.toggle_pause().unwrap_err().is_transient());
        assert!(!player.is_paused());
        assert_eq!(player.status().voice, Some(VoiceState::Playing));

        run_to_end(&backend, &mut player, 11_025);
        assert_eq!(player.end_reason(), Some(PlaybackEndReason::Eof));
        assert_eq!(player.underruns(), 0);
    }

    #[test]
    #[should_panic(expected = "device returned buffers out of submission order")]
    fn reclaim_rejects_out_of_order_buffers() {
        let backend = Arc::new(TamperedDequeue {
            inner: SimulatedBackend::new(44_100, 1),
            mode: DequeueTamper::Reverse,
        });
        let mut player = StreamingPlayer::new(
            backend.clone(),
            wav_source(MONO16, &pattern(220_500)),
            &config(4),
        )
        .unwrap();
        player.start().unwrap();

        // Two chunks finish, so the reversed dequeue hands back slot 1 first.
        backend.inner.advance_frames(22_050);
        let _ = player.tick();
    }

    #[test]
    fn failed_upload_is_retried_without_losing_data() {
        let data = pattern(220_500);
        let (backend, mut player) = mono_player(&data);
        player.start().unwrap();

        backend.advance_frames(11_025);
        backend.fail_next_uploads(1);
        let err = player.tick().unwrap_err();
        assert!(matches!(err, PlayerError::Device(_)));
        assert!(err.is_transient());
        assert_eq!(player.state(), PlayerState::Streaming);
        assert_eq!(player.buffers_in_flight(), 3);
        assert_eq!(player.cursor().delivered_bytes, 88_200);

        let report = player.tick().unwrap();
        assert_eq!(report.refilled, 1);
        assert_eq!(player.buffers_in_flight(), 4);

        run_to_end(&backend, &mut player, 11_025);
        assert_eq!(player.end_reason(), Some(PlaybackEndReason::Eof));
        assert_eq!(backend.captured(), as_f32(&data));
    }

    #[test]
    fn stop_is_immediate_and_idempotent() {
        let data = pattern(220_500);
        let (backend, mut player) = mono_player(&data);
        player.start().unwrap();
        backend.advance_frames(5_000);

        player.stop().unwrap();
        let once = player.status();
        player.stop().unwrap();
        let twice = player.status();

        assert_eq!(once.state, PlayerState::Ended);
        assert_eq!(once.end_reason, Some(PlaybackEndReason::Stopped));
        assert_eq!(once.buffers_in_flight, 0);
        assert_eq!(twice.state, once.state);
        assert_eq!(twice.end_reason, once.end_reason);
        assert_eq!(twice.buffers_in_flight, 0);
        assert_eq!(twice.position_secs, once.position_secs);
        assert_eq!(player.tick().unwrap(), TickReport::default());

        drop(player);
        assert_eq!(backend.live_buffers(), 0);
    }

    #[test]
    fn mp3_corrupt_trailer_drains_then_ends() {
        let mut decoder = ScriptedDecoder::stereo(&[1152; 12]);
        // A junk frame, then the decoder gives up mid-file.
        decoder.push(scripted_frame(0, 200), Vec::new());
        let source = Mp3Source::new(decoder, 1_000_000).unwrap();
        let total_bytes = 12 * 1152 * 4;

        let backend = Arc::new(SimulatedBackend::new(44_100, 2).with_capture());
        let cfg = PlayerConfig {
            buffer_count: 3,
            buffer_seconds: 0.1,
            tick_interval: None,
        };
        let mut player = StreamingPlayer::new(backend.clone(), Box::new(source), &cfg).unwrap();
        let chunk_frames = player.chunk_size() / 4;
        player.start().unwrap();

        let mut saw_draining = false;
        let mut ended = 0;
        for _ in 0..1_000 {
            if player.state() == PlayerState::Ended {
                break;
            }
            backend.advance_frames(chunk_frames);
            let report = player.tick().unwrap();
            saw_draining |= player.state() == PlayerState::Draining;
            ended += report.ended as usize;
        }
        assert!(saw_draining);
        assert_eq!(ended, 1);
        assert_eq!(player.end_reason(), Some(PlaybackEndReason::Eof));
        assert_eq!(player.cursor().delivered_bytes, total_bytes as u64);
        assert!(player.status().duration_estimated);

        let captured = backend.captured();
        let audible = captured.iter().filter(|&&s| s != 0.0).count();
        assert_eq!(audible, 12 * 1152 * 2);
    }

    #[test]
    fn volume_and_status_follow_player() {
        let data = pattern(44_100);
        let (_backend, mut player) = mono_player(&data);
        assert_eq!(player.adjust_volume(-30).unwrap(), 70);
        assert_eq!(player.adjust_volume(50).unwrap(), 100);
        player.set_volume_percent(25).unwrap();

        let status = player.status();
        assert_eq!(status.state, PlayerState::Priming);
        assert_eq!(status.volume_percent, 25);
        assert_eq!(status.chunk_bytes, 22_050);
        assert_eq!(status.buffer_count, 4);
        assert!(player.tick_interval() < player.chunk_duration());
    }

    #[test]
    fn construction_rejects_bad_config() {
        let backend = Arc::new(SimulatedBackend::new(44_100, 1));
        let cfg = PlayerConfig {
            buffer_count: 9,
            ..PlayerConfig::default()
        };
        let err = StreamingPlayer::new(backend.clone(), wav_source(MONO16, &[0; 4]), &cfg)
            .err()
            .unwrap();
        assert!(matches!(err, PlayerError::Config(_)));

        let cfg = PlayerConfig {
            tick_interval: Some(Duration::from_secs(1)),
            ..PlayerConfig::default()
        };
        assert!(StreamingPlayer::new(backend.clone(), wav_source(MONO16, &[0; 4]), &cfg).is_err());
        assert_eq!(backend.live_buffers(), 0);
    }
}
