use std::collections::VecDeque;
use std::time::Duration;

use crate::error::{FormatError, PlayerError, Result};
use crate::source::{Chunk, PcmFormat, PcmSource, SourceInfo, StreamSpec};

/// Result of decoding one compressed frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameInfo {
    /// Sample frames produced (per channel). Zero for skipped junk.
    pub samples: usize,
    pub channels: u16,
    pub sample_rate: u32,
    pub bitrate_kbps: u32,
    /// Compressed bytes consumed. Zero means end of stream or undecodable data.
    pub frame_bytes: usize,
}

/// Frame-at-a-time MP3 bitstream decoder.
pub trait FrameDecoder {
    /// Decode the next frame, appending interleaved `i16` samples to `pcm`.
    fn decode_frame(&mut self, pcm: &mut Vec<i16>) -> Result<FrameInfo>;

    /// Exact stream length in sample frames, when the bitstream header carries it.
    fn total_frames(&self) -> Option<u64> {
        None
    }
}

/// Chunked PCM view over a [`FrameDecoder`].
///
/// Decoded frames vary in size, so samples accumulate in a byte ring until a full
/// chunk is available. After the decoder reports `frame_bytes == 0` the ring is drained
/// and the last chunk may be shorter than requested; it is never padded.
pub struct Mp3Source<D> {
    decoder: D,
    spec: StreamSpec,
    ring: VecDeque<u8>,
    scratch: Vec<i16>,
    arena: Vec<u8>,
    last: Option<bool>,
    cursor: u64,
    end_of_stream: bool,
    exhausted: bool,
    duration: Duration,
    duration_estimated: bool,
    first_frame: FrameInfo,
    frames_decoded: u64,
    compressed_bytes: u64,
    decoded_frames: u64,
}

impl<D: FrameDecoder> Mp3Source<D> {
    /// Decode up to the first audible frame to learn the stream layout.
    ///
    /// `file_bytes` is the compressed size, used only for the duration estimate.
    pub fn new(mut decoder: D, file_bytes: u64) -> Result<Self> {
        let mut scratch = Vec::new();
        let mut skipped = 0u64;
        let first = loop {
            scratch.clear();
            let info = decoder.decode_frame(&mut scratch)?;
            if info.frame_bytes == 0 {
                return Err(FormatError::NoFrames.into());
            }
            if info.samples > 0 {
                break info;
            }
            skipped += info.frame_bytes as u64;
        };

        let format = PcmFormat::from_layout(first.channels, 16).ok_or(
            FormatError::UnsupportedLayout {
                channels: first.channels,
                bits: 16,
            },
        )?;
        if first.sample_rate == 0 {
            return Err(FormatError::Inconsistent("mp3 frame reports 0 Hz".to_string()).into());
        }
        let spec = StreamSpec::new(first.sample_rate, format);

        let (duration, duration_estimated) = match decoder.total_frames() {
            Some(frames) => (
                Duration::from_secs_f64(frames as f64 / first.sample_rate as f64),
                false,
            ),
            None => (estimate_duration(file_bytes, &first), true),
        };
        tracing::debug!(
            channels = first.channels,
            sample_rate = first.sample_rate,
            bitrate_kbps = first.bitrate_kbps,
            frame_bytes = first.frame_bytes,
            skipped_bytes = skipped,
            duration_secs = duration.as_secs_f64(),
            estimated = duration_estimated,
            "mp3 stream"
        );

        let mut source = Self {
            decoder,
            spec,
            ring: VecDeque::new(),
            scratch: Vec::new(),
            arena: Vec::new(),
            last: None,
            cursor: 0,
            end_of_stream: false,
            exhausted: false,
            duration,
            duration_estimated,
            first_frame: first,
            frames_decoded: 1,
            compressed_bytes: skipped + first.frame_bytes as u64,
            decoded_frames: first.samples as u64,
        };
        source.push_samples(&scratch);
        Ok(source)
    }

    fn push_samples(&mut self, samples: &[i16]) {
        for s in samples {
            self.ring.extend(s.to_le_bytes());
        }
    }

    /// Decode one more frame into the ring.
    fn decode_one(&mut self) -> Result<()> {
        self.scratch.clear();
        let mut scratch = std::mem::take(&mut self.scratch);
        let decoded = self.decoder.decode_frame(&mut scratch);
        let info = match decoded {
            Ok(info) => info,
            Err(e) => {
                self.scratch = scratch;
                return Err(e);
            }
        };

        if info.frame_bytes == 0 {
            tracing::debug!(frames = self.frames_decoded, "mp3 end of stream");
            self.end_of_stream = true;
        } else {
            self.frames_decoded += 1;
            self.compressed_bytes += info.frame_bytes as u64;
            if info.samples > 0 {
                let spec = self.spec;
                if info.channels != spec.format.channels() || info.sample_rate != spec.sample_rate {
                    tracing::warn!(
                        channels = info.channels,
                        sample_rate = info.sample_rate,
                        "mp3 frame layout changed mid-stream; frame dropped"
                    );
                } else {
                    self.decoded_frames += info.samples as u64;
                    self.push_samples(&scratch);
                }
            }
        }
        self.scratch = scratch;
        Ok(())
    }
}

impl<D: FrameDecoder> PcmSource for Mp3Source<D> {
    fn spec(&self) -> StreamSpec {
        self.spec
    }

    fn next_chunk(&mut self, max_bytes: usize) -> Result<Option<Chunk<'_>>> {
        if max_bytes == 0 {
            return Err(PlayerError::Config("chunk size must be positive".to_string()));
        }
        if self.exhausted {
            self.last = None;
            return Ok(None);
        }

        while self.ring.len() < max_bytes && !self.end_of_stream {
            self.decode_one()?;
        }

        let mut take = self.ring.len().min(max_bytes);
        take -= take % self.spec.block_align();
        if take == 0 {
            self.exhausted = true;
            self.last = None;
            return Ok(None);
        }

        self.arena.clear();
        self.arena.extend(self.ring.drain(..take));
        self.cursor += take as u64;

        let is_last = self.end_of_stream && self.ring.len() < self.spec.block_align();
        if is_last {
            self.exhausted = true;
        }
        self.last = Some(is_last);
        Ok(self.last_chunk())
    }

    fn last_chunk(&self) -> Option<Chunk<'_>> {
        self.last.map(|is_last| Chunk {
            bytes: &self.arena,
            data_len: self.arena.len(),
            is_last,
        })
    }

    fn duration(&self) -> Duration {
        self.duration
    }

    fn duration_is_estimate(&self) -> bool {
        self.duration_estimated
    }

    fn position(&self) -> Duration {
        self.spec.bytes_to_duration(self.cursor)
    }

    fn cursor(&self) -> u64 {
        self.cursor
    }

    fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    fn describe(&self) -> SourceInfo {
        let avg_kbps = if self.decoded_frames > 0 {
            let secs = self.decoded_frames as f64 / self.spec.sample_rate as f64;
            Some((self.compressed_bytes as f64 * 8.0 / secs / 1000.0).round() as u32)
        } else {
            None
        };
        let f = &self.first_frame;
        SourceInfo {
            codec: "MP3".to_string(),
            bitrate_kbps: avg_kbps.or(Some(f.bitrate_kbps)),
            fields: vec![
                ("channels".to_string(), f.channels.to_string()),
                ("sample_rate".to_string(), f.sample_rate.to_string()),
                ("first_frame_bitrate_kbps".to_string(), f.bitrate_kbps.to_string()),
                ("first_frame_bytes".to_string(), f.frame_bytes.to_string()),
                ("frames_decoded".to_string(), self.frames_decoded.to_string()),
                (
                    "duration".to_string(),
                    format!(
                        "{}{:.2}s",
                        if self.duration_estimated { "~" } else { "" },
                        self.duration.as_secs_f64()
                    ),
                ),
            ],
        }
    }
}

/// Best-effort duration from compressed size.
///
/// Assumes every frame matches the first one (constant bitrate); variable-bitrate
/// streams without a length header will be off.
fn estimate_duration(file_bytes: u64, first: &FrameInfo) -> Duration {
    if first.bitrate_kbps > 0 {
        let secs = file_bytes as f64 * 8.0 / (first.bitrate_kbps as f64 * 1000.0);
        return Duration::from_secs_f64(secs);
    }
    if first.frame_bytes > 0 && first.sample_rate > 0 {
        let frames = file_bytes as f64 / first.frame_bytes as f64;
        let secs = frames * first.samples as f64 / first.sample_rate as f64;
        return Duration::from_secs_f64(secs);
    }
    Duration::ZERO
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Decoder that replays a fixed list of frames, then reports end of stream.
    pub(crate) struct ScriptedDecoder {
        frames: VecDeque<(FrameInfo, Vec<i16>)>,
        pub(crate) total: Option<u64>,
    }

    impl ScriptedDecoder {
        /// Frames of `sizes[i]` stereo samples at 44.1 kHz with a running sample counter.
        pub(crate) fn stereo(sizes: &[usize]) -> Self {
            let mut next = 0i16;
            let frames = sizes
                .iter()
                .map(|&n| {
                    let pcm: Vec<i16> = (0..n * 2)
                        .map(|_| {
                            next = next.wrapping_add(1);
                            next
                        })
                        .collect();
                    (frame(n, 417), pcm)
                })
                .collect();
            Self {
                frames,
                total: None,
            }
        }

        pub(crate) fn push(&mut self, info: FrameInfo, pcm: Vec<i16>) {
            self.frames.push_back((info, pcm));
        }
    }

    pub(crate) fn frame(samples: usize, frame_bytes: usize) -> FrameInfo {
        FrameInfo {
            samples,
            channels: 2,
            sample_rate: 44_100,
            bitrate_kbps: 128,
            frame_bytes,
        }
    }

    impl FrameDecoder for ScriptedDecoder {
        fn decode_frame(&mut self, pcm: &mut Vec<i16>) -> Result<FrameInfo> {
            match self.frames.pop_front() {
                Some((info, samples)) => {
                    pcm.extend_from_slice(&samples);
                    Ok(info)
                }
                None => Ok(FrameInfo::default()),
            }
        }

        fn total_frames(&self) -> Option<u64> {
            self.total
        }
    }

    fn all_bytes(sizes: &[usize]) -> Vec<u8> {
        let total: usize = sizes.iter().sum::<usize>() * 2;
        (1..=total as i16).flat_map(|s| s.to_le_bytes()).collect()
    }

    #[test]
    fn accumulates_variable_frames_into_fixed_chunks() {
        let sizes = [1152, 576, 1152, 100];
        let mut src = Mp3Source::new(ScriptedDecoder::stereo(&sizes), 10_000).unwrap();
        assert_eq!(src.spec(), StreamSpec::new(44_100, PcmFormat::Stereo16));

        let mut out = Vec::new();
        let mut lens = Vec::new();
        while let Some(c) = src.next_chunk(4_000).unwrap() {
            lens.push((c.bytes.len(), c.is_last));
            out.extend_from_slice(&c.bytes[..c.data_len]);
        }
        assert_eq!(out, all_bytes(&sizes));
        // 2980 frames * 4 bytes = 11920 = 2 full chunks + 3920 tail
        assert_eq!(lens, vec![(4_000, false), (4_000, false), (3_920, true)]);
        assert_eq!(src.cursor(), 11_920);
    }

    #[test]
    fn junk_frames_are_skipped() {
        let mut dec = ScriptedDecoder::stereo(&[]);
        dec.push(frame(0, 300), Vec::new());
        dec.push(frame(2, 417), vec![1, 2, 3, 4]);
        dec.push(frame(0, 90), Vec::new());
        dec.push(frame(1, 417), vec![5, 6]);
        let mut src = Mp3Source::new(dec, 1_224).unwrap();
        let c = src.next_chunk(64).unwrap().unwrap();
        assert_eq!(c.bytes.len(), 12);
        assert!(c.is_last);
        assert!(src.next_chunk(64).unwrap().is_none());
    }

    #[test]
    fn zero_frame_bytes_mid_stream_ends_cleanly() {
        let mut dec = ScriptedDecoder::stereo(&[1152, 1152]);
        dec.push(FrameInfo::default(), Vec::new());
        dec.push(frame(1152, 417), vec![7; 2304]);
        let mut src = Mp3Source::new(dec, 100_000).unwrap();
        let mut total = 0;
        while let Some(c) = src.next_chunk(1_000).unwrap() {
            total += c.data_len;
        }
        assert_eq!(total, 2 * 1152 * 4);
        assert!(src.is_exhausted());
    }

    #[test]
    fn exact_fill_then_end_of_stream_returns_none() {
        let mut src = Mp3Source::new(ScriptedDecoder::stereo(&[250]), 417).unwrap();
        let c = src.next_chunk(1_000).unwrap().unwrap();
        assert_eq!(c.bytes.len(), 1_000);
        assert!(!c.is_last);
        assert!(src.next_chunk(1_000).unwrap().is_none());
        assert!(src.is_exhausted());
    }

    #[test]
    fn open_without_frames_is_format_error() {
        let dec = ScriptedDecoder::stereo(&[]);
        assert!(matches!(
            Mp3Source::new(dec, 0),
            Err(PlayerError::Format(FormatError::NoFrames))
        ));
    }

    #[test]
    fn duration_prefers_header_frame_count() {
        let mut dec = ScriptedDecoder::stereo(&[1152]);
        dec.total = Some(441_000);
        let src = Mp3Source::new(dec, 1).unwrap();
        assert_eq!(src.duration(), Duration::from_secs(10));
        assert!(!src.duration_is_estimate());
    }

    #[test]
    fn duration_estimate_uses_bitrate() {
        // 160 000 bytes at 128 kbps = 10 s
        let src = Mp3Source::new(ScriptedDecoder::stereo(&[1152]), 160_000).unwrap();
        assert_eq!(src.duration(), Duration::from_secs(10));
        assert!(src.duration_is_estimate());
    }

    #[test]
    fn estimate_falls_back_to_frame_count() {
        let mut first = frame(1152, 417);
        first.bitrate_kbps = 0;
        let d = estimate_duration(417 * 100, &first);
        let expected = 100.0 * 1152.0 / 44_100.0;
        assert!((d.as_secs_f64() - expected).abs() < 1e-9);
    }
}
