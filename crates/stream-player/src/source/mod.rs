//! PCM sources: a uniform chunked view over WAV and MP3 input.
//!
//! A source hands out the next `max_bytes` of interleaved little-endian PCM per call,
//! tracks its own cursor for position reporting, and signals end-of-stream by returning
//! `None`. Chunk bytes live in an arena owned by the source and stay valid until the next
//! call, so a failed device upload can be retried from [`PcmSource::last_chunk`].

mod mp3;
mod wav;

use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::time::Duration;

use serde::Serialize;

use crate::decode::SymphoniaFrameDecoder;
use crate::error::Result;

pub use mp3::{FrameDecoder, FrameInfo, Mp3Source};
pub use wav::WavSource;

#[cfg(test)]
pub(crate) use mp3::tests::{ScriptedDecoder, frame as scripted_frame};

/// Interleaved integer PCM layouts the output path carries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum PcmFormat {
    Mono8,
    Mono16,
    Stereo8,
    Stereo16,
}

impl PcmFormat {
    pub fn from_layout(channels: u16, bits: u16) -> Option<Self> {
        match (channels, bits) {
            (1, 8) => Some(PcmFormat::Mono8),
            (1, 16) => Some(PcmFormat::Mono16),
            (2, 8) => Some(PcmFormat::Stereo8),
            (2, 16) => Some(PcmFormat::Stereo16),
            _ => None,
        }
    }

    pub fn channels(self) -> u16 {
        match self {
            PcmFormat::Mono8 | PcmFormat::Mono16 => 1,
            PcmFormat::Stereo8 | PcmFormat::Stereo16 => 2,
        }
    }

    pub fn bits(self) -> u16 {
        match self {
            PcmFormat::Mono8 | PcmFormat::Stereo8 => 8,
            PcmFormat::Mono16 | PcmFormat::Stereo16 => 16,
        }
    }

    /// Bytes per interleaved sample frame.
    pub fn block_align(self) -> usize {
        self.channels() as usize * self.bits() as usize / 8
    }

    /// Byte value of digital silence (8-bit PCM is unsigned).
    pub fn silence(self) -> u8 {
        match self.bits() {
            8 => 0x80,
            _ => 0,
        }
    }
}

/// Rate and layout of a PCM stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct StreamSpec {
    pub sample_rate: u32,
    pub format: PcmFormat,
}

impl StreamSpec {
    pub fn new(sample_rate: u32, format: PcmFormat) -> Self {
        Self {
            sample_rate,
            format,
        }
    }

    pub fn byte_rate(&self) -> u32 {
        self.sample_rate * self.format.block_align() as u32
    }

    pub fn block_align(&self) -> usize {
        self.format.block_align()
    }

    /// Seconds of audio in `bytes` of PCM.
    pub fn bytes_to_secs(&self, bytes: u64) -> f64 {
        let rate = self.byte_rate();
        if rate == 0 {
            return 0.0;
        }
        bytes as f64 / rate as f64
    }

    pub fn bytes_to_duration(&self, bytes: u64) -> Duration {
        Duration::from_secs_f64(self.bytes_to_secs(bytes))
    }
}

/// One chunk of PCM borrowed from a source's arena.
#[derive(Clone, Copy, Debug)]
pub struct Chunk<'a> {
    /// Bytes to upload, including any zero padding.
    pub bytes: &'a [u8],
    /// Leading bytes that are real stream data.
    pub data_len: usize,
    /// No further data follows this chunk.
    pub is_last: bool,
}

/// Descriptive metadata for status and `info` output.
#[derive(Clone, Debug, Default, Serialize)]
pub struct SourceInfo {
    /// Codec label, e.g. `PCM_S16` or `MP3`.
    pub codec: String,
    /// Average bitrate in kbps when known.
    pub bitrate_kbps: Option<u32>,
    /// Container-specific fields as `(name, value)` pairs.
    pub fields: Vec<(String, String)>,
}

/// Uniform chunked access to decoded PCM.
pub trait PcmSource {
    fn spec(&self) -> StreamSpec;

    /// Next chunk of at most `max_bytes`, or `None` once the stream is exhausted.
    ///
    /// `max_bytes` should be a multiple of the frame size.
    fn next_chunk(&mut self, max_bytes: usize) -> Result<Option<Chunk<'_>>>;

    /// The chunk most recently returned by [`PcmSource::next_chunk`].
    fn last_chunk(&self) -> Option<Chunk<'_>>;

    /// Total playable time.
    fn duration(&self) -> Duration;

    /// Whether [`PcmSource::duration`] is an estimate rather than exact.
    fn duration_is_estimate(&self) -> bool {
        false
    }

    /// Time covered by the data handed out so far.
    fn position(&self) -> Duration;

    /// Real (unpadded) bytes handed out so far.
    fn cursor(&self) -> u64;

    fn is_exhausted(&self) -> bool;

    fn describe(&self) -> SourceInfo;
}

/// Open `path` as WAV or MP3.
///
/// The extension decides first; otherwise a `RIFF` magic selects WAV and anything else
/// is handed to the MP3 decoder.
pub fn open_source(path: &Path) -> Result<Box<dyn PcmSource>> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    let is_wav = match ext.as_deref() {
        Some("wav") | Some("wave") => true,
        Some("mp3") => false,
        _ => has_riff_magic(path)?,
    };

    if is_wav {
        let source = WavSource::open(path)?;
        Ok(Box::new(source))
    } else {
        let decoder = SymphoniaFrameDecoder::open(path)?;
        let file_bytes = std::fs::metadata(path)?.len();
        let source = Mp3Source::new(decoder, file_bytes)?;
        Ok(Box::new(source))
    }
}

fn has_riff_magic(path: &Path) -> Result<bool> {
    let mut magic = [0u8; 4];
    match File::open(path)?.read_exact(&mut magic) {
        Ok(()) => Ok(&magic == b"RIFF"),
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Ok(false),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_layouts() {
        assert_eq!(PcmFormat::from_layout(2, 16), Some(PcmFormat::Stereo16));
        assert_eq!(PcmFormat::from_layout(1, 24), None);
        assert_eq!(PcmFormat::Stereo16.block_align(), 4);
        assert_eq!(PcmFormat::Mono8.block_align(), 1);
        assert_eq!(PcmFormat::Stereo8.silence(), 0x80);
    }

    #[test]
    fn spec_converts_bytes_to_time() {
        let spec = StreamSpec::new(44_100, PcmFormat::Stereo16);
        assert_eq!(spec.byte_rate(), 176_400);
        assert!((spec.bytes_to_secs(88_200) - 0.5).abs() < 1e-9);
        assert_eq!(spec.bytes_to_duration(176_400), Duration::from_secs(1));
    }

    #[test]
    fn riff_magic_needs_four_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let short = dir.path().join("short");
        std::fs::write(&short, b"RI").unwrap();
        assert!(!has_riff_magic(&short).unwrap());

        let other = dir.path().join("other");
        std::fs::write(&other, b"ID3\x04rest").unwrap();
        assert!(!has_riff_magic(&other).unwrap());
    }

    #[test]
    fn open_source_sniffs_riff_without_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.bin");
        let header = crate::wav::WavHeader::for_pcm(StreamSpec::new(8_000, PcmFormat::Mono8), 4);
        let mut bytes = header.to_bytes().to_vec();
        bytes.extend_from_slice(&[1, 2, 3, 4]);
        std::fs::write(&path, bytes).unwrap();

        let source = open_source(&path).unwrap();
        assert_eq!(source.spec(), StreamSpec::new(8_000, PcmFormat::Mono8));
        assert_eq!(source.describe().codec, "PCM_U8");
    }
}
