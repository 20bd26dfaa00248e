//! Canonical 44-byte RIFF/WAVE header.
//!
//! Only the fixed layout is understood: `RIFF` size `WAVE`, a 16-byte `fmt ` subchunk,
//! then `data` size, followed directly by little-endian PCM. Extra chunks are rejected.

use std::io::Read;

use crate::error::{FormatError, Result};
use crate::source::{PcmFormat, StreamSpec};

pub const WAV_HEADER_LEN: usize = 44;

const PCM_FORMAT_CODE: u16 = 1;
const PCM_FMT_SIZE: u32 = 16;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WavHeader {
    /// RIFF chunk size (file size - 8).
    pub riff_size: u32,
    pub fmt_size: u32,
    pub audio_format: u16,
    pub channels: u16,
    pub sample_rate: u32,
    pub byte_rate: u32,
    pub block_align: u16,
    pub bits_per_sample: u16,
    /// Bytes of PCM following the header.
    pub data_size: u32,
}

impl WavHeader {
    /// Header describing `data_size` bytes of PCM in `spec`.
    pub fn for_pcm(spec: StreamSpec, data_size: u32) -> Self {
        Self {
            riff_size: (WAV_HEADER_LEN as u32 - 8).saturating_add(data_size),
            fmt_size: PCM_FMT_SIZE,
            audio_format: PCM_FORMAT_CODE,
            channels: spec.format.channels(),
            sample_rate: spec.sample_rate,
            byte_rate: spec.byte_rate(),
            block_align: spec.format.block_align() as u16,
            bits_per_sample: spec.format.bits(),
            data_size,
        }
    }

    /// Read and validate a header, leaving `reader` at the first PCM byte.
    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self> {
        let mut raw = Vec::with_capacity(WAV_HEADER_LEN);
        reader.take(WAV_HEADER_LEN as u64).read_to_end(&mut raw)?;
        let raw: [u8; WAV_HEADER_LEN] =
            raw.as_slice().try_into().map_err(|_| FormatError::Truncated {
                read: raw.len(),
                expected: WAV_HEADER_LEN,
            })?;
        Ok(Self::parse(&raw)?)
    }

    /// Parse and validate the fixed header fields.
    pub fn parse(raw: &[u8; WAV_HEADER_LEN]) -> std::result::Result<Self, FormatError> {
        expect_tag(raw, 0, "RIFF")?;
        expect_tag(raw, 8, "WAVE")?;
        expect_tag(raw, 12, "fmt ")?;
        expect_tag(raw, 36, "data")?;

        let header = Self {
            riff_size: le_u32(raw, 4),
            fmt_size: le_u32(raw, 16),
            audio_format: le_u16(raw, 20),
            channels: le_u16(raw, 22),
            sample_rate: le_u32(raw, 24),
            byte_rate: le_u32(raw, 28),
            block_align: le_u16(raw, 32),
            bits_per_sample: le_u16(raw, 34),
            data_size: le_u32(raw, 40),
        };
        header.validate()?;
        Ok(header)
    }

    fn validate(&self) -> std::result::Result<(), FormatError> {
        if self.fmt_size != PCM_FMT_SIZE {
            return Err(FormatError::UnsupportedFmtSize(self.fmt_size));
        }
        if self.audio_format != PCM_FORMAT_CODE {
            return Err(FormatError::UnsupportedEncoding(self.audio_format));
        }
        let format = PcmFormat::from_layout(self.channels, self.bits_per_sample).ok_or(
            FormatError::UnsupportedLayout {
                channels: self.channels,
                bits: self.bits_per_sample,
            },
        )?;
        if self.sample_rate == 0 {
            return Err(FormatError::Inconsistent("sample rate is zero".to_string()));
        }
        let expected_align = format.block_align() as u16;
        if self.block_align != expected_align {
            return Err(FormatError::Inconsistent(format!(
                "block align {} != {expected_align}",
                self.block_align
            )));
        }
        let expected_rate = self.sample_rate as u64 * expected_align as u64;
        if self.byte_rate as u64 != expected_rate {
            return Err(FormatError::Inconsistent(format!(
                "byte rate {} != {expected_rate}",
                self.byte_rate
            )));
        }
        Ok(())
    }

    /// Stream parameters. Only meaningful on a validated header.
    pub fn spec(&self) -> StreamSpec {
        let format = PcmFormat::from_layout(self.channels, self.bits_per_sample)
            .unwrap_or(PcmFormat::Stereo16);
        StreamSpec::new(self.sample_rate, format)
    }

    /// Playable seconds: `data_size / byte_rate`.
    pub fn duration_secs(&self) -> f64 {
        if self.byte_rate == 0 {
            return 0.0;
        }
        self.data_size as f64 / self.byte_rate as f64
    }

    pub fn to_bytes(&self) -> [u8; WAV_HEADER_LEN] {
        let mut out = [0u8; WAV_HEADER_LEN];
        out[0..4].copy_from_slice(b"RIFF");
        out[4..8].copy_from_slice(&self.riff_size.to_le_bytes());
        out[8..12].copy_from_slice(b"WAVE");
        out[12..16].copy_from_slice(b"fmt ");
        out[16..20].copy_from_slice(&self.fmt_size.to_le_bytes());
        out[20..22].copy_from_slice(&self.audio_format.to_le_bytes());
        out[22..24].copy_from_slice(&self.channels.to_le_bytes());
        out[24..28].copy_from_slice(&self.sample_rate.to_le_bytes());
        out[28..32].copy_from_slice(&self.byte_rate.to_le_bytes());
        out[32..34].copy_from_slice(&self.block_align.to_le_bytes());
        out[34..36].copy_from_slice(&self.bits_per_sample.to_le_bytes());
        out[36..40].copy_from_slice(b"data");
        out[40..44].copy_from_slice(&self.data_size.to_le_bytes());
        out
    }
}

fn expect_tag(
    raw: &[u8; WAV_HEADER_LEN],
    at: usize,
    expected: &'static str,
) -> std::result::Result<(), FormatError> {
    let found = &raw[at..at + 4];
    if found != expected.as_bytes() {
        return Err(FormatError::BadTag {
            expected,
            found: String::from_utf8_lossy(found).into_owned(),
        });
    }
    Ok(())
}

fn le_u16(raw: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([raw[at], raw[at + 1]])
}

fn le_u32(raw: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([raw[at], raw[at + 1], raw[at + 2], raw[at + 3]])
}
