//! MP3 frame decoding.
//!
//! Uses Symphonia to:
//! - probe the input container and pick the default track
//! - decode one packet (one MP3 frame) per call into interleaved `i16`
//! - report per-frame size/bitrate so [`Mp3Source`](crate::source::Mp3Source) can
//!   accumulate variable-length frames into fixed chunks

use std::fs::File;
use std::path::Path;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{CodecParameters, Decoder, DecoderOptions};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::{MediaSource, MediaSourceStream};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::error::{FormatError, Result};
use crate::source::{FrameDecoder, FrameInfo};

/// [`FrameDecoder`] backed by Symphonia's MP3 codec.
///
/// Demuxer and decoder errors never escape: junk packets come back as zero-sample
/// frames, and anything that ends the packet stream comes back as `frame_bytes == 0`.
pub struct SymphoniaFrameDecoder {
    format: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    total_frames: Option<u64>,
}

impl SymphoniaFrameDecoder {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let mut hint = Hint::new();
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        } else {
            hint.with_extension("mp3");
        }
        Self::from_media_source(Box::new(file), hint)
    }

    /// Probe an arbitrary Symphonia [`MediaSource`].
    pub fn from_media_source(source: Box<dyn MediaSource>, hint: Hint) -> Result<Self> {
        let mss = MediaSourceStream::new(source, Default::default());
        let probed = symphonia::default::get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| FormatError::Probe(e.to_string()))?;

        let format = probed.format;
        let track = format
            .default_track()
            .ok_or_else(|| FormatError::Probe("no default audio track".to_string()))?;
        let codec_params: CodecParameters = track.codec_params.clone();
        let track_id = track.id;

        let decoder = symphonia::default::get_codecs()
            .make(&codec_params, &DecoderOptions::default())
            .map_err(|e| FormatError::Probe(e.to_string()))?;

        Ok(Self {
            format,
            decoder,
            track_id,
            total_frames: codec_params.n_frames,
        })
    }
}

impl FrameDecoder for SymphoniaFrameDecoder {
    fn decode_frame(&mut self, pcm: &mut Vec<i16>) -> Result<FrameInfo> {
        loop {
            let packet = match self.format.next_packet() {
                Ok(p) => p,
                Err(SymphoniaError::IoError(e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    return Ok(FrameInfo::default());
                }
                Err(e) => {
                    tracing::warn!("mp3 demux stopped: {e}");
                    return Ok(FrameInfo::default());
                }
            };
            if packet.track_id() != self.track_id {
                continue;
            }

            let frame_bytes = packet.buf().len().max(1);
            return match self.decoder.decode(&packet) {
                Ok(decoded) => {
                    let spec = *decoded.spec();
                    let frames = decoded.frames();
                    if frames > 0 {
                        let mut sample_buf = SampleBuffer::<i16>::new(frames as u64, spec);
                        sample_buf.copy_interleaved_ref(decoded);
                        pcm.extend_from_slice(sample_buf.samples());
                    }
                    Ok(FrameInfo {
                        samples: frames,
                        channels: spec.channels.count() as u16,
                        sample_rate: spec.rate,
                        bitrate_kbps: frame_bitrate_kbps(frame_bytes, frames, spec.rate),
                        frame_bytes,
                    })
                }
                Err(SymphoniaError::DecodeError(e)) => {
                    tracing::warn!(frame_bytes, "mp3 frame skipped: {e}");
                    Ok(FrameInfo {
                        frame_bytes,
                        ..FrameInfo::default()
                    })
                }
                Err(e) => {
                    tracing::warn!("mp3 decoder stopped: {e}");
                    Ok(FrameInfo::default())
                }
            };
        }
    }

    fn total_frames(&self) -> Option<u64> {
        self.total_frames
    }
}

/// Bitrate implied by one frame: `bytes * 8 * rate / samples`, in kbps.
fn frame_bitrate_kbps(frame_bytes: usize, samples: usize, sample_rate: u32) -> u32 {
    if samples == 0 || sample_rate == 0 {
        return 0;
    }
    let bits_per_sec = frame_bytes as u64 * 8 * sample_rate as u64 / samples as u64;
    ((bits_per_sec + 500) / 1000) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_bitrate_matches_layer3_cbr() {
        // 128 kbps at 44.1 kHz: 417-byte frames of 1152 samples
        assert_eq!(frame_bitrate_kbps(417, 1152, 44_100), 128);
        // 320 kbps at 48 kHz: 960-byte frames
        assert_eq!(frame_bitrate_kbps(960, 1152, 48_000), 320);
    }

    #[test]
    fn frame_bitrate_handles_empty_frames() {
        assert_eq!(frame_bitrate_kbps(417, 0, 44_100), 0);
        assert_eq!(frame_bitrate_kbps(417, 1152, 0), 0);
    }

    #[test]
    fn open_rejects_non_audio() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("noise.mp3");
        std::fs::write(&path, b"definitely not an mpeg stream").unwrap();
        assert!(SymphoniaFrameDecoder::open(&path).is_err());
    }
}
