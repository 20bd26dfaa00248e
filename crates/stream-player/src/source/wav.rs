use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use std::time::Duration;

use crate::error::{PlayerError, Result};
use crate::source::{Chunk, PcmSource, SourceInfo, StreamSpec};
use crate::wav::WavHeader;

/// Chunked reader over the PCM payload of a canonical WAV file.
///
/// The final chunk is padded with silence up to the requested size so every device
/// buffer has the same length; [`Chunk::data_len`] tells how much of it is real.
pub struct WavSource<R = BufReader<File>> {
    reader: R,
    header: WavHeader,
    spec: StreamSpec,
    cursor: u64,
    exhausted: bool,
    arena: Vec<u8>,
    last: Option<(usize, bool)>,
}

impl WavSource {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        Self::from_reader(BufReader::new(file))
    }
}

impl<R: Read> WavSource<R> {
    /// Parse the header from `reader`; fails with a format error on any deviation.
    pub fn from_reader(mut reader: R) -> Result<Self> {
        let header = WavHeader::read_from(&mut reader)?;
        let spec = header.spec();
        tracing::debug!(
            channels = header.channels,
            sample_rate = header.sample_rate,
            byte_rate = header.byte_rate,
            block_align = header.block_align,
            bits = header.bits_per_sample,
            data_size = header.data_size,
            duration_secs = header.duration_secs(),
            "wav header"
        );
        Ok(Self {
            reader,
            exhausted: header.data_size == 0,
            header,
            spec,
            cursor: 0,
            arena: Vec::new(),
            last: None,
        })
    }

    pub fn header(&self) -> &WavHeader {
        &self.header
    }

    fn remaining(&self) -> u64 {
        (self.header.data_size as u64).saturating_sub(self.cursor)
    }
}

impl<R: Read> PcmSource for WavSource<R> {
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

        let want = self.remaining().min(max_bytes as u64) as usize;
        self.arena.clear();
        self.arena.resize(max_bytes, self.spec.format.silence());

        let got = read_full(&mut self.reader, &mut self.arena[..want])?;
        if got < want {
            tracing::warn!(
                expected = want,
                read = got,
                cursor = self.cursor,
                "wav data ended before declared size"
            );
            // Whatever partial frame was read is replaced with silence.
            let whole = got - got % self.spec.block_align();
            self.arena[whole..].fill(self.spec.format.silence());
            self.exhausted = true;
            if whole == 0 {
                self.last = None;
                return Ok(None);
            }
            self.cursor += whole as u64;
            self.last = Some((whole, true));
            return Ok(self.last_chunk());
        }

        self.cursor += got as u64;
        let is_last = self.remaining() == 0;
        if is_last {
            self.exhausted = true;
        }
        self.last = Some((got, is_last));
        Ok(self.last_chunk())
    }

    fn last_chunk(&self) -> Option<Chunk<'_>> {
        self.last.map(|(data_len, is_last)| Chunk {
            bytes: &self.arena,
            data_len,
            is_last,
        })
    }

    fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.header.duration_secs())
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
        let h = &self.header;
        let codec = match h.bits_per_sample {
            8 => "PCM_U8",
            _ => "PCM_S16",
        };
        SourceInfo {
            codec: codec.to_string(),
            bitrate_kbps: Some(h.byte_rate * 8 / 1000),
            fields: vec![
                ("riff_size".to_string(), h.riff_size.to_string()),
                ("audio_format".to_string(), h.audio_format.to_string()),
                ("channels".to_string(), h.channels.to_string()),
                ("sample_rate".to_string(), h.sample_rate.to_string()),
                ("byte_rate".to_string(), h.byte_rate.to_string()),
                ("block_align".to_string(), h.block_align.to_string()),
                ("bits_per_sample".to_string(), h.bits_per_sample.to_string()),
                ("data_size".to_string(), h.data_size.to_string()),
                (
                    "duration".to_string(),
                    format!("{:.2}s", h.duration_secs()),
                ),
            ],
        }
    }
}

fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut read = 0;
    while read < buf.len() {
        match reader.read(&mut buf[read..]) {
            Ok(0) => break,
            Ok(n) => read += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(read)
}
