use std::collections::HashMap;

use log::{debug, warn};

use super::{default_channel_mask, Container, ContainerKind};
use crate::error::{Error, Result};
use crate::format::{ByteOrder, SampleFormat};
use crate::options::OpenOptions;
use crate::source::{MediaSource, SourceStream};
use crate::stream::PcmStream;

pub const WAVE_FORMAT_PCM: u16 = 0x0001;
pub const WAVE_FORMAT_IEEE_FLOAT: u16 = 0x0003;
pub const WAVE_FORMAT_EXTENSIBLE: u16 = 0xFFFE;

/// Data chunk sizes that mean "unknown, read until the stream ends".
const STREAMING_SIZES: [u32; 2] = [0, u32::MAX];

/// RIFF/WAVE files carrying linear PCM or IEEE float samples.
#[derive(Debug, Clone, Copy, Default)]
pub struct WaveContainer;

impl Container for WaveContainer {
    fn probe(&self, window: &[u8]) -> u32 {
        if window.len() >= 12 && &window[0..4] == b"RIFF" && &window[8..12] == b"WAVE" {
            100
        } else {
            0
        }
    }

    fn init<R: MediaSource>(&self, stream: &mut PcmStream<R>, options: &OpenOptions) -> Result<()> {
        let header = WaveHeader::parse(&mut stream.io)?;
        let format = header.sample_format()?;
        header.apply(stream, format, options.read_to_eof);
        Ok(())
    }
}

/// Contents of the "fmt " chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
struct FormatChunk {
    format_tag: u16,
    channels: u16,
    sample_rate: u32,
    block_align: u16,
    bits_per_sample: u16,
    /// Only present in WAVE_FORMAT_EXTENSIBLE headers.
    channel_mask: Option<u32>,
    sub_format: Option<u16>,
}

impl FormatChunk {
    /// The tag describing the sample encoding, looking through EXTENSIBLE.
    fn effective_tag(&self) -> u16 {
        match (self.format_tag, self.sub_format) {
            (WAVE_FORMAT_EXTENSIBLE, Some(sub)) => sub,
            (tag, _) => tag,
        }
    }
}

/// Everything the header tells us, gathered before the stream is touched.
#[derive(Debug, Clone)]
struct WaveHeader {
    fmt: FormatChunk,
    data_start: u64,
    data_size: u32,
    metadata: HashMap<String, String>,
}

impl WaveHeader {
    const RIFF_ID: [u8; 4] = *b"RIFF";
    const WAVE_ID: [u8; 4] = *b"WAVE";

    /// Reads the RIFF header and walks chunks up to the start of "data".
    fn parse<R: MediaSource>(io: &mut SourceStream<R>) -> Result<Self> {
        let mut parser = ChunkParser::new(io);

        if parser.read_exact::<4>()? != Self::RIFF_ID {
            return Err(Error::InvalidData("Invalid RIFF identifier"));
        }
        let _riff_size = parser.read_u32_le()?;
        if parser.read_exact::<4>()? != Self::WAVE_ID {
            return Err(Error::InvalidData("Invalid WAVE identifier"));
        }

        let mut fmt = None;
        let mut metadata = HashMap::new();
        loop {
            let id = parser.read_exact::<4>()?;
            let size = parser.read_u32_le()?;
            match &id {
                b"fmt " => {
                    let chunk = parser.parse_format_chunk(size)?;
                    if fmt.is_some() {
                        warn!("Multiple 'fmt ' chunks found. Using the first one.");
                    } else {
                        fmt = Some(chunk);
                    }
                }
                b"LIST" => parser.parse_list_chunk(size, &mut metadata)?,
                b"data" => {
                    let fmt = fmt.ok_or(Error::InvalidData("'data' chunk precedes 'fmt ' chunk"))?;
                    return Ok(Self {
                        fmt,
                        data_start: parser.cursor,
                        data_size: size,
                        metadata,
                    });
                }
                other => {
                    debug!("skipping '{}' chunk ({size} bytes)", String::from_utf8_lossy(other));
                    parser.skip_bytes(size as u64)?;
                }
            }
            parser.align_cursor(size)?;
        }
    }

    fn sample_format(&self) -> Result<SampleFormat> {
        let fmt = &self.fmt;
        if fmt.channels == 0 {
            return Err(Error::InvalidData("Number of channels cannot be zero"));
        }
        if fmt.sample_rate == 0 {
            return Err(Error::InvalidData("Sample rate cannot be zero"));
        }
        let format = match (fmt.effective_tag(), fmt.bits_per_sample) {
            (WAVE_FORMAT_PCM, 8) => SampleFormat::U8,
            (WAVE_FORMAT_PCM, 16) => SampleFormat::S16,
            (WAVE_FORMAT_PCM, 20) => SampleFormat::S20,
            (WAVE_FORMAT_PCM, 24) => SampleFormat::S24,
            (WAVE_FORMAT_PCM, 32) => SampleFormat::S32,
            (WAVE_FORMAT_IEEE_FLOAT, 32) => SampleFormat::Float,
            (WAVE_FORMAT_IEEE_FLOAT, 64) => SampleFormat::Double,
            (WAVE_FORMAT_PCM | WAVE_FORMAT_IEEE_FLOAT, bits) => {
                return Err(Error::UnsupportedFormat(format!(
                    "{bits} bits per sample for WAVE format tag 0x{:04X}",
                    fmt.effective_tag()
                )))
            }
            (tag, _) => {
                return Err(Error::UnsupportedFormat(format!(
                    "WAVE format tag 0x{tag:04X}"
                )))
            }
        };
        Ok(format)
    }

    fn apply<R: MediaSource>(self, stream: &mut PcmStream<R>, format: SampleFormat, force_eof: bool) {
        let fmt = &self.fmt;
        let mut read_to_eof = force_eof;
        let mut data_size = self.data_size as u64;
        if STREAMING_SIZES.contains(&self.data_size) {
            warn!("WAVE data size is unset (0x{:08X}); reading until end of stream", self.data_size);
            read_to_eof = true;
            data_size = 0;
        }
        if stream.seekable && stream.file_size > 0 {
            let available = stream.file_size.saturating_sub(self.data_start);
            if data_size == 0 {
                data_size = available;
            } else if data_size > available {
                warn!(
                    "WAVE data chunk claims {data_size} bytes but only {available} follow; truncating"
                );
                data_size = available;
            }
        }

        stream.container = ContainerKind::Wave;
        stream.wav_format = fmt.effective_tag();
        stream.channels = fmt.channels;
        stream.channel_mask = fmt
            .channel_mask
            .filter(|&mask| mask != 0)
            .unwrap_or_else(|| default_channel_mask(fmt.channels));
        stream.sample_rate = fmt.sample_rate;
        stream.data_start = self.data_start;
        stream.data_size = data_size;
        stream.position = self.data_start;
        stream.read_to_eof = read_to_eof;
        stream.bind_source(format, ByteOrder::Little);

        if stream.block_align != fmt.block_align as u32 {
            warn!(
                "WAVE header block align {} does not match {}-bit x{}; using {}",
                fmt.block_align, fmt.bits_per_sample, fmt.channels, stream.block_align
            );
        }
        if data_size % stream.block_align as u64 != 0 {
            warn!(
                "Data chunk size ({data_size}) is not a multiple of block align ({}). Trailing bytes are ignored.",
                stream.block_align
            );
        }
        stream.metadata = self.metadata;
    }
}

/// Walks RIFF chunks on a forward-only stream, tracking the absolute offset.
struct ChunkParser<'a, R: MediaSource> {
    io: &'a mut SourceStream<R>,
    cursor: u64,
}

impl<'a, R: MediaSource> ChunkParser<'a, R> {
    fn new(io: &'a mut SourceStream<R>) -> Self {
        Self { io, cursor: 0 }
    }

    #[inline]
    fn read_exact<const N: usize>(&mut self) -> Result<[u8; N]> {
        let buf = self.io.read_exact::<N>()?;
        self.cursor += N as u64;
        Ok(buf)
    }

    #[inline]
    fn read_u16_le(&mut self) -> Result<u16> {
        Ok(u16::from_le_bytes(self.read_exact::<2>()?))
    }

    #[inline]
    fn read_u32_le(&mut self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.read_exact::<4>()?))
    }

    fn read_vec(&mut self, n: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0; n];
        if self.io.read(&mut buf)? != n {
            return Err(Error::InvalidData("Unexpected end of file inside a chunk"));
        }
        self.cursor += n as u64;
        Ok(buf)
    }

    fn skip_bytes(&mut self, n: u64) -> Result<()> {
        let skipped = self.io.skip(n)?;
        self.cursor += skipped;
        if skipped != n {
            return Err(Error::InvalidData("Unexpected end of file inside a chunk"));
        }
        Ok(())
    }

    /// Chunks are padded to an even size.
    fn align_cursor(&mut self, chunk_size: u32) -> Result<()> {
        if chunk_size % 2 != 0 {
            // Missing padding at the very end of a file is tolerated.
            self.cursor += self.io.skip(1)?;
        }
        Ok(())
    }

    fn parse_format_chunk(&mut self, chunk_size: u32) -> Result<FormatChunk> {
        if chunk_size < 16 {
            return Err(Error::InvalidData("Invalid 'fmt ' chunk size (< 16 bytes)"));
        }

        let format_tag = self.read_u16_le()?;
        let channels = self.read_u16_le()?;
        let sample_rate = self.read_u32_le()?;
        let _byte_rate = self.read_u32_le()?;
        let block_align = self.read_u16_le()?;
        let bits_per_sample = self.read_u16_le()?;
        let mut consumed = 16;

        let mut channel_mask = None;
        let mut sub_format = None;
        if format_tag == WAVE_FORMAT_EXTENSIBLE && chunk_size >= 40 {
            let cb_size = self.read_u16_le()?;
            consumed += 2;
            if cb_size >= 22 {
                let _valid_bits = self.read_u16_le()?;
                channel_mask = Some(self.read_u32_le()?);
                let guid = self.read_exact::<16>()?;
                sub_format = Some(u16::from_le_bytes([guid[0], guid[1]]));
                consumed += 22;
            }
        }
        self.skip_bytes((chunk_size - consumed) as u64)?;

        Ok(FormatChunk {
            format_tag,
            channels,
            sample_rate,
            block_align,
            bits_per_sample,
            channel_mask,
            sub_format,
        })
    }

    /// Collects INFO text tags; other list types are skipped.
    fn parse_list_chunk(&mut self, chunk_size: u32, tags: &mut HashMap<String, String>) -> Result<()> {
        if chunk_size < 4 {
            return Err(Error::InvalidData("Invalid 'LIST' chunk size (< 4 bytes)"));
        }
        let list_type = self.read_exact::<4>()?;
        let mut remaining = chunk_size - 4;
        if &list_type != b"INFO" {
            return self.skip_bytes(remaining as u64);
        }

        while remaining >= 8 {
            let key = self.read_exact::<4>()?;
            let size = self.read_u32_le()?;
            remaining -= 8;
            if size > remaining {
                return Err(Error::InvalidData("INFO tag size exceeds remaining LIST chunk size"));
            }
            let value = self.read_vec(size as usize)?;
            remaining -= size;

            let len = value.iter().position(|&b| b == 0).unwrap_or(value.len());
            tags.insert(
                String::from_utf8_lossy(&key).into_owned(),
                String::from_utf8_lossy(&value[..len]).into_owned(),
            );

            if size % 2 != 0 && remaining > 0 {
                self.skip_bytes(1)?;
                remaining -= 1;
            }
        }
        self.skip_bytes(remaining as u64)
    }
}
