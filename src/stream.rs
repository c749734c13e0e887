use std::collections::HashMap;
use std::io::SeekFrom;

use aligned_vec::{AVec, ConstAlign};
use log::{debug, info, warn};

use crate::container::{self, Container, ContainerKind, PROBE_SIZE};
use crate::container::{WAVE_FORMAT_IEEE_FLOAT, WAVE_FORMAT_PCM};
use crate::convert::Converter;
use crate::error::Result;
use crate::format::{ByteOrder, SampleFormat};
use crate::options::OpenOptions;
use crate::source::{MediaSource, SourceStream};

/// Alignment of the per-read scratch buffer; enough for any sample slot.
pub(crate) const SCRATCH_ALIGN: usize = 8;

/// An opened PCM stream: delivers interleaved, native-order samples in the
/// chosen read format and supports sample-accurate seeking.
pub struct PcmStream<R: MediaSource> {
    pub(crate) io: SourceStream<R>,
    pub(crate) seekable: bool,
    /// Ignore `data_size` and read until the source is exhausted.
    pub(crate) read_to_eof: bool,
    /// Total source size in bytes, 0 if unknown.
    pub(crate) file_size: u64,
    /// Logical byte offset of the next unread byte.
    pub(crate) position: u64,
    pub(crate) data_start: u64,
    pub(crate) data_size: u64,
    /// Sample frames in the data region.
    pub(crate) samples: u64,

    pub(crate) container: ContainerKind,
    /// WAVE format tag, meaningful for `ContainerKind::Wave` only.
    pub(crate) wav_format: u16,
    pub(crate) order: ByteOrder,
    pub(crate) channels: u16,
    pub(crate) channel_mask: u32,
    pub(crate) sample_rate: u32,
    /// Bytes per frame across all channels, 0 until a source format is bound.
    pub(crate) block_align: u32,
    pub(crate) bit_width: u32,

    pub(crate) source_format: SampleFormat,
    pub(crate) read_format: SampleFormat,
    pub(crate) converter: Converter,

    pub(crate) metadata: HashMap<String, String>,
    pub(crate) scratch: AVec<u8, ConstAlign<SCRATCH_ALIGN>>,
}

impl<R: MediaSource> PcmStream<R> {
    /// Opens `source`, probing the container when `container` is `None`.
    pub fn open(source: R, read_format: SampleFormat, container: Option<ContainerKind>) -> Result<Self> {
        let mut options = OpenOptions::new(read_format);
        options.container = container;
        Self::open_with(source, &options)
    }

    /// Opens `source` as configured by `options`.
    pub fn open_with(mut source: R, options: &OpenOptions) -> Result<Self> {
        options.validate()?;
        let (seekable, file_size) = detect_size(&mut source)?;
        let mut stream = Self::new(source, seekable, file_size, options.read_format);

        let kind = match options.container {
            Some(kind) => kind,
            None => {
                let mut window = [0u8; PROBE_SIZE];
                let n = stream.io.peek(&mut window)?;
                let kind = container::probe(&window[..n]);
                debug!("probed {n} leading bytes: {kind}");
                kind
            }
        };
        kind.handler().init(&mut stream, options)?;

        info!("{}", stream.describe());
        Ok(stream)
    }

    fn new(source: R, seekable: bool, file_size: u64, read_format: SampleFormat) -> Self {
        let source_format = SampleFormat::S16;
        Self {
            io: SourceStream::new(source),
            seekable,
            read_to_eof: false,
            file_size,
            position: 0,
            data_start: 0,
            data_size: 0,
            samples: 0,
            container: ContainerKind::Raw,
            wav_format: 0,
            order: ByteOrder::Little,
            channels: 0,
            channel_mask: 0,
            sample_rate: 0,
            block_align: 0,
            bit_width: 0,
            source_format,
            read_format,
            converter: Converter::new(source_format, read_format),
            metadata: HashMap::new(),
            scratch: AVec::new(SCRATCH_ALIGN),
        }
    }

    /// Declares the on-disk sample format and byte order.
    ///
    /// Rebinds the converter to `(format -> read format)`, updates the bit width and,
    /// for linear layouts, block alignment and total sample count. May be called
    /// any number of times.
    pub fn bind_source(&mut self, format: SampleFormat, order: ByteOrder) {
        self.converter = Converter::new(format, self.read_format);
        self.source_format = format;
        self.order = order;
        self.bit_width = format.bit_width();
        if self.has_linear_layout() {
            let frame = format.packed_bytes() as u32 * self.channels as u32;
            self.block_align = frame.max(1);
            self.samples = self.data_size / self.block_align as u64;
        }
    }

    /// Changes the representation subsequent reads deliver.
    pub fn set_read_format(&mut self, format: SampleFormat) {
        self.read_format = format;
        self.converter = Converter::new(self.source_format, format);
    }

    fn has_linear_layout(&self) -> bool {
        self.container != ContainerKind::Wave
            || self.wav_format == WAVE_FORMAT_PCM
            || self.wav_format == WAVE_FORMAT_IEEE_FLOAT
    }

    /// One-line summary, e.g. `WAVE Signed 16-bit little-endian 44100 Hz stereo`.
    pub fn describe(&self) -> String {
        let kind = if self.source_format.is_float() {
            "Floating-point"
        } else if self.bit_width > 8 {
            "Signed"
        } else {
            "Unsigned"
        };
        format!(
            "{} {} {}-bit {} {} Hz {}",
            self.container,
            kind,
            self.bit_width,
            self.order,
            self.sample_rate,
            channel_layout(self.channels, self.channel_mask)
        )
    }

    /// Releases the read buffer and returns the underlying source.
    pub fn close(self) -> R {
        self.io.close()
    }

    // --- Accessors ---

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Speaker positions present, as WAVE `dwChannelMask` bits.
    pub fn channel_mask(&self) -> u32 {
        self.channel_mask
    }

    pub fn bit_width(&self) -> u32 {
        self.bit_width
    }

    pub fn block_align(&self) -> u32 {
        self.block_align
    }

    /// Sample frames in the declared data region (0 when unknown).
    pub fn total_samples(&self) -> u64 {
        self.samples
    }

    pub fn duration_ms(&self) -> u64 {
        if self.sample_rate == 0 {
            return 0;
        }
        self.samples.saturating_mul(1000) / self.sample_rate as u64
    }

    pub fn source_format(&self) -> SampleFormat {
        self.source_format
    }

    pub fn read_format(&self) -> SampleFormat {
        self.read_format
    }

    pub fn byte_order(&self) -> ByteOrder {
        self.order
    }

    pub fn container(&self) -> ContainerKind {
        self.container
    }

    pub fn is_seekable(&self) -> bool {
        self.seekable
    }

    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    pub fn data_start(&self) -> u64 {
        self.data_start
    }

    pub fn data_size(&self) -> u64 {
        self.data_size
    }

    pub fn read_to_eof(&self) -> bool {
        self.read_to_eof
    }

    /// INFO tags found in the header, keyed by their four-character id.
    pub fn metadata(&self) -> &HashMap<String, String> {
        &self.metadata
    }

    pub fn get_ref(&self) -> &R {
        self.io.get_ref()
    }
}

/// Determines seekability and total size, leaving the source at its start.
fn detect_size<R: MediaSource>(source: &mut R) -> Result<(bool, u64)> {
    if !source.is_seekable() {
        return Ok((false, 0));
    }
    match source.seek(SeekFrom::End(0)) {
        Ok(size) => {
            source.seek(SeekFrom::Start(0))?;
            Ok((true, size))
        }
        Err(e) => {
            warn!("Unsupported file size ({e}); treating input as a stream");
            Ok((false, 0))
        }
    }
}

fn channel_layout(channels: u16, mask: u32) -> &'static str {
    // Bit 3 is the low-frequency effects speaker.
    if mask & 0x08 != 0 {
        match channels.saturating_sub(1) {
            1 => "1.1-channel",
            2 => "2.1-channel",
            3 => "3.1-channel",
            4 => "4.1-channel",
            5 => "5.1-channel",
            _ => "multi-channel with LFE",
        }
    } else {
        match channels {
            1 => "mono",
            2 => "stereo",
            3 => "3-channel",
            4 => "4-channel",
            5 => "5-channel",
            6 => "6-channel",
            _ => "multi-channel",
        }
    }
}
