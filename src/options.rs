use crate::container::ContainerKind;
use crate::error::{Error, Result};
use crate::format::{ByteOrder, SampleFormat};
use crate::source::MediaSource;
use crate::stream::PcmStream;

/// Layout assumed for headerless input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawParams {
    pub format: SampleFormat,
    pub order: ByteOrder,
    pub sample_rate: u32,
    pub channels: u16,
}

impl Default for RawParams {
    fn default() -> Self {
        Self {
            format: SampleFormat::S16,
            order: ByteOrder::Little,
            sample_rate: 48000,
            channels: 2,
        }
    }
}

/// Options and flags which can be used to configure how a stream is opened.
///
/// ```no_run
/// use pcm_rush::{ContainerKind, OpenOptions, SampleFormat};
///
/// let file = std::fs::File::open("input.pcm")?;
/// let stream = OpenOptions::new(SampleFormat::Float)
///     .container(ContainerKind::Raw)
///     .raw_channels(6)
///     .raw_sample_rate(44100)
///     .open(file)?;
/// # Ok::<(), pcm_rush::Error>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenOptions {
    pub(crate) read_format: SampleFormat,
    pub(crate) container: Option<ContainerKind>,
    pub(crate) read_to_eof: bool,
    pub(crate) raw: RawParams,
}

impl OpenOptions {
    /// Samples will be delivered as `read_format`; the container is probed.
    pub fn new(read_format: SampleFormat) -> Self {
        Self {
            read_format,
            container: None,
            read_to_eof: false,
            raw: RawParams::default(),
        }
    }

    /// Skips probing and treats the input as `kind`.
    pub fn container(mut self, kind: ContainerKind) -> Self {
        self.container = Some(kind);
        self
    }

    /// Ignores the declared data size and reads until the source is exhausted.
    pub fn read_to_eof(mut self, yes: bool) -> Self {
        self.read_to_eof = yes;
        self
    }

    pub fn raw_format(mut self, format: SampleFormat) -> Self {
        self.raw.format = format;
        self
    }

    pub fn raw_order(mut self, order: ByteOrder) -> Self {
        self.raw.order = order;
        self
    }

    pub fn raw_sample_rate(mut self, sample_rate: u32) -> Self {
        self.raw.sample_rate = sample_rate;
        self
    }

    pub fn raw_channels(mut self, channels: u16) -> Self {
        self.raw.channels = channels;
        self
    }

    pub fn read_format(&self) -> SampleFormat {
        self.read_format
    }

    pub fn raw_params(&self) -> &RawParams {
        &self.raw
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.raw.channels == 0 {
            return Err(Error::InvalidArgument("raw channel count must be non-zero"));
        }
        if self.raw.sample_rate == 0 {
            return Err(Error::InvalidArgument("raw sample rate must be non-zero"));
        }
        Ok(())
    }

    /// Opens `source` with these options.
    pub fn open<R: MediaSource>(&self, source: R) -> Result<PcmStream<R>> {
        PcmStream::open_with(source, self)
    }
}
