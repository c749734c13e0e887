use log::debug;

use super::{default_channel_mask, Container, ContainerKind};
use crate::error::Result;
use crate::options::OpenOptions;
use crate::source::MediaSource;
use crate::stream::PcmStream;

/// Headerless sample data laid out as described by [`RawParams`](crate::RawParams).
#[derive(Debug, Clone, Copy, Default)]
pub struct RawContainer;

impl Container for RawContainer {
    fn probe(&self, _window: &[u8]) -> u32 {
        1
    }

    fn init<R: MediaSource>(&self, stream: &mut PcmStream<R>, options: &OpenOptions) -> Result<()> {
        options.validate()?;
        let raw = options.raw;

        stream.container = ContainerKind::Raw;
        stream.channels = raw.channels;
        stream.channel_mask = default_channel_mask(raw.channels);
        stream.sample_rate = raw.sample_rate;
        stream.data_start = 0;
        stream.data_size = if stream.seekable { stream.file_size } else { 0 };
        stream.read_to_eof = true;
        stream.bind_source(raw.format, raw.order);

        debug!(
            "raw input: {} {} x{} @ {} Hz, {} bytes",
            raw.format, raw.order, raw.channels, raw.sample_rate, stream.data_size
        );
        Ok(())
    }
}
