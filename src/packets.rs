use aligned_vec::{AVec, ConstAlign};
use fallible_streaming_iterator::FallibleStreamingIterator;

use crate::error::{Error, Result};
use crate::format::Sample;
use crate::read::MAX_READ_FRAMES;
use crate::source::MediaSource;
use crate::stream::{PcmStream, SCRATCH_ALIGN};

/// Reads a stream in blocks of interleaved samples, yielding `&[T]` slices of an
/// internal buffer.
pub struct Packets<'a, R: MediaSource, T: Sample> {
    stream: &'a mut PcmStream<R>,
    buffer: AVec<T, ConstAlign<SCRATCH_ALIGN>>,
    frames_per_packet: usize,
    /// Valid samples in `buffer` for the current packet.
    samples_in_packet: usize,
    is_data_available: bool,
}

impl<R: MediaSource> PcmStream<R> {
    /// Iterates over the rest of the stream `frames_per_packet` frames at a time.
    /// The last packet may be shorter.
    pub fn packets<T: Sample>(&mut self, frames_per_packet: usize) -> Result<Packets<'_, R, T>> {
        if T::SLOT != self.read_format.descriptor().slot {
            return Err(Error::InvalidArgument(
                "packet sample type does not match the read format",
            ));
        }
        if frames_per_packet == 0 || self.channels == 0 {
            return Err(Error::InvalidArgument("packets must hold at least one frame"));
        }
        let frames_per_packet = frames_per_packet.min(MAX_READ_FRAMES);
        let samples = frames_per_packet
            .checked_mul(self.channels as usize)
            .filter(|n| n.checked_mul(std::mem::size_of::<T>()).is_some())
            .ok_or(Error::Allocation(usize::MAX))?;

        let mut buffer = AVec::new(SCRATCH_ALIGN);
        buffer.resize(samples, T::default());
        Ok(Packets {
            stream: self,
            buffer,
            frames_per_packet,
            samples_in_packet: 0,
            is_data_available: true,
        })
    }
}

impl<R: MediaSource, T: Sample> Packets<'_, R, T> {
    pub fn frames_per_packet(&self) -> usize {
        self.frames_per_packet
    }
}

impl<R: MediaSource, T: Sample> FallibleStreamingIterator for Packets<'_, R, T> {
    type Item = [T];
    type Error = Error;

    fn advance(&mut self) -> Result<()> {
        if !self.is_data_available {
            self.samples_in_packet = 0;
            return Ok(());
        }
        let frames = self
            .stream
            .read_samples(&mut self.buffer[..], self.frames_per_packet)?;
        if frames == 0 {
            self.is_data_available = false;
        }
        self.samples_in_packet = frames * self.stream.channels as usize;
        Ok(())
    }

    fn get(&self) -> Option<&Self::Item> {
        if self.samples_in_packet > 0 {
            Some(&self.buffer[..self.samples_in_packet])
        } else {
            None
        }
    }

    /// Exact only when the stream has a declared data size.
    fn size_hint(&self) -> (usize, Option<usize>) {
        let stream = &self.stream;
        if stream.read_to_eof || stream.block_align == 0 || !self.is_data_available {
            return (0, None);
        }
        let end = stream.data_start + stream.data_size;
        let frames = end.saturating_sub(stream.position) / stream.block_align as u64;
        let count = frames.div_ceil(self.frames_per_packet as u64) as usize;
        (count, Some(count))
    }
}
