use std::io::{self, SeekFrom};

use log::{debug, warn};

use crate::error::{Error, Result};
use crate::source::{MediaSource, SourceStream};
use crate::stream::PcmStream;

/// Reference point for a relative seek.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Whence {
    /// From the first sample of the data region.
    Start,
    /// From the current position.
    Current,
    /// Backwards from the end of the data region.
    End,
}

/// Seeks forward by reading and discarding input.
///
/// Used for sources that cannot reposition, and for forward distances too large
/// to express as a single relative seek.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForwardSkip {
    from: u64,
    to: u64,
}

impl ForwardSkip {
    /// Bytes discarded per read.
    pub const CHUNK_SIZE: usize = 1024;

    /// Fails with [`Error::SeekRange`] when `to` lies behind `from`.
    pub fn new(from: u64, to: u64) -> Result<Self> {
        if to < from {
            return Err(Error::SeekRange { from, to });
        }
        Ok(Self { from, to })
    }

    pub fn distance(&self) -> u64 {
        self.to - self.from
    }

    /// Discards input until `position` reaches the destination.
    ///
    /// `position` advances with every chunk, so it stays accurate if the source
    /// ends early (reported as `UnexpectedEof`).
    pub fn run<R: MediaSource>(&self, source: &mut SourceStream<R>, position: &mut u64) -> Result<()> {
        let mut chunk = [0u8; Self::CHUNK_SIZE];
        *position = self.from;
        while *position < self.to {
            let len = (self.to - *position).min(Self::CHUNK_SIZE as u64) as usize;
            let n = source.read(&mut chunk[..len])?;
            if n == 0 {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!("stream ended at byte {} while skipping to {}", position, self.to),
                )
                .into());
            }
            *position += n as u64;
        }
        Ok(())
    }
}

impl<R: MediaSource> PcmStream<R> {
    /// Moves to absolute byte offset `dest` of the source.
    pub fn seek_to_byte(&mut self, dest: u64) -> Result<()> {
        if self.seekable {
            if dest <= i32::MAX as u64 {
                self.io.seek(SeekFrom::Start(dest))?;
                self.position = dest;
                return Ok(());
            }
            let delta = dest as i128 - self.position as i128;
            if (i32::MIN as i128..=i32::MAX as i128).contains(&delta) {
                self.io.seek(SeekFrom::Current(delta as i64))?;
                self.position = dest;
                return Ok(());
            }
            if delta < 0 {
                return Err(Error::SeekRange {
                    from: self.position,
                    to: dest,
                });
            }
            warn!(
                "Seek of {delta} bytes to {dest} is out of range for a direct seek; skipping forward instead"
            );
        }
        let skip = ForwardSkip::new(self.position, dest)?;
        debug!("skipping {} bytes", skip.distance());
        skip.run(&mut self.io, &mut self.position)
    }

    /// Seeks by `offset` sample frames relative to `whence`. The target is clamped
    /// to the data region. Does nothing when the data region size is unknown.
    pub fn seek_samples(&mut self, offset: i64, whence: Whence) -> Result<()> {
        if self.block_align == 0 {
            return Err(Error::InvalidArgument("stream has no block alignment"));
        }
        if self.position < self.data_start {
            return Err(Error::InvalidArgument("position precedes the data region"));
        }
        if self.data_size == 0 {
            return Ok(());
        }

        let offset = offset as i128 * self.block_align as i128;
        let start = self.data_start as i128;
        let size = self.data_size as i128;
        let dest = match whence {
            Whence::Start => start + offset.clamp(0, size),
            Whence::Current => (self.position as i128 + offset).clamp(start, start + size),
            Whence::End => start + size - offset.clamp(0, size),
        };
        // dest lies within [data_start, data_start + data_size].
        self.seek_to_byte(dest as u64)
    }

    /// Seeks by `offset` milliseconds relative to `whence`.
    pub fn seek_time_ms(&mut self, offset: i64, whence: Whence) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(Error::InvalidArgument("stream has no sample rate"));
        }
        let samples = offset as i128 * self.sample_rate as i128 / 1000;
        let samples = samples.clamp(i64::MIN as i128, i64::MAX as i128) as i64;
        self.seek_samples(samples, whence)
    }

    /// Current position in sample frames from the start of the data region.
    ///
    /// Counted even when the data size is unknown (RAW input from a pipe).
    /// Reports 0 only while no sample layout is bound.
    pub fn position(&self) -> u64 {
        if self.block_align == 0 {
            return 0;
        }
        self.position.saturating_sub(self.data_start) / self.block_align as u64
    }

    /// Current position in milliseconds from the start of the data region.
    pub fn position_time_ms(&self) -> u64 {
        if self.sample_rate == 0 {
            return 0;
        }
        (self.position() as u128 * 1000 / self.sample_rate as u128) as u64
    }
}
