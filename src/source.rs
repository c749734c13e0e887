use std::fs::File;
use std::io::{self, Cursor, Read, Seek, SeekFrom};

use crate::error::Result;

/// A byte source a [`PcmStream`](crate::PcmStream) can be opened on.
///
/// `is_seekable` reports whether `Seek` actually repositions the source. Sources
/// that are not seekable are only ever read forward.
pub trait MediaSource: Read + Seek {
    fn is_seekable(&self) -> bool;
}

impl MediaSource for File {
    /// Regular files seek; pipes, FIFOs and character devices opened as `File` don't.
    fn is_seekable(&self) -> bool {
        self.metadata().map(|m| m.is_file()).unwrap_or(false)
    }
}

impl<T: AsRef<[u8]>> MediaSource for Cursor<T> {
    fn is_seekable(&self) -> bool {
        true
    }
}

impl<S: MediaSource + ?Sized> MediaSource for Box<S> {
    fn is_seekable(&self) -> bool {
        (**self).is_seekable()
    }
}

/// Adapts any reader (stdin, sockets, decompressors) into a forward-only source.
#[derive(Debug)]
pub struct ReadOnlySource<R: Read> {
    inner: R,
}

impl<R: Read> ReadOnlySource<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read> Read for ReadOnlySource<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

impl<R: Read> Seek for ReadOnlySource<R> {
    fn seek(&mut self, _pos: SeekFrom) -> io::Result<u64> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "source does not support seeking",
        ))
    }
}

impl<R: Read> MediaSource for ReadOnlySource<R> {
    fn is_seekable(&self) -> bool {
        false
    }
}

/// Buffered reader over a [`MediaSource`] with non-consuming lookahead.
///
/// The buffer is owned here rather than delegated to `BufReader` so that `peek`
/// can fill an arbitrary window and `flush` can report how far the underlying
/// cursor runs ahead of the logical position.
#[derive(Debug)]
pub struct SourceStream<R: MediaSource> {
    inner: R,
    buf: Box<[u8]>,
    /// Read offset into `buf`.
    pos: usize,
    /// Number of valid bytes in `buf`.
    filled: usize,
}

impl<R: MediaSource> SourceStream<R> {
    const BUFFER_SIZE: usize = 1024 * 16;

    pub fn new(inner: R) -> Self {
        Self {
            inner,
            buf: vec![0; Self::BUFFER_SIZE].into_boxed_slice(),
            pos: 0,
            filled: 0,
        }
    }

    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    /// Bytes held in the lookahead buffer but not yet consumed.
    #[inline]
    pub fn buffered(&self) -> usize {
        self.filled - self.pos
    }

    /// Reads until `buf` is full or the source is exhausted.
    ///
    /// Returns the number of bytes read; fewer than `buf.len()` only at end of stream.
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut done = 0;
        while done < buf.len() {
            if self.buffered() == 0 {
                // Large reads bypass the buffer.
                if buf.len() - done >= self.buf.len() {
                    let n = read_retrying(&mut self.inner, &mut buf[done..])?;
                    if n == 0 {
                        break;
                    }
                    done += n;
                    continue;
                }
                if self.fill()? == 0 {
                    break;
                }
            }
            let n = self.buffered().min(buf.len() - done);
            buf[done..done + n].copy_from_slice(&self.buf[self.pos..self.pos + n]);
            self.pos += n;
            done += n;
        }
        Ok(done)
    }

    /// Copies up to `buf.len()` upcoming bytes into `buf` without consuming them.
    ///
    /// Returns fewer bytes than requested only when the stream ends first.
    pub fn peek(&mut self, buf: &mut [u8]) -> Result<usize> {
        let want = buf.len().min(self.buf.len());
        if self.buffered() < want {
            self.buf.copy_within(self.pos..self.filled, 0);
            self.filled -= self.pos;
            self.pos = 0;
            while self.filled < want {
                let n = read_retrying(&mut self.inner, &mut self.buf[self.filled..])?;
                if n == 0 {
                    break;
                }
                self.filled += n;
            }
        }
        let n = self.buffered().min(want);
        buf[..n].copy_from_slice(&self.buf[self.pos..self.pos + n]);
        Ok(n)
    }

    /// Reads exactly `N` bytes into a fixed-size array.
    #[inline]
    pub fn read_exact<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        if self.read(&mut out)? != N {
            return Err(io::Error::from(io::ErrorKind::UnexpectedEof).into());
        }
        Ok(out)
    }

    #[inline]
    pub fn read_u16_le(&mut self) -> Result<u16> {
        Ok(u16::from_le_bytes(self.read_exact::<2>()?))
    }

    #[inline]
    pub fn read_u32_le(&mut self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.read_exact::<4>()?))
    }

    /// Reads and discards `n` bytes. Returns how many were actually skipped.
    pub fn skip(&mut self, mut n: u64) -> Result<u64> {
        let mut scratch = [0u8; 1024];
        let total = n;
        while n > 0 {
            let len = n.min(scratch.len() as u64) as usize;
            let got = self.read(&mut scratch[..len])?;
            if got == 0 {
                break;
            }
            n -= got as u64;
        }
        Ok(total - n)
    }

    /// Drops the lookahead buffer. Returns the number of discarded bytes, i.e. how
    /// far the underlying cursor was ahead of the logical position.
    pub fn flush(&mut self) -> usize {
        let discarded = self.buffered();
        self.pos = 0;
        self.filled = 0;
        discarded
    }

    /// Repositions the underlying source. Offsets are logical: `Current` is relative
    /// to the next byte `read` would have returned.
    pub fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        let lag = self.flush() as i64;
        let pos = match pos {
            SeekFrom::Current(delta) => SeekFrom::Current(delta - lag),
            other => other,
        };
        Ok(self.inner.seek(pos)?)
    }

    /// Releases the buffer and hands back the source.
    pub fn close(self) -> R {
        self.inner
    }

    fn fill(&mut self) -> Result<usize> {
        self.pos = 0;
        self.filled = read_retrying(&mut self.inner, &mut self.buf)?;
        Ok(self.filled)
    }
}

fn read_retrying<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    loop {
        match reader.read(buf) {
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            other => return other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Hands out at most `chunk` bytes per read, like a pipe.
    struct Trickle {
        data: Vec<u8>,
        pos: usize,
        chunk: usize,
    }

    impl Read for Trickle {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let n = buf.len().min(self.chunk).min(self.data.len() - self.pos);
            buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
            self.pos += n;
            Ok(n)
        }
    }

    fn bytes(n: usize) -> Vec<u8> {
        (0..n).map(|i| i as u8).collect()
    }

    #[test]
    fn peek_does_not_consume() {
        let mut stream = SourceStream::new(Cursor::new(bytes(64)));
        let mut window = [0u8; 12];
        assert_eq!(stream.peek(&mut window).unwrap(), 12);
        let mut out = [0u8; 16];
        assert_eq!(stream.read(&mut out).unwrap(), 16);
        assert_eq!(&out[..12], &window);
    }

    #[test]
    fn peek_fills_window_from_slow_reader() {
        let src = ReadOnlySource::new(Trickle { data: bytes(40), pos: 0, chunk: 5 });
        let mut stream = SourceStream::new(src);
        let mut window = [0u8; 12];
        assert_eq!(stream.peek(&mut window).unwrap(), 12);
        assert_eq!(window.to_vec(), bytes(12));
    }

    #[test]
    fn peek_short_stream() {
        let mut stream = SourceStream::new(Cursor::new(bytes(3)));
        let mut window = [0u8; 12];
        assert_eq!(stream.peek(&mut window).unwrap(), 3);
    }

    #[test]
    fn read_spans_buffer_refills() {
        let data = bytes(50_000);
        let src = ReadOnlySource::new(Trickle { data: data.clone(), pos: 0, chunk: 999 });
        let mut stream = SourceStream::new(src);
        let mut head = [0u8; 7];
        stream.read(&mut head).unwrap();
        let mut rest = vec![0u8; 60_000];
        let n = stream.read(&mut rest).unwrap();
        assert_eq!(n, 50_000 - 7);
        assert_eq!(&rest[..n], &data[7..]);
    }

    #[test]
    fn relative_seek_is_logical() {
        let mut stream = SourceStream::new(Cursor::new(bytes(200)));
        let mut out = [0u8; 10];
        stream.read(&mut out).unwrap();
        // Underlying cursor is now at 200, logical position at 10.
        assert!(stream.buffered() > 0);
        stream.seek(SeekFrom::Current(5)).unwrap();
        stream.read(&mut out[..1]).unwrap();
        assert_eq!(out[0], 15);
    }

    #[test]
    fn skip_and_little_endian_fields() {
        let mut stream = SourceStream::new(Cursor::new(vec![9, 9, 9, 0x34, 0x12, 0x78, 0x56, 0x34, 0x12]));
        assert_eq!(stream.skip(3).unwrap(), 3);
        assert_eq!(stream.read_u16_le().unwrap(), 0x1234);
        assert_eq!(stream.read_u32_le().unwrap(), 0x1234_5678);
        assert!(stream.read_u16_le().is_err());
    }

    #[test]
    fn read_only_source_refuses_seek() {
        let mut src = ReadOnlySource::new(&b"abc"[..]);
        assert!(!src.is_seekable());
        assert!(src.seek(SeekFrom::Start(0)).is_err());
    }
}
