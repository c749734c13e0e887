//! Sample reader: byte-order normalization, packed-width unpacking and
//! conversion into the caller's buffer.

use crate::error::{Error, Result};
use crate::format::{ByteOrder, Sample};
use crate::source::MediaSource;
use crate::stream::PcmStream;

/// Upper bound on sample frames moved by a single read call.
pub const MAX_READ_FRAMES: usize = 240_000;

impl<R: MediaSource> PcmStream<R> {
    /// Reads up to `max_frames` interleaved sample frames into `out`.
    ///
    /// `T` must be the storage type of the read format (`i32` for S20, S24 and S32).
    /// Returns the number of frames read; `Ok(0)` means no more data.
    /// See [`read_samples_bytes`](Self::read_samples_bytes) for buffer growth.
    pub fn read_samples<T: Sample>(&mut self, out: &mut [T], max_frames: usize) -> Result<usize> {
        if T::SLOT != self.read_format.descriptor().slot {
            return Err(Error::InvalidArgument(
                "output sample type does not match the read format",
            ));
        }
        self.read_samples_bytes(bytemuck::cast_slice_mut(out), max_frames)
    }

    /// Byte-level form of [`read_samples`](Self::read_samples): `out` receives
    /// native-order slots of the read format.
    ///
    /// The scratch buffer grows to at most [`MAX_READ_FRAMES`] frames of the
    /// source format. Like any other allocation, failing to grow it aborts.
    pub fn read_samples_bytes(&mut self, out: &mut [u8], max_frames: usize) -> Result<usize> {
        if self.block_align == 0 || self.channels == 0 {
            return Err(Error::InvalidArgument("stream has no sample layout"));
        }
        let channels = self.channels as usize;
        let block_align = self.block_align as usize;
        let out_frame = channels * self.read_format.slot_bytes();

        let mut frames = max_frames.min(MAX_READ_FRAMES).min(out.len() / out_frame);
        if !self.read_to_eof {
            let end = self.data_start + self.data_size;
            let remaining = end.saturating_sub(self.position) / block_align as u64;
            frames = frames.min(usize::try_from(remaining).unwrap_or(usize::MAX));
        }
        if frames == 0 {
            return Ok(0);
        }

        // Raw bytes land at the tail so packed samples can be expanded forward in place.
        let bytes_needed = frames * block_align;
        let buffer_size = (frames * channels * self.source_format.slot_bytes()).max(bytes_needed);
        let raw_offset = buffer_size - bytes_needed;
        self.scratch.clear();
        self.scratch.resize(buffer_size, 0);

        let nr = self
            .io
            .read(&mut self.scratch[raw_offset..raw_offset + bytes_needed])?;
        if nr == 0 {
            return Ok(0);
        }
        self.position += nr as u64;
        let frames = nr / block_align;
        let nsmp = frames * channels;

        let packed = self.source_format.packed_bytes();
        let src = match packed {
            3 => {
                unpack_packed(&mut self.scratch, raw_offset, nsmp, self.bit_width, self.order);
                &self.scratch[..nsmp * 4]
            }
            _ => {
                let data = &mut self.scratch[raw_offset..raw_offset + nsmp * packed];
                if self.order.needs_swap() {
                    swap_elements(data, packed);
                }
                &self.scratch[raw_offset..raw_offset + nsmp * packed]
            }
        };
        self.converter.convert(src, out, nsmp);
        Ok(frames)
    }
}

/// Reverses the bytes of every `size`-byte element of `data` in place.
fn swap_elements(data: &mut [u8], size: usize) {
    match size {
        2 => bytemuck::cast_slice_mut::<u8, u16>(data)
            .iter_mut()
            .for_each(|v| *v = v.swap_bytes()),
        4 => bytemuck::cast_slice_mut::<u8, u32>(data)
            .iter_mut()
            .for_each(|v| *v = v.swap_bytes()),
        8 => bytemuck::cast_slice_mut::<u8, u64>(data)
            .iter_mut()
            .for_each(|v| *v = v.swap_bytes()),
        _ => {}
    }
}

/// Expands `count` 3-byte samples starting at `buf[raw_offset..]` into native
/// `i32` slots at the front of `buf`, sign-extending from `bit_width`.
///
/// Requires `raw_offset >= count` so each slot write trails its source bytes.
pub(crate) fn unpack_packed(
    buf: &mut [u8],
    raw_offset: usize,
    count: usize,
    bit_width: u32,
    order: ByteOrder,
) {
    if count == 0 {
        return;
    }
    debug_assert!(raw_offset >= count);
    let shift = 32 - bit_width;
    let extend = |v: u32| ((v << shift) as i32) >> shift;

    for i in 0..count - 1 {
        let at = raw_offset + i * 3;
        let v = match order {
            // One unaligned word; the top byte belongs to the next sample and shifts out.
            ByteOrder::Little => {
                u32::from_le_bytes([buf[at], buf[at + 1], buf[at + 2], buf[at + 3]])
            }
            ByteOrder::Big => {
                (buf[at] as u32) << 16 | (buf[at + 1] as u32) << 8 | buf[at + 2] as u32
            }
        };
        buf[i * 4..i * 4 + 4].copy_from_slice(&extend(v).to_ne_bytes());
    }

    // Last sample: exactly three bytes remain.
    let i = count - 1;
    let at = raw_offset + i * 3;
    let (b0, b1, b2) = (buf[at] as u32, buf[at + 1] as u32, buf[at + 2] as u32);
    let v = match order {
        ByteOrder::Little => b0 | b1 << 8 | b2 << 16,
        ByteOrder::Big => b0 << 16 | b1 << 8 | b2,
    };
    buf[i * 4..i * 4 + 4].copy_from_slice(&extend(v).to_ne_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::ContainerKind;
    use crate::format::SampleFormat;
    use crate::options::OpenOptions;
    use crate::source::ReadOnlySource;
    use rand::{rngs::StdRng, Rng, SeedableRng};
    use std::cell::Cell;
    use std::io::{self, Cursor, Read, Seek, SeekFrom};
    use std::rc::Rc;

    fn unpack(bytes: &[u8], width: u32, order: ByteOrder) -> Vec<i32> {
        let n = bytes.len() / 3;
        let mut buf = vec![0u8; n * 4];
        buf[n..].copy_from_slice(bytes);
        unpack_packed(&mut buf, n, n, width, order);
        buf.chunks_exact(4)
            .map(|c| i32::from_ne_bytes([c[0], c[1], c[2], c[3]]))
            .collect()
    }

    #[test]
    fn packed_24_bit_sign_extension() {
        let out = unpack(&[0x21, 0x43, 0x65, 0xFF, 0xFF, 0xFF], 24, ByteOrder::Little);
        assert_eq!(out, vec![0x0065_4321, -1]);
        let out = unpack(&[0xFF, 0xFF, 0xFF, 0x21, 0x43, 0x65], 24, ByteOrder::Little);
        assert_eq!(out, vec![-1, 0x0065_4321]);
        let out = unpack(&[0x00, 0x00, 0x80], 24, ByteOrder::Little);
        assert_eq!(out, vec![-8388608]);
    }

    #[test]
    fn packed_big_endian() {
        let out = unpack(&[0x65, 0x43, 0x21, 0x80, 0x00, 0x00, 0x00, 0x00, 0x01], 24, ByteOrder::Big);
        assert_eq!(out, vec![0x0065_4321, -8388608, 1]);
    }

    #[test]
    fn packed_20_bit_drops_container_high_bits() {
        // 0xF7FFFF: bit 19 clear after the top nibble is discarded.
        let out = unpack(&[0xFF, 0xFF, 0xF7, 0x00, 0x00, 0x08], 20, ByteOrder::Little);
        assert_eq!(out, vec![0x7FFFF, -524288]);
    }

    #[test]
    fn packed_matches_bytewise_decoding() {
        let mut rng = StdRng::seed_from_u64(24);
        let values: Vec<i32> = (0..1000).map(|_| rng.random_range(-8388608..8388608)).collect();
        let mut bytes = Vec::new();
        for v in &values {
            bytes.extend_from_slice(&v.to_le_bytes()[..3]);
        }
        assert_eq!(unpack(&bytes, 24, ByteOrder::Little), values);
        let swapped: Vec<u8> = bytes.chunks_exact(3).flat_map(|c| [c[2], c[1], c[0]]).collect();
        assert_eq!(unpack(&swapped, 24, ByteOrder::Big), values);
    }

    /// Counts calls that reach the underlying reader.
    struct Counting {
        inner: Cursor<Vec<u8>>,
        reads: Rc<Cell<usize>>,
    }

    impl Read for Counting {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.reads.set(self.reads.get() + 1);
            self.inner.read(buf)
        }
    }

    impl Seek for Counting {
        fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
            self.inner.seek(pos)
        }
    }

    impl MediaSource for Counting {
        fn is_seekable(&self) -> bool {
            true
        }
    }

    fn wave_s16_stereo(data: &[u8], trailer: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(b"RIFF");
        out.extend_from_slice(&0u32.to_le_bytes());
        out.extend_from_slice(b"WAVE");
        out.extend_from_slice(b"fmt ");
        out.extend_from_slice(&16u32.to_le_bytes());
        out.extend_from_slice(&1u16.to_le_bytes());
        out.extend_from_slice(&2u16.to_le_bytes());
        out.extend_from_slice(&8000u32.to_le_bytes());
        out.extend_from_slice(&32000u32.to_le_bytes());
        out.extend_from_slice(&4u16.to_le_bytes());
        out.extend_from_slice(&16u16.to_le_bytes());
        out.extend_from_slice(b"data");
        out.extend_from_slice(&(data.len() as u32).to_le_bytes());
        out.extend_from_slice(data);
        out.extend_from_slice(trailer);
        out
    }

    #[test]
    fn reads_stop_at_data_end_without_io() {
        let data: Vec<u8> = (0..1003).map(|i| i as u8).collect();
        let reads = Rc::new(Cell::new(0));
        let source = Counting {
            inner: Cursor::new(wave_s16_stereo(&data, b"JUNK\x04\x00\x00\x00abcd")),
            reads: reads.clone(),
        };
        let mut stream = OpenOptions::new(SampleFormat::S16).open(source).unwrap();
        assert_eq!(stream.total_samples(), 250);

        let mut out = vec![0i16; 64 * 2];
        let mut total = 0;
        loop {
            let n = stream.read_samples(&mut out, 64).unwrap();
            if n == 0 {
                break;
            }
            total += n;
        }
        assert_eq!(total, 250);
        assert_eq!(stream.position(), 250);

        let before = reads.get();
        assert_eq!(stream.read_samples(&mut out, 64).unwrap(), 0);
        assert_eq!(reads.get(), before);
    }

    #[test]
    fn sample_values_survive_read() {
        let mut data = Vec::new();
        for v in [1i16, -1, i16::MAX, i16::MIN, 0x1234, -0x1234] {
            data.extend_from_slice(&v.to_le_bytes());
        }
        let mut stream = OpenOptions::new(SampleFormat::S16)
            .open(Cursor::new(wave_s16_stereo(&data, &[])))
            .unwrap();
        let mut out = [0i16; 6];
        assert_eq!(stream.read_samples(&mut out, 100).unwrap(), 3);
        assert_eq!(out, [1, -1, i16::MAX, i16::MIN, 0x1234, -0x1234]);
    }

    #[test]
    fn big_endian_raw_is_swapped() {
        let mut stream = OpenOptions::new(SampleFormat::S16)
            .container(ContainerKind::Raw)
            .raw_order(ByteOrder::Big)
            .raw_channels(1)
            .open(Cursor::new(vec![0x12, 0x34, 0xFF, 0xFE]))
            .unwrap();
        let mut out = [0i16; 4];
        assert_eq!(stream.read_samples(&mut out, 4).unwrap(), 2);
        assert_eq!(&out[..2], &[0x1234, -2]);
        assert_eq!(stream.read_samples(&mut out, 4).unwrap(), 0);
    }

    #[test]
    fn big_endian_s32_and_double() {
        let mut stream = OpenOptions::new(SampleFormat::S32)
            .container(ContainerKind::Raw)
            .raw_format(SampleFormat::S32)
            .raw_order(ByteOrder::Big)
            .raw_channels(1)
            .open(Cursor::new(vec![0x01, 0x02, 0x03, 0x04]))
            .unwrap();
        let mut out = [0i32; 1];
        assert_eq!(stream.read_samples(&mut out, 1).unwrap(), 1);
        assert_eq!(out[0], 0x0102_0304);

        let mut stream = OpenOptions::new(SampleFormat::Double)
            .container(ContainerKind::Raw)
            .raw_format(SampleFormat::Double)
            .raw_order(ByteOrder::Big)
            .raw_channels(1)
            .open(Cursor::new(0.75f64.to_be_bytes().to_vec()))
            .unwrap();
        let mut out = [0f64; 1];
        assert_eq!(stream.read_samples(&mut out, 1).unwrap(), 1);
        assert_eq!(out[0], 0.75);
    }

    #[test]
    fn packed_source_converts_to_float() {
        let mut stream = OpenOptions::new(SampleFormat::Float)
            .container(ContainerKind::Raw)
            .raw_format(SampleFormat::S24)
            .raw_order(ByteOrder::Big)
            .raw_channels(2)
            .open(Cursor::new(vec![
                0x40, 0x00, 0x00, 0xC0, 0x00, 0x00, 0x00, 0x00, 0x00, 0x7F, 0xFF, 0xFF,
            ]))
            .unwrap();
        let mut out = [0f32; 4];
        assert_eq!(stream.read_samples(&mut out, 2).unwrap(), 2);
        assert_eq!(&out[..3], &[0.5, -0.5, 0.0]);
        assert!(out[3] > 0.9999 && out[3] < 1.0);
    }

    #[test]
    fn unsigned_source_to_s16() {
        let mut stream = OpenOptions::new(SampleFormat::S16)
            .container(ContainerKind::Raw)
            .raw_format(SampleFormat::U8)
            .raw_channels(1)
            .open(ReadOnlySource::new(&[0u8, 128, 255][..]))
            .unwrap();
        let mut out = [0i16; 8];
        assert_eq!(stream.read_samples(&mut out, 8).unwrap(), 3);
        assert_eq!(&out[..3], &[-32768, 0, 127 << 8]);
        assert_eq!(stream.read_samples(&mut out, 8).unwrap(), 0);
    }

    #[test]
    fn output_capacity_bounds_frames() {
        let mut stream = OpenOptions::new(SampleFormat::S16)
            .container(ContainerKind::Raw)
            .open(Cursor::new(vec![0u8; 400]))
            .unwrap();
        let mut out = [0i16; 5];
        // Room for two whole stereo frames only.
        assert_eq!(stream.read_samples(&mut out, 1000).unwrap(), 2);
        assert_eq!(stream.position(), 2);
        let mut tiny = [0i16; 1];
        assert_eq!(stream.read_samples(&mut tiny, 1000).unwrap(), 0);
    }

    #[test]
    fn trailing_partial_frame_is_dropped() {
        let mut stream = OpenOptions::new(SampleFormat::S16)
            .container(ContainerKind::Raw)
            .open(ReadOnlySource::new(&[1u8, 0, 2, 0, 3, 0][..]))
            .unwrap();
        let mut out = [0i16; 8];
        assert_eq!(stream.read_samples(&mut out, 4).unwrap(), 1);
        assert_eq!(&out[..2], &[1, 2]);
        assert_eq!(stream.read_samples(&mut out, 4).unwrap(), 0);
    }

    #[test]
    fn read_to_eof_ignores_declared_size() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"RIFF");
        bytes.extend_from_slice(&0u32.to_le_bytes());
        bytes.extend_from_slice(b"WAVEfmt ");
        bytes.extend_from_slice(&16u32.to_le_bytes());
        bytes.extend_from_slice(&1u16.to_le_bytes());
        bytes.extend_from_slice(&1u16.to_le_bytes());
        bytes.extend_from_slice(&8000u32.to_le_bytes());
        bytes.extend_from_slice(&16000u32.to_le_bytes());
        bytes.extend_from_slice(&2u16.to_le_bytes());
        bytes.extend_from_slice(&16u16.to_le_bytes());
        bytes.extend_from_slice(b"data");
        bytes.extend_from_slice(&4u32.to_le_bytes());
        for v in [1i16, 2, 3, 4] {
            bytes.extend_from_slice(&v.to_le_bytes());
        }

        let mut stream = OpenOptions::new(SampleFormat::S16)
            .read_to_eof(true)
            .open(Cursor::new(bytes.clone()))
            .unwrap();
        let mut out = [0i16; 8];
        assert_eq!(stream.read_samples(&mut out, 8).unwrap(), 4);
        assert_eq!(&out[..4], &[1, 2, 3, 4]);

        let mut stream = OpenOptions::new(SampleFormat::S16)
            .open(ReadOnlySource::new(Cursor::new(bytes)))
            .unwrap();
        let mut out = [0i16; 8];
        assert_eq!(stream.read_samples(&mut out, 8).unwrap(), 2);
        assert_eq!(&out[..2], &[1, 2]);
        assert_eq!(stream.read_samples(&mut out, 8).unwrap(), 0);
    }

    #[test]
    fn mismatched_output_type_rejected() {
        let mut stream = OpenOptions::new(SampleFormat::Float)
            .container(ContainerKind::Raw)
            .open(Cursor::new(vec![0u8; 16]))
            .unwrap();
        let mut out = [0i16; 4];
        assert!(matches!(
            stream.read_samples(&mut out, 2),
            Err(Error::InvalidArgument(_))
        ));
        let mut bytes = [0u8; 16];
        assert_eq!(stream.read_samples_bytes(&mut bytes, 2).unwrap(), 2);
    }
}
