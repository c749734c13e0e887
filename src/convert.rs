//! Elementwise conversion between the seven sample formats.
//!
//! Buffers hold unpacked samples in native byte order: one slot per sample
//! (`u8`, `i16`, `i32`, `f32` or `f64`, see [`SampleFormat::slot_bytes`]).
//! A [`Converter`] is derived from a (source, destination) pair and applies the
//! numeric policy of that pair:
//!
//! * same format: verbatim copy
//! * integer to integer: shift by the width difference, `U8` biased by 128
//! * integer to float: divide by the source full-scale magnitude
//! * float to integer: multiply by the destination full-scale magnitude, clip, truncate
//! * float to float: plain cast

use crate::format::{Sample, SampleDescriptor, SampleFormat, Slot};

/// An unpacked sample on its way between two formats.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Value {
    /// Signed integer at the width of its source format (bias already removed).
    Int(i32),
    Float(f64),
}

/// Conversion bound to one (source format, destination format) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Converter {
    src: SampleFormat,
    dst: SampleFormat,
}

impl Converter {
    pub fn new(src: SampleFormat, dst: SampleFormat) -> Self {
        Self { src, dst }
    }

    pub fn source(&self) -> SampleFormat {
        self.src
    }

    pub fn destination(&self) -> SampleFormat {
        self.dst
    }

    /// Converts `n` samples from `src` into `dst`.
    ///
    /// # Panics
    /// If either buffer is shorter than `n` slots of its format.
    pub fn convert(&self, src: &[u8], dst: &mut [u8], n: usize) {
        let sd = self.src.descriptor();
        let dd = self.dst.descriptor();
        let (ss, ds) = (sd.slot.bytes(), dd.slot.bytes());
        let src = &src[..n * ss];
        let dst = &mut dst[..n * ds];

        if self.src == self.dst {
            dst.copy_from_slice(src);
            return;
        }

        for (s, d) in src.chunks_exact(ss).zip(dst.chunks_exact_mut(ds)) {
            let value = transform(load(&sd, s), &sd, &dd);
            store(&dd, value, d);
        }
    }

    /// Typed form of [`Converter::convert`] over whole slices.
    ///
    /// Converts `min(src.len(), dst.len())` samples; the slot types must match the
    /// converter's formats.
    pub fn convert_slice<S: Sample, D: Sample>(&self, src: &[S], dst: &mut [D]) {
        debug_assert_eq!(S::SLOT, self.src.descriptor().slot);
        debug_assert_eq!(D::SLOT, self.dst.descriptor().slot);
        let n = src.len().min(dst.len());
        self.convert(
            bytemuck::cast_slice(src),
            bytemuck::cast_slice_mut(dst),
            n,
        );
    }
}

#[inline(always)]
fn load(desc: &SampleDescriptor, b: &[u8]) -> Value {
    match desc.slot {
        Slot::U8 => Value::Int(b[0] as i32 - desc.bias),
        Slot::I16 => Value::Int(i16::from_ne_bytes([b[0], b[1]]) as i32),
        Slot::I32 => Value::Int(i32::from_ne_bytes([b[0], b[1], b[2], b[3]])),
        Slot::F32 => Value::Float(f32::from_ne_bytes([b[0], b[1], b[2], b[3]]) as f64),
        Slot::F64 => Value::Float(f64::from_ne_bytes([
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
        ])),
    }
}

/// Rescales a value from the source domain to the destination domain.
#[inline(always)]
fn transform(value: Value, src: &SampleDescriptor, dst: &SampleDescriptor) -> Value {
    match (value, dst.slot.is_float()) {
        (Value::Int(v), false) => {
            if dst.width >= src.width {
                Value::Int(v << (dst.width - src.width))
            } else {
                Value::Int(v >> (src.width - dst.width))
            }
        }
        (Value::Int(v), true) => Value::Float(v as f64 / src.full_scale()),
        (Value::Float(x), true) => Value::Float(x),
        (Value::Float(x), false) => {
            // NaN is silence in every integer format.
            let x = if x.is_nan() { 0.0 } else { x };
            // Bias is applied before truncation so U8 rounds like the biased value.
            let fs = dst.full_scale();
            let bias = dst.bias as f64;
            let clipped = (x * fs + bias).clamp(bias - fs, bias + fs - 1.0);
            Value::Int(clipped as i32 - dst.bias)
        }
    }
}

#[inline(always)]
fn store(desc: &SampleDescriptor, value: Value, d: &mut [u8]) {
    match (desc.slot, value) {
        (Slot::U8, Value::Int(v)) => d[0] = v.wrapping_add(desc.bias) as u8,
        (Slot::I16, Value::Int(v)) => d.copy_from_slice(&(v as i16).to_ne_bytes()),
        (Slot::I32, Value::Int(v)) => d.copy_from_slice(&v.to_ne_bytes()),
        (Slot::F32, Value::Float(x)) => d.copy_from_slice(&(x as f32).to_ne_bytes()),
        (Slot::F64, Value::Float(x)) => d.copy_from_slice(&x.to_ne_bytes()),
        // transform() always yields the destination's domain.
        (_, value) => unreachable!("{value:?} does not fit a {:?} slot", desc.slot),
    }
}
