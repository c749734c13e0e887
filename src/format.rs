use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Sample representations a stream can be read from or converted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SampleFormat {
    /// Unsigned 8-bit integer, silence at 128.
    U8,
    /// Signed 16-bit integer.
    S16,
    /// Signed 20-bit integer, packed into 3 bytes on disk, held in an `i32`.
    S20,
    /// Signed 24-bit integer, packed into 3 bytes on disk, held in an `i32`.
    S24,
    /// Signed 32-bit integer.
    S32,
    /// 32-bit IEEE float, nominally in [-1, 1).
    Float,
    /// 64-bit IEEE float, nominally in [-1, 1).
    Double,
}

impl SampleFormat {
    pub const ALL: [SampleFormat; 7] = [
        SampleFormat::U8,
        SampleFormat::S16,
        SampleFormat::S20,
        SampleFormat::S24,
        SampleFormat::S32,
        SampleFormat::Float,
        SampleFormat::Double,
    ];

    /// Intrinsic width in bits.
    #[inline]
    pub fn bit_width(&self) -> u32 {
        match self {
            SampleFormat::U8 => 8,
            SampleFormat::S16 => 16,
            SampleFormat::S20 => 20,
            SampleFormat::S24 => 24,
            SampleFormat::S32 | SampleFormat::Float => 32,
            SampleFormat::Double => 64,
        }
    }

    /// Bytes one sample occupies in the byte stream.
    #[inline]
    pub fn packed_bytes(&self) -> usize {
        self.bit_width().div_ceil(8) as usize
    }

    /// Bytes one sample occupies once unpacked into memory.
    #[inline]
    pub fn slot_bytes(&self) -> usize {
        self.descriptor().slot.bytes()
    }

    #[inline]
    pub fn is_float(&self) -> bool {
        self.descriptor().slot.is_float()
    }

    /// The value descriptor that drives conversion to and from this format.
    #[inline]
    pub fn descriptor(&self) -> SampleDescriptor {
        let (slot, bias) = match self {
            SampleFormat::U8 => (Slot::U8, 128),
            SampleFormat::S16 => (Slot::I16, 0),
            SampleFormat::S20 | SampleFormat::S24 | SampleFormat::S32 => (Slot::I32, 0),
            SampleFormat::Float => (Slot::F32, 0),
            SampleFormat::Double => (Slot::F64, 0),
        };
        SampleDescriptor {
            slot,
            width: self.bit_width(),
            bias,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            SampleFormat::U8 => "u8",
            SampleFormat::S16 => "s16",
            SampleFormat::S20 => "s20",
            SampleFormat::S24 => "s24",
            SampleFormat::S32 => "s32",
            SampleFormat::Float => "flt",
            SampleFormat::Double => "dbl",
        }
    }
}

impl fmt::Display for SampleFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SampleFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "u8" => Ok(SampleFormat::U8),
            "s16" => Ok(SampleFormat::S16),
            "s20" => Ok(SampleFormat::S20),
            "s24" => Ok(SampleFormat::S24),
            "s32" => Ok(SampleFormat::S32),
            "flt" | "float" | "f32" => Ok(SampleFormat::Float),
            "dbl" | "double" | "f64" => Ok(SampleFormat::Double),
            other => Err(Error::UnsupportedFormat(format!(
                "unknown sample format '{other}'"
            ))),
        }
    }
}

/// In-memory storage type of one unpacked sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    U8,
    I16,
    I32,
    F32,
    F64,
}

impl Slot {
    #[inline]
    pub fn bytes(&self) -> usize {
        match self {
            Slot::U8 => 1,
            Slot::I16 => 2,
            Slot::I32 | Slot::F32 => 4,
            Slot::F64 => 8,
        }
    }

    #[inline]
    pub fn is_float(&self) -> bool {
        matches!(self, Slot::F32 | Slot::F64)
    }
}

/// Storage slot, significant width and zero-point bias of a sample format.
///
/// Every conversion is a pure function of a source and a destination descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleDescriptor {
    pub slot: Slot,
    pub width: u32,
    /// Offset added to a signed value to obtain the stored value (128 for `U8`).
    pub bias: i32,
}

impl SampleDescriptor {
    /// 2^(width-1): the integer magnitude that maps to 1.0.
    #[inline]
    pub fn full_scale(&self) -> f64 {
        (1u64 << (self.width - 1)) as f64
    }
}

/// Byte order of multi-byte samples in the byte stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ByteOrder {
    #[default]
    Little,
    Big,
}

impl ByteOrder {
    /// Byte order of the machine running this code.
    #[inline]
    pub fn native() -> ByteOrder {
        if u16::from_ne_bytes([1, 0]) == 1 {
            ByteOrder::Little
        } else {
            ByteOrder::Big
        }
    }

    /// True when samples in this order must be swapped to become native.
    #[inline]
    pub fn needs_swap(&self) -> bool {
        *self != ByteOrder::native()
    }

    pub fn name(&self) -> &'static str {
        match self {
            ByteOrder::Little => "little-endian",
            ByteOrder::Big => "big-endian",
        }
    }
}

impl fmt::Display for ByteOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ByteOrder {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "le" | "little" => Ok(ByteOrder::Little),
            "be" | "big" => Ok(ByteOrder::Big),
            other => Err(Error::UnsupportedFormat(format!(
                "unknown byte order '{other}'"
            ))),
        }
    }
}

/// A primitive that can hold samples of some read format in memory.
pub trait Sample: bytemuck::Pod + Default {
    const SLOT: Slot;
}

impl Sample for u8 {
    const SLOT: Slot = Slot::U8;
}

impl Sample for i16 {
    const SLOT: Slot = Slot::I16;
}

impl Sample for i32 {
    const SLOT: Slot = Slot::I32;
}

impl Sample for f32 {
    const SLOT: Slot = Slot::F32;
}

impl Sample for f64 {
    const SLOT: Slot = Slot::F64;
}
