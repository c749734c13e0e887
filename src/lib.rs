//! Streaming PCM input.
//!
//! Opens headerless (RAW) or RIFF/WAVE audio from any byte source, including
//! forward-only ones such as pipes, and delivers interleaved samples in whichever
//! of seven sample formats the caller asks for, with sample-accurate seeking.
//!
//! ```no_run
//! use pcm_rush::{FallibleStreamingIterator, PcmStream, SampleFormat, Whence};
//!
//! let file = std::fs::File::open("input.wav")?;
//! let mut stream = PcmStream::open(file, SampleFormat::Float, None)?;
//! println!("{}", stream.describe());
//!
//! stream.seek_time_ms(1500, Whence::Start)?;
//! let mut packets = stream.packets::<f32>(4096)?;
//! while let Some(samples) = packets.next()? {
//!     // interleaved f32 samples in [-1, 1)
//!     let _ = samples;
//! }
//! # Ok::<(), pcm_rush::Error>(())
//! ```

mod container;
mod convert;
mod error;
mod format;
mod options;
mod packets;
mod read;
mod seek;
mod source;
mod stream;

pub use container::{
    default_channel_mask, probe, AnyContainer, Container, ContainerKind, RawContainer,
    WaveContainer, PROBE_SIZE, WAVE_FORMAT_EXTENSIBLE, WAVE_FORMAT_IEEE_FLOAT, WAVE_FORMAT_PCM,
};
pub use convert::Converter;
pub use error::{Error, Result};
pub use format::{ByteOrder, Sample, SampleDescriptor, SampleFormat, Slot};
pub use options::{OpenOptions, RawParams};
pub use packets::Packets;
pub use read::MAX_READ_FRAMES;
pub use seek::{ForwardSkip, Whence};
pub use source::{MediaSource, ReadOnlySource, SourceStream};
pub use stream::PcmStream;

pub use fallible_streaming_iterator::FallibleStreamingIterator;
