//! Container detection and the per-container initializers.

use std::fmt;
use std::str::FromStr;

use enum_dispatch::enum_dispatch;

use crate::error::{Error, Result};
use crate::options::OpenOptions;
use crate::source::MediaSource;
use crate::stream::PcmStream;

mod raw;
mod wave;

pub use raw::RawContainer;
pub use wave::{WaveContainer, WAVE_FORMAT_EXTENSIBLE, WAVE_FORMAT_IEEE_FLOAT, WAVE_FORMAT_PCM};

/// Number of leading bytes handed to every prober.
pub const PROBE_SIZE: usize = 12;

/// A container layout that can be detected from leading bytes and can
/// initialize a stream positioned at its start.
#[enum_dispatch]
pub trait Container {
    /// Confidence that `window` begins this container. 0 means no match.
    fn probe(&self, window: &[u8]) -> u32;

    /// Fills in the stream's layout and binds its source format. Leaves the
    /// stream positioned at the first sample byte.
    fn init<R: MediaSource>(&self, stream: &mut PcmStream<R>, options: &OpenOptions) -> Result<()>;
}

#[enum_dispatch(Container)]
#[derive(Debug, Clone, Copy)]
pub enum AnyContainer {
    RawContainer,
    WaveContainer,
}

/// Supported container formats, in probing order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContainerKind {
    Raw,
    Wave,
}

impl ContainerKind {
    pub const ALL: [ContainerKind; 2] = [ContainerKind::Raw, ContainerKind::Wave];

    pub fn handler(&self) -> AnyContainer {
        match self {
            ContainerKind::Raw => RawContainer.into(),
            ContainerKind::Wave => WaveContainer.into(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ContainerKind::Raw => "RAW",
            ContainerKind::Wave => "WAVE",
        }
    }
}

impl fmt::Display for ContainerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ContainerKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "raw" => Ok(ContainerKind::Raw),
            "wav" | "wave" => Ok(ContainerKind::Wave),
            other => Err(Error::UnsupportedFormat(format!(
                "unknown container '{other}'"
            ))),
        }
    }
}

/// Picks the container with the strictly highest score. Ties keep the earlier
/// kind, so RAW wins whenever nothing else matches.
pub fn probe(window: &[u8]) -> ContainerKind {
    let mut best = ContainerKind::ALL[0];
    let mut best_score = best.handler().probe(window);
    for kind in &ContainerKind::ALL[1..] {
        let score = kind.handler().probe(window);
        if score > best_score {
            best = *kind;
            best_score = score;
        }
    }
    best
}

/// Conventional speaker mask for a channel count (WAVE `dwChannelMask` bits).
pub fn default_channel_mask(channels: u16) -> u32 {
    match channels {
        1 => 0x04,
        2 => 0x03,
        3 => 0x07,
        4 => 0x33,
        5 => 0x37,
        6 => 0x3F,
        8 => 0x63F,
        _ => 0,
    }
}
