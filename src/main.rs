use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::time::Instant;

use clap::Parser;
use log::{info, LevelFilter};
use pcm_rush::*;

/// Decode RAW or WAVE PCM input and report its layout, length and peak level
#[derive(Parser, Debug)]
#[command(name = "pcm_rush")]
#[command(version, about, long_about = None)]
struct Args {
    /// Input file, or "-" to read from stdin
    #[arg(value_name = "INPUT")]
    input: PathBuf,

    /// Sample format to decode into: u8, s16, s20, s24, s32, flt, dbl
    #[arg(short, long, default_value = "flt")]
    format: SampleFormat,

    /// Container format (raw, wav); probed when omitted
    #[arg(short, long)]
    container: Option<ContainerKind>,

    /// Sample format of RAW input
    #[arg(long, default_value = "s16")]
    raw_format: SampleFormat,

    /// Byte order of RAW input (le, be)
    #[arg(long, default_value = "le")]
    raw_order: ByteOrder,

    /// Sample rate of RAW input (Hz)
    #[arg(long, default_value = "48000")]
    raw_rate: u32,

    /// Channel count of RAW input
    #[arg(long, default_value = "2")]
    raw_channels: u16,

    /// Ignore the declared data size and read until end of input
    #[arg(long)]
    read_to_eof: bool,

    /// Start decoding this many milliseconds into the stream
    #[arg(short, long, value_name = "MS")]
    seek: Option<i64>,

    /// Frames decoded per packet
    #[arg(long, default_value = "4096")]
    packet_frames: usize,

    /// More log output (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let level = match args.verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();

    let source: Box<dyn MediaSource> = if args.input.as_os_str() == "-" {
        Box::new(ReadOnlySource::new(io::stdin().lock()))
    } else {
        Box::new(File::open(&args.input)?)
    };

    let mut options = OpenOptions::new(args.format)
        .read_to_eof(args.read_to_eof)
        .raw_format(args.raw_format)
        .raw_order(args.raw_order)
        .raw_sample_rate(args.raw_rate)
        .raw_channels(args.raw_channels);
    if let Some(kind) = args.container {
        options = options.container(kind);
    }
    let mut stream = options.open(source)?;

    println!("{}", stream.describe());
    if stream.total_samples() > 0 {
        println!(
            "{} frames, {:.3} s",
            stream.total_samples(),
            stream.duration_ms() as f64 / 1000.0
        );
    }
    let mut tags: Vec<_> = stream.metadata().iter().collect();
    tags.sort();
    for (key, value) in tags {
        println!("{key}: {value}");
    }

    if let Some(ms) = args.seek {
        stream.seek_time_ms(ms, Whence::Start)?;
        info!("seeked to frame {}", stream.position());
    }

    let time = Instant::now();
    let frames = args.packet_frames;
    let (decoded, peak) = match args.format {
        SampleFormat::U8 => decode::<_, u8>(&mut stream, frames)?,
        SampleFormat::S16 => decode::<_, i16>(&mut stream, frames)?,
        SampleFormat::S20 | SampleFormat::S24 | SampleFormat::S32 => {
            decode::<_, i32>(&mut stream, frames)?
        }
        SampleFormat::Float => decode::<_, f32>(&mut stream, frames)?,
        SampleFormat::Double => decode::<_, f64>(&mut stream, frames)?,
    };
    let peak_db = if peak > 0.0 { 20.0 * peak.log10() } else { f64::NEG_INFINITY };
    println!("Decoded {decoded} frames as {}, peak {peak_db:.2} dBFS", args.format);
    println!("Elapsed time: {:?}", time.elapsed());

    Ok(())
}

/// Reads the rest of the stream. Returns the frame count and the peak magnitude
/// on a [-1, 1] scale.
fn decode<R: MediaSource, T: Sample + Into<f64>>(
    stream: &mut PcmStream<R>,
    frames_per_packet: usize,
) -> Result<(u64, f64)> {
    let desc = stream.read_format().descriptor();
    let channels = stream.channels() as u64;
    let mut packets = stream.packets::<T>(frames_per_packet)?;

    let mut samples = 0u64;
    let mut peak = 0f64;
    while let Some(packet) = packets.next()? {
        samples += packet.len() as u64;
        for &s in packet {
            let mut v: f64 = s.into();
            if !desc.slot.is_float() {
                v = (v - desc.bias as f64) / desc.full_scale();
            }
            peak = peak.max(v.abs());
        }
    }
    Ok((samples / channels, peak))
}
