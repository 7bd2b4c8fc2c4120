use std::path::PathBuf;

use clap::{Args, Parser as ClapParser, Subcommand, ValueEnum};

use psxstr::mdec::color::ChromaUpsample;
use psxstr::mdec::decode::DecodeQuality;

#[derive(Debug, ClapParser)]
#[command(
    name       = env!("CARGO_PKG_NAME"),
    version    = env!("CARGO_PKG_VERSION"),
    author     = env!("CARGO_PKG_AUTHORS"),
    about      = "Tools for inspecting and decoding PlayStation STR video streams",
    long_about = None,
)]
pub struct Cli {
    /// Set the log level
    #[arg(long, global = true, value_enum, default_value_t = LogLevel::Info)]
    pub loglevel: LogLevel,

    /// Treat warnings as fatal errors (fail on first warning).
    #[arg(long, global = true)]
    pub strict: bool,

    /// Log output format.
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Plain)]
    pub log_format: LogFormat,

    /// Show progress bars during operations.
    #[arg(long, global = true)]
    pub progress: bool,

    /// Choose an operation to perform.
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Decode one indexed video stream to AVI (and WAV for its audio).
    Decode(DecodeArgs),

    /// Scan a disc image and list the video streams on it
    Info(InfoArgs),
}

#[derive(Debug, Args)]
pub struct DecodeArgs {
    /// Input disc image (2048-byte ISO or 2352-byte raw sectors).
    #[arg(value_name = "IMAGE")]
    pub input: PathBuf,

    /// Stream index to decode, as reported by `info`.
    #[arg(long, value_name = "INDEX", default_value_t = 0)]
    pub stream: usize,

    /// Output path for the video and audio files.
    #[arg(long, value_name = "PATH")]
    pub output_path: Option<PathBuf>,

    /// IDCT backend, a speed/fidelity tradeoff.
    #[arg(long, value_enum, default_value_t = Quality::High)]
    pub quality: Quality,

    /// Chroma upsampling filter.
    #[arg(long, value_enum, default_value_t = Upsample::Nearest)]
    pub upsample: Upsample,
}

#[derive(Debug, Args)]
pub struct InfoArgs {
    /// Input disc image.
    #[arg(value_name = "IMAGE")]
    pub input: PathBuf,

    /// Emit the stream list as a YAML report instead of a table.
    #[arg(long)]
    pub yaml: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum LogLevel {
    /// Disable logging output.
    Off,
    /// No output except errors.
    Error,
    /// Show warnings and errors.
    Warn,
    /// Show info, warnings and errors (default).
    Info,
    /// Show debug, info, warnings and errors.
    Debug,
    /// Show all log messages including trace.
    Trace,
}

impl LogLevel {
    /// Convert LogLevel to log::LevelFilter
    pub fn to_level_filter(self) -> log::LevelFilter {
        match self {
            LogLevel::Off => log::LevelFilter::Off,
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum LogFormat {
    /// Colorized human-readable text.
    Plain,
    /// Structured JSON per log record.
    Json,
}

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq)]
pub enum Quality {
    /// Simple fixed-point integer IDCT.
    Fast,
    /// Double-precision IDCT, the closest to the ideal output.
    High,
    /// PSX hardware arithmetic, matching what the console displayed.
    Psx,
}

impl Quality {
    pub fn to_decode_quality(self) -> DecodeQuality {
        match self {
            Quality::Fast => DecodeQuality::Fast,
            Quality::High => DecodeQuality::High,
            Quality::Psx => DecodeQuality::Psx,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq)]
pub enum Upsample {
    /// Repeat each chroma sample over its 2x2 luma block.
    Nearest,
    /// Bilinear chroma interpolation.
    Bilinear,
}

impl Upsample {
    pub fn to_chroma_upsample(self) -> ChromaUpsample {
        match self {
            Upsample::Nearest => ChromaUpsample::NearestNeighbor,
            Upsample::Bilinear => ChromaUpsample::Bilinear,
        }
    }
}
