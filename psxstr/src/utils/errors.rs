#[macro_export]
macro_rules! log_or_err {
    ($state:expr, $level:expr, $err:expr $(,)?) => {{
        if $level <= $state.fail_level {
            return Err($err.into());
        } else {
            match $level {
                ::log::Level::Error => ::log::error!("{}", $err),
                ::log::Level::Warn => ::log::warn!("{}", $err),
                ::log::Level::Info => ::log::info!("{}", $err),
                ::log::Level::Debug => ::log::debug!("{}", $err),
                ::log::Level::Trace => ::log::trace!("{}", $err),
            }
        }
    }};
}

#[derive(thiserror::Error, Debug)]
pub enum SectorError {
    #[error("Image size {0} is not a multiple of a known sector size")]
    UnknownSectorSize(u64),

    #[error("Raw sector {0} is missing the 12-byte sync pattern")]
    MissingSync(u32),

    #[error("Sector index {index} out of range (image has {count} sectors)")]
    OutOfRange { index: u32, count: u32 },

    #[error("I/O error reading sector: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(thiserror::Error, Debug)]
pub enum HeaderError {
    #[error("Invalid STR sector magic. Read {0:#010X}, expected 0x80010160")]
    InvalidSectorMagic(u32),

    #[error("Invalid bitstream magic. Read {0:#06X}, expected 0x3800")]
    InvalidBitstreamMagic(u16),

    #[error("Bitstream version must be 2 or 3. Read {0}")]
    InvalidVersion(u16),

    #[error("Quantization scale must be within [1, 63]. Read {0}")]
    InvalidQuantScale(u16),

    #[error("chunk_number {number} not below chunks_in_frame {count}")]
    ChunkNumberOutOfRange { number: u16, count: u16 },

    #[error("Frame dimensions {width}x{height} out of bounds")]
    InvalidDimensions { width: u16, height: u16 },

    #[error("used_demux_size {used} exceeds frame capacity {capacity}")]
    DemuxSizeTooLarge { used: u32, capacity: u32 },

    #[error("Reserved header bytes must be zero")]
    ReservedNotZero,

    #[error("Header truncated: {0} bytes")]
    Truncated(usize),
}

#[derive(thiserror::Error, Debug)]
pub enum UncompressError {
    #[error("No VLC table entry matches the next bits at bit position {position}")]
    UnknownCode { position: u64 },

    #[error("Bitstream ended mid-block at bit position {position}")]
    UnexpectedEnd { position: u64 },

    #[error("Invalid DC size category at bit position {position}")]
    InvalidDcSize { position: u64 },

    #[error("VLC0 table too small: {entries} entries, need at least {required}")]
    TableTooSmall { entries: usize, required: usize },

    #[error("Frame header rejected: {0}")]
    Header(#[from] HeaderError),

    #[error("I/O error in bitstream: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(thiserror::Error, Debug)]
pub enum MdecError {
    #[error("Run length overruns block: position {position} > 63 (macroblock {macroblock}, block {block})")]
    RunOutOfBounds {
        position: usize,
        macroblock: usize,
        block: usize,
    },

    #[error("Uncompress failure in macroblock {macroblock}, block {block}: {source}")]
    Uncompress {
        macroblock: usize,
        block: usize,
        source: UncompressError,
    },
}

#[derive(thiserror::Error, Debug)]
pub enum DemuxError {
    #[error("Duplicate chunk {chunk} for frame {frame}")]
    DuplicateChunk { frame: u32, chunk: u16 },

    #[error("Chunk {chunk} outside [0, {count}) for frame {frame}")]
    ChunkOutOfRange { frame: u32, chunk: u16, count: u16 },

    #[error(
        "Dimension change mid-frame {frame}: had {old_w}x{old_h}, chunk reports {new_w}x{new_h}"
    )]
    DimensionMismatch {
        frame: u32,
        old_w: u16,
        old_h: u16,
        new_w: u16,
        new_h: u16,
    },

    #[error("chunks_in_frame changed mid-frame {frame}: had {old}, chunk reports {new}")]
    ChunkCountMismatch { frame: u32, old: u16, new: u16 },

    #[error("Frame listener failed: {0}")]
    Listener(#[source] anyhow::Error),
}

#[derive(thiserror::Error, Debug)]
pub enum PacketError {
    #[error("Unrecognized packet magic {0:#010X}")]
    InvalidMagic(u32),

    #[error("Packet size {0} not a multiple of 4")]
    SizeNotAligned(u32),

    #[error("Packet size {0} outside [456, 14200]")]
    SizeOutOfBounds(u32),

    #[error("Byte stream ended inside a packet ({needed} bytes declared, {available} available)")]
    TruncatedPacket { needed: usize, available: usize },

    #[error("MDEC packet dimensions {width}x{height} are not a known Road Rash size")]
    InvalidDimensions { width: u16, height: u16 },

    #[error("Audio packet sentinel mismatch: read ({0}, {1}), expected (2048, 512)")]
    BadAudioSentinel(u16, u16),

    #[error("MDEC packet too short for its sub-header: {0} bytes")]
    MdecTooShort(usize),

    #[error("MDEC packet sub-header rejected: {0}")]
    SubHeader(#[from] HeaderError),
}

#[derive(thiserror::Error, Debug)]
pub enum CatalogError {
    #[error("Malformed diagram header line {line}: {text:?}")]
    BadDiagramHeader { line: usize, text: String },

    #[error("Diagram {name:?} contains invalid symbol {symbol:?}")]
    BadDiagramSymbol { name: String, symbol: char },

    #[error("Malformed sequence table header: {0:?}")]
    BadSequenceHeader(String),

    #[error("Malformed sector pair on line {line}: {text:?}")]
    BadSectorPair { line: usize, text: String },
}
