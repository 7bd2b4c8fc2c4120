#![doc = include_str!("../README.md")]
//!
//! ## Technical Overview
//!
//! STR movies interleave video and audio sectors on the disc; a frame of
//! video spans several sectors and must be demultiplexed before it can be
//! decoded. The decoded unit is the MDEC coefficient stream the PlayStation's
//! Motion Decoder chip consumes: per 8x8 block, a (quantization scale, DC)
//! code followed by (run, AC) codes up to an end-of-data sentinel.
//!
//! ## Quick Start
//!
//! Steps for extracting video from a disc image:
//!
//! 1. Index the image with [`index::DiscScanner`] to locate video streams
//! 2. Demux each stream's sectors into frames with [`demux::FrameDemuxer`]
//! 3. Uncompress a frame's bitstream into MDEC codes
//!    ([`vlc::strv2::BitStreamUncompressorStrV2`] and friends)
//! 4. Decode the codes to pixels with [`mdec::decode::MdecDecoder`]
//!
//! ```rust,no_run
//! use psxstr::demux::FrameDemuxer;
//! use psxstr::mdec::decode::{DecodeQuality, MdecDecoder};
//! use psxstr::sector::str_video::StrVideoSector;
//! use psxstr::vlc::strv2::BitStreamUncompressorStrV2;
//!
//! let mut frames = Vec::new();
//! let mut demuxer = FrameDemuxer::new(|frame| {
//!     frames.push(frame);
//!     Ok(())
//! });
//!
//! # let sectors: Vec<psxstr::sector::CdSector> = Vec::new();
//! for sector in &sectors {
//!     if let Some(vid) = StrVideoSector::identify(sector) {
//!         demuxer.feed(vid.into_chunk())?;
//!     }
//! }
//! demuxer.flush()?;
//!
//! let mut decoder = MdecDecoder::new(320, 240, DecodeQuality::High);
//! for frame in &frames {
//!     let data = frame.demux_data();
//!     let mut codes = BitStreamUncompressorStrV2::new(&data)?;
//!     if let Some(err) = decoder.decode(&mut codes) {
//!         eprintln!("frame {}: {err}", frame.frame_number);
//!     }
//!     let _rgb = decoder.to_rgb(Default::default());
//! }
//! # Ok::<(), anyhow::Error>(())
//! ```

/// Disc sector access and sector-type identification.
///
/// - **Sector source** ([`sector::DiscImage`]): 2048/2352-byte disc images
/// - **STR video sectors** ([`sector::str_video`]): the 32-byte chunk header
pub mod sector;

/// MDEC coefficient model and block decode engine.
///
/// - **Codes** ([`mdec::MdecCode`]): 16-bit (top 6, bottom 10) units
/// - **Decoder** ([`mdec::decode`]): dequantization, reverse zig-zag, IDCT
/// - **IDCT backends** ([`mdec::idct`]): integer, PSX fixed-point, double
/// - **Color** ([`mdec::color`]): YCbCr to RGB with 4:2:0 upsampling
pub mod mdec;

/// Bitstream uncompressors turning VLC byte blobs into MDEC codes.
///
/// - **STR v2** ([`vlc::strv2`]): fixed table, raw 10-bit DC
/// - **STR v3** ([`vlc::strv3`]): differential variable-length DC
/// - **Road Rash** ([`vlc::roadrash`]): per-movie table from a VLC0 packet
pub mod vlc;

/// Frame demultiplexing from interleaved sector streams.
///
/// - **Frame demuxer** ([`demux::FrameDemuxer`]): chunk accumulation state machine
/// - **Road Rash packets** ([`demux::roadrash`]): byte stream spanning sectors
pub mod demux;

/// Sectors-per-frame inference from frame boundary spacing.
///
/// - **Whole-number detector** ([`fps::whole`]): constraint narrowing
/// - **Sequence matching** ([`fps::sequence`]): diagram catalog search
/// - **Irregular titles** ([`fps::inconsistent`]): per-title sector tables
pub mod fps;

/// Single-pass disc indexing with per-format listeners.
pub mod index;

/// SPU ADPCM audio decoding for Road Rash audio packets.
pub mod audio;

/// Utility functions and supporting infrastructure.
///
/// - **Bitstream I/O** ([`utils::bitstream_io`]): 16-bit-word bit reading
/// - **Error Handling** ([`utils::errors`]): error types
pub mod utils;

/// Builds every process-wide lookup table (VLC lookup, frame-rate diagram
/// and irregular-sequence catalogs) up front.
///
/// The tables also build on first access; calling this once at startup keeps
/// initialization ordering deterministic.
pub fn init() {
    vlc::tables::init();
    let _ = fps::sequence::diagram_catalog();
    let _ = fps::inconsistent::sequence_catalog();
}
