//! Bitstream uncompressors: proprietary VLC byte blobs in, MDEC codes out.

use crate::mdec::MdecCode;
use crate::utils::bitstream_io::MdecBitReader;
use crate::utils::errors::{HeaderError, UncompressError};
use crate::vlc::tables::{EOB_BITS, EOB_LEN, ESCAPE_BITS, ESCAPE_LEN, MAX_CODE_LEN, ac_lookup};

pub mod roadrash;
pub mod strv2;
pub mod strv3;
pub mod tables;

/// The 8-byte header at the start of every STR-family frame bitstream.
///
/// Little-endian halfwords: half the MDEC code count, the 0x3800 magic, the
/// frame quantization scale and the format version. The header must
/// self-validate before any payload bit is trusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StrFrameHeader {
    pub half_code_count: u16,
    pub quant_scale: u16,
    pub version: u16,
}

pub const STR_FRAME_MAGIC: u16 = 0x3800;
pub const STR_FRAME_HEADER_LEN: usize = 8;

impl StrFrameHeader {
    pub fn parse(data: &[u8]) -> Result<Self, HeaderError> {
        if data.len() < STR_FRAME_HEADER_LEN {
            return Err(HeaderError::Truncated(data.len()));
        }
        let half_code_count = u16::from_le_bytes([data[0], data[1]]);
        let magic = u16::from_le_bytes([data[2], data[3]]);
        let quant_scale = u16::from_le_bytes([data[4], data[5]]);
        let version = u16::from_le_bytes([data[6], data[7]]);

        if magic != STR_FRAME_MAGIC {
            return Err(HeaderError::InvalidBitstreamMagic(magic));
        }
        if !(2..=3).contains(&version) {
            return Err(HeaderError::InvalidVersion(version));
        }
        if !(1..=63).contains(&quant_scale) {
            return Err(HeaderError::InvalidQuantScale(quant_scale));
        }

        Ok(Self {
            half_code_count,
            quant_scale,
            version,
        })
    }
}

/// Outcome of one walk down the shared AC code tree.
pub(crate) enum AcSymbol {
    EndOfBlock,
    /// Raw (run, level) from the escape path.
    Escape { run: u16, level: i16 },
    /// Canonical table leaf plus the trailing sign bit.
    Leaf { index: usize, negative: bool },
}

/// Walks the canonical STR code tree one bit at a time.
///
/// Shared by every uncompressor; the Road Rash format remaps what a leaf
/// means but keeps this tree shape.
pub(crate) fn read_ac_symbol(reader: &mut MdecBitReader) -> Result<AcSymbol, UncompressError> {
    let lookup = ac_lookup();
    let mut bits = 0u32;
    let mut len = 0u32;

    loop {
        bits = (bits << 1) | reader.get().map_err(eof_to_end(reader))? as u32;
        len += 1;

        if len == EOB_LEN && bits == EOB_BITS {
            return Ok(AcSymbol::EndOfBlock);
        }
        if len == ESCAPE_LEN && bits == ESCAPE_BITS {
            let run: u16 = reader.get_n(6).map_err(eof_to_end(reader))?;
            let level: i16 = reader.get_s(10).map_err(eof_to_end(reader))?;
            return Ok(AcSymbol::Escape { run, level });
        }
        if let Some(index) = lookup.find(len, bits) {
            let negative = reader.get().map_err(eof_to_end(reader))?;
            return Ok(AcSymbol::Leaf { index, negative });
        }
        if len >= MAX_CODE_LEN {
            return Err(UncompressError::UnknownCode {
                position: reader.position().unwrap_or(0),
            });
        }
    }
}

/// Maps a reader EOF into the truncation error, with bit position context.
pub(crate) fn eof_to_end(
    reader: &mut MdecBitReader,
) -> impl FnOnce(std::io::Error) -> UncompressError {
    let position = reader.position().unwrap_or(0);
    move |e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            UncompressError::UnexpectedEnd { position }
        } else {
            UncompressError::Io(e)
        }
    }
}

/// Resolves an [`AcSymbol`] against the fixed STR table.
pub(crate) fn str_symbol_to_code(symbol: AcSymbol) -> Option<MdecCode> {
    match symbol {
        AcSymbol::EndOfBlock => None,
        AcSymbol::Escape { run, level } => Some(MdecCode::new(run, level)),
        AcSymbol::Leaf { index, negative } => {
            let entry = &tables::AC_TABLE[index];
            let level = if negative {
                -(entry.level as i16)
            } else {
                entry.level as i16
            };
            Some(MdecCode::new(entry.run as u16, level))
        }
    }
}

/// Packs (bits, len) fragments MSB-first into the little-endian 16-bit words
/// STR bitstreams are made of. Test helper for every uncompressor.
#[cfg(test)]
pub(crate) fn pack_bits(fragments: &[(u32, u32)]) -> Vec<u8> {
    let mut acc: u64 = 0;
    let mut acc_len = 0u32;
    let mut words = Vec::new();
    for &(bits, len) in fragments {
        acc = (acc << len) | bits as u64;
        acc_len += len;
        while acc_len >= 16 {
            acc_len -= 16;
            words.push(((acc >> acc_len) & 0xFFFF) as u16);
        }
    }
    if acc_len > 0 {
        words.push(((acc << (16 - acc_len)) & 0xFFFF) as u16);
    }
    words.iter().flat_map(|w| w.to_le_bytes()).collect()
}
