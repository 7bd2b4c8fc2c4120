//! MDEC coefficient model.
//!
//! The PlayStation's Motion Decoder chip consumes a stream of 16-bit codes.
//! The first code of each 8x8 block carries (quantization scale, DC); every
//! following code carries (zero run length, AC level) until the end-of-data
//! sentinel. A macroblock is six blocks in Cr, Cb, Y1..Y4 order.

use crate::utils::errors::UncompressError;

pub mod color;
pub mod decode;
pub mod idct;

/// Blocks per macroblock (Cr, Cb, Y1, Y2, Y3, Y4).
pub const BLOCKS_PER_MACROBLOCK: usize = 6;

/// The PSX default quantization matrix, natural (row-major) order.
///
/// These values are burned into every retail BIOS; decoded pixels diverge
/// from hardware if a single entry differs.
#[rustfmt::skip]
pub const PSX_QUANT_MATRIX: [i32; 64] = [
     2, 16, 19, 22, 26, 27, 29, 34,
    16, 16, 22, 24, 27, 29, 34, 37,
    19, 22, 26, 27, 29, 34, 34, 38,
    22, 22, 26, 27, 29, 34, 37, 40,
    22, 26, 27, 29, 32, 35, 40, 48,
    26, 27, 29, 32, 35, 40, 48, 58,
    26, 27, 29, 34, 38, 46, 56, 69,
    27, 29, 35, 38, 46, 56, 69, 83,
];

/// Maps a zig-zag scan position to its natural 8x8 index (reverse zig-zag).
#[rustfmt::skip]
pub const SCAN_TO_NATURAL: [usize; 64] = [
     0,  1,  8, 16,  9,  2,  3, 10,
    17, 24, 32, 25, 18, 11,  4,  5,
    12, 19, 26, 33, 40, 48, 41, 34,
    27, 20, 13,  6,  7, 14, 21, 28,
    35, 42, 49, 56, 57, 50, 43, 36,
    29, 22, 15, 23, 30, 37, 44, 51,
    58, 59, 52, 45, 38, 31, 39, 46,
    53, 60, 61, 54, 47, 55, 62, 63,
];

/// One 16-bit MDEC code: 6 top bits and a signed 10-bit bottom field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MdecCode(u16);

impl MdecCode {
    /// The end-of-data sentinel, top6 = 63 and bottom10 = -512.
    pub const END_OF_DATA: MdecCode = MdecCode(0xFE00);

    /// Packs the two fields. `top6` is masked to [0, 63], `bottom10` to the
    /// signed 10-bit range.
    pub fn new(top6: u16, bottom10: i16) -> Self {
        MdecCode(((top6 & 0x3F) << 10) | (bottom10 as u16 & 0x3FF))
    }

    pub fn from_word(word: u16) -> Self {
        MdecCode(word)
    }

    pub fn to_word(self) -> u16 {
        self.0
    }

    /// Top 6 bits: quantization scale (first code) or zero run length.
    pub fn top6(self) -> u16 {
        self.0 >> 10
    }

    /// Bottom 10 bits, sign extended: DC or AC coefficient value.
    pub fn bottom10(self) -> i16 {
        ((self.0 << 6) as i16) >> 6
    }

    pub fn is_end_of_data(self) -> bool {
        self == Self::END_OF_DATA
    }
}

/// Pull interface every bitstream uncompressor implements.
///
/// The decoder drives this one code at a time; implementations surface
/// malformed bit patterns and truncation as [`UncompressError`], which the
/// frame-level policy converts into a zero-filled frame remainder.
pub trait MdecCodeStream {
    fn next_code(&mut self) -> Result<MdecCode, UncompressError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_fields_round_trip() {
        let code = MdecCode::new(38, -42);
        assert_eq!(code.top6(), 38);
        assert_eq!(code.bottom10(), -42);
        assert_eq!(MdecCode::from_word(code.to_word()), code);
    }

    #[test]
    fn eod_bit_pattern() {
        assert_eq!(MdecCode::END_OF_DATA.to_word(), 0xFE00);
        assert_eq!(MdecCode::END_OF_DATA.top6(), 63);
        assert_eq!(MdecCode::END_OF_DATA.bottom10(), -512);
        assert!(MdecCode::new(63, -512).is_end_of_data());
        assert!(!MdecCode::new(63, -511).is_end_of_data());
    }

    #[test]
    fn scan_table_is_a_permutation() {
        let mut seen = [false; 64];
        for &n in &SCAN_TO_NATURAL {
            assert!(!seen[n]);
            seen[n] = true;
        }
    }
}
