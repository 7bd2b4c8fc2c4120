//! Variable-length code tables shared by the bitstream uncompressors.
//!
//! The STR AC table is the MPEG-1 run/level table: 111 leaves of 2 to 16
//! bits, each followed by a sign bit, plus the 2-bit end-of-block code and
//! the 6-bit escape prefix. The Road Rash format reuses this tree shape but
//! remaps what each leaf decodes to, so the leaf order here is the canonical
//! index the per-movie tables are keyed by.

use std::collections::HashMap;
use std::sync::OnceLock;

/// End-of-block code: 2 bits, `10`.
pub const EOB_LEN: u32 = 2;
pub const EOB_BITS: u32 = 0b10;

/// Escape prefix: 6 bits, `000001`, followed by a raw 6-bit run and a raw
/// signed 10-bit level.
pub const ESCAPE_LEN: u32 = 6;
pub const ESCAPE_BITS: u32 = 0b000001;

/// Longest table code, excluding the sign bit.
pub const MAX_CODE_LEN: u32 = 16;

/// One AC table leaf: the bit pattern (without sign) and its run/level.
#[derive(Debug, Clone, Copy)]
pub struct AcVlcEntry {
    pub len: u8,
    pub bits: u16,
    pub run: u8,
    pub level: u16,
}

const fn e(len: u8, bits: u16, run: u8, level: u16) -> AcVlcEntry {
    AcVlcEntry {
        len,
        bits,
        run,
        level,
    }
}

/// The fixed STR AC table, ordered by code length then bit pattern value.
#[rustfmt::skip]
pub static AC_TABLE: [AcVlcEntry; 111] = [
    e( 2, 0b11,                0,  1),
    e( 3, 0b011,               1,  1),
    e( 4, 0b0100,              0,  2),
    e( 4, 0b0101,              2,  1),
    e( 5, 0b00101,             0,  3),
    e( 5, 0b00110,             4,  1),
    e( 5, 0b00111,             3,  1),
    e( 6, 0b000100,            7,  1),
    e( 6, 0b000101,            6,  1),
    e( 6, 0b000110,            1,  2),
    e( 6, 0b000111,            5,  1),
    e( 7, 0b0000100,           2,  2),
    e( 7, 0b0000101,           9,  1),
    e( 7, 0b0000110,           0,  4),
    e( 7, 0b0000111,           8,  1),
    e( 8, 0b00100000,         13,  1),
    e( 8, 0b00100001,          0,  6),
    e( 8, 0b00100010,         12,  1),
    e( 8, 0b00100011,         11,  1),
    e( 8, 0b00100100,          3,  2),
    e( 8, 0b00100101,          1,  3),
    e( 8, 0b00100110,          0,  5),
    e( 8, 0b00100111,         10,  1),
    e(10, 0b0000001000,       16,  1),
    e(10, 0b0000001001,        5,  2),
    e(10, 0b0000001010,        0,  7),
    e(10, 0b0000001011,        2,  3),
    e(10, 0b0000001100,        1,  4),
    e(10, 0b0000001101,       15,  1),
    e(10, 0b0000001110,       14,  1),
    e(10, 0b0000001111,        4,  2),
    e(12, 0b000000010000,      0, 11),
    e(12, 0b000000010001,      8,  2),
    e(12, 0b000000010010,      4,  3),
    e(12, 0b000000010011,      0, 10),
    e(12, 0b000000010100,      2,  4),
    e(12, 0b000000010101,      7,  2),
    e(12, 0b000000010110,     21,  1),
    e(12, 0b000000010111,     20,  1),
    e(12, 0b000000011000,      0,  9),
    e(12, 0b000000011001,     19,  1),
    e(12, 0b000000011010,     18,  1),
    e(12, 0b000000011011,      1,  5),
    e(12, 0b000000011100,      3,  3),
    e(12, 0b000000011101,      0,  8),
    e(12, 0b000000011110,      6,  2),
    e(12, 0b000000011111,     17,  1),
    e(13, 0b0000000010000,    10,  2),
    e(13, 0b0000000010001,     9,  2),
    e(13, 0b0000000010010,     5,  3),
    e(13, 0b0000000010011,     3,  4),
    e(13, 0b0000000010100,     2,  5),
    e(13, 0b0000000010101,     1,  7),
    e(13, 0b0000000010110,     1,  6),
    e(13, 0b0000000010111,     0, 15),
    e(13, 0b0000000011000,     0, 14),
    e(13, 0b0000000011001,     0, 13),
    e(13, 0b0000000011010,     0, 12),
    e(13, 0b0000000011011,    26,  1),
    e(13, 0b0000000011100,    25,  1),
    e(13, 0b0000000011101,    24,  1),
    e(13, 0b0000000011110,    23,  1),
    e(13, 0b0000000011111,    22,  1),
    e(14, 0b00000000010000,    0, 31),
    e(14, 0b00000000010001,    0, 30),
    e(14, 0b00000000010010,    0, 29),
    e(14, 0b00000000010011,    0, 28),
    e(14, 0b00000000010100,    0, 27),
    e(14, 0b00000000010101,    0, 26),
    e(14, 0b00000000010110,    0, 25),
    e(14, 0b00000000010111,    0, 24),
    e(14, 0b00000000011000,    0, 23),
    e(14, 0b00000000011001,    0, 22),
    e(14, 0b00000000011010,    0, 21),
    e(14, 0b00000000011011,    0, 20),
    e(14, 0b00000000011100,    0, 19),
    e(14, 0b00000000011101,    0, 18),
    e(14, 0b00000000011110,    0, 17),
    e(14, 0b00000000011111,    0, 16),
    e(15, 0b000000000010000,   0, 40),
    e(15, 0b000000000010001,   0, 39),
    e(15, 0b000000000010010,   0, 38),
    e(15, 0b000000000010011,   0, 37),
    e(15, 0b000000000010100,   0, 36),
    e(15, 0b000000000010101,   0, 35),
    e(15, 0b000000000010110,   0, 34),
    e(15, 0b000000000010111,   0, 33),
    e(15, 0b000000000011000,   0, 32),
    e(15, 0b000000000011001,   1, 14),
    e(15, 0b000000000011010,   1, 13),
    e(15, 0b000000000011011,   1, 12),
    e(15, 0b000000000011100,   1, 11),
    e(15, 0b000000000011101,   1, 10),
    e(15, 0b000000000011110,   1,  9),
    e(15, 0b000000000011111,   1,  8),
    e(16, 0b0000000000010000, 31,  1),
    e(16, 0b0000000000010001, 30,  1),
    e(16, 0b0000000000010010, 29,  1),
    e(16, 0b0000000000010011, 28,  1),
    e(16, 0b0000000000010100,  6,  3),
    e(16, 0b0000000000010101, 16,  2),
    e(16, 0b0000000000010110, 15,  2),
    e(16, 0b0000000000010111, 14,  2),
    e(16, 0b0000000000011000, 13,  2),
    e(16, 0b0000000000011001, 12,  2),
    e(16, 0b0000000000011010, 11,  2),
    e(16, 0b0000000000011011, 27,  1),
    e(16, 0b0000000000011100,  1, 18),
    e(16, 0b0000000000011101,  1, 17),
    e(16, 0b0000000000011110,  1, 16),
    e(16, 0b0000000000011111,  1, 15),
];

/// One DC size-category code for version 3 differential DC.
#[derive(Debug, Clone, Copy)]
pub struct DcSizeEntry {
    pub len: u8,
    pub bits: u16,
    pub size: u8,
}

const fn d(len: u8, bits: u16, size: u8) -> DcSizeEntry {
    DcSizeEntry { len, bits, size }
}

/// Luminance DC size-category table.
pub static DC_SIZE_LUMA: [DcSizeEntry; 9] = [
    d(2, 0b00, 1),
    d(2, 0b01, 2),
    d(3, 0b100, 0),
    d(3, 0b101, 3),
    d(3, 0b110, 4),
    d(4, 0b1110, 5),
    d(5, 0b11110, 6),
    d(6, 0b111110, 7),
    d(7, 0b1111110, 8),
];

/// Chrominance DC size-category table.
pub static DC_SIZE_CHROMA: [DcSizeEntry; 9] = [
    d(2, 0b00, 0),
    d(2, 0b01, 1),
    d(2, 0b10, 2),
    d(3, 0b110, 3),
    d(4, 0b1110, 4),
    d(5, 0b11110, 5),
    d(6, 0b111110, 6),
    d(7, 0b1111110, 7),
    d(8, 0b11111110, 8),
];

/// Prefix lookup over the canonical AC table, keyed by (length, bits).
pub struct AcLookup {
    map: HashMap<u32, usize>,
}

impl AcLookup {
    fn build() -> Self {
        let mut map = HashMap::with_capacity(AC_TABLE.len());
        for (index, entry) in AC_TABLE.iter().enumerate() {
            map.insert(((entry.len as u32) << 16) | entry.bits as u32, index);
        }
        Self { map }
    }

    /// Returns the canonical leaf index for an accumulated code, if any.
    pub fn find(&self, len: u32, bits: u32) -> Option<usize> {
        self.map.get(&((len << 16) | bits)).copied()
    }
}

static AC_LOOKUP: OnceLock<AcLookup> = OnceLock::new();

/// The process-wide AC lookup. Built on first use; call [`init`] at startup
/// to keep initialization ordering deterministic.
pub fn ac_lookup() -> &'static AcLookup {
    AC_LOOKUP.get_or_init(AcLookup::build)
}

/// Explicitly builds the AC lookup; part of [`crate::init`].
pub fn init() {
    let _ = ac_lookup();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_codes_are_unique_and_prefix_free() {
        // EOB and the escape prefix take part in the same tree.
        let mut codes: Vec<(u8, u16)> = AC_TABLE.iter().map(|e| (e.len, e.bits)).collect();
        codes.push((EOB_LEN as u8, EOB_BITS as u16));
        codes.push((ESCAPE_LEN as u8, ESCAPE_BITS as u16));
        for (i, &(a_len, a_bits)) in codes.iter().enumerate() {
            for &(b_len, b_bits) in codes.iter().skip(i + 1) {
                let (s_len, s_bits, l_len, l_bits) = if a_len <= b_len {
                    (a_len, a_bits, b_len, b_bits)
                } else {
                    (b_len, b_bits, a_len, a_bits)
                };
                assert_ne!(
                    l_bits >> (l_len - s_len),
                    s_bits,
                    "{s_bits:b}/{s_len} prefixes {l_bits:b}/{l_len}"
                );
            }
        }
    }

    #[test]
    fn lookup_hits_every_entry() {
        let lookup = ac_lookup();
        for (i, entry) in AC_TABLE.iter().enumerate() {
            assert_eq!(lookup.find(entry.len as u32, entry.bits as u32), Some(i));
        }
        assert_eq!(lookup.find(EOB_LEN, EOB_BITS), None);
        assert_eq!(lookup.find(ESCAPE_LEN, ESCAPE_BITS), None);
    }

    #[test]
    fn run_level_pairs_are_unique() {
        let mut seen = std::collections::HashSet::new();
        for entry in &AC_TABLE {
            assert!(seen.insert((entry.run, entry.level)));
        }
        assert_eq!(seen.len(), 111);
    }
}
