//! Road Rash bitstream uncompressor.
//!
//! Road Rash keeps the canonical STR code tree but rebuilds what each leaf
//! decodes to per movie: the VLC0 packet at the start of a stream carries
//! one (positive, negative) pair of 16-bit MDEC codes per canonical leaf.
//! The same bit pattern therefore decodes to different coefficients in
//! different movies, so the table is per-stream state injected at
//! construction, never a process-wide constant.

use std::sync::Arc;

use crate::mdec::{MdecCode, MdecCodeStream};
use crate::utils::bitstream_io::MdecBitReader;
use crate::utils::errors::UncompressError;
use crate::vlc::tables::AC_TABLE;
use crate::vlc::{AcSymbol, StrFrameHeader, eof_to_end, read_ac_symbol};

/// Per-movie leaf remapping, immutable after construction.
#[derive(Debug, Clone)]
pub struct RoadRashVlcTable {
    /// Indexed by canonical leaf; `[0]` is the positive-sign code.
    entries: Vec<[MdecCode; 2]>,
}

impl RoadRashVlcTable {
    /// Parses a VLC0 payload: pairs of 16-bit little-endian MDEC codes, one
    /// pair per canonical leaf, in canonical leaf order.
    pub fn parse(payload: &[u8]) -> Result<Self, UncompressError> {
        let entries: Vec<[MdecCode; 2]> = payload
            .chunks_exact(4)
            .map(|quad| {
                [
                    MdecCode::from_word(u16::from_le_bytes([quad[0], quad[1]])),
                    MdecCode::from_word(u16::from_le_bytes([quad[2], quad[3]])),
                ]
            })
            .collect();
        if entries.len() < AC_TABLE.len() {
            return Err(UncompressError::TableTooSmall {
                entries: entries.len(),
                required: AC_TABLE.len(),
            });
        }
        Ok(Self { entries })
    }

    fn resolve(&self, index: usize, negative: bool) -> MdecCode {
        self.entries[index][negative as usize]
    }
}

pub struct BitStreamUncompressorRoadRash {
    reader: MdecBitReader,
    header: StrFrameHeader,
    table: Arc<RoadRashVlcTable>,
    at_block_start: bool,
}

impl BitStreamUncompressorRoadRash {
    /// `payload` is the bitstream after the packet's v2-style sub-header.
    pub fn new(payload: &[u8], header: StrFrameHeader, table: Arc<RoadRashVlcTable>) -> Self {
        Self {
            reader: MdecBitReader::from_slice(payload),
            header,
            table,
            at_block_start: true,
        }
    }
}

impl MdecCodeStream for BitStreamUncompressorRoadRash {
    fn next_code(&mut self) -> Result<MdecCode, UncompressError> {
        if self.at_block_start {
            let dc: i16 = self.reader.get_s(10).map_err(eof_to_end(&mut self.reader))?;
            self.at_block_start = false;
            return Ok(MdecCode::new(self.header.quant_scale, dc));
        }

        match read_ac_symbol(&mut self.reader)? {
            AcSymbol::EndOfBlock => {
                self.at_block_start = true;
                Ok(MdecCode::END_OF_DATA)
            }
            AcSymbol::Escape { run, level } => Ok(MdecCode::new(run, level)),
            AcSymbol::Leaf { index, negative } => Ok(self.table.resolve(index, negative)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vlc::pack_bits;

    /// A table mapping every leaf i to run i%64, levels +/-(i+1).
    fn synthetic_table() -> Arc<RoadRashVlcTable> {
        let mut payload = Vec::new();
        for i in 0..AC_TABLE.len() {
            let pos = MdecCode::new(i as u16 & 0x3F, (i + 1) as i16);
            let neg = MdecCode::new(i as u16 & 0x3F, -((i + 1) as i16));
            payload.extend_from_slice(&pos.to_word().to_le_bytes());
            payload.extend_from_slice(&neg.to_word().to_le_bytes());
        }
        Arc::new(RoadRashVlcTable::parse(&payload).unwrap())
    }

    fn header(qscale: u16) -> StrFrameHeader {
        StrFrameHeader {
            half_code_count: 0,
            quant_scale: qscale,
            version: 2,
        }
    }

    #[test]
    fn leaves_decode_through_the_movie_table() -> anyhow::Result<()> {
        // Leaf 0 is the 2-bit code "11"; in the synthetic table it decodes
        // to (0, 1) positive and (0, -1) negative.
        let payload = pack_bits(&[(0, 10), (0b11, 2), (0, 1), (0b11, 2), (1, 1), (0b10, 2)]);
        let mut s = BitStreamUncompressorRoadRash::new(&payload, header(7), synthetic_table());

        let dc = s.next_code()?;
        assert_eq!((dc.top6(), dc.bottom10()), (7, 0));

        let ac = s.next_code()?;
        assert_eq!((ac.top6(), ac.bottom10()), (0, 1));
        let ac = s.next_code()?;
        assert_eq!((ac.top6(), ac.bottom10()), (0, -1));
        assert!(s.next_code()?.is_end_of_data());
        Ok(())
    }

    #[test]
    fn two_streams_with_different_tables_disagree() -> anyhow::Result<()> {
        // Same bits, different injected tables: the decoded coefficients
        // must differ. This is the per-movie property in miniature.
        let mut other_payload = Vec::new();
        for i in 0..AC_TABLE.len() {
            let code = MdecCode::new(3, 100 + i as i16);
            other_payload.extend_from_slice(&code.to_word().to_le_bytes());
            other_payload.extend_from_slice(&code.to_word().to_le_bytes());
        }
        let other = Arc::new(RoadRashVlcTable::parse(&other_payload)?);

        let bits = pack_bits(&[(0, 10), (0b11, 2), (0, 1), (0b10, 2)]);
        let mut a = BitStreamUncompressorRoadRash::new(&bits, header(1), synthetic_table());
        let mut b = BitStreamUncompressorRoadRash::new(&bits, header(1), other);

        a.next_code()?;
        b.next_code()?;
        assert_ne!(a.next_code()?, b.next_code()?);
        Ok(())
    }

    #[test]
    fn escape_round_trip() -> anyhow::Result<()> {
        // Encode (run 40, level -300) through the escape path and decode it.
        let run = 40u32;
        let level = -300i32;
        let payload = pack_bits(&[
            (0, 10),
            (0b000001, 6),
            (run, 6),
            ((level & 0x3FF) as u32, 10),
            (0b10, 2),
        ]);
        let mut s = BitStreamUncompressorRoadRash::new(&payload, header(1), synthetic_table());
        s.next_code()?;
        let ac = s.next_code()?;
        assert_eq!((ac.top6() as u32, ac.bottom10() as i32), (run, level));
        Ok(())
    }

    #[test]
    fn short_table_is_rejected() {
        let payload = vec![0u8; (AC_TABLE.len() - 1) * 4];
        assert!(matches!(
            RoadRashVlcTable::parse(&payload),
            Err(UncompressError::TableTooSmall { .. })
        ));
    }
}
