//! STR version 2 bitstream uncompressor.
//!
//! The most common STR layout: a fixed Huffman table for AC coefficients and
//! a raw signed 10-bit DC at the start of every block. The quantization
//! scale comes from the frame header and applies to the whole frame.

use crate::mdec::{MdecCode, MdecCodeStream};
use crate::utils::bitstream_io::MdecBitReader;
use crate::utils::errors::{HeaderError, UncompressError};
use crate::vlc::{
    STR_FRAME_HEADER_LEN, StrFrameHeader, eof_to_end, read_ac_symbol, str_symbol_to_code,
};

pub struct BitStreamUncompressorStrV2 {
    reader: MdecBitReader,
    header: StrFrameHeader,
    at_block_start: bool,
}

impl BitStreamUncompressorStrV2 {
    /// Validates the frame header and positions the reader at the payload.
    pub fn new(data: &[u8]) -> Result<Self, UncompressError> {
        let header = StrFrameHeader::parse(data)?;
        if header.version != 2 {
            return Err(HeaderError::InvalidVersion(header.version).into());
        }
        Ok(Self::with_header(&data[STR_FRAME_HEADER_LEN..], header))
    }

    /// Reader over a payload whose 8-byte header was parsed elsewhere
    /// (Road Rash embeds a v2-style sub-header inside its MDEC packets).
    pub fn with_header(payload: &[u8], header: StrFrameHeader) -> Self {
        Self {
            reader: MdecBitReader::from_slice(payload),
            header,
            at_block_start: true,
        }
    }

    pub fn header(&self) -> &StrFrameHeader {
        &self.header
    }
}

impl MdecCodeStream for BitStreamUncompressorStrV2 {
    fn next_code(&mut self) -> Result<MdecCode, UncompressError> {
        if self.at_block_start {
            let dc: i16 = self.reader.get_s(10).map_err(eof_to_end(&mut self.reader))?;
            self.at_block_start = false;
            return Ok(MdecCode::new(self.header.quant_scale, dc));
        }

        match str_symbol_to_code(read_ac_symbol(&mut self.reader)?) {
            Some(code) => Ok(code),
            None => {
                self.at_block_start = true;
                Ok(MdecCode::END_OF_DATA)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::vlc::pack_bits;

    fn v2_frame(fragments: &[(u32, u32)], qscale: u16) -> Vec<u8> {
        let mut data = vec![0x01, 0x00, 0x00, 0x38];
        data.extend_from_slice(&qscale.to_le_bytes());
        data.extend_from_slice(&2u16.to_le_bytes());
        data.extend_from_slice(&pack_bits(fragments));
        data
    }

    #[test]
    fn dc_then_table_codes() -> anyhow::Result<()> {
        // DC = -3, then (0,1) negative, then (1,1) positive, then EOB.
        let data = v2_frame(
            &[
                (0b1111111101, 10),
                (0b11, 2),
                (1, 1),
                (0b011, 3),
                (0, 1),
                (0b10, 2),
            ],
            5,
        );
        let mut s = BitStreamUncompressorStrV2::new(&data)?;

        let dc = s.next_code()?;
        assert_eq!(dc.top6(), 5);
        assert_eq!(dc.bottom10(), -3);

        let ac = s.next_code()?;
        assert_eq!((ac.top6(), ac.bottom10()), (0, -1));

        let ac = s.next_code()?;
        assert_eq!((ac.top6(), ac.bottom10()), (1, 1));

        assert!(s.next_code()?.is_end_of_data());

        // Next block begins with a fresh DC read (zero padding here).
        let dc = s.next_code()?;
        assert_eq!((dc.top6(), dc.bottom10()), (5, 0));
        Ok(())
    }

    #[test]
    fn escape_code_round_trip() -> anyhow::Result<()> {
        let data = v2_frame(
            &[
                (0, 10),              // DC 0
                (0b000001, 6),        // escape
                (13, 6),              // run
                (0b1100000000, 10),   // level -256
                (0b10, 2),            // EOB
            ],
            1,
        );
        let mut s = BitStreamUncompressorStrV2::new(&data)?;
        s.next_code()?;
        let ac = s.next_code()?;
        assert_eq!((ac.top6(), ac.bottom10()), (13, -256));
        assert!(s.next_code()?.is_end_of_data());
        Ok(())
    }

    #[test]
    fn unknown_pattern_is_a_decode_failure() {
        // 16 zero bits never match a code, the EOB or the escape prefix.
        let data = v2_frame(&[(0, 10), (0, 17)], 1);
        let mut s = BitStreamUncompressorStrV2::new(&data).unwrap();
        s.next_code().unwrap();
        assert!(matches!(
            s.next_code(),
            Err(UncompressError::UnknownCode { .. })
        ));
    }

    #[test]
    fn version_3_header_is_rejected() {
        let mut data = vec![0x01, 0x00, 0x00, 0x38, 0x01, 0x00, 0x03, 0x00];
        data.extend_from_slice(&[0; 4]);
        assert!(matches!(
            BitStreamUncompressorStrV2::new(&data),
            Err(UncompressError::Header(HeaderError::InvalidVersion(3)))
        ));
    }
}
