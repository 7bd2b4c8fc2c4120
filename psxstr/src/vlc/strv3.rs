//! STR version 3 bitstream uncompressor.
//!
//! Version 3 shares the AC layer with version 2 but codes DC differentially:
//! a size-category VLC picks how many raw bits follow, the decoded
//! difference is scaled by 4 and added to a per-component predictor. Cr and
//! Cb keep their own predictors; the four luma blocks share one.

use crate::mdec::{MdecCode, MdecCodeStream};
use crate::utils::bitstream_io::MdecBitReader;
use crate::utils::errors::{HeaderError, UncompressError};
use crate::vlc::tables::{DC_SIZE_CHROMA, DC_SIZE_LUMA, DcSizeEntry};
use crate::vlc::{
    STR_FRAME_HEADER_LEN, StrFrameHeader, eof_to_end, read_ac_symbol, str_symbol_to_code,
};

pub struct BitStreamUncompressorStrV3 {
    reader: MdecBitReader,
    header: StrFrameHeader,
    at_block_start: bool,
    /// 0 = Cr, 1 = Cb, 2..=5 luma.
    block_in_macroblock: usize,
    predictor_cr: i16,
    predictor_cb: i16,
    predictor_luma: i16,
}

impl BitStreamUncompressorStrV3 {
    pub fn new(data: &[u8]) -> Result<Self, UncompressError> {
        let header = StrFrameHeader::parse(data)?;
        if header.version != 3 {
            return Err(HeaderError::InvalidVersion(header.version).into());
        }
        Ok(Self {
            reader: MdecBitReader::from_slice(&data[STR_FRAME_HEADER_LEN..]),
            header,
            at_block_start: true,
            block_in_macroblock: 0,
            predictor_cr: 0,
            predictor_cb: 0,
            predictor_luma: 0,
        })
    }

    fn read_dc_size(&mut self, table: &'static [DcSizeEntry; 9]) -> Result<u8, UncompressError> {
        let mut bits = 0u16;
        let mut len = 0u8;
        loop {
            bits = (bits << 1) | self.reader.get().map_err(eof_to_end(&mut self.reader))? as u16;
            len += 1;
            if let Some(entry) = table.iter().find(|e| e.len == len && e.bits == bits) {
                return Ok(entry.size);
            }
            if len >= 8 {
                return Err(UncompressError::InvalidDcSize {
                    position: self.reader.position().unwrap_or(0),
                });
            }
        }
    }

    fn read_dc(&mut self) -> Result<i16, UncompressError> {
        let table = if self.block_in_macroblock < 2 {
            &DC_SIZE_CHROMA
        } else {
            &DC_SIZE_LUMA
        };
        let size = self.read_dc_size(table)?;

        let diff = if size == 0 {
            0
        } else {
            let raw: u32 = self
                .reader
                .get_n(size as u32)
                .map_err(eof_to_end(&mut self.reader))?;
            // Top bit clear means the negative half of the size category.
            if raw >> (size - 1) == 0 {
                raw as i32 - ((1 << size) - 1)
            } else {
                raw as i32
            }
        };

        let predictor = match self.block_in_macroblock {
            0 => &mut self.predictor_cr,
            1 => &mut self.predictor_cb,
            _ => &mut self.predictor_luma,
        };
        *predictor += (diff * 4) as i16;
        Ok(*predictor)
    }

    pub fn header(&self) -> &StrFrameHeader {
        &self.header
    }
}

impl MdecCodeStream for BitStreamUncompressorStrV3 {
    fn next_code(&mut self) -> Result<MdecCode, UncompressError> {
        if self.at_block_start {
            let dc = self.read_dc()?;
            self.at_block_start = false;
            return Ok(MdecCode::new(self.header.quant_scale, dc));
        }

        match str_symbol_to_code(read_ac_symbol(&mut self.reader)?) {
            Some(code) => Ok(code),
            None => {
                self.at_block_start = true;
                self.block_in_macroblock = (self.block_in_macroblock + 1) % 6;
                Ok(MdecCode::END_OF_DATA)
            }
        }
    }
}
