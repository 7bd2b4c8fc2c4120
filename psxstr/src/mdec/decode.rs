//! MDEC block decode engine.
//!
//! Turns one frame's worth of quantized DCT coefficients into luma and
//! chroma planes. Decode-local failures zero-fill the remainder of the frame
//! and are reported as a recoverable per-frame error; structural stream
//! recovery is the demuxer's job, not this engine's.

use log::debug;

use crate::mdec::color::{ChromaUpsample, ycbcr_to_rgb};
use crate::mdec::idct::{Idct, IdctF64, IdctPsx, IdctSimple};
use crate::mdec::{BLOCKS_PER_MACROBLOCK, MdecCodeStream, PSX_QUANT_MATRIX, SCAN_TO_NATURAL};
use crate::utils::errors::MdecError;

/// Numeric backend selection, a user-facing speed/fidelity tradeoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DecodeQuality {
    /// Simple fixed-point integer IDCT.
    Fast,
    /// PSX hardware scale-table arithmetic.
    Psx,
    /// Double-precision IDCT with true /8 dequantization.
    #[default]
    High,
}

impl DecodeQuality {
    fn integer_rounding(self) -> bool {
        !matches!(self, DecodeQuality::High)
    }
}

/// Per-frame decoder for a fixed width and height.
///
/// Owns its plane buffers exclusively; instances are independent and not
/// thread-safe internally, run one per thread if decoding streams in
/// parallel.
pub struct MdecDecoder {
    width: usize,
    height: usize,
    mb_w: usize,
    mb_h: usize,
    quality: DecodeQuality,
    idct: Box<dyn Idct>,
    /// Full-resolution luma plane, mb_w*16 by mb_h*16, signed around 0.
    luma: Vec<i32>,
    /// Half-resolution chroma planes.
    cb: Vec<i32>,
    cr: Vec<i32>,
    coeffs: [f64; 64],
    pixels: [i32; 64],
}

impl MdecDecoder {
    pub fn new(width: usize, height: usize, quality: DecodeQuality) -> Self {
        let mb_w = width.div_ceil(16);
        let mb_h = height.div_ceil(16);
        let idct: Box<dyn Idct> = match quality {
            DecodeQuality::Fast => Box::new(IdctSimple::new()),
            DecodeQuality::Psx => Box::new(IdctPsx::new()),
            DecodeQuality::High => Box::new(IdctF64::new()),
        };
        Self {
            width,
            height,
            mb_w,
            mb_h,
            quality,
            idct,
            luma: vec![0; mb_w * 16 * mb_h * 16],
            cb: vec![0; mb_w * 8 * mb_h * 8],
            cr: vec![0; mb_w * 8 * mb_h * 8],
            coeffs: [0.0; 64],
            pixels: [0; 64],
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Decodes one frame of codes into the internal planes.
    ///
    /// Returns `None` on a clean frame. On a decode-local failure the
    /// remaining blocks are left zero-filled and the failure is returned;
    /// the planes still hold a displayable frame either way.
    pub fn decode<S: MdecCodeStream>(&mut self, stream: &mut S) -> Option<MdecError> {
        self.luma.fill(0);
        self.cb.fill(0);
        self.cr.fill(0);

        // Macroblocks are stored column-major: down each 16-pixel-wide
        // column, then the next column.
        for mb_x in 0..self.mb_w {
            for mb_y in 0..self.mb_h {
                let mb = mb_x * self.mb_h + mb_y;
                for block in 0..BLOCKS_PER_MACROBLOCK {
                    if let Err(err) = self.decode_block(stream, mb, block) {
                        debug!(
                            "zero-filling frame remainder from macroblock {mb} block {block}: {err}"
                        );
                        return Some(err);
                    }
                    self.place_block(mb_x, mb_y, block);
                }
            }
        }
        None
    }

    fn decode_block<S: MdecCodeStream>(
        &mut self,
        stream: &mut S,
        macroblock: usize,
        block: usize,
    ) -> Result<(), MdecError> {
        let wrap = |source| MdecError::Uncompress {
            macroblock,
            block,
            source,
        };

        self.coeffs = [0.0; 64];

        let first = stream.next_code().map_err(wrap)?;
        let qscale = first.top6() as i32;
        let dc = first.bottom10() as i32;
        // DC uses the matrix but never the quantization scale.
        self.coeffs[0] = (dc * PSX_QUANT_MATRIX[0]) as f64;
        let mut nonzero_ac = 0usize;

        let mut pos = 0usize;
        loop {
            let code = stream.next_code().map_err(wrap)?;
            if code.is_end_of_data() {
                break;
            }
            pos += code.top6() as usize + 1;
            if pos > 63 {
                return Err(MdecError::RunOutOfBounds {
                    position: pos,
                    macroblock,
                    block,
                });
            }
            let natural = SCAN_TO_NATURAL[pos];
            let raw = code.bottom10() as i32;
            let product = raw * PSX_QUANT_MATRIX[natural] * qscale;
            self.coeffs[natural] = if self.quality.integer_rounding() {
                ((product + 4) >> 3) as f64
            } else {
                product as f64 / 8.0
            };
            nonzero_ac += 1;
        }

        if nonzero_ac == 0 {
            self.idct.transform_dc(self.coeffs[0], &mut self.pixels);
        } else {
            self.idct.transform(&self.coeffs, &mut self.pixels);
        }
        Ok(())
    }

    /// Copies the freshly transformed 8x8 block into its plane.
    fn place_block(&mut self, mb_x: usize, mb_y: usize, block: usize) {
        match block {
            // Chroma first: Cr then Cb, both at half resolution.
            0 | 1 => {
                let plane = if block == 0 { &mut self.cr } else { &mut self.cb };
                let stride = self.mb_w * 8;
                let base = mb_y * 8 * stride + mb_x * 8;
                for row in 0..8 {
                    let dst = base + row * stride;
                    plane[dst..dst + 8].copy_from_slice(&self.pixels[row * 8..row * 8 + 8]);
                }
            }
            // Four luma blocks in raster order within the macroblock.
            _ => {
                let stride = self.mb_w * 16;
                let lx = ((block - 2) & 1) * 8;
                let ly = ((block - 2) >> 1) * 8;
                let base = (mb_y * 16 + ly) * stride + mb_x * 16 + lx;
                for row in 0..8 {
                    let dst = base + row * stride;
                    self.luma[dst..dst + 8].copy_from_slice(&self.pixels[row * 8..row * 8 + 8]);
                }
            }
        }
    }

    /// Converts the decoded planes to packed RGB24, cropped to the frame's
    /// real dimensions.
    pub fn to_rgb(&self, upsample: ChromaUpsample) -> Vec<u8> {
        ycbcr_to_rgb(
            &self.luma,
            &self.cb,
            &self.cr,
            self.mb_w * 16,
            self.width,
            self.height,
            upsample,
        )
    }
}
