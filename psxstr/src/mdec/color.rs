//! Fixed-function YCbCr to RGB conversion with 4:2:0 upsampling.
//!
//! Decoded planes are signed samples centered on zero; the conversion adds
//! the 128 bias and clamps. Chroma sits at half resolution and is upsampled
//! to luma resolution by one of two pluggable qualities.

/// How half-resolution chroma is brought up to luma resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChromaUpsample {
    /// Each chroma sample covers its 2x2 luma quad unchanged.
    #[default]
    NearestNeighbor,
    /// Interstitial bilinear weighting (9/3/3/1 over the four neighbors).
    Bilinear,
}

#[inline]
fn clamp_u8(v: i32) -> u8 {
    v.clamp(0, 255) as u8
}

/// Fixed-point Rec.601 conversion of one biased pixel.
#[inline]
fn convert(y: i32, cb: i32, cr: i32) -> [u8; 3] {
    let y = y + 128;
    let r = y + ((91881 * cr) >> 16);
    let g = y - ((22554 * cb + 46802 * cr) >> 16);
    let b = y + ((116130 * cb) >> 16);
    [clamp_u8(r), clamp_u8(g), clamp_u8(b)]
}

/// Converts planes to packed RGB24.
///
/// `luma_stride` is the macroblock-padded plane width; chroma planes use
/// half that stride. Output is cropped to `width` x `height`.
pub fn ycbcr_to_rgb(
    luma: &[i32],
    cb: &[i32],
    cr: &[i32],
    luma_stride: usize,
    width: usize,
    height: usize,
    upsample: ChromaUpsample,
) -> Vec<u8> {
    let chroma_stride = luma_stride / 2;
    let chroma_rows = cb.len() / chroma_stride;
    let mut rgb = Vec::with_capacity(width * height * 3);

    for y in 0..height {
        for x in 0..width {
            let lum = luma[y * luma_stride + x];
            let (cb_v, cr_v) = match upsample {
                ChromaUpsample::NearestNeighbor => {
                    let ci = (y / 2) * chroma_stride + x / 2;
                    (cb[ci], cr[ci])
                }
                ChromaUpsample::Bilinear => {
                    bilinear(cb, cr, chroma_stride, chroma_rows, x, y)
                }
            };
            rgb.extend_from_slice(&convert(lum, cb_v, cr_v));
        }
    }
    rgb
}

/// Interstitial bilinear chroma fetch: chroma samples sit between 2x2 luma
/// pixels, so each luma pixel blends its nearest four chroma samples with
/// weights 9, 3, 3, 1 (sum 16), clamping at the plane edges.
fn bilinear(
    cb: &[i32],
    cr: &[i32],
    stride: usize,
    rows: usize,
    x: usize,
    y: usize,
) -> (i32, i32) {
    let cx = (x / 2) as isize;
    let cy = (y / 2) as isize;
    // Parity picks which side the second-nearest samples lie on.
    let dx = if x % 2 == 0 { -1 } else { 1 };
    let dy = if y % 2 == 0 { -1 } else { 1 };

    let clamp_x = |v: isize| v.clamp(0, stride as isize - 1) as usize;
    let clamp_y = |v: isize| v.clamp(0, rows as isize - 1) as usize;

    let i00 = clamp_y(cy) * stride + clamp_x(cx);
    let i10 = clamp_y(cy) * stride + clamp_x(cx + dx);
    let i01 = clamp_y(cy + dy) * stride + clamp_x(cx);
    let i11 = clamp_y(cy + dy) * stride + clamp_x(cx + dx);

    let mix = |p: &[i32]| (9 * p[i00] + 3 * p[i10] + 3 * p[i01] + p[i11] + 8) >> 4;
    (mix(cb), mix(cr))
}
