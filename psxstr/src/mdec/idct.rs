//! Pluggable inverse DCT backends.
//!
//! All backends take dequantized coefficients in natural order (held in f64,
//! which represents every value the integer pipeline produces exactly) and
//! emit rounded pixel-domain samples. The backends are interchangeable
//! numeric strategies selected by the decode quality setting.

use std::f64::consts::PI;

/// An 8x8 inverse transform strategy.
pub trait Idct {
    /// Full two-dimensional inverse transform.
    fn transform(&self, coeffs: &[f64; 64], out: &mut [i32; 64]);

    /// Fast path for a block whose only non-zero coefficient is the DC term.
    ///
    /// The default implementation runs the full transform on the sparse
    /// block, so overriding backends must agree with it.
    fn transform_dc(&self, dc: f64, out: &mut [i32; 64]) {
        let mut coeffs = [0.0; 64];
        coeffs[0] = dc;
        self.transform(&coeffs, out);
    }
}

/// Basis value including the per-dimension 1/2 and the C(0) = 1/sqrt(2)
/// normalization: C(u) * cos((2x+1) * u * pi / 16) / 2.
fn basis(u: usize, x: usize) -> f64 {
    let c = if u == 0 { 1.0 / 2f64.sqrt() } else { 1.0 };
    c * ((2 * x + 1) as f64 * u as f64 * PI / 16.0).cos() / 2.0
}

/// Double-precision separable IDCT.
pub struct IdctF64 {
    table: [[f64; 8]; 8],
}

impl IdctF64 {
    pub fn new() -> Self {
        let mut table = [[0.0; 8]; 8];
        for (u, row) in table.iter_mut().enumerate() {
            for (x, cell) in row.iter_mut().enumerate() {
                *cell = basis(u, x);
            }
        }
        Self { table }
    }
}

impl Default for IdctF64 {
    fn default() -> Self {
        Self::new()
    }
}

impl Idct for IdctF64 {
    fn transform(&self, coeffs: &[f64; 64], out: &mut [i32; 64]) {
        let mut tmp = [0.0; 64];
        // Columns: sum over v for each (u, y).
        for u in 0..8 {
            for y in 0..8 {
                let mut acc = 0.0;
                for v in 0..8 {
                    acc += self.table[v][y] * coeffs[v * 8 + u];
                }
                tmp[y * 8 + u] = acc;
            }
        }
        // Rows: sum over u for each (x, y).
        for y in 0..8 {
            for x in 0..8 {
                let mut acc = 0.0;
                for u in 0..8 {
                    acc += self.table[u][x] * tmp[y * 8 + u];
                }
                out[y * 8 + x] = acc.round() as i32;
            }
        }
    }

    fn transform_dc(&self, dc: f64, out: &mut [i32; 64]) {
        // 2D IDCT of a DC-only block is the constant dc/8.
        let value = (dc / 8.0).round() as i32;
        out.fill(value);
    }
}

/// Simple fixed-point integer IDCT, 12 fractional bits.
pub struct IdctSimple {
    table: [[i32; 8]; 8],
}

impl IdctSimple {
    pub fn new() -> Self {
        let mut table = [[0; 8]; 8];
        for (u, row) in table.iter_mut().enumerate() {
            for (x, cell) in row.iter_mut().enumerate() {
                *cell = (basis(u, x) * (1 << 12) as f64).round() as i32;
            }
        }
        Self { table }
    }
}

impl Default for IdctSimple {
    fn default() -> Self {
        Self::new()
    }
}

impl Idct for IdctSimple {
    fn transform(&self, coeffs: &[f64; 64], out: &mut [i32; 64]) {
        let mut tmp = [0i64; 64];
        for u in 0..8 {
            for y in 0..8 {
                let mut acc = 0i64;
                for v in 0..8 {
                    acc += self.table[v][y] as i64 * coeffs[v * 8 + u] as i64;
                }
                tmp[y * 8 + u] = (acc + (1 << 11)) >> 12;
            }
        }
        for y in 0..8 {
            for x in 0..8 {
                let mut acc = 0i64;
                for u in 0..8 {
                    acc += self.table[u][x] as i64 * tmp[y * 8 + u];
                }
                out[y * 8 + x] = ((acc + (1 << 11)) >> 12) as i32;
            }
        }
    }
}

/// IDCT mirroring the PSX hardware's 16-bit scale table arithmetic.
///
/// The scale table holds C(u) * cos((2x+1) * u * pi / 16) quantized to
/// signed 16 bits (1/sqrt(2) becomes 23170); the second pass folds in the
/// overall 1/4 by shifting two extra bits.
pub struct IdctPsx {
    table: [[i32; 8]; 8],
}

impl IdctPsx {
    pub fn new() -> Self {
        let mut table = [[0; 8]; 8];
        for (u, row) in table.iter_mut().enumerate() {
            for (x, cell) in row.iter_mut().enumerate() {
                let c = if u == 0 { 1.0 / 2f64.sqrt() } else { 1.0 };
                let value = c * ((2 * x + 1) as f64 * u as f64 * PI / 16.0).cos();
                *cell = (value * (1 << 15) as f64).round() as i32;
            }
        }
        Self { table }
    }
}

impl Default for IdctPsx {
    fn default() -> Self {
        Self::new()
    }
}

impl Idct for IdctPsx {
    fn transform(&self, coeffs: &[f64; 64], out: &mut [i32; 64]) {
        let mut tmp = [0i64; 64];
        for u in 0..8 {
            for y in 0..8 {
                let mut acc = 0i64;
                for v in 0..8 {
                    acc += self.table[v][y] as i64 * coeffs[v * 8 + u] as i64;
                }
                tmp[y * 8 + u] = (acc + (1 << 14)) >> 15;
            }
        }
        for y in 0..8 {
            for x in 0..8 {
                let mut acc = 0i64;
                for u in 0..8 {
                    acc += self.table[u][x] as i64 * tmp[y * 8 + u];
                }
                out[y * 8 + x] = ((acc + (1 << 16)) >> 17) as i32;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dc_only_matches_full(idct: &dyn Idct, dc: f64) {
        let mut coeffs = [0.0; 64];
        coeffs[0] = dc;
        let mut full = [0; 64];
        idct.transform(&coeffs, &mut full);
        let mut fast = [0; 64];
        idct.transform_dc(dc, &mut fast);
        for (a, b) in full.iter().zip(fast.iter()) {
            assert!((a - b).abs() <= 1, "full {a} vs fast {b} for dc {dc}");
        }
    }

    #[test]
    fn single_coefficient_fast_path_agrees() {
        dc_only_matches_full(&IdctF64::new(), 800.0);
        dc_only_matches_full(&IdctF64::new(), -1024.0);
        // Integer backends use the default (exact) fast path.
        let simple = IdctSimple::new();
        let mut coeffs = [0.0; 64];
        coeffs[0] = 800.0;
        let mut full = [0; 64];
        simple.transform(&coeffs, &mut full);
        let mut fast = [0; 64];
        simple.transform_dc(800.0, &mut fast);
        assert_eq!(full, fast);
    }

    #[test]
    fn dc_only_block_is_flat() {
        let idct = IdctF64::new();
        let mut out = [0; 64];
        idct.transform_dc(800.0, &mut out);
        assert!(out.iter().all(|&v| v == 100));
    }

    #[test]
    fn backends_agree_on_a_dense_block() {
        let mut coeffs = [0.0; 64];
        for (i, c) in coeffs.iter_mut().enumerate() {
            *c = ((i as i32 % 13) - 6) as f64 * 20.0;
        }
        let mut a = [0; 64];
        let mut b = [0; 64];
        let mut c = [0; 64];
        IdctF64::new().transform(&coeffs, &mut a);
        IdctSimple::new().transform(&coeffs, &mut b);
        IdctPsx::new().transform(&coeffs, &mut c);
        for i in 0..64 {
            assert!((a[i] - b[i]).abs() <= 2, "simple diverged at {i}");
            assert!((a[i] - c[i]).abs() <= 2, "psx diverged at {i}");
        }
    }
}
