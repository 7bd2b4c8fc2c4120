//! SPU ADPCM audio decoding.
//!
//! Road Rash audio packets carry SPU sound units in a packed 15-byte form:
//! the filter/shift header byte, then 14 data bytes of two 4-bit samples
//! each. The unit's second byte (the loop flags) was stripped at authoring
//! time; re-expansion forces it to zero. The stripped byte is not always
//! zero in pressed discs and the true rule is unknown, so this is a known
//! lossy assumption, kept as-is.

/// Packed Road Rash sound unit length.
pub const SOUND_UNIT_LEN: usize = 15;
/// Samples decoded from one sound unit.
pub const SAMPLES_PER_UNIT: usize = 28;

const FILTER_POS: [i32; 5] = [0, 60, 115, 98, 122];
const FILTER_NEG: [i32; 5] = [0, 0, -52, -55, -60];

/// Expands a packed 15-byte unit to the 16-byte SPU block layout.
pub fn expand_unit(packed: &[u8]) -> [u8; 16] {
    debug_assert_eq!(packed.len(), SOUND_UNIT_LEN);
    let mut block = [0u8; 16];
    block[0] = packed[0];
    block[2..].copy_from_slice(&packed[1..]);
    block
}

/// One channel's ADPCM predictor state.
///
/// Instances are independent; a stereo stream needs one decoder per
/// channel because the predictor history never resets between units.
#[derive(Debug, Default)]
pub struct SpuAdpcmDecoder {
    prev1: i32,
    prev2: i32,
}

impl SpuAdpcmDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decodes one packed 15-byte sound unit to 28 PCM samples.
    pub fn decode_unit(&mut self, unit: &[u8]) -> [i16; SAMPLES_PER_UNIT] {
        self.decode_block(&expand_unit(unit))
    }

    /// Decodes a 16-byte SPU block. The loop-flag byte is ignored.
    fn decode_block(&mut self, block: &[u8; 16]) -> [i16; SAMPLES_PER_UNIT] {
        let header = block[0];
        let shift = header & 0x0F;
        // Hardware treats out-of-range shifts as 9.
        let shift = if shift > 12 { 9 } else { shift as u32 };
        let filter = (((header >> 4) & 0x0F) as usize).min(4);

        let mut samples = [0i16; SAMPLES_PER_UNIT];
        for (i, sample) in samples.iter_mut().enumerate() {
            let byte = block[2 + i / 2];
            let nibble = if i % 2 == 0 { byte & 0x0F } else { byte >> 4 };
            // Sign-extend the 4-bit sample, scale by the shift.
            let raw = ((nibble as i32) << 28) >> 28;
            let scaled = (raw << 12) >> shift;

            let predicted =
                (self.prev1 * FILTER_POS[filter] + self.prev2 * FILTER_NEG[filter] + 32) >> 6;
            let value = (scaled + predicted).clamp(i16::MIN as i32, i16::MAX as i32);

            self.prev2 = self.prev1;
            self.prev1 = value;
            *sample = value as i16;
        }
        samples
    }

    /// Decodes back-to-back packed units, ignoring any trailing partial
    /// unit.
    pub fn decode_all(&mut self, data: &[u8]) -> Vec<i16> {
        let mut pcm = Vec::with_capacity(data.len() / SOUND_UNIT_LEN * SAMPLES_PER_UNIT);
        for unit in data.chunks_exact(SOUND_UNIT_LEN) {
            pcm.extend_from_slice(&self.decode_unit(unit));
        }
        pcm
    }
}

/// Interleaves two equal-length channel buffers into L R pairs. A longer
/// channel is truncated to the shorter one.
pub fn interleave_stereo(left: &[i16], right: &[i16]) -> Vec<i16> {
    left.iter()
        .zip(right)
        .flat_map(|(&l, &r)| [l, r])
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(header: u8, data: &[u8]) -> Vec<u8> {
        let mut u = vec![header];
        u.extend_from_slice(data);
        u.resize(SOUND_UNIT_LEN, 0);
        u
    }

    #[test]
    fn filter_zero_is_a_pure_shift() {
        let mut dec = SpuAdpcmDecoder::new();
        // Shift 0: nibble 1 -> 4096, nibble 0xF -> -4096.
        let samples = dec.decode_unit(&unit(0x00, &[0xF1]));
        assert_eq!(samples[0], 4096);
        assert_eq!(samples[1], -4096);
        assert_eq!(samples[2], 0);

        // Shift 12: nibble comes out at unit scale.
        let mut dec = SpuAdpcmDecoder::new();
        let samples = dec.decode_unit(&unit(0x0C, &[0x03]));
        assert_eq!(samples[0], 3);
    }

    #[test]
    fn filter_one_holds_the_previous_sample() {
        // f0 = 60: predicted = (prev * 60 + 32) >> 6, so a lone impulse
        // of 4 sustains at 4.
        let mut dec = SpuAdpcmDecoder::new();
        let samples = dec.decode_unit(&unit(0x1C, &[0x04]));
        assert_eq!(&samples[..4], &[4, 4, 4, 4]);
    }

    #[test]
    fn accumulation_clamps_to_i16() {
        // Repeated max positive nibbles at shift 0 with filter 1 overflow
        // 16 bits quickly and must saturate.
        let mut dec = SpuAdpcmDecoder::new();
        let samples = dec.decode_unit(&unit(0x10, &[0x77; 14]));
        assert_eq!(samples[0], 28672);
        assert_eq!(samples[SAMPLES_PER_UNIT - 1], i16::MAX);
    }

    #[test]
    fn predictor_state_carries_across_units() {
        let mut dec = SpuAdpcmDecoder::new();
        dec.decode_unit(&unit(0x1C, &[0x04]));
        // Next unit contributes no new data but the predictor still rings.
        let samples = dec.decode_unit(&unit(0x1C, &[]));
        assert_eq!(samples[0], 4);
    }

    #[test]
    fn expansion_forces_the_flag_byte_to_zero() {
        let mut packed = [0u8; SOUND_UNIT_LEN];
        packed[0] = 0x35;
        packed[1] = 0xAB;
        let block = expand_unit(&packed);
        assert_eq!(block[0], 0x35);
        assert_eq!(block[1], 0);
        assert_eq!(block[2], 0xAB);
    }

    #[test]
    fn decode_all_ignores_a_trailing_partial_unit() {
        let mut dec = SpuAdpcmDecoder::new();
        let mut data = unit(0x0C, &[0x03]);
        data.extend_from_slice(&[0x99; 7]);

        let pcm = dec.decode_all(&data);
        assert_eq!(pcm.len(), SAMPLES_PER_UNIT);
        assert_eq!(pcm[0], 3);
    }

    #[test]
    fn stereo_interleave_pairs_samples() {
        let pcm = interleave_stereo(&[1, 2, 3], &[-1, -2, -3]);
        assert_eq!(pcm, vec![1, -1, 2, -2, 3, -3]);
    }
}
