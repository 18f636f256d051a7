//! TDM channel multiplexing.
//!
//! The SAI runs a 16-slot TDM frame with 32-bit slot words. Two 16-bit
//! channels share each slot word, so a frame is 8 words long and a full
//! block (128 samples per channel) occupies `128 × 8` words.
//!
//! ## Word layout
//!
//! Channel blocks are read as `u32` words holding two consecutive samples
//! (`s[2k]` in the low half, `s[2k+1]` in the high half, as they sit in
//! memory on a little-endian core). For a pair `(a, b)`:
//!
//! ```text
//! out1 = (in_a << 16) | (in_b & 0xFFFF)        // frame 2k
//! out2 = (in_a & 0xFFFF0000) | (in_b >> 16)    // frame 2k + 1
//! ```
//!
//! so every slot word carries channel `a` in its upper half and channel `b`
//! in its lower half.
//!
//! ```text
//!  word:   0    1    2  …  7  │  8    9  …  15 │ …
//!        [0|1][2|3][4|5]…[14|15]│[0|1][2|3]…   │
//!         ───────frame 0───────  ───frame 1───
//! ```

use crate::constants::TDM_SLOTS;

/// Pack two consecutive samples into one little-endian memory word.
#[inline(always)]
fn sample_word(samples: &[i16], k: usize) -> u32 {
    (samples[2 * k] as u16 as u32) | ((samples[2 * k + 1] as u16 as u32) << 16)
}

/// Multiplex one channel pair into a TDM half buffer.
///
/// `dest` is the start of the half buffer, `pair` the slot index inside the
/// frame (0..8). `a` goes to the upper 16 bits of the slot, `b` to the lower.
///
/// # Panics
///
/// Debug-asserts that both channels have the same even length and that
/// `dest` can hold every frame.
pub fn mux_pair(dest: &mut [u32], pair: usize, a: &[i16], b: &[i16]) {
    debug_assert!(pair < TDM_SLOTS);
    debug_assert_eq!(a.len(), b.len());
    debug_assert_eq!(a.len() % 2, 0);
    debug_assert!(dest.len() >= a.len() * TDM_SLOTS);

    for k in 0..a.len() / 2 {
        let in1 = sample_word(a, k);
        let in2 = sample_word(b, k);
        let out1 = (in1 << 16) | (in2 & 0xFFFF);
        let out2 = (in1 & 0xFFFF_0000) | (in2 >> 16);
        let frame = 2 * k;
        dest[frame * TDM_SLOTS + pair] = out1;
        dest[(frame + 1) * TDM_SLOTS + pair] = out2;
    }
}

/// Split one slot column of a TDM half buffer back into its two channels.
///
/// Inverse of [`mux_pair`]; used for loopback checks and diagnostics.
pub fn demux_pair(src: &[u32], pair: usize, a: &mut [i16], b: &mut [i16]) {
    debug_assert!(pair < TDM_SLOTS);
    debug_assert_eq!(a.len(), b.len());
    debug_assert!(src.len() >= a.len() * TDM_SLOTS);

    for frame in 0..a.len() {
        let word = src[frame * TDM_SLOTS + pair];
        a[frame] = (word >> 16) as i16;
        b[frame] = word as i16;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{AUDIO_BLOCK_SAMPLES, TDM_HALF_WORDS};

    fn ramp(start: i16, step: i16) -> [i16; AUDIO_BLOCK_SAMPLES] {
        core::array::from_fn(|i| start.wrapping_add((i as i16).wrapping_mul(step)))
    }

    #[test]
    fn interleave_law_holds_for_every_sample() {
        let a = ramp(-3000, 37);
        let b = ramp(12000, -211);
        let mut dest = [0u32; TDM_HALF_WORDS];

        mux_pair(&mut dest, 3, &a, &b);

        for k in 0..AUDIO_BLOCK_SAMPLES / 2 {
            let in1 = (a[2 * k] as u16 as u32) | ((a[2 * k + 1] as u16 as u32) << 16);
            let in2 = (b[2 * k] as u16 as u32) | ((b[2 * k + 1] as u16 as u32) << 16);
            assert_eq!(
                dest[(2 * k) * TDM_SLOTS + 3],
                (in1 << 16) | (in2 & 0xFFFF),
                "out1 mismatch at k={k}"
            );
            assert_eq!(
                dest[(2 * k + 1) * TDM_SLOTS + 3],
                (in1 & 0xFFFF_0000) | (in2 >> 16),
                "out2 mismatch at k={k}"
            );
        }
    }

    #[test]
    fn slot_word_has_a_high_b_low() {
        let mut a = [0i16; AUDIO_BLOCK_SAMPLES];
        let mut b = [0i16; AUDIO_BLOCK_SAMPLES];
        a[0] = 0x1234;
        b[0] = -2; // 0xFFFE
        a[1] = -1;
        b[1] = 0x0042;
        let mut dest = [0u32; TDM_HALF_WORDS];

        mux_pair(&mut dest, 0, &a, &b);

        assert_eq!(dest[0], 0x1234_FFFE);
        assert_eq!(dest[TDM_SLOTS], 0xFFFF_0042);
    }

    #[test]
    fn only_the_pair_column_is_written() {
        let a = ramp(1, 1);
        let b = ramp(-1, -1);
        let mut dest = [0xDEAD_BEEFu32; TDM_HALF_WORDS];

        mux_pair(&mut dest, 5, &a, &b);

        for (i, &word) in dest.iter().enumerate() {
            if i % TDM_SLOTS != 5 {
                assert_eq!(word, 0xDEAD_BEEF, "word {i} outside the pair column changed");
            }
        }
    }

    #[test]
    fn demux_inverts_mux() {
        let a = ramp(i16::MIN, 513);
        let b = ramp(i16::MAX, -257);
        let mut dest = [0u32; TDM_HALF_WORDS];
        mux_pair(&mut dest, 7, &a, &b);

        let mut out_a = [0i16; AUDIO_BLOCK_SAMPLES];
        let mut out_b = [0i16; AUDIO_BLOCK_SAMPLES];
        demux_pair(&dest, 7, &mut out_a, &mut out_b);

        assert_eq!(out_a, a);
        assert_eq!(out_b, b);
    }

    #[test]
    fn silent_pair_writes_zero() {
        let zeros = [0i16; AUDIO_BLOCK_SAMPLES];
        let mut dest = [u32::MAX; TDM_HALF_WORDS];
        mux_pair(&mut dest, 2, &zeros, &zeros);
        for frame in 0..AUDIO_BLOCK_SAMPLES {
            assert_eq!(dest[frame * TDM_SLOTS + 2], 0);
        }
    }
}
