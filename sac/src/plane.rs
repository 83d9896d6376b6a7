use crate::DIFF_OFFSET;

/// Packs a signed diff array into two unsigned-8 planes such that
/// `((hi << 8) | lo) - DIFF_OFFSET == d`, per §3's two-plane packing.
pub fn pack_hi_lo(diff: &[i16]) -> (Vec<u8>, Vec<u8>) {
    let mut hi = Vec::with_capacity(diff.len());
    let mut lo = Vec::with_capacity(diff.len());
    for &d in diff {
        let biased = (d as i32 + DIFF_OFFSET) as u32;
        hi.push((biased >> 8) as u8);
        lo.push((biased & 0xff) as u8);
    }
    (hi, lo)
}

/// Inverse of [`pack_hi_lo`].
pub fn unpack_hi_lo(hi: &[u8], lo: &[u8]) -> Vec<i16> {
    hi.iter()
        .zip(lo.iter())
        .map(|(&h, &l)| {
            let biased = ((h as i32) << 8) | l as i32;
            (biased - DIFF_OFFSET) as i16
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hi_lo_round_trip_full_range() {
        let diff: Vec<i16> = (i16::MIN..=i16::MAX).step_by(257).collect();
        let (hi, lo) = pack_hi_lo(&diff);
        let unpacked = unpack_hi_lo(&hi, &lo);
        assert_eq!(unpacked, diff);
    }

    #[test]
    fn zero_diff_packs_to_bias_midpoint() {
        let (hi, lo) = pack_hi_lo(&[0]);
        // DIFF_OFFSET = 32768 = 0x8000
        assert_eq!(hi[0], 0x80);
        assert_eq!(lo[0], 0x00);
    }
}
