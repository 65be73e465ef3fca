//! The 64-bit site hash.
//!
//! External tools bisect over these values, so the computation is part of
//! the wire protocol and must stay bit-identical across releases: SHA-1
//! of the site name, low 8 digest bytes little-endian, with an optional
//! parameter scramble drawn from digest bytes 9..17.

use sha1::{Digest, Sha1};

/// Hash a site name, mixing in `param` when nonzero.
///
/// `param` is typically a line number, so it is small and near other
/// params of the same site; the scramble spreads it through the low-order
/// bits the search actually looks at.
#[must_use]
pub fn site_hash(name: &str, param: u64) -> u64 {
    let digest = Sha1::digest(name.as_bytes());
    let b = digest.as_slice();

    let mut hash = 0u64;
    for i in (0..8).rev() {
        hash = hash << 8 | u64::from(b[i]);
    }

    if param == 0 {
        return hash;
    }

    let p0 = param
        .wrapping_add(u64::from(b[9]))
        .wrapping_add(u64::from(b[10]) << 8)
        .wrapping_add(u64::from(b[11]) << 16)
        .wrapping_add(u64::from(b[12]) << 24);
    let p1 = param
        .wrapping_add(u64::from(b[13]))
        .wrapping_add(u64::from(b[14]) << 8)
        .wrapping_add(u64::from(b[15]) << 16)
        .wrapping_add(u64::from(b[16]) << 24);
    let mut param = param.wrapping_add(p0.wrapping_mul(p1));
    param ^= (param >> 17) ^ (param << 47);

    hash ^ param
}

/// Render a hash the way legacy trigger lines carry it: binary with
/// leading zeros stripped, `"0"` for zero.
#[must_use]
pub fn binary_string(hash: u64) -> String {
    if hash == 0 {
        return "0".to_owned();
    }
    let mut s = String::with_capacity(64);
    let mut h = hash;
    while h != 0 {
        s.insert(0, if h & 1 == 1 { '1' } else { '0' });
        h >>= 1;
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    // Fixed vectors computed independently from the definition.
    #[test]
    fn known_vectors_param_zero() {
        assert_eq!(site_hash("ant", 0), 0x6156_4291_d805_bd64);
        assert_eq!(site_hash("bat", 0), 0x84fb_e22e_add4_649b);
        assert_eq!(site_hash("cat", 0), 0x0e9e_dc27_8d9e_989d);
        assert_eq!(site_hash("hen", 0), 0x096c_db76_6108_11d8);
        assert_eq!(site_hash("main.Example", 0), 0x063c_c130_a43d_14d6);
    }

    #[test]
    fn known_vectors_with_param() {
        assert_eq!(site_hash("ant", 1), 0xbd02_848e_457e_c12d);
        assert_eq!(site_hash("ant", 102), 0x0666_841c_83d6_d495);
        assert_eq!(site_hash("cat", 102), 0x0559_6d13_5298_8aa2);
        assert_eq!(site_hash("main.Example", 7), 0x8a6c_3d29_c66e_78cc);
        assert_eq!(site_hash("./a/a.go", 11), 0x6141_1bd5_284e_96fa);
    }

    #[test]
    fn param_changes_hash() {
        let base = site_hash("dog", 0);
        for p in 1..50u64 {
            assert_ne!(site_hash("dog", p), base);
        }
    }

    #[test]
    fn binary_string_strips_leading_zeros() {
        assert_eq!(binary_string(0), "0");
        assert_eq!(binary_string(1), "1");
        assert_eq!(binary_string(0b1010), "1010");
        assert_eq!(binary_string(u64::MAX), "1".repeat(64));
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            // The rendered binary string always parses back to the hash.
            #[test]
            fn binary_string_round_trips(h in any::<u64>()) {
                let s = binary_string(h);
                prop_assert_eq!(u64::from_str_radix(&s, 2).unwrap(), h);
            }

            // Recompute the low-8-byte extraction directly against the
            // digest to pin the endianness.
            #[test]
            fn param_zero_is_le_low_bytes(name in "[a-zA-Z._/]{1,24}") {
                let digest = sha1::Sha1::digest(name.as_bytes());
                let mut expect = [0u8; 8];
                expect.copy_from_slice(&digest[..8]);
                prop_assert_eq!(site_hash(&name, 0), u64::from_le_bytes(expect));
            }
        }
    }
}
