//! Stable 64-bit ids derived from strings: tile source URIs, composer image
//! ids, and (via [`style_hash`]) geometry converter material keys.

use xxhash_rust::xxh3::xxh3_64;

pub fn hash_str(s: &str) -> u64 {
    xxh3_64(s.as_bytes())
}

/// Combines an already-hashed prefix with a tag, for composite keys like
/// `(entity_id, tile_uuid)` in [`crate::cache::GlobalCache`].
pub fn combine_hash(a: u64, b: u64) -> u64 {
    // splitmix64 finalizer, applied to the xor of both inputs
    let mut z = a ^ b.wrapping_mul(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_stable() {
        assert_eq!(hash_str("https://example.com/tile/1/2/3.png"), hash_str("https://example.com/tile/1/2/3.png"));
        assert_ne!(hash_str("a"), hash_str("b"));
    }
}
