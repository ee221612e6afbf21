//! The 64-bit string hasher `PeerPicker::pick_peers` (C8) feeds into the jump
//! hash. Kept separate from [`crate::jump_hash`] so the picker can be
//! generic over the hasher, as `spec.md` §4.8 allows ("the supplied string
//! hasher").

use std::hash::Hasher;
use twox_hash::XxHash64;

/// Hashes a key to a 64-bit value using xxHash, matching the hasher already
/// used for on-disk addressing in the teacher storage engine.
pub fn hash_key(key: &str) -> u64 {
    let mut hasher = XxHash64::with_seed(0);
    hasher.write(key.as_bytes());
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn is_deterministic() {
        assert_eq!(hash_key("hello"), hash_key("hello"));
    }

    #[test]
    fn distinguishes_distinct_keys() {
        assert_ne!(hash_key("foo"), hash_key("bar"));
    }
}
