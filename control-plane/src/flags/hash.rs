use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Deterministic bucketing hash used for percentage rollouts: a user
/// always lands in the same bucket for a given flag, independent of
/// evaluation order or request origin.
///
/// Takes the first 4 bytes of SHA-256(user_id ++ ":" ++ flag_key), over the
/// UTF-8 bytes of the canonical hyphenated UUID string, as a big-endian u32
/// and reduces mod 100, giving a stable value in 0..100. The operand order
/// and the UUID's string form are both load-bearing: this must match other
/// implementations bucketing the same user/flag pair byte for byte.
pub fn stable_hash(user_id: Uuid, flag_key: &str) -> u32 {
    let mut hasher = Sha256::new();
    hasher.update(format!("{user_id}:{flag_key}").as_bytes());
    let digest = hasher.finalize();
    let bucket = u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]]);
    bucket % 100
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn is_deterministic() {
        let user_id = Uuid::new_v4();
        assert_eq!(stable_hash(user_id, "new-dashboard"), stable_hash(user_id, "new-dashboard"));
    }

    #[test]
    fn differs_across_flags() {
        let user_id = Uuid::new_v4();
        let a = stable_hash(user_id, "flag-a");
        let b = stable_hash(user_id, "flag-b");
        assert!(a < 100 && b < 100);
    }

    #[test]
    fn stays_in_range() {
        for _ in 0..200 {
            let bucket = stable_hash(Uuid::new_v4(), "k");
            assert!(bucket < 100);
        }
    }
}
