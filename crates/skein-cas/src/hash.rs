//! Content fingerprint used to decide whether an upload may resume.
//!
//! This is a resumability heuristic only. It covers the whole encoded payload
//! but is not an integrity check: chunk contents are never verified against it.

/// Hex characters of the full-payload digest kept in the fingerprint.
const DIGEST_HEX_LEN: usize = 16;

/// Fingerprint an encoded payload.
///
/// A 31-multiplier wrapping hash over the first `prefix_len` characters, the
/// full encoded length, and a blake3 digest of the whole payload, rendered as
/// `"{hash:08x}-{len:x}-{digest}"`. Any edit anywhere in `encoded` changes the
/// digest, so a checkpoint is never reused for different content.
pub fn rolling_hash(encoded: &str, prefix_len: usize) -> String {
    let mut hash: i32 = 0;
    for byte in encoded.bytes().take(prefix_len) {
        hash = hash.wrapping_mul(31).wrapping_add(i32::from(byte));
    }
    let digest = blake3::hash(encoded.as_bytes()).to_hex();
    format!(
        "{:08x}-{:x}-{}",
        hash as u32,
        encoded.len(),
        &digest.as_str()[..DIGEST_HEX_LEN]
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_deterministic() {
        assert_eq!(rolling_hash("abcdef", 100), rolling_hash("abcdef", 100));
    }

    #[test]
    fn test_hash_known_prefix() {
        // "ab": 97 * 31 + 98 = 3105 = 0xc21
        assert!(rolling_hash("ab", 10).starts_with("00000c21-2-"));
        assert!(rolling_hash("", 10).starts_with("00000000-0-"));
    }

    #[test]
    fn test_hash_shape() {
        let hash = rolling_hash("abcdef", 10);
        let parts: Vec<&str> = hash.split('-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0].len(), 8);
        assert_eq!(parts[2].len(), DIGEST_HEX_LEN);
        assert!(parts[2].chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_hash_detects_prefix_change() {
        assert_ne!(rolling_hash("aaaa", 4), rolling_hash("aaab", 4));
    }

    #[test]
    fn test_hash_detects_length_change_past_prefix() {
        let a = format!("{}{}", "x".repeat(10), "tail");
        let b = format!("{}{}", "x".repeat(10), "longer tail");
        assert_ne!(rolling_hash(&a, 10), rolling_hash(&b, 10));
    }

    #[test]
    fn test_hash_detects_same_length_change_past_prefix() {
        let a = format!("{}{}", "x".repeat(10), "AAAA");
        let b = format!("{}{}", "x".repeat(10), "BBBB");
        assert_ne!(rolling_hash(&a, 10), rolling_hash(&b, 10));
    }

    #[test]
    fn test_hash_detects_single_byte_change_deep_in_payload() {
        let a = "y".repeat(30_000);
        let mut b = a.clone();
        b.replace_range(25_000..25_001, "z");
        assert_ne!(rolling_hash(&a, 10_000), rolling_hash(&b, 10_000));
    }
}
