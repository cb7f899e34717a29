//! Document identifiers.
//!
//! IDs look like `c-3f0a...` : a short kind prefix and 128 random bits in hex.

use rand::rngs::OsRng;
use rand::RngCore;

/// Prefix for client documents.
pub const CLIENT_PREFIX: &str = "c";
/// Prefix for patient documents.
pub const PATIENT_PREFIX: &str = "p";
/// Prefix for visits embedded in a patient.
pub const VISIT_PREFIX: &str = "v";

const RANDOM_BYTES: usize = 16;

/// Generate a fresh ID with the given kind prefix.
pub fn generate(prefix: &str) -> String {
    let mut bytes = [0u8; RANDOM_BYTES];
    OsRng.fill_bytes(&mut bytes);
    format!("{}-{}", prefix, hex::encode(bytes))
}

/// Check whether `id` has the shape produced by [`generate`] for `prefix`.
pub fn is_valid(prefix: &str, id: &str) -> bool {
    match id.split_once('-') {
        Some((p, rest)) => {
            p == prefix
                && rest.len() == RANDOM_BYTES * 2
                && rest.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase())
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_format() {
        let id = generate(CLIENT_PREFIX);
        assert!(id.starts_with("c-"));
        assert_eq!(id.len(), 2 + 32);
        assert!(is_valid(CLIENT_PREFIX, &id));
        assert!(!is_valid(PATIENT_PREFIX, &id));
    }

    #[test]
    fn test_generate_unique() {
        let ids: std::collections::HashSet<_> = (0..1000).map(|_| generate(VISIT_PREFIX)).collect();
        assert_eq!(ids.len(), 1000);
    }

    #[test]
    fn test_is_valid_rejects_garbage() {
        assert!(!is_valid("c", "c"));
        assert!(!is_valid("c", "c-xyz"));
        assert!(!is_valid("c", "c-ABCDEF0123456789ABCDEF0123456789"));
    }
}
