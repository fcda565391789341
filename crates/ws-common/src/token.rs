//! Random URL-safe tokens for subscription ids and challenges.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use rand::RngCore;

/// Entropy of a subscription id: 18 bytes = 144 bits, 24 characters encoded.
pub const SUBSCRIPTION_ID_BYTES: usize = 18;

/// Entropy of a generated challenge.
pub const CHALLENGE_BYTES: usize = 32;

/// Generate `num_bytes` of OS-seeded randomness encoded as unpadded base64url.
pub fn url_safe_token(num_bytes: usize) -> String {
    let mut bytes = vec![0u8; num_bytes];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(&bytes)
}

/// Fresh subscription id. Collisions are not checked.
pub fn new_subscription_id() -> String {
    url_safe_token(SUBSCRIPTION_ID_BYTES)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_subscription_id_shape() {
        let id = new_subscription_id();
        assert_eq!(id.len(), 24);
        assert!(id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn test_ten_thousand_ids_are_distinct() {
        let ids: HashSet<String> = (0..10_000).map(|_| new_subscription_id()).collect();
        assert_eq!(ids.len(), 10_000);
    }
}
