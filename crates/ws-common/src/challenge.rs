//! Challenge Verifier
//!
//! Responds to endpoint-authenticity probes. An operator tool sends a random
//! challenge to the callback base URL and expects back:
//!
//! `hex(HMAC-SHA256(VALIDATION_KEY, challenge))`
//!
//! The key is not a secret. It only namespaces the response so that an
//! unrelated endpoint echoing or hashing its input does not pass the probe.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::token::{url_safe_token, CHALLENGE_BYTES};

type HmacSha256 = Hmac<Sha256>;

/// Process-wide namespacing key for challenge responses
pub const VALIDATION_KEY: &[u8] = b"websub-internal-validation-key";

#[derive(Debug, Clone, Copy, Default)]
pub struct ChallengeVerifier;

impl ChallengeVerifier {
    pub fn new() -> Self {
        Self
    }

    /// Random challenge suitable for a query parameter
    pub fn generate_challenge(&self) -> String {
        url_safe_token(CHALLENGE_BYTES)
    }

    /// Lowercase hex HMAC-SHA256 over the exact challenge bytes
    pub fn response(&self, challenge: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(VALIDATION_KEY)
            .expect("HMAC can take key of any size");
        mac.update(challenge.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    /// Check a response produced by [`ChallengeVerifier::response`]
    pub fn verify(&self, challenge: &str, response: &str) -> bool {
        let expected = self.response(challenge);
        expected.as_bytes().ct_eq(response.as_bytes()).into()
    }
}
