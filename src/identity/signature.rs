//! HMAC-SHA256 signing shared by the guest cookie and bearer tokens.

use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Signs and verifies short messages with a server-side secret.
#[derive(Clone)]
pub struct Signer {
    secret: Vec<u8>,
}

impl Signer {
    /// Creates a signer for `secret`.
    #[must_use]
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self {
            secret: secret.as_ref().to_vec(),
        }
    }

    /// Returns the unpadded base64url HMAC of `message`.
    #[must_use]
    pub fn sign(&self, message: &str) -> String {
        let Ok(mut mac) = HmacSha256::new_from_slice(&self.secret) else {
            return String::new();
        };
        mac.update(message.as_bytes());
        URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes())
    }

    /// Checks `signature` against `message` in constant time.
    #[must_use]
    pub fn verify(&self, message: &str, signature: &str) -> bool {
        let Ok(expected) = URL_SAFE_NO_PAD.decode(signature) else {
            return false;
        };
        let Ok(mut mac) = HmacSha256::new_from_slice(&self.secret) else {
            return false;
        };
        mac.update(message.as_bytes());
        mac.verify_slice(&expected).is_ok()
    }
}

impl fmt::Debug for Signer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signer").field("secret", &"<redacted>").finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_verifies_only_for_same_secret_and_message() {
        let signer = Signer::new("s3cret");
        let sig = signer.sign("abc|100");
        assert!(signer.verify("abc|100", &sig));
        assert!(!signer.verify("abc|101", &sig));
        assert!(!Signer::new("other").verify("abc|100", &sig));
        assert!(!signer.verify("abc|100", "not base64 !!"));
    }

    #[test]
    fn debug_hides_secret() {
        let rendered = format!("{:?}", Signer::new("s3cret"));
        assert!(!rendered.contains("s3cret"));
    }
}
