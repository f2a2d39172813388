//! URL signature: HMAC-SHA1 over the canonical path, URL-safe base64.

use base64::engine::general_purpose::URL_SAFE;
use base64::Engine as _;
use hmac::{Hmac, Mac};
use sha1::Sha1;

/// Capability for signing canonical paths.
pub trait Signer: Send + Sync {
    fn sign(&self, path: &str) -> String;
}

/// Default signer: HMAC-SHA1 keyed by a shared secret, encoded with
/// URL-safe base64 (padding kept) so the hash survives as a path segment.
pub struct HmacSigner {
    secret: String,
}

impl HmacSigner {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }
}

impl Signer for HmacSigner {
    fn sign(&self, path: &str) -> String {
        let mut mac = Hmac::<Sha1>::new_from_slice(self.secret.as_bytes())
            .expect("HMAC accepts keys of any length");
        mac.update(path.as_bytes());
        URL_SAFE.encode(mac.finalize().into_bytes())
    }
}

/// Prefixes a canonical path with its signature, yielding a servable
/// request path.
pub fn sign_path(signer: &dyn Signer, path: &str) -> String {
    let path = path.trim_start_matches('/');
    format!("{}/{}", signer.sign(path), path)
}

/// Constant-time string equality. Length mismatch fails immediately;
/// equal lengths are compared via an XOR fold with no early exit.
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    let (a, b) = (a.as_bytes(), b.as_bytes());
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
