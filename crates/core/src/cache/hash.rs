//! Cache key generation for stored responses.

use sha2::{Digest, Sha256};

/// Compute the key a response is stored under within one cache generation.
///
/// Keys are unique per method and absolute URL; callers pass a URL that
/// has already been resolved and stripped of its fragment.
pub fn compute_cache_key(method: &str, url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(method.to_ascii_uppercase().as_bytes());
    hasher.update(b"\n");
    hasher.update(url.as_bytes());
    hex::encode(hasher.finalize())
}
