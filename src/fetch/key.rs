//! Cache key derivation.

use sha2::{Digest, Sha256};

use super::Request;

/// Builds the store key for a request: `METHOD:url:sha256(body)`.
///
/// The method is upper-cased so `get` and `GET` share entries. A missing body
/// and an empty body hash the same.
pub fn cache_key(request: &Request) -> String {
    let body = request.body.as_deref().unwrap_or_default();
    let digest = Sha256::digest(body);
    format!(
        "{}:{}:{}",
        request.method.to_ascii_uppercase(),
        request.url,
        hex::encode(digest)
    )
}
