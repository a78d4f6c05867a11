//! Upstream cacheability rules.
//!
//! Every client shares one store, so a response that is private to a user
//! (a `Set-Cookie`, `Cache-Control: private`) must never land in it.

use super::message::header_values;
use super::Response;

/// Parsed `Cache-Control` directives relevant to a shared cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheControl {
    /// False when `no-store`, `no-cache` or `private` is present
    pub cacheable: bool,
}

impl Default for CacheControl {
    fn default() -> Self {
        Self { cacheable: true }
    }
}

/// Parses one `Cache-Control` header value.
pub fn parse_cache_control(value: &str) -> CacheControl {
    let mut result = CacheControl::default();

    for directive in value.split(',').map(|s| s.trim().to_ascii_lowercase()) {
        if directive == "no-store" || directive == "no-cache" || directive == "private" {
            result.cacheable = false;
        }
    }

    result
}

/// Whether `response` may be written to a shared store.
pub fn is_storable(response: &Response) -> bool {
    if header_values(&response.headers, "set-cookie").next().is_some() {
        return false;
    }

    header_values(&response.headers, "cache-control").all(|v| parse_cache_control(v).cacheable)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cache_control() {
        assert!(parse_cache_control("public, max-age=600").cacheable);
        assert!(!parse_cache_control("no-store").cacheable);
        assert!(!parse_cache_control("max-age=0, Private").cacheable);
        assert!(!parse_cache_control(" no-cache ").cacheable);
        assert!(parse_cache_control("").cacheable);
    }

    #[test]
    fn test_storable_responses() {
        assert!(is_storable(&Response::new(200, "ok")));
        assert!(is_storable(
            &Response::new(200, "ok").with_header("Cache-Control", "public, max-age=60")
        ));
    }

    #[test]
    fn test_user_specific_responses_are_not_storable() {
        let with_cookie = Response::new(200, "<html>").with_header("Set-Cookie", "sessionid=A");
        assert!(!is_storable(&with_cookie));

        let private = Response::new(200, "<html>").with_header("cache-control", "private");
        assert!(!is_storable(&private));

        let split = Response::new(200, "{}")
            .with_header("cache-control", "max-age=60")
            .with_header("cache-control", "no-store");
        assert!(!is_storable(&split));
    }
}
