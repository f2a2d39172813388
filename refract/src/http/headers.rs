//! HTTP caching header values.

use chrono::Utc;
use std::time::Duration;

/// `Cache-Control` value for a derived image response.
///
/// A zero TTL opts the response out of shared caches entirely;
/// otherwise the response is publicly cacheable for the TTL, with a
/// stale-while-revalidate window appended when it is shorter than the
/// TTL.
pub fn cache_control(ttl: Duration, swr: Duration) -> String {
    if ttl.is_zero() {
        return "private, no-cache, no-store, must-revalidate".to_string();
    }
    let ttl_secs = ttl.as_secs();
    let mut value = format!("public, s-maxage={ttl_secs}, max-age={ttl_secs}, no-transform");
    if !swr.is_zero() && swr < ttl {
        value.push_str(&format!(", stale-while-revalidate={}", swr.as_secs()));
    }
    value
}

/// `Expires` value: RFC1123 with the literal `GMT` zone designator.
pub fn expires_value(ttl: Duration) -> String {
    let expires = Utc::now() + chrono::Duration::from_std(ttl).unwrap_or_default();
    expires.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_ttl_is_uncacheable() {
        assert_eq!(
            cache_control(Duration::ZERO, Duration::from_secs(60)),
            "private, no-cache, no-store, must-revalidate"
        );
    }

    #[test]
    fn test_ttl_with_swr() {
        assert_eq!(
            cache_control(Duration::from_secs(3600), Duration::from_secs(60)),
            "public, s-maxage=3600, max-age=3600, no-transform, stale-while-revalidate=60"
        );
    }

    #[test]
    fn test_swr_must_be_shorter_than_ttl() {
        assert_eq!(
            cache_control(Duration::from_secs(60), Duration::from_secs(60)),
            "public, s-maxage=60, max-age=60, no-transform"
        );
        assert_eq!(
            cache_control(Duration::from_secs(60), Duration::from_secs(120)),
            "public, s-maxage=60, max-age=60, no-transform"
        );
        assert_eq!(
            cache_control(Duration::from_secs(60), Duration::ZERO),
            "public, s-maxage=60, max-age=60, no-transform"
        );
    }

    #[test]
    fn test_expires_is_rfc1123_gmt() {
        let value = expires_value(Duration::from_secs(60));
        // e.g. "Sun, 02 Aug 2026 15:04:05 GMT"
        assert!(value.ends_with(" GMT"));
        assert_eq!(value.len(), 29);
        assert_eq!(&value[3..5], ", ");
    }
}
