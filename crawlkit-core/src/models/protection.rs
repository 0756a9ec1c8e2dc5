//! Bot-protection signatures.
//!
//! A response is considered blocked by a protection service when it combines
//! a blocking status with a header that only those services emit.

use super::headers::Headers;

/// Statuses protection services answer with when they block a client.
pub const BLOCKING_STATUSES: &[u16] = &[403, 429, 503];

/// `(header, value substring)` pairs identifying protection services.
///
/// A `None` value matches on presence alone.
const SIGNATURES: &[(&str, Option<&str>)] = &[
    // Cloudflare
    ("cf-ray", None),
    ("cf-mitigated", None),
    ("server", Some("cloudflare")),
    // Sucuri
    ("x-sucuri-id", None),
    // DataDome
    ("x-datadome", None),
    // Imperva / Incapsula
    ("x-iinfo", None),
    // Akamai
    ("akamai-grn", None),
    ("server", Some("akamaighost")),
    // AWS WAF
    ("x-amzn-waf-action", None),
];

/// Returns the name of the first protection header present, if any.
pub fn protection_header(headers: &Headers) -> Option<&'static str> {
    SIGNATURES.iter().find_map(|(name, needle)| {
        let value = headers.get(name)?;
        match needle {
            Some(needle) => value.to_ascii_lowercase().contains(needle).then_some(*name),
            None => Some(*name),
        }
    })
}

/// True if the status and headers together look like a protection block.
pub fn is_protected(status_code: u16, headers: &Headers) -> bool {
    BLOCKING_STATUSES.contains(&status_code) && protection_header(headers).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cloudflare_block() {
        let headers: Headers = [("CF-RAY", "8a1b2c3d4e-AMS")].into_iter().collect();
        assert!(is_protected(403, &headers));
        assert!(is_protected(503, &headers));
        assert_eq!(protection_header(&headers), Some("cf-ray"));
    }

    #[test]
    fn test_status_alone_is_not_protection() {
        let headers: Headers = [("Server", "nginx")].into_iter().collect();
        assert!(!is_protected(403, &headers));
    }

    #[test]
    fn test_header_alone_is_not_protection() {
        let headers: Headers = [("Server", "cloudflare")].into_iter().collect();
        assert!(!is_protected(200, &headers));
        assert!(is_protected(429, &headers));
    }
}
