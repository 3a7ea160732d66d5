//! Session credential extraction and constant-time comparison.

use axum::http::{header, HeaderMap};

/// Cookie carrying the session token
pub const TOKEN_COOKIE: &str = "token";

/// Read the session token from the `Cookie` header(s).
///
/// Empty values count as absent.
pub fn session_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|cookies| cookies.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| name.trim() == TOKEN_COOKIE)
        .map(|(_, value)| value.trim().trim_matches('"'))
        .filter(|value| !value.is_empty())
}

/// Constant-time string comparison to prevent timing attacks
///
/// SECURITY: This function takes the same amount of time regardless of how
/// many characters match, preventing timing side-channel attacks.
pub fn constant_time_compare(a: &str, b: &str) -> bool {
    use subtle::ConstantTimeEq;

    // Pad to the longer length so the comparison does not leak it
    let max_len = std::cmp::max(a.len(), b.len());

    let mut a_padded = vec![0u8; max_len];
    let mut b_padded = vec![0xFFu8; max_len]; // Different pad value ensures mismatch if lengths differ

    a_padded[..a.len()].copy_from_slice(a.as_bytes());
    b_padded[..b.len()].copy_from_slice(b.as_bytes());

    let lengths_equal = a.len().ct_eq(&b.len());
    let contents_equal = a_padded.ct_eq(&b_padded);

    (lengths_equal & contents_equal).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(cookies: &[&str]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for c in cookies {
            map.append(header::COOKIE, HeaderValue::from_str(c).unwrap());
        }
        map
    }

    #[test]
    fn test_constant_time_compare() {
        assert!(constant_time_compare("secret", "secret"));
        assert!(!constant_time_compare("secret", "Secret"));
        assert!(!constant_time_compare("secret", "secre"));
        assert!(!constant_time_compare("secret", "secrets"));
        assert!(constant_time_compare("", ""));
    }

    #[test]
    fn test_token_cookie_found() {
        assert_eq!(session_token(&headers(&["token=abc.def"])), Some("abc.def"));
        assert_eq!(
            session_token(&headers(&["theme=dark; token=abc.def; lang=en"])),
            Some("abc.def")
        );
        assert_eq!(
            session_token(&headers(&["theme=dark", "token=\"xyz\""])),
            Some("xyz")
        );
    }

    #[test]
    fn test_token_cookie_absent() {
        assert_eq!(session_token(&HeaderMap::new()), None);
        assert_eq!(session_token(&headers(&["tokens=abc"])), None);
        assert_eq!(session_token(&headers(&["token="])), None);
    }
}
