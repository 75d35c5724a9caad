//! # auth-adapters
//!
//! Implementations of the `IdentityProvider` port. Sign-in itself happens at
//! the external identity provider; these adapters only resolve the bearer
//! tokens it hands out.

#[cfg(feature = "auth-jwt")]
pub mod jwt;

#[cfg(feature = "auth-jwt")]
pub use jwt::{JwtIdentityProvider, JwtIssuer};

/// Extracts the token from an `Authorization: Bearer <token>` header value.
pub fn bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

/// Finds `name` in a `Cookie` header value.
pub fn cookie_value<'a>(header: &'a str, name: &str) -> Option<&'a str> {
    header
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.trim())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bearer_header() {
        assert_eq!(bearer_token("Bearer abc.def"), Some("abc.def"));
        assert_eq!(bearer_token("bearer   xyz "), Some("xyz"));
        assert_eq!(bearer_token("Basic Zm9vOmJhcg=="), None);
        assert_eq!(bearer_token("Bearer "), None);
    }

    #[test]
    fn finds_cookie() {
        let header = "theme=dark; session=tok123; other=x";
        assert_eq!(cookie_value(header, "session"), Some("tok123"));
        assert_eq!(cookie_value(header, "missing"), None);
    }
}
