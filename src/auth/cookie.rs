//! # Session Cookie Verification
//!
//! A session token is the standard base64 encoding of
//! `<hmac-sha256(key, username)>.<username>`. The split happens at the last
//! `.` so usernames may contain dots; the signature itself is raw bytes and
//! may contain any byte, including `.`, which is why the username must not
//! be searched for from the left.

use axum::http::{header, HeaderMap};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::debug;

use crate::core::config::{SigningKey, DEFAULT_SESSION_COOKIE};
use crate::core::error::{AuthError, AuthResult};

type HmacSha256 = Hmac<Sha256>;

const TOKEN_DELIMITER: u8 = b'.';

fn keyed_mac(key: &SigningKey) -> AuthResult<HmacSha256> {
    HmacSha256::new_from_slice(key.as_bytes())
        .map_err(|_| AuthError::invalid_signature())
}

/// Produces session tokens that [`CookieVerifier`] accepts
#[derive(Debug, Clone)]
pub struct SessionSigner {
    key: SigningKey,
}

impl SessionSigner {
    pub fn new(key: SigningKey) -> Self {
        Self { key }
    }

    /// Raw signature bytes for a username
    pub fn sign(&self, username: &str) -> AuthResult<Vec<u8>> {
        let mut mac = keyed_mac(&self.key)?;
        mac.update(username.as_bytes());
        Ok(mac.finalize().into_bytes().to_vec())
    }

    /// Transport-encoded token for the session cookie value
    pub fn issue(&self, username: &str) -> AuthResult<String> {
        let mut token = self.sign(username)?;
        token.push(TOKEN_DELIMITER);
        token.extend_from_slice(username.as_bytes());
        Ok(BASE64.encode(token))
    }
}

/// Validates the signed session cookie of a request
#[derive(Debug, Clone)]
pub struct CookieVerifier {
    key: SigningKey,
    cookie_name: String,
}

impl CookieVerifier {
    pub fn new(key: SigningKey) -> Self {
        Self {
            key,
            cookie_name: DEFAULT_SESSION_COOKIE.to_string(),
        }
    }

    /// Read the session from a differently named cookie
    pub fn with_cookie_name(mut self, name: impl Into<String>) -> Self {
        self.cookie_name = name.into();
        self
    }

    /// Return the username carried by a valid session cookie
    pub fn verify(&self, headers: &HeaderMap) -> AuthResult<String> {
        let value = find_cookie(headers, &self.cookie_name)
            .ok_or_else(|| AuthError::missing("no session cookie"))?;
        self.verify_token(value)
    }

    /// Verify a cookie value on its own
    pub fn verify_token(&self, value: &str) -> AuthResult<String> {
        let session = BASE64.decode(value).map_err(|e| {
            debug!(error = %e, "cookie-auth: invalid encoding");
            AuthError::malformed("session cookie is not valid base64")
        })?;

        let split = session
            .iter()
            .rposition(|&b| b == TOKEN_DELIMITER)
            .ok_or_else(|| AuthError::malformed("invalid cookie format; expected $sig.$user"))?;
        let (signature, user) = (&session[..split], &session[split + 1..]);

        let mut mac = keyed_mac(&self.key)?;
        mac.update(user);
        mac.verify_slice(signature)
            .map_err(|_| AuthError::invalid_signature())?;

        String::from_utf8(user.to_vec())
            .map_err(|_| AuthError::malformed("session username is not valid UTF-8"))
    }
}

/// First cookie with the given name across all `Cookie` headers
///
/// Pairs are split as raw bytes so a neighbouring cookie with non-ASCII
/// content does not hide the session. A pair without `=` counts as present
/// with an empty value. A matching pair whose value is not UTF-8 is skipped.
fn find_cookie<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .flat_map(|value| value.as_bytes().split(|&b| b == b';'))
        .filter_map(|pair| {
            let (key, value) = match pair.iter().position(|&b| b == b'=') {
                Some(at) => (&pair[..at], &pair[at + 1..]),
                None => (pair, &pair[pair.len()..]),
            };
            (trim_bytes(key) == name.as_bytes()).then_some(value)
        })
        .find_map(|value| std::str::from_utf8(trim_bytes(value)).ok())
        .map(|value| {
            value
                .strip_prefix('"')
                .and_then(|v| v.strip_suffix('"'))
                .unwrap_or(value)
        })
}

fn trim_bytes(bytes: &[u8]) -> &[u8] {
    let start = bytes
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(bytes.len());
    let end = bytes
        .iter()
        .rposition(|b| !b.is_ascii_whitespace())
        .map_or(start, |at| at + 1);
    &bytes[start..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn cookie_headers(line: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_str(line).unwrap());
        headers
    }

    #[test]
    fn test_find_cookie_among_others() {
        let headers = cookie_headers("theme=dark; sessionid=abc; lang=en");
        assert_eq!(find_cookie(&headers, "sessionid"), Some("abc"));
        assert_eq!(find_cookie(&headers, "session"), None);
    }

    #[test]
    fn test_find_cookie_across_header_lines() {
        let mut headers = HeaderMap::new();
        headers.append(header::COOKIE, HeaderValue::from_static("a=1"));
        headers.append(header::COOKIE, HeaderValue::from_static("sessionid=\"quoted\""));
        assert_eq!(find_cookie(&headers, "sessionid"), Some("quoted"));
    }

    #[test]
    fn test_first_matching_cookie_wins() {
        let headers = cookie_headers("sessionid=first; sessionid=second");
        assert_eq!(find_cookie(&headers, "sessionid"), Some("first"));
    }

    #[test]
    fn test_base64_padding_preserved_in_value() {
        let headers = cookie_headers("sessionid=YWJj.ZA==");
        assert_eq!(find_cookie(&headers, "sessionid"), Some("YWJj.ZA=="));
    }

    #[test]
    fn test_non_ascii_neighbour_does_not_hide_session() {
        let token = SessionSigner::new(SigningKey::from("k")).issue("alice").unwrap();
        let line = format!("theme=caf\u{e9}; sessionid={}", token);
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_bytes(line.as_bytes()).unwrap());

        assert_eq!(find_cookie(&headers, "sessionid"), Some(token.as_str()));
        let verifier = CookieVerifier::new(SigningKey::from("k"));
        assert_eq!(verifier.verify(&headers).unwrap(), "alice");
    }

    #[test]
    fn test_non_utf8_matching_value_is_skipped() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_bytes(b"sessionid=\xff\xfe; sessionid=abc").unwrap(),
        );
        assert_eq!(find_cookie(&headers, "sessionid"), Some("abc"));
    }

    #[test]
    fn test_bare_name_is_present_and_empty() {
        let headers = cookie_headers("theme=dark; sessionid");
        assert_eq!(find_cookie(&headers, "sessionid"), Some(""));

        let err = CookieVerifier::new(SigningKey::from("k"))
            .verify(&headers)
            .unwrap_err();
        assert_eq!(err.kind(), crate::core::error::AuthErrorKind::MalformedToken);
    }

    #[test]
    fn test_space_around_name_is_trimmed() {
        let headers = cookie_headers("sessionid =abc");
        assert_eq!(find_cookie(&headers, "sessionid"), Some("abc"));
    }

    #[test]
    fn test_issue_layout() {
        let signer = SessionSigner::new(SigningKey::from("k"));
        let token = BASE64.decode(signer.issue("bob").unwrap()).unwrap();
        assert_eq!(token.len(), 32 + 1 + 3);
        assert_eq!(token[32], b'.');
        assert_eq!(&token[33..], b"bob");
    }
}
