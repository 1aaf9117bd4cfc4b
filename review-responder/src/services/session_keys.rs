use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;

use super::random_token;

pub const SESSION_COOKIE: &str = "rr_session";

type HmacSha256 = Hmac<Sha256>;

/// Issues and verifies signed session cookies.
///
/// The cookie only carries an opaque session id; tokens stay server-side keyed by that id.
pub struct SessionKeys {
    secret: SecretString,
    secure: bool,
    max_age_seconds: u64,
}

impl SessionKeys {
    pub fn new(secret: SecretString, secure: bool, max_age_seconds: u64) -> Self {
        Self {
            secret,
            secure,
            max_age_seconds,
        }
    }

    fn mac(&self) -> HmacSha256 {
        HmacSha256::new_from_slice(self.secret.expose_secret().as_bytes())
            .unwrap_or_else(|_| unreachable!("HMAC accepts keys of any length"))
    }

    /// Fresh session id together with its signed cookie value
    pub fn issue(&self) -> (String, String) {
        let session_id = random_token();
        let value = self.sign(&session_id);
        (session_id, value)
    }

    pub fn sign(&self, session_id: &str) -> String {
        let mut mac = self.mac();
        mac.update(session_id.as_bytes());
        let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());
        format!("{}.{}", session_id, signature)
    }

    /// Session id from a cookie value, `None` if the signature does not match
    pub fn verify(&self, value: &str) -> Option<String> {
        let (session_id, signature) = value.rsplit_once('.')?;
        let signature = URL_SAFE_NO_PAD.decode(signature).ok()?;

        let mut mac = self.mac();
        mac.update(session_id.as_bytes());
        mac.verify_slice(&signature).ok()?;
        Some(session_id.to_string())
    }

    /// Extract and verify the session cookie from a `Cookie` header value
    pub fn session_from_cookies(&self, header: &str) -> Option<String> {
        header
            .split(';')
            .filter_map(|pair| pair.trim().split_once('='))
            .filter(|(name, _)| *name == SESSION_COOKIE)
            .find_map(|(_, value)| self.verify(value))
    }

    pub fn set_cookie(&self, value: &str) -> String {
        let mut cookie = format!(
            "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
            SESSION_COOKIE, value, self.max_age_seconds
        );
        if self.secure {
            cookie.push_str("; Secure");
        }
        cookie
    }

    pub fn expire_cookie(&self) -> String {
        let mut cookie = format!("{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0", SESSION_COOKIE);
        if self.secure {
            cookie.push_str("; Secure");
        }
        cookie
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(secret: &str) -> SessionKeys {
        SessionKeys::new(SecretString::from(secret.to_string()), true, 3600)
    }

    #[test]
    fn issued_cookie_verifies() {
        let keys = keys("0123456789abcdef0123456789abcdef");
        let (session_id, value) = keys.issue();

        assert_eq!(keys.verify(&value), Some(session_id));
    }

    #[test]
    fn tampered_or_foreign_cookies_are_rejected() {
        let keys_a = keys("0123456789abcdef0123456789abcdef");
        let keys_b = keys("fedcba9876543210fedcba9876543210");
        let (session_id, value) = keys_a.issue();

        assert_eq!(keys_b.verify(&value), None);
        assert_eq!(keys_a.verify(&format!("x{}", value)), None);
        assert_eq!(keys_a.verify(&session_id), None);
        assert_eq!(keys_a.verify(""), None);
    }

    #[test]
    fn finds_session_among_other_cookies() {
        let keys = keys("0123456789abcdef0123456789abcdef");
        let (session_id, value) = keys.issue();
        let header = format!("theme=dark; {}={}; other=1", SESSION_COOKIE, value);

        assert_eq!(keys.session_from_cookies(&header), Some(session_id));
        assert_eq!(keys.session_from_cookies("theme=dark"), None);
    }

    #[test]
    fn cookie_attributes() {
        let keys = keys("0123456789abcdef0123456789abcdef");
        let cookie = keys.set_cookie("abc.def");

        assert!(cookie.starts_with("rr_session=abc.def;"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("SameSite=Lax"));
        assert!(cookie.ends_with("; Secure"));
        assert!(keys.expire_cookie().contains("Max-Age=0"));
    }
}
