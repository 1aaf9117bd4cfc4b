use chrono::{DateTime, Duration, Utc};
use secrecy::SecretString;

/// Tokens within this window of expiry are treated as already expired.
const EXPIRY_SKEW: Duration = Duration::seconds(60);

/// Token pair returned from the OAuth flow.
///
/// Never serialized: only `expires_at` is allowed to leave the process.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: SecretString,
    pub refresh_token: Option<SecretString>,
    pub expires_at: DateTime<Utc>,
}

impl TokenPair {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now + EXPIRY_SKEW
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Whole seconds until expiry, floored at zero.
    pub fn expires_in(&self) -> i64 {
        (self.expires_at - Utc::now()).num_seconds().max(0)
    }

    /// Merge a refresh response. Google usually omits the refresh token on refresh, in which
    /// case the one we already hold stays valid.
    pub fn apply_refresh(&mut self, refreshed: TokenPair) {
        self.access_token = refreshed.access_token;
        self.expires_at = refreshed.expires_at;
        if let Some(refresh_token) = refreshed.refresh_token {
            self.refresh_token = Some(refresh_token);
        }
    }
}

/// A usable access token, and whether obtaining it already spent the silent refresh.
#[derive(Debug, Clone)]
pub struct AccessGrant {
    pub access_token: SecretString,
    pub refreshed: bool,
}
