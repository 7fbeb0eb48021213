use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthToken {
    pub value: String,
    pub acquired_at: DateTime<Utc>,
    pub ttl_secs: u64,
}

impl AuthToken {
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        let ttl = Duration::try_seconds(i64::try_from(self.ttl_secs).ok()?)?;
        self.acquired_at.checked_add_signed(ttl)
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at().is_none_or(|expires| expires <= now)
    }
}

impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthToken")
            .field("value", &"<redacted>")
            .field("acquired_at", &self.acquired_at)
            .field("ttl_secs", &self.ttl_secs)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_expires_after_ttl() {
        let acquired_at = Utc::now();
        let token = AuthToken {
            value: "secret".to_string(),
            acquired_at,
            ttl_secs: 60,
        };

        assert!(!token.is_expired_at(acquired_at + Duration::seconds(59)));
        assert!(token.is_expired_at(acquired_at + Duration::seconds(60)));
        assert!(!format!("{token:?}").contains("secret"));
    }
}
