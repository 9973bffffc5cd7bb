/// Session model
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// One row per live refresh-token lineage. Looked up by fingerprint only;
/// the raw refresh token is never stored. Rows are retained after revocation
/// for audit and reuse detection.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Session {
    pub id: Uuid,
    pub principal_id: Uuid,
    pub refresh_fingerprint: String,
    pub expires_at: DateTime<Utc>,
    pub revoked: bool,
    pub revoked_at: Option<DateTime<Utc>>,
    pub last_activity_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Session {
    /// A session is usable iff it has not been revoked and has not expired.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        !self.revoked && self.expires_at > now
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn session(expires_at: DateTime<Utc>, revoked: bool) -> Session {
        let now = Utc::now();
        Session {
            id: Uuid::new_v4(),
            principal_id: Uuid::new_v4(),
            refresh_fingerprint: "fp".to_string(),
            expires_at,
            revoked,
            revoked_at: revoked.then_some(now),
            last_activity_at: now,
            created_at: now,
        }
    }

    #[test]
    fn active_session_is_active() {
        let now = Utc::now();
        assert!(session(now + Duration::days(1), false).is_active(now));
    }

    #[test]
    fn revoked_session_is_not_active() {
        let now = Utc::now();
        assert!(!session(now + Duration::days(1), true).is_active(now));
    }

    #[test]
    fn expiry_boundary_is_exclusive() {
        let now = Utc::now();
        assert!(!session(now, false).is_active(now));
        assert!(session(now, false).is_expired(now));
    }
}
