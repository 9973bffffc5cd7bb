/// In-memory stores with the same compare-and-set semantics as the Postgres
/// backend. Used by tests that need deterministic time and instrumented
/// call counts; the counters back the access-token statelessness checks.
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use uuid::Uuid;

use crate::db::{NewPrincipal, NewSession, PrincipalStore, SessionStore};
use crate::error::{AuthError, Result};
use crate::models::{Principal, PrincipalStatus, Session};
use crate::security::lockout::LockoutState;

#[derive(Default)]
pub struct MemoryPrincipalStore {
    inner: Mutex<HashMap<Uuid, Principal>>,
    ops: AtomicUsize,
}

impl MemoryPrincipalStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of store operations performed so far.
    pub fn op_count(&self) -> usize {
        self.ops.load(Ordering::SeqCst)
    }

    /// Test hook: overwrite a principal's status in place.
    pub fn set_status(&self, id: Uuid, status: PrincipalStatus) {
        if let Some(principal) = self.inner.lock().unwrap().get_mut(&id) {
            principal.status = status;
        }
    }
}

#[async_trait]
impl PrincipalStore for MemoryPrincipalStore {
    async fn create(&self, new: NewPrincipal, now: DateTime<Utc>) -> Result<Principal> {
        self.ops.fetch_add(1, Ordering::SeqCst);
        let mut inner = self.inner.lock().unwrap();

        if inner.values().any(|p| p.login_key == new.login_key) {
            return Err(AuthError::LoginKeyTaken);
        }

        let principal = Principal {
            id: Uuid::new_v4(),
            login_key: new.login_key,
            password_hash: new.password_hash,
            role: new.role,
            status: PrincipalStatus::Active,
            failed_attempts: 0,
            failure_window_started_at: None,
            locked_until: None,
            created_at: now,
            updated_at: now,
        };
        inner.insert(principal.id, principal.clone());
        Ok(principal)
    }

    async fn find_by_login_key(&self, login_key: &str) -> Result<Option<Principal>> {
        self.ops.fetch_add(1, Ordering::SeqCst);
        let inner = self.inner.lock().unwrap();
        Ok(inner.values().find(|p| p.login_key == login_key).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Principal>> {
        self.ops.fetch_add(1, Ordering::SeqCst);
        Ok(self.inner.lock().unwrap().get(&id).cloned())
    }

    async fn save_lockout(
        &self,
        id: Uuid,
        previous: &LockoutState,
        next: &LockoutState,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        self.ops.fetch_add(1, Ordering::SeqCst);
        let mut inner = self.inner.lock().unwrap();
        let principal = inner
            .get_mut(&id)
            .ok_or_else(|| AuthError::Store("principal vanished".to_string()))?;

        if principal.lockout() != *previous {
            return Ok(false);
        }

        principal.apply_lockout(next);
        principal.updated_at = now;
        Ok(true)
    }
}

#[derive(Default)]
pub struct MemorySessionStore {
    inner: Mutex<HashMap<Uuid, Session>>,
    ops: AtomicUsize,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn op_count(&self) -> usize {
        self.ops.load(Ordering::SeqCst)
    }

    /// Count of sessions currently usable at `now`.
    pub fn active_count(&self, now: DateTime<Utc>) -> usize {
        self.inner
            .lock()
            .unwrap()
            .values()
            .filter(|s| s.is_active(now))
            .count()
    }

    /// Total rows, revoked and expired included (audit retention).
    pub fn total_count(&self) -> usize {
        self.inner.lock().unwrap().len()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn create(&self, new: NewSession) -> Result<Session> {
        self.ops.fetch_add(1, Ordering::SeqCst);
        let session = Session {
            id: Uuid::new_v4(),
            principal_id: new.principal_id,
            refresh_fingerprint: new.refresh_fingerprint,
            expires_at: new.expires_at,
            revoked: false,
            revoked_at: None,
            last_activity_at: new.created_at,
            created_at: new.created_at,
        };
        self.inner
            .lock()
            .unwrap()
            .insert(session.id, session.clone());
        Ok(session)
    }

    async fn find_by_fingerprint(&self, fingerprint: &str) -> Result<Option<Session>> {
        self.ops.fetch_add(1, Ordering::SeqCst);
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .values()
            .find(|s| s.refresh_fingerprint == fingerprint)
            .cloned())
    }

    async fn revoke(&self, id: Uuid, now: DateTime<Utc>) -> Result<bool> {
        self.ops.fetch_add(1, Ordering::SeqCst);
        let mut inner = self.inner.lock().unwrap();
        match inner.get_mut(&id) {
            Some(session) if !session.revoked => {
                session.revoked = true;
                session.revoked_at = Some(now);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn revoke_all_for_principal(
        &self,
        principal_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<u64> {
        self.ops.fetch_add(1, Ordering::SeqCst);
        let mut inner = self.inner.lock().unwrap();
        let mut revoked = 0;
        for session in inner.values_mut() {
            if session.principal_id == principal_id && !session.revoked {
                session.revoked = true;
                session.revoked_at = Some(now);
                revoked += 1;
            }
        }
        Ok(revoked)
    }

    async fn touch(&self, id: Uuid, now: DateTime<Utc>) -> Result<()> {
        self.ops.fetch_add(1, Ordering::SeqCst);
        if let Some(session) = self.inner.lock().unwrap().get_mut(&id) {
            session.last_activity_at = now;
        }
        Ok(())
    }

    async fn purge_dead(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        self.ops.fetch_add(1, Ordering::SeqCst);
        let mut inner = self.inner.lock().unwrap();
        let before = inner.len();
        inner.retain(|_, s| {
            let long_revoked = matches!(s.revoked_at, Some(at) if at < cutoff);
            let long_expired = s.expires_at < cutoff;
            !(long_revoked || long_expired)
        });
        Ok((before - inner.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;
    use chrono::Duration;

    fn now() -> DateTime<Utc> {
        "2025-06-01T12:00:00Z".parse().unwrap()
    }

    #[tokio::test]
    async fn duplicate_login_key_rejected() {
        let store = MemoryPrincipalStore::new();
        let new = NewPrincipal {
            login_key: "p@example.com".to_string(),
            password_hash: "hash".to_string(),
            role: Role::Member,
        };

        store.create(new.clone(), now()).await.unwrap();
        let err = store.create(new, now()).await.unwrap_err();
        assert!(matches!(err, AuthError::LoginKeyTaken));
    }

    #[tokio::test]
    async fn lockout_cas_detects_conflict() {
        let store = MemoryPrincipalStore::new();
        let principal = store
            .create(
                NewPrincipal {
                    login_key: "p@example.com".to_string(),
                    password_hash: "hash".to_string(),
                    role: Role::Member,
                },
                now(),
            )
            .await
            .unwrap();

        let clean = principal.lockout();
        let bumped = LockoutState {
            failed_attempts: 1,
            window_started_at: Some(now()),
            locked_until: None,
        };

        assert!(store
            .save_lockout(principal.id, &clean, &bumped, now())
            .await
            .unwrap());
        // Stale expectation: the row has moved on.
        assert!(!store
            .save_lockout(principal.id, &clean, &bumped, now())
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn revoke_cas_has_exactly_one_winner() {
        let store = MemorySessionStore::new();
        let session = store
            .create(NewSession {
                principal_id: Uuid::new_v4(),
                refresh_fingerprint: "fp".to_string(),
                expires_at: now() + Duration::days(7),
                created_at: now(),
            })
            .await
            .unwrap();

        assert!(store.revoke(session.id, now()).await.unwrap());
        assert!(!store.revoke(session.id, now()).await.unwrap());
    }

    #[tokio::test]
    async fn purge_keeps_recent_rows() {
        let store = MemorySessionStore::new();
        let old = store
            .create(NewSession {
                principal_id: Uuid::new_v4(),
                refresh_fingerprint: "old".to_string(),
                expires_at: now() - Duration::days(120),
                created_at: now() - Duration::days(127),
            })
            .await
            .unwrap();
        store
            .create(NewSession {
                principal_id: Uuid::new_v4(),
                refresh_fingerprint: "fresh".to_string(),
                expires_at: now() + Duration::days(7),
                created_at: now(),
            })
            .await
            .unwrap();

        let purged = store.purge_dead(now() - Duration::days(90)).await.unwrap();
        assert_eq!(purged, 1);
        assert!(store
            .find_by_fingerprint(&old.refresh_fingerprint)
            .await
            .unwrap()
            .is_none());
        assert_eq!(store.total_count(), 1);
    }
}
