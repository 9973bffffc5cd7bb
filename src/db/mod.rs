/// Store traits for the credential store and session registry.
///
/// The engine needs four persistence operations: read-by-unique-key,
/// conditional update (compare-and-set), insert, and bulk update. Backends
/// implement these traits; the service never sees SQL.
pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::Result;
use crate::models::{Principal, Role, Session};
use crate::security::lockout::LockoutState;

#[derive(Debug, Clone)]
pub struct NewPrincipal {
    pub login_key: String,
    pub password_hash: String,
    pub role: Role,
}

#[derive(Debug, Clone)]
pub struct NewSession {
    pub principal_id: Uuid,
    pub refresh_fingerprint: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[async_trait]
pub trait PrincipalStore: Send + Sync {
    /// Insert a new principal. Fails with `LoginKeyTaken` when the login key
    /// is already registered.
    async fn create(&self, new: NewPrincipal, now: DateTime<Utc>) -> Result<Principal>;

    async fn find_by_login_key(&self, login_key: &str) -> Result<Option<Principal>>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Principal>>;

    /// Compare-and-set write of the lockout fields: succeeds only if the row
    /// still carries `previous`. Returns `Ok(false)` on conflict so the
    /// caller can re-read and retry; concurrent failed attempts must not lose
    /// counter increments.
    async fn save_lockout(
        &self,
        id: Uuid,
        previous: &LockoutState,
        next: &LockoutState,
        now: DateTime<Utc>,
    ) -> Result<bool>;
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn create(&self, new: NewSession) -> Result<Session>;

    /// Lookup by fingerprint, revoked and expired rows included: reuse
    /// detection needs to see already-revoked lineages. Liveness is judged
    /// with [`Session::is_active`].
    async fn find_by_fingerprint(&self, fingerprint: &str) -> Result<Option<Session>>;

    /// Compare-and-set revocation: flips `revoked` only if it was still
    /// false at write time. Returns whether this call won the flip. Two
    /// concurrent rotations of the same session get exactly one `true`.
    async fn revoke(&self, id: Uuid, now: DateTime<Utc>) -> Result<bool>;

    /// Revoke every active session of a principal (logout everywhere,
    /// reuse-detection precaution). Returns how many were revoked.
    async fn revoke_all_for_principal(&self, principal_id: Uuid, now: DateTime<Utc>) -> Result<u64>;

    async fn touch(&self, id: Uuid, now: DateTime<Utc>) -> Result<()>;

    /// Physically archive rows that have been revoked or expired since
    /// before `cutoff`. Storage hygiene only; lookups already filter on
    /// revocation and expiry.
    async fn purge_dead(&self, cutoff: DateTime<Utc>) -> Result<u64>;
}
