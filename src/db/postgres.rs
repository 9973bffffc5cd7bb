/// Postgres-backed stores.
///
/// Expected schema (owned by the deployment's migration pipeline):
/// `principals(id uuid pk, login_key text unique, password_hash text,
/// role text, status text, failed_attempts int, failure_window_started_at
/// timestamptz null, locked_until timestamptz null, created_at timestamptz,
/// updated_at timestamptz)` and `sessions(id uuid pk, principal_id uuid,
/// refresh_fingerprint text unique, expires_at timestamptz, revoked bool,
/// revoked_at timestamptz null, last_activity_at timestamptz, created_at
/// timestamptz)`.
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::db::{NewPrincipal, NewSession, PrincipalStore, SessionStore};
use crate::error::{AuthError, Result};
use crate::models::{Principal, PrincipalStatus, Role, Session};
use crate::security::lockout::LockoutState;

pub struct PgPrincipalStore {
    pool: PgPool,
}

impl PgPrincipalStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Raw row; role/status are TEXT columns parsed into the domain enums.
#[derive(Debug, FromRow)]
struct PrincipalRow {
    id: Uuid,
    login_key: String,
    password_hash: String,
    role: String,
    status: String,
    failed_attempts: i32,
    failure_window_started_at: Option<DateTime<Utc>>,
    locked_until: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<PrincipalRow> for Principal {
    type Error = AuthError;

    fn try_from(row: PrincipalRow) -> Result<Self> {
        let role = Role::parse(&row.role)
            .ok_or_else(|| AuthError::Store(format!("unknown role tag: {}", row.role)))?;
        let status = PrincipalStatus::parse(&row.status)
            .ok_or_else(|| AuthError::Store(format!("unknown principal status: {}", row.status)))?;

        Ok(Principal {
            id: row.id,
            login_key: row.login_key,
            password_hash: row.password_hash,
            role,
            status,
            failed_attempts: row.failed_attempts,
            failure_window_started_at: row.failure_window_started_at,
            locked_until: row.locked_until,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[async_trait]
impl PrincipalStore for PgPrincipalStore {
    async fn create(&self, new: NewPrincipal, now: DateTime<Utc>) -> Result<Principal> {
        let row = sqlx::query_as::<_, PrincipalRow>(
            r#"
            INSERT INTO principals
                (id, login_key, password_hash, role, status, failed_attempts,
                 failure_window_started_at, locked_until, created_at, updated_at)
            VALUES (gen_random_uuid(), $1, $2, $3, $4, 0, NULL, NULL, $5, $5)
            RETURNING *
            "#,
        )
        .bind(&new.login_key)
        .bind(&new.password_hash)
        .bind(new.role.as_str())
        .bind(PrincipalStatus::Active.as_str())
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if e.to_string().contains("unique constraint") {
                AuthError::LoginKeyTaken
            } else {
                AuthError::Store(e.to_string())
            }
        })?;

        row.try_into()
    }

    async fn find_by_login_key(&self, login_key: &str) -> Result<Option<Principal>> {
        let row = sqlx::query_as::<_, PrincipalRow>(
            r#"
            SELECT * FROM principals WHERE login_key = $1
            "#,
        )
        .bind(login_key)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Principal::try_from).transpose()
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Principal>> {
        let row = sqlx::query_as::<_, PrincipalRow>(
            r#"
            SELECT * FROM principals WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Principal::try_from).transpose()
    }

    async fn save_lockout(
        &self,
        id: Uuid,
        previous: &LockoutState,
        next: &LockoutState,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        // NULL-safe compare-and-set on the previous field values; a lost race
        // leaves the row untouched and reports zero rows affected.
        let result = sqlx::query(
            r#"
            UPDATE principals
            SET failed_attempts = $2,
                failure_window_started_at = $3,
                locked_until = $4,
                updated_at = $5
            WHERE id = $1
              AND failed_attempts = $6
              AND failure_window_started_at IS NOT DISTINCT FROM $7
              AND locked_until IS NOT DISTINCT FROM $8
            "#,
        )
        .bind(id)
        .bind(next.failed_attempts)
        .bind(next.window_started_at)
        .bind(next.locked_until)
        .bind(now)
        .bind(previous.failed_attempts)
        .bind(previous.window_started_at)
        .bind(previous.locked_until)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}

pub struct PgSessionStore {
    pool: PgPool,
}

impl PgSessionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn create(&self, new: NewSession) -> Result<Session> {
        let session = sqlx::query_as::<_, Session>(
            r#"
            INSERT INTO sessions
                (id, principal_id, refresh_fingerprint, expires_at, revoked,
                 revoked_at, last_activity_at, created_at)
            VALUES (gen_random_uuid(), $1, $2, $3, false, NULL, $4, $4)
            RETURNING *
            "#,
        )
        .bind(new.principal_id)
        .bind(&new.refresh_fingerprint)
        .bind(new.expires_at)
        .bind(new.created_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(session)
    }

    async fn find_by_fingerprint(&self, fingerprint: &str) -> Result<Option<Session>> {
        let session = sqlx::query_as::<_, Session>(
            r#"
            SELECT * FROM sessions WHERE refresh_fingerprint = $1
            "#,
        )
        .bind(fingerprint)
        .fetch_optional(&self.pool)
        .await?;

        Ok(session)
    }

    async fn revoke(&self, id: Uuid, now: DateTime<Utc>) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE sessions
            SET revoked = true, revoked_at = $2
            WHERE id = $1 AND revoked = false
            "#,
        )
        .bind(id)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn revoke_all_for_principal(
        &self,
        principal_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE sessions
            SET revoked = true, revoked_at = $2
            WHERE principal_id = $1 AND revoked = false
            "#,
        )
        .bind(principal_id)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn touch(&self, id: Uuid, now: DateTime<Utc>) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE sessions SET last_activity_at = $2 WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn purge_dead(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM sessions
            WHERE (revoked = true AND revoked_at < $1)
               OR expires_at < $1
            "#,
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}
