/// Authentication service: the orchestrator over the credential store,
/// password verifier, lockout policy, token issuer, and session registry.
///
/// All credential failures collapse to `InvalidCredentials` and all token
/// failures to `InvalidOrExpiredToken` before leaving this module; internal
/// causes are logged for operators, never returned to clients.
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use uuid::Uuid;

use crate::clock::Clock;
use crate::config::AuthConfig;
use crate::db::{NewPrincipal, NewSession, PrincipalStore, SessionStore};
use crate::error::{AuthError, EligibilityReason, Result};
use crate::models::{Principal, PrincipalStatus, PrincipalSummary, Role, Session, TokenPair};
use crate::security::lockout::{LockStatus, LockoutPolicy, LockoutState};
use crate::security::token::{fingerprint, AccessIdentity, Keyring, TokenIssuer};
use crate::security::password;

/// A verified principal plus the freshly issued token pair.
#[derive(Debug, Clone)]
pub struct AuthOutcome {
    pub principal: PrincipalSummary,
    pub tokens: TokenPair,
}

pub struct AuthService {
    principals: Arc<dyn PrincipalStore>,
    sessions: Arc<dyn SessionStore>,
    issuer: TokenIssuer,
    lockout: LockoutPolicy,
    config: AuthConfig,
    clock: Arc<dyn Clock>,
}

impl AuthService {
    pub fn new(
        principals: Arc<dyn PrincipalStore>,
        sessions: Arc<dyn SessionStore>,
        keyring: Keyring,
        config: AuthConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let issuer = TokenIssuer::new(
            keyring,
            config.access_ttl,
            config.refresh_ttl,
            config.clock_skew_leeway,
        );
        let lockout = LockoutPolicy::new(
            config.failure_threshold,
            config.failure_window,
            config.lock_duration,
        );

        Self {
            principals,
            sessions,
            issuer,
            lockout,
            config,
            clock,
        }
    }

    /// Register a new principal. The secret is hashed (and strength-checked)
    /// before anything is stored.
    pub async fn register(
        &self,
        login_key: &str,
        secret: &str,
        role: Role,
    ) -> Result<PrincipalSummary> {
        let password_hash = password::hash_password(secret)?;
        let principal = self
            .principals
            .create(
                NewPrincipal {
                    login_key: login_key.to_string(),
                    password_hash,
                    role,
                },
                self.clock.now(),
            )
            .await?;

        tracing::info!(principal_id = %principal.id, "principal registered");
        Ok(principal.summary())
    }

    /// The login state machine: lookup, lockout gate, password verification,
    /// failure/success accounting, eligibility gates, token issuance.
    pub async fn authenticate(&self, login_key: &str, secret: &str) -> Result<AuthOutcome> {
        let now = self.clock.now();

        // Unknown login keys get the same generic answer as wrong secrets.
        let principal = match self.principals.find_by_login_key(login_key).await? {
            Some(principal) => principal,
            None => {
                tracing::info!("login attempt for unknown login key");
                return Err(AuthError::InvalidCredentials);
            }
        };

        // Lockout gate runs before verification; a locked account's failure
        // counters are not touched by further attempts.
        if let LockStatus::Locked { retry_after } =
            self.lockout.evaluate(&principal.lockout(), now)
        {
            tracing::info!(principal_id = %principal.id, "login attempt while locked");
            return Err(AuthError::AccountLocked { retry_after });
        }

        if password::verify_password(secret, &principal.password_hash).is_err() {
            self.persist_lockout(&principal, now, |state| self.lockout.on_failure(state, now))
                .await
                .map_err(|_| AuthError::InvalidCredentials)?;
            tracing::info!(principal_id = %principal.id, "password mismatch");
            return Err(AuthError::InvalidCredentials);
        }

        self.persist_lockout(&principal, now, |_| self.lockout.on_success())
            .await
            .map_err(|_| AuthError::InvalidCredentials)?;

        match principal.status {
            PrincipalStatus::Suspended => {
                return Err(AuthError::AccountNotEligible(EligibilityReason::Suspended));
            }
            PrincipalStatus::PendingVerification if self.config.require_verified => {
                return Err(AuthError::AccountNotEligible(EligibilityReason::Unverified));
            }
            _ => {}
        }

        let tokens = self.issue_pair(&principal, now).await?;
        tracing::info!(principal_id = %principal.id, "principal authenticated");

        Ok(AuthOutcome {
            principal: principal.summary(),
            tokens,
        })
    }

    /// The refresh state machine: fingerprint lookup, reuse detection,
    /// atomic rotation (or touch, when rotation is disabled), issuance.
    pub async fn refresh(&self, raw_refresh_token: &str) -> Result<TokenPair> {
        let now = self.clock.now();
        let fp = fingerprint(raw_refresh_token);

        let session = match self.sessions.find_by_fingerprint(&fp).await? {
            Some(session) => session,
            None => return Err(AuthError::InvalidOrExpiredToken),
        };

        if session.revoked {
            return Err(self.handle_reuse(&session, now).await);
        }

        if session.is_expired(now) {
            return Err(AuthError::InvalidOrExpiredToken);
        }

        let principal = self
            .principals
            .find_by_id(session.principal_id)
            .await?
            .ok_or(AuthError::InvalidOrExpiredToken)?;

        let (access_token, access_expires_at) =
            self.issuer.issue_access(principal.id, principal.role, now)?;

        if !self.config.rotate_on_refresh {
            self.sessions.touch(session.id, now).await?;
            return Ok(TokenPair {
                access_token,
                refresh_token: raw_refresh_token.to_string(),
                access_expires_at,
                refresh_expires_at: session.expires_at,
            });
        }

        // Rotation: revoke-then-create, with the revoke as a compare-and-set.
        // Of two concurrent refreshes exactly one wins the flip; the loser
        // must not create a second child session.
        if !self.sessions.revoke(session.id, now).await? {
            tracing::info!(session_id = %session.id, "lost refresh rotation race");
            return Err(AuthError::InvalidOrExpiredToken);
        }

        let (refresh_token, new_fp, refresh_expires_at) = self.issuer.issue_refresh(now);
        self.sessions
            .create(NewSession {
                principal_id: principal.id,
                refresh_fingerprint: new_fp,
                expires_at: refresh_expires_at,
                created_at: now,
            })
            .await?;

        tracing::info!(principal_id = %principal.id, "refresh token rotated");

        Ok(TokenPair {
            access_token,
            refresh_token,
            access_expires_at,
            refresh_expires_at,
        })
    }

    /// Signature and expiry check only; deliberately no session-store I/O so
    /// every request in the wider system can afford it.
    pub fn verify_access_token(&self, raw_access_token: &str) -> Result<AccessIdentity> {
        self.issuer.verify_access(raw_access_token, self.clock.now())
    }

    pub async fn revoke_session(&self, session_id: Uuid) -> Result<()> {
        self.sessions.revoke(session_id, self.clock.now()).await?;
        Ok(())
    }

    /// Logout-everywhere and administrative revocation.
    pub async fn revoke_all_sessions(&self, principal_id: Uuid) -> Result<u64> {
        let revoked = self
            .sessions
            .revoke_all_for_principal(principal_id, self.clock.now())
            .await?;
        tracing::info!(%principal_id, revoked, "sessions revoked");
        Ok(revoked)
    }

    /// Storage hygiene for the background sweep: archive rows dead for longer
    /// than `retention`. Lookups never depend on this running.
    pub async fn purge_expired_sessions(&self, retention: Duration) -> Result<u64> {
        let cutoff = self.clock.now() - retention;
        self.sessions.purge_dead(cutoff).await
    }

    async fn issue_pair(&self, principal: &Principal, now: DateTime<Utc>) -> Result<TokenPair> {
        let (access_token, access_expires_at) =
            self.issuer.issue_access(principal.id, principal.role, now)?;
        let (refresh_token, fp, refresh_expires_at) = self.issuer.issue_refresh(now);

        self.sessions
            .create(NewSession {
                principal_id: principal.id,
                refresh_fingerprint: fp,
                expires_at: refresh_expires_at,
                created_at: now,
            })
            .await?;

        Ok(TokenPair {
            access_token,
            refresh_token,
            access_expires_at,
            refresh_expires_at,
        })
    }

    /// A revoked lineage being presented again is treated as token theft:
    /// every other live session of the principal is revoked as a precaution.
    /// The classification never reaches the client verbatim.
    async fn handle_reuse(&self, session: &Session, now: DateTime<Utc>) -> AuthError {
        tracing::warn!(
            principal_id = %session.principal_id,
            session_id = %session.id,
            "refresh token reuse detected; revoking all sessions for principal"
        );

        if let Err(err) = self
            .sessions
            .revoke_all_for_principal(session.principal_id, now)
            .await
        {
            tracing::error!(error = %err, "precautionary revoke-all failed");
        }

        AuthError::TokenReuseDetected.into_client_kind()
    }

    /// Persist a lockout transition with compare-and-set semantics, retrying
    /// once against a fresh read on conflict. Concurrent failed attempts must
    /// not lose counter increments.
    async fn persist_lockout<F>(
        &self,
        principal: &Principal,
        now: DateTime<Utc>,
        transition: F,
    ) -> Result<()>
    where
        F: Fn(&LockoutState) -> LockoutState,
    {
        let previous = principal.lockout();
        let next = transition(&previous);
        if previous == next {
            return Ok(());
        }
        if self
            .principals
            .save_lockout(principal.id, &previous, &next, now)
            .await?
        {
            return Ok(());
        }

        let fresh = self
            .principals
            .find_by_id(principal.id)
            .await?
            .ok_or_else(|| AuthError::Store("principal vanished during lockout write".to_string()))?;
        let previous = fresh.lockout();
        let next = transition(&previous);
        if previous == next {
            return Ok(());
        }
        if self
            .principals
            .save_lockout(fresh.id, &previous, &next, now)
            .await?
        {
            Ok(())
        } else {
            // Second conflict in a row: treat as transient and let the caller
            // fold it into the generic failure message.
            tracing::warn!(principal_id = %principal.id, "lockout write conflicted twice");
            Err(AuthError::Store("lockout write conflict".to_string()))
        }
    }
}
