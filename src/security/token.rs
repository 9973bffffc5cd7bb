/// Token issuance and verification
///
/// Access tokens are self-contained HS256 JWTs: verification is signature +
/// expiry only, with no store round-trip. Refresh tokens are opaque
/// high-entropy strings; the server keeps only a SHA-256 fingerprint, so a
/// database compromise does not expose usable refresh tokens.
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{
    decode, decode_header, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::{AuthError, Result};
use crate::models::Role;

const JWT_ALGORITHM: Algorithm = Algorithm::HS256;
const REFRESH_TOKEN_BYTES: usize = 32;

/// One signing secret plus the key id embedded in token headers.
pub struct TokenKey {
    kid: String,
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl TokenKey {
    pub fn from_secret(kid: impl Into<String>, secret: &str) -> Self {
        Self {
            kid: kid.into(),
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        }
    }
}

/// The active signing key plus retired keys still accepted for verification.
/// Retired keys give previously-issued tokens a grace period across a signing
/// key rotation; the `kid` header selects which key verifies a token.
pub struct Keyring {
    active: TokenKey,
    retired: Vec<TokenKey>,
}

impl Keyring {
    pub fn new(active: TokenKey, retired: Vec<TokenKey>) -> Self {
        Self { active, retired }
    }

    fn decoding_for(&self, kid: &str) -> Option<&DecodingKey> {
        if self.active.kid == kid {
            return Some(&self.active.decoding);
        }
        self.retired
            .iter()
            .find(|key| key.kid == kid)
            .map(|key| &key.decoding)
    }
}

/// Claims carried by an access token.
#[derive(Debug, Serialize, Deserialize)]
pub struct AccessClaims {
    /// Principal id as a UUID string.
    pub sub: String,
    pub role: String,
    pub iat: i64,
    pub exp: i64,
    pub jti: String,
}

/// The verified identity an access token proves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessIdentity {
    pub principal_id: Uuid,
    pub role: Role,
}

pub struct TokenIssuer {
    keyring: Keyring,
    access_ttl: Duration,
    refresh_ttl: Duration,
    leeway: Duration,
}

impl TokenIssuer {
    pub fn new(keyring: Keyring, access_ttl: Duration, refresh_ttl: Duration, leeway: Duration) -> Self {
        Self {
            keyring,
            access_ttl,
            refresh_ttl,
            leeway,
        }
    }

    /// Mint a signed access token for a principal. Returns the token and its
    /// nominal expiry.
    pub fn issue_access(
        &self,
        principal_id: Uuid,
        role: Role,
        now: DateTime<Utc>,
    ) -> Result<(String, DateTime<Utc>)> {
        let expires_at = now + self.access_ttl;
        let claims = AccessClaims {
            sub: principal_id.to_string(),
            role: role.as_str().to_string(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
            jti: Uuid::new_v4().to_string(),
        };

        let mut header = Header::new(JWT_ALGORITHM);
        header.kid = Some(self.keyring.active.kid.clone());

        let token = encode(&header, &claims, &self.keyring.active.encoding)
            .map_err(|e| AuthError::Internal(format!("failed to sign access token: {e}")))?;

        Ok((token, expires_at))
    }

    /// Mint an opaque refresh token. Returns the raw token (for the client),
    /// its fingerprint (the only thing the server stores), and its expiry.
    pub fn issue_refresh(&self, now: DateTime<Utc>) -> (String, String, DateTime<Utc>) {
        let mut bytes = [0u8; REFRESH_TOKEN_BYTES];
        rand::thread_rng().fill_bytes(&mut bytes);
        let raw = hex::encode(bytes);
        let fp = fingerprint(&raw);
        (raw, fp, now + self.refresh_ttl)
    }

    /// Verify signature and expiry of an access token. Pure CPU, no store
    /// round-trip. Expiry is checked against the caller's clock with a small
    /// leeway to absorb drift between issuer and verifier hosts.
    pub fn verify_access(&self, token: &str, now: DateTime<Utc>) -> Result<AccessIdentity> {
        let header = decode_header(token).map_err(|_| AuthError::InvalidOrExpiredToken)?;
        let kid = header.kid.as_deref().unwrap_or(&self.keyring.active.kid);
        let key = self
            .keyring
            .decoding_for(kid)
            .ok_or(AuthError::InvalidOrExpiredToken)?;

        // Expiry is validated below against the injected clock; jsonwebtoken's
        // built-in check would read the system clock instead.
        let mut validation = Validation::new(JWT_ALGORITHM);
        validation.validate_exp = false;

        let data = decode::<AccessClaims>(token, key, &validation)
            .map_err(|_| AuthError::InvalidOrExpiredToken)?;

        if data.claims.exp + self.leeway.num_seconds() < now.timestamp() {
            return Err(AuthError::InvalidOrExpiredToken);
        }

        let principal_id =
            Uuid::parse_str(&data.claims.sub).map_err(|_| AuthError::InvalidOrExpiredToken)?;
        let role = Role::parse(&data.claims.role).ok_or(AuthError::InvalidOrExpiredToken)?;

        Ok(AccessIdentity { principal_id, role })
    }
}

/// One-way fingerprint of a raw token, stored in place of the token itself.
pub fn fingerprint(raw: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(raw.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issuer() -> TokenIssuer {
        TokenIssuer::new(
            Keyring::new(TokenKey::from_secret("k1", "test-signing-secret"), Vec::new()),
            Duration::minutes(30),
            Duration::days(7),
            Duration::seconds(60),
        )
    }

    fn instant() -> DateTime<Utc> {
        "2025-06-01T12:00:00Z".parse().unwrap()
    }

    #[test]
    fn issue_and_verify_access_token() {
        let issuer = issuer();
        let now = instant();
        let principal_id = Uuid::new_v4();

        let (token, expires_at) = issuer.issue_access(principal_id, Role::Member, now).unwrap();
        assert_eq!(token.matches('.').count(), 2);
        assert_eq!(expires_at, now + Duration::minutes(30));

        let identity = issuer.verify_access(&token, now).unwrap();
        assert_eq!(identity.principal_id, principal_id);
        assert_eq!(identity.role, Role::Member);
    }

    #[test]
    fn expired_token_rejected_beyond_leeway() {
        let issuer = issuer();
        let now = instant();
        let (token, expires_at) = issuer.issue_access(Uuid::new_v4(), Role::Member, now).unwrap();

        // Inside the grace window: still accepted.
        assert!(issuer
            .verify_access(&token, expires_at + Duration::seconds(59))
            .is_ok());

        // Past the grace window: rejected.
        let err = issuer
            .verify_access(&token, expires_at + Duration::seconds(61))
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidOrExpiredToken));
    }

    #[test]
    fn tampered_token_rejected() {
        let issuer = issuer();
        let now = instant();
        let (token, _) = issuer.issue_access(Uuid::new_v4(), Role::Admin, now).unwrap();

        let mut parts: Vec<&str> = token.split('.').collect();
        let tampered_sig = "A".repeat(parts[2].len());
        parts[2] = &tampered_sig;
        let tampered = parts.join(".");

        assert!(issuer.verify_access(&tampered, now).is_err());
    }

    #[test]
    fn retired_key_still_verifies_during_grace_period() {
        let now = instant();
        let old_issuer = TokenIssuer::new(
            Keyring::new(TokenKey::from_secret("k1", "old-secret"), Vec::new()),
            Duration::minutes(30),
            Duration::days(7),
            Duration::seconds(60),
        );
        let (old_token, _) = old_issuer.issue_access(Uuid::new_v4(), Role::Member, now).unwrap();

        let rotated = TokenIssuer::new(
            Keyring::new(
                TokenKey::from_secret("k2", "new-secret"),
                vec![TokenKey::from_secret("k1", "old-secret")],
            ),
            Duration::minutes(30),
            Duration::days(7),
            Duration::seconds(60),
        );

        assert!(rotated.verify_access(&old_token, now).is_ok());

        // A keyring without the old key rejects it.
        let without_grace = TokenIssuer::new(
            Keyring::new(TokenKey::from_secret("k2", "new-secret"), Vec::new()),
            Duration::minutes(30),
            Duration::days(7),
            Duration::seconds(60),
        );
        assert!(without_grace.verify_access(&old_token, now).is_err());
    }

    #[test]
    fn refresh_tokens_are_unique_and_fingerprinted() {
        let issuer = issuer();
        let now = instant();

        let (raw_a, fp_a, expires_a) = issuer.issue_refresh(now);
        let (raw_b, fp_b, _) = issuer.issue_refresh(now);

        assert_ne!(raw_a, raw_b);
        assert_ne!(fp_a, fp_b);
        assert_eq!(fp_a, fingerprint(&raw_a));
        assert_eq!(raw_a.len(), REFRESH_TOKEN_BYTES * 2);
        assert_eq!(expires_a, now + Duration::days(7));
    }

    #[test]
    fn fingerprint_is_deterministic() {
        assert_eq!(fingerprint("token"), fingerprint("token"));
        assert_ne!(fingerprint("token-a"), fingerprint("token-b"));
    }
}
