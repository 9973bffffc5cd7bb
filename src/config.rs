/// Configuration management
use chrono::Duration;
use serde::Deserialize;

use crate::security::token::{Keyring, TokenKey};

/// Process configuration, deserialized from the environment.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_server_host")]
    pub server_host: String,
    #[serde(default = "default_server_port")]
    pub server_port: u16,
    pub database_url: String,

    /// Active signing secret for access tokens.
    pub token_secret: String,
    /// Key id embedded in the token header for the active secret.
    #[serde(default = "default_token_secret_id")]
    pub token_secret_id: String,
    /// Comma-separated `kid=secret` pairs still accepted for verification
    /// during a signing-key rotation grace period.
    #[serde(default)]
    pub retired_token_secrets: Option<String>,

    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    #[serde(default = "default_failure_window_secs")]
    pub failure_window_secs: i64,
    #[serde(default = "default_lock_duration_secs")]
    pub lock_duration_secs: i64,
    #[serde(default = "default_access_ttl_secs")]
    pub access_ttl_secs: i64,
    #[serde(default = "default_refresh_ttl_secs")]
    pub refresh_ttl_secs: i64,
    #[serde(default = "default_true")]
    pub rotate_on_refresh: bool,
    #[serde(default)]
    pub require_verified: bool,
    #[serde(default = "default_leeway_secs")]
    pub clock_skew_leeway_secs: i64,

    /// How often the background sweep archives long-dead session rows.
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
    /// Revoked/expired sessions older than this are eligible for archival.
    #[serde(default = "default_session_retention_days")]
    pub session_retention_days: i64,
}

impl Config {
    pub fn from_env() -> Result<Self, envy::Error> {
        envy::from_env()
    }

    /// The explicit knobs handed to the authentication service constructor.
    pub fn auth(&self) -> AuthConfig {
        AuthConfig {
            failure_threshold: self.failure_threshold,
            failure_window: Duration::seconds(self.failure_window_secs),
            lock_duration: Duration::seconds(self.lock_duration_secs),
            access_ttl: Duration::seconds(self.access_ttl_secs),
            refresh_ttl: Duration::seconds(self.refresh_ttl_secs),
            rotate_on_refresh: self.rotate_on_refresh,
            require_verified: self.require_verified,
            clock_skew_leeway: Duration::seconds(self.clock_skew_leeway_secs),
        }
    }

    pub fn keyring(&self) -> anyhow::Result<Keyring> {
        let active = TokenKey::from_secret(self.token_secret_id.clone(), &self.token_secret);

        let mut retired = Vec::new();
        if let Some(raw) = &self.retired_token_secrets {
            for entry in raw.split(',').filter(|e| !e.trim().is_empty()) {
                let (kid, secret) = entry
                    .trim()
                    .split_once('=')
                    .ok_or_else(|| anyhow::anyhow!("retired token secret entry must be kid=secret"))?;
                retired.push(TokenKey::from_secret(kid.to_string(), secret));
            }
        }

        Ok(Keyring::new(active, retired))
    }
}

/// Lockout, token-lifetime, and rotation knobs for the authentication
/// service. Constructed explicitly so callers and tests never depend on
/// ambient process state.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub failure_threshold: u32,
    pub failure_window: Duration,
    pub lock_duration: Duration,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
    pub rotate_on_refresh: bool,
    pub require_verified: bool,
    pub clock_skew_leeway: Duration,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            failure_window: Duration::minutes(15),
            lock_duration: Duration::minutes(30),
            access_ttl: Duration::minutes(30),
            refresh_ttl: Duration::days(7),
            rotate_on_refresh: true,
            require_verified: false,
            clock_skew_leeway: Duration::seconds(60),
        }
    }
}

fn default_server_host() -> String {
    "0.0.0.0".to_string()
}

fn default_server_port() -> u16 {
    8080
}

fn default_token_secret_id() -> String {
    "k1".to_string()
}

fn default_failure_threshold() -> u32 {
    5
}

fn default_failure_window_secs() -> i64 {
    15 * 60
}

fn default_lock_duration_secs() -> i64 {
    30 * 60
}

fn default_access_ttl_secs() -> i64 {
    30 * 60
}

fn default_refresh_ttl_secs() -> i64 {
    7 * 24 * 60 * 60
}

fn default_true() -> bool {
    true
}

fn default_leeway_secs() -> i64 {
    60
}

fn default_sweep_interval_secs() -> u64 {
    60 * 60
}

fn default_session_retention_days() -> i64 {
    90
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_auth_config_matches_policy_constants() {
        let config = AuthConfig::default();
        assert_eq!(config.failure_threshold, 5);
        assert_eq!(config.failure_window, Duration::minutes(15));
        assert_eq!(config.lock_duration, Duration::minutes(30));
        assert!(config.access_ttl < config.refresh_ttl);
        assert!(config.rotate_on_refresh);
    }
}
