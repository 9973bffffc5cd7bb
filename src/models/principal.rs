/// Principal model
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::security::lockout::LockoutState;

/// Role tag carried by a principal and embedded in access tokens. Roles are
/// tags, not distinct types; the engine treats them all the same way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Member,
    Seller,
    Moderator,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Member => "member",
            Role::Seller => "seller",
            Role::Moderator => "moderator",
            Role::Admin => "admin",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "member" => Some(Role::Member),
            "seller" => Some(Role::Seller),
            "moderator" => Some(Role::Moderator),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PrincipalStatus {
    Active,
    Suspended,
    PendingVerification,
}

impl PrincipalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PrincipalStatus::Active => "active",
            PrincipalStatus::Suspended => "suspended",
            PrincipalStatus::PendingVerification => "pending_verification",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "active" => Some(PrincipalStatus::Active),
            "suspended" => Some(PrincipalStatus::Suspended),
            "pending_verification" => Some(PrincipalStatus::PendingVerification),
            _ => None,
        }
    }
}

/// A login-capable account. The password hash is never serialized and never
/// leaves the engine; summaries are exposed through [`PrincipalSummary`].
#[derive(Debug, Clone)]
pub struct Principal {
    pub id: Uuid,
    pub login_key: String,
    pub password_hash: String,
    pub role: Role,
    pub status: PrincipalStatus,
    pub failed_attempts: i32,
    pub failure_window_started_at: Option<DateTime<Utc>>,
    pub locked_until: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Principal {
    /// Snapshot of the three lockout fields, the unit the policy reasons
    /// about and the stores compare-and-set on.
    pub fn lockout(&self) -> LockoutState {
        LockoutState {
            failed_attempts: self.failed_attempts,
            window_started_at: self.failure_window_started_at,
            locked_until: self.locked_until,
        }
    }

    pub fn apply_lockout(&mut self, state: &LockoutState) {
        self.failed_attempts = state.failed_attempts;
        self.failure_window_started_at = state.window_started_at;
        self.locked_until = state.locked_until;
    }

    pub fn summary(&self) -> PrincipalSummary {
        PrincipalSummary {
            id: self.id,
            login_key: self.login_key.clone(),
            role: self.role,
            status: self.status,
        }
    }
}

/// What the rest of the system gets to see about a principal.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PrincipalSummary {
    pub id: Uuid,
    pub login_key: String,
    pub role: Role,
    pub status: PrincipalStatus,
}
