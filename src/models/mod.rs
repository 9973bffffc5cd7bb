pub mod principal;
pub mod session;

pub use principal::{Principal, PrincipalStatus, PrincipalSummary, Role};
pub use session::Session;

use chrono::{DateTime, Utc};

/// The transient output of a successful login or refresh. Never persisted;
/// the server retains only the refresh token's fingerprint.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub access_expires_at: DateTime<Utc>,
    pub refresh_expires_at: DateTime<Utc>,
}
