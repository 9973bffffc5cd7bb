/// Security primitives for the authentication engine: password hashing,
/// lockout policy, and token issuance.
pub mod lockout;
pub mod password;
pub mod token;

pub use lockout::{LockStatus, LockoutPolicy, LockoutState};
pub use password::{hash_password, verify_password};
pub use token::{fingerprint, AccessIdentity, Keyring, TokenIssuer, TokenKey};
