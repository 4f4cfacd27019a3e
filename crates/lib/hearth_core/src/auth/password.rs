//! Record password hashing.

use tracing::warn;

use crate::error::{Error, Result};

const BCRYPT_COST: u32 = 10;

pub fn hash_password(plain: &str) -> Result<String> {
    bcrypt::hash(plain, BCRYPT_COST).map_err(|e| Error::Internal(format!("bcrypt hash: {e}")))
}

/// Whether `plain` matches `hash`. An empty or unreadable hash never matches.
pub fn password_matches(plain: &str, hash: &str) -> bool {
    if hash.is_empty() {
        return false;
    }
    match bcrypt::verify(plain, hash) {
        Ok(matches) => matches,
        Err(e) => {
            warn!(error = %e, "stored password hash is unreadable");
            false
        }
    }
}
