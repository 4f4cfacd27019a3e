//! Storage-owned domain models read by the auth layer.
//!
//! Collections and records belong to the storage engine; the auth layer only
//! reads ids, secrets, emails and the verified flag, and writes back the few
//! fields its flows change.

pub mod collection;
pub mod record;

pub use collection::{Collection, CollectionKind, SUPERUSERS_COLLECTION, TokenOptions};
pub use record::Record;

use rand::distr::Alphanumeric;
use rand::{Rng, rng};

/// Length of generated record and collection ids.
pub const ID_LENGTH: usize = 15;

/// Random alphanumeric string (mixed case), used for secrets and token keys.
pub fn random_secret(len: usize) -> String {
    rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// Random lowercase alphanumeric id.
pub fn random_id() -> String {
    rng()
        .sample_iter(&Alphanumeric)
        .take(ID_LENGTH)
        .map(|b| char::from(b).to_ascii_lowercase())
        .collect()
}
