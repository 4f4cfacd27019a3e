//! Record model.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;

use super::{Collection, random_id, random_secret};
use crate::auth::password;
use crate::error::Result;

/// Length of a record token key.
const TOKEN_KEY_LENGTH: usize = 50;

/// Keys that custom data may not use: system fields and secrets.
pub const RESERVED_DATA_KEYS: &[&str] = &[
    "id",
    "collectionId",
    "collectionName",
    "email",
    "emailVisibility",
    "verified",
    "created",
    "updated",
    "password",
    "passwordHash",
    "tokenKey",
];

/// A stored record. `password_hash` and `token_key` are never serialized.
#[derive(Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    pub id: String,
    pub collection_id: String,
    pub collection_name: String,
    pub email: String,
    pub email_visibility: bool,
    pub verified: bool,
    #[serde(skip)]
    pub password_hash: String,
    #[serde(skip)]
    pub token_key: String,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
    /// Custom fields, written through [`Record::set`].
    #[serde(flatten)]
    data: Map<String, Value>,
}

impl Record {
    /// New unsaved record in `collection` with a fresh id and token key.
    pub fn new(collection: &Collection) -> Self {
        let now = Utc::now();
        Self {
            id: random_id(),
            collection_id: collection.id.clone(),
            collection_name: collection.name.clone(),
            email: String::new(),
            email_visibility: false,
            verified: false,
            password_hash: String::new(),
            token_key: random_secret(TOKEN_KEY_LENGTH),
            created: now,
            updated: now,
            data: Map::new(),
        }
    }

    /// Hash and store a new password. Rotates the token key so that sessions
    /// opened with the old password stop working.
    pub fn set_password(&mut self, plain: &str) -> Result<()> {
        self.password_hash = password::hash_password(plain)?;
        self.refresh_token_key();
        Ok(())
    }

    /// Check `plain` against the stored hash. A record without a password
    /// never validates.
    pub fn validate_password(&self, plain: &str) -> bool {
        password::password_matches(plain, &self.password_hash)
    }

    /// Rotate the token key, revoking every token issued for this record.
    pub fn refresh_token_key(&mut self) {
        self.token_key = random_secret(TOKEN_KEY_LENGTH);
    }

    /// Set a custom field. Reserved keys are ignored so they can never shadow
    /// a system field or leak a secret in the serialized record.
    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        let key = key.into();
        if RESERVED_DATA_KEYS.contains(&key.as_str()) {
            debug!(record = %self.id, key = %key, "ignoring reserved data key");
            return;
        }
        self.data.insert(key, value);
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    /// Storage key `(collection_id, id)`.
    pub fn key(&self) -> (String, String) {
        (self.collection_id.clone(), self.id.clone())
    }
}

impl std::fmt::Debug for Record {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Record")
            .field("id", &self.id)
            .field("collection_id", &self.collection_id)
            .field("collection_name", &self.collection_name)
            .field("email", &self.email)
            .field("verified", &self.verified)
            .field("password_hash", &"[REDACTED]")
            .field("token_key", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}
