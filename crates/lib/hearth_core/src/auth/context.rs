//! Per-request authentication state.

use crate::models::{Collection, Record};

/// An authenticated caller.
#[derive(Debug, Clone)]
pub struct AuthIdentity {
    pub record: Record,
    pub collection: Collection,
    /// The raw token the caller presented.
    pub token: String,
    pub refreshable: bool,
}

/// Who is making the request. Guests carry no identity.
#[derive(Debug, Clone, Default)]
pub struct AuthContext {
    identity: Option<AuthIdentity>,
}

impl AuthContext {
    pub fn guest() -> Self {
        Self::default()
    }

    pub fn authenticated(identity: AuthIdentity) -> Self {
        Self {
            identity: Some(identity),
        }
    }

    pub fn is_guest(&self) -> bool {
        self.identity.is_none()
    }

    pub fn identity(&self) -> Option<&AuthIdentity> {
        self.identity.as_ref()
    }

    pub fn record(&self) -> Option<&Record> {
        self.identity.as_ref().map(|i| &i.record)
    }

    pub fn collection(&self) -> Option<&Collection> {
        self.identity.as_ref().map(|i| &i.collection)
    }

    pub fn is_superuser(&self) -> bool {
        self.collection().is_some_and(Collection::is_superusers)
    }
}
