//! Route authorization predicates.
//!
//! Each guard is a pure function of the request's [`AuthContext`] and its
//! path parameters. Guests get 401 where authentication would help and 400
//! or 403 otherwise.

use std::collections::HashMap;

use super::context::AuthContext;
use crate::error::{Error, Result};

const DEFAULT_OWNER_PARAM: &str = "id";
const DEFAULT_COLLECTION_PARAM: &str = "collection";

const MSG_UNAUTHORIZED: &str = "The request requires valid record authorization token.";
const MSG_FORBIDDEN: &str = "The authorized record is not allowed to perform this action.";
const MSG_SUPERUSER: &str = "The request requires valid superuser authorization token.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Guard {
    /// Only unauthenticated callers.
    GuestOnly,
    /// Any authenticated record, optionally restricted to the listed
    /// collections (names or ids). Superusers are not exempt.
    Auth(Vec<String>),
    SuperuserAuth,
    /// A superuser, or the record whose id is in the named path parameter.
    SuperuserOrOwner(String),
    /// The caller's collection must match the named path parameter.
    SameCollectionContext(String),
}

impl Guard {
    pub fn auth() -> Self {
        Guard::Auth(Vec::new())
    }

    pub fn auth_in<S: Into<String>>(collections: impl IntoIterator<Item = S>) -> Self {
        Guard::Auth(collections.into_iter().map(Into::into).collect())
    }

    pub fn superuser_or_owner() -> Self {
        Guard::SuperuserOrOwner(DEFAULT_OWNER_PARAM.to_string())
    }

    pub fn same_collection_context() -> Self {
        Guard::SameCollectionContext(DEFAULT_COLLECTION_PARAM.to_string())
    }

    /// Evaluate the guard. Rejections carry the HTTP-facing error.
    pub fn check(&self, auth: &AuthContext, params: &HashMap<String, String>) -> Result<()> {
        match self {
            Guard::GuestOnly => {
                if auth.is_guest() {
                    Ok(())
                } else {
                    Err(Error::BadRequest(
                        "The request can be accessed only by guests.".into(),
                    ))
                }
            }
            Guard::Auth(allowed) => {
                let collection = auth
                    .collection()
                    .ok_or_else(|| Error::Unauthorized(MSG_UNAUTHORIZED.into()))?;
                if allowed.is_empty() || allowed.iter().any(|c| collection.matches(c)) {
                    Ok(())
                } else {
                    Err(Error::Forbidden(MSG_FORBIDDEN.into()))
                }
            }
            Guard::SuperuserAuth => {
                if auth.is_guest() {
                    Err(Error::Unauthorized(MSG_SUPERUSER.into()))
                } else if auth.is_superuser() {
                    Ok(())
                } else {
                    Err(Error::Forbidden(MSG_SUPERUSER.into()))
                }
            }
            Guard::SuperuserOrOwner(param) => {
                let record = auth
                    .record()
                    .ok_or_else(|| Error::Unauthorized(MSG_UNAUTHORIZED.into()))?;
                if auth.is_superuser() {
                    return Ok(());
                }
                match params.get(param_or(param, DEFAULT_OWNER_PARAM)) {
                    Some(owner) if !owner.is_empty() && *owner == record.id => Ok(()),
                    _ => Err(Error::Forbidden(MSG_FORBIDDEN.into())),
                }
            }
            Guard::SameCollectionContext(param) => {
                let collection = auth
                    .collection()
                    .ok_or_else(|| Error::Unauthorized(MSG_UNAUTHORIZED.into()))?;
                match params.get(param_or(param, DEFAULT_COLLECTION_PARAM)) {
                    Some(target) if collection.matches(target) => Ok(()),
                    _ => Err(Error::Forbidden(MSG_FORBIDDEN.into())),
                }
            }
        }
    }
}

/// An empty parameter name selects the guard's default.
fn param_or<'a>(param: &'a str, default: &'a str) -> &'a str {
    if param.is_empty() { default } else { param }
}
