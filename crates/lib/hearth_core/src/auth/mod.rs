//! Authentication and authorization logic.
//!
//! Record tokens, password hashing, request identity resolution and the
//! route guards built on top of it.

pub mod context;
pub mod guards;
pub mod password;
pub mod resolver;
pub mod tokens;

pub use context::{AuthContext, AuthIdentity};
pub use guards::Guard;
