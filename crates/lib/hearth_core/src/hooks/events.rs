//! Hook event payloads.

use serde::Serialize;
use serde_json::Value;

use super::HookEvent;
use crate::app::App;
use crate::auth::context::AuthIdentity;
use crate::mailer::Message;
use crate::models::{Collection, Record};

/// Body returned by endpoints that hand out an auth token.
#[derive(Debug, Clone, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub record: Record,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,
}

/// Record model event (`on_record_update`, `on_record_after_update_success`).
pub struct RecordEvent {
    pub app: App,
    pub record: Record,
}

/// Fired whenever a flow is about to return an auth token.
pub struct RecordAuthRequestEvent {
    pub app: App,
    pub collection: Collection,
    pub record: Record,
    pub token: String,
    /// `"refresh"`, `"impersonate"`, ...
    pub auth_method: String,
    pub meta: Option<Value>,
    /// Set by the final step.
    pub response: Option<AuthResponse>,
}

pub struct RecordAuthRefreshRequestEvent {
    pub app: App,
    pub collection: Collection,
    pub record: Record,
    /// The caller's current identity.
    pub auth: AuthIdentity,
    pub response: Option<AuthResponse>,
}

pub struct RecordRequestEmailChangeRequestEvent {
    pub app: App,
    pub collection: Collection,
    pub record: Record,
    pub new_email: String,
}

pub struct RecordConfirmEmailChangeRequestEvent {
    pub app: App,
    pub collection: Collection,
    pub record: Record,
    pub new_email: String,
}

pub struct RecordConfirmVerificationRequestEvent {
    pub app: App,
    pub collection: Collection,
    pub record: Record,
}

/// Fired before a record-related mail is sent; handlers may edit the message.
pub struct MailerRecordEvent {
    pub app: App,
    pub record: Record,
    pub message: Message,
    pub meta: serde_json::Map<String, Value>,
}

macro_rules! impl_hook_event {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl HookEvent for $ty {
                fn app(&self) -> &App {
                    &self.app
                }

                fn app_mut(&mut self) -> &mut App {
                    &mut self.app
                }
            }
        )+
    };
}

impl_hook_event!(
    RecordEvent,
    RecordAuthRequestEvent,
    RecordAuthRefreshRequestEvent,
    RecordRequestEmailChangeRequestEvent,
    RecordConfirmEmailChangeRequestEvent,
    RecordConfirmVerificationRequestEvent,
    MailerRecordEvent,
);
