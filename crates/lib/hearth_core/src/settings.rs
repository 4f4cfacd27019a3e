//! Runtime application settings.

use serde::{Deserialize, Serialize};

/// Application metadata used in mail and links.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetaSettings {
    pub app_name: String,
    pub app_url: String,
    pub sender_name: String,
    pub sender_address: String,
}

impl Default for MetaSettings {
    fn default() -> Self {
        Self {
            app_name: "Hearth".into(),
            app_url: "http://localhost:8090".into(),
            sender_name: "Support".into(),
            sender_address: "noreply@example.com".into(),
        }
    }
}

/// One rate limit rule.
///
/// `label` is `<collection>:<action>` or `*:<action>`. At most
/// `max_requests` requests per client are allowed in each window of
/// `duration` seconds; `max_requests == 0` denies everything.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitRule {
    pub label: String,
    pub max_requests: u32,
    pub duration: u64,
}

impl RateLimitRule {
    pub fn new(label: &str, max_requests: u32, duration: u64) -> Self {
        Self {
            label: label.to_string(),
            max_requests,
            duration,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitSettings {
    pub enabled: bool,
    pub rules: Vec<RateLimitRule>,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            rules: vec![
                RateLimitRule::new("*:authRefresh", 10, 10),
                RateLimitRule::new("*:impersonate", 10, 10),
                RateLimitRule::new("*:requestEmailChange", 2, 3),
                RateLimitRule::new("*:confirmEmailChange", 2, 3),
                RateLimitRule::new("*:confirmVerification", 2, 3),
            ],
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub meta: MetaSettings,
    pub rate_limits: RateLimitSettings,
}
