//! Outgoing mail.

use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

use crate::models::Record;
use crate::settings::MetaSettings;

#[derive(Debug, Error)]
pub enum MailerError {
    #[error("mail send failed: {0}")]
    Send(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Address {
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub from: Address,
    pub to: Vec<Address>,
    pub subject: String,
    pub html: String,
}

/// Mail transport.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: &Message) -> Result<(), MailerError>;
}

/// Mailer that only logs what it would send.
#[derive(Debug, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, message: &Message) -> Result<(), MailerError> {
        let to: Vec<&str> = message.to.iter().map(|a| a.email.as_str()).collect();
        info!(to = ?to, subject = %message.subject, "mail send (log transport)");
        Ok(())
    }
}

/// Mailer that keeps every message in memory.
#[derive(Debug, Default)]
pub struct TestMailer {
    messages: Mutex<Vec<Message>>,
}

impl TestMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<Message> {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn last_message(&self) -> Option<Message> {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
            .cloned()
    }

    pub fn total_send(&self) -> usize {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[async_trait]
impl Mailer for TestMailer {
    async fn send(&self, message: &Message) -> Result<(), MailerError> {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(message.clone());
        Ok(())
    }
}

/// Link the recipient follows to confirm an email change.
pub fn email_change_link(meta: &MetaSettings, token: &str) -> String {
    format!(
        "{}/_/#/auth/confirm-email-change/{token}",
        meta.app_url.trim_end_matches('/')
    )
}

/// Email change confirmation, addressed to the new email.
pub fn email_change_message(
    meta: &MetaSettings,
    record: &Record,
    new_email: &str,
    token: &str,
) -> Message {
    let link = email_change_link(meta, token);
    Message {
        from: Address {
            name: meta.sender_name.clone(),
            email: meta.sender_address.clone(),
        },
        to: vec![Address {
            name: String::new(),
            email: new_email.to_string(),
        }],
        subject: format!("Confirm your {} new email address", meta.app_name),
        html: format!(
            "<p>Hello,</p>\n\
             <p>Click on the button below to confirm your new email address.</p>\n\
             <p><a class=\"btn\" href=\"{link}\" target=\"_blank\" rel=\"noopener\">Confirm new email</a></p>\n\
             <p><i>If you didn't ask to change your email address ({current}), you can ignore this email.</i></p>\n\
             <p>Thanks,<br/>{app} team</p>",
            current = record.email,
            app = meta.app_name,
        ),
    }
}
