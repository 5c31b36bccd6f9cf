//! Delivery of password reset links.
//!
//! The forum does not speak SMTP itself. Links are either written to the log
//! or handed to a mail relay over HTTP.

use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::info;
use url::Url;

use crate::config::{MailConfig, ResetConfig};

#[async_trait]
pub trait ResetNotifier: Send + Sync {
    /// Sends `token` to `recipient`.
    async fn deliver(&self, recipient: &str, token: &str) -> Result<()>;
}

/// Builds `<base_url>/reset-password?token=<token>`. A path prefix on
/// `base_url` is kept.
pub fn reset_link(base_url: &str, token: &str) -> Result<String> {
    let mut base = Url::parse(base_url)
        .map_err(|e| anyhow::anyhow!("Invalid reset base URL {base_url}: {e}"))?;
    if !base.path().ends_with('/') {
        let prefix = format!("{}/", base.path());
        base.set_path(&prefix);
    }

    let mut url = base.join("reset-password")?;
    url.query_pairs_mut().clear().append_pair("token", token);
    Ok(url.into())
}

/// Writes the link to the application log. Used when no relay is configured.
pub struct LogNotifier {
    base_url: String,
}

impl LogNotifier {
    #[must_use]
    pub const fn new(base_url: String) -> Self {
        Self { base_url }
    }
}

#[async_trait]
impl ResetNotifier for LogNotifier {
    async fn deliver(&self, recipient: &str, token: &str) -> Result<()> {
        let link = reset_link(&self.base_url, token)?;
        info!(
            event = "reset_link_issued",
            recipient = %recipient,
            link = %link,
            "No mail relay configured, logging password reset link"
        );
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct ResetMail<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    html: String,
}

/// Posts the reset mail as JSON to a mail relay.
pub struct WebhookNotifier {
    client: Client,
    webhook_url: String,
    from: String,
    base_url: String,
    ttl_minutes: u64,
}

impl WebhookNotifier {
    pub fn new(mail: &MailConfig, reset: &ResetConfig, webhook_url: String) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(mail.request_timeout_seconds))
            .user_agent("Agora/1.0")
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build HTTP client: {e}"))?;

        Ok(Self {
            client,
            webhook_url,
            from: mail.from.clone(),
            base_url: reset.base_url.clone(),
            ttl_minutes: reset.token_ttl_seconds / 60,
        })
    }
}

#[async_trait]
impl ResetNotifier for WebhookNotifier {
    async fn deliver(&self, recipient: &str, token: &str) -> Result<()> {
        let link = reset_link(&self.base_url, token)?;
        let link = html_escape::encode_double_quoted_attribute(&link);

        let mail = ResetMail {
            from: &self.from,
            to: recipient,
            subject: "Password Reset Request",
            html: format!(
                "<p>You requested a password reset.</p>\
                 <p>This link expires in <strong>{} minutes</strong>.</p>\
                 <p><a href=\"{link}\">Reset Password</a></p>\
                 <p>If you did not request this, ignore this email.</p>",
                self.ttl_minutes
            ),
        };

        self.client
            .post(&self.webhook_url)
            .json(&mail)
            .send()
            .await?
            .error_for_status()?;

        info!(event = "reset_mail_sent", recipient = %recipient, "Password reset mail handed to relay");
        Ok(())
    }
}

/// Picks the webhook notifier when a relay URL is configured.
pub fn from_config(mail: &MailConfig, reset: &ResetConfig) -> Result<std::sync::Arc<dyn ResetNotifier>> {
    match &mail.webhook_url {
        Some(url) => Ok(std::sync::Arc::new(WebhookNotifier::new(
            mail,
            reset,
            url.clone(),
        )?)),
        None => Ok(std::sync::Arc::new(LogNotifier::new(reset.base_url.clone()))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reset_link() {
        let link = reset_link("http://localhost:3000", "abc123").unwrap();
        assert_eq!(link, "http://localhost:3000/reset-password?token=abc123");

        let link = reset_link("https://forum.example.com/", "ff").unwrap();
        assert_eq!(link, "https://forum.example.com/reset-password?token=ff");
    }

    #[test]
    fn test_reset_link_keeps_path_prefix() {
        let link = reset_link("https://example.com/forum", "ff").unwrap();
        assert_eq!(link, "https://example.com/forum/reset-password?token=ff");

        let link = reset_link("https://example.com/forum/?from=mail", "ff").unwrap();
        assert_eq!(link, "https://example.com/forum/reset-password?token=ff");
    }

    #[test]
    fn test_reset_link_rejects_bad_base() {
        assert!(reset_link("not a url", "abc").is_err());
    }
}
