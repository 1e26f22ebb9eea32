//! Outbound email.
//!
//! The only message the clinic sends is the password-reset code. Delivery
//! goes through Resend when `RESEND_API_KEY` and `RESEND_FROM` are set; the
//! `Mailer` trait lets tests capture messages instead.

use resend_rs::Resend;
use resend_rs::types::CreateEmailBaseOptions;

use crate::config::MailConfig;

const PASSWORD_RESET_TEMPLATE: &str = include_str!("../../templates/password_reset.html");

#[derive(Debug, thiserror::Error)]
#[error("email delivery failed: {0}")]
pub struct MailError(pub String);

/// Provider-neutral async mail sender. Enables mocking in tests.
#[async_trait::async_trait]
pub trait Mailer: Send + Sync {
    /// Send one HTML email.
    ///
    /// # Errors
    ///
    /// Returns a [`MailError`] if the provider rejects the message.
    async fn send_html(&self, to: &str, subject: &str, html: &str) -> Result<(), MailError>;
}

pub struct ResendMailer {
    client: Resend,
    from: String,
}

impl ResendMailer {
    #[must_use]
    pub fn new(config: &MailConfig) -> Self {
        Self { client: Resend::new(&config.api_key), from: config.from.clone() }
    }
}

#[async_trait::async_trait]
impl Mailer for ResendMailer {
    async fn send_html(&self, to: &str, subject: &str, html: &str) -> Result<(), MailError> {
        let email = CreateEmailBaseOptions::new(&self.from, [to], subject).with_html(html);
        self.client
            .emails
            .send(email)
            .await
            .map_err(|e| MailError(e.to_string()))?;
        Ok(())
    }
}

#[must_use]
pub fn render_password_reset(clinic: &str, email: &str, code: &str) -> String {
    PASSWORD_RESET_TEMPLATE
        .replace("{{CLINIC}}", clinic)
        .replace("{{EMAIL}}", email)
        .replace("{{CODE}}", code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_template_fills_placeholders() {
        let html = render_password_reset("Dighayu Medical Center", "doc@example.com", "AB23CD");
        assert!(html.contains("Dighayu Medical Center"));
        assert!(html.contains("doc@example.com"));
        assert!(html.contains("AB23CD"));
        assert!(!html.contains("{{"));
    }
}
