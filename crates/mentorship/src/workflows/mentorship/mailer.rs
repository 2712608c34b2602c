use async_trait::async_trait;
use tracing::info;

use super::repository::{MailError, Mailer, OutboundEmail};

/// Default transport when no relay is wired in: records the message in the service log.
#[derive(Debug, Default, Clone)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: OutboundEmail) -> Result<(), MailError> {
        if email.to.trim().is_empty() {
            return Err(MailError::Rejected {
                recipient: email.to,
                reason: "empty recipient".to_string(),
            });
        }

        info!(
            from = %email.from,
            to = %email.to,
            subject = %email.subject,
            bytes = email.html_body.len(),
            "outbound e-mail logged"
        );
        Ok(())
    }
}
