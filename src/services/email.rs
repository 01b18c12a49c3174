use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncFileTransport, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::path::Path;

use crate::config::EmailConfig;

#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("invalid mailbox address: {0}")]
    Address(#[from] lettre::address::AddressError),
    #[error("could not build message: {0}")]
    Message(#[from] lettre::error::Error),
    #[error("smtp delivery failed: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
    #[error("file outbox delivery failed: {0}")]
    Outbox(#[from] lettre::transport::file::Error),
    #[error("could not create outbox directory: {0}")]
    Io(#[from] std::io::Error),
}

/// Outbound mail collaborator. SMTP in real deployments; a file outbox for
/// development so flows are inspectable without a relay.
pub struct Mailer {
    transport: Transport,
    from: String,
    base_url: String,
}

enum Transport {
    Smtp(AsyncSmtpTransport<Tokio1Executor>),
    File(AsyncFileTransport<Tokio1Executor>),
}

impl Mailer {
    pub fn new(config: &EmailConfig) -> Result<Self, MailError> {
        let transport = match &config.file_outbox {
            Some(dir) => {
                let outbox = Path::new(dir);
                if !outbox.exists() {
                    std::fs::create_dir_all(outbox)?;
                }
                Transport::File(AsyncFileTransport::new(outbox))
            }
            None => {
                let builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(
                    &config.smtp_host,
                )?
                .port(config.smtp_port)
                .credentials(Credentials::new(
                    config.smtp_username.clone(),
                    config.smtp_password.clone(),
                ));
                Transport::Smtp(builder.build())
            }
        };
        Ok(Self {
            transport,
            from: format!("{} <{}>", config.from_name, config.from_email),
            base_url: config.public_base_url.clone(),
        })
    }

    pub async fn send_welcome(&self, to_email: &str, to_name: &str) -> Result<(), MailError> {
        let first_name = to_name.split_whitespace().next().unwrap_or(to_name);
        let body = format!(
            "Hi {},\n\nWelcome to Trailhead! Visit {}/me to complete your profile.\n",
            first_name, self.base_url
        );
        self.send(to_email, to_name, "Welcome to the Trailhead family", &body)
            .await
    }

    /// The reset plaintext only ever leaves the process through this mail.
    pub async fn send_password_reset(
        &self,
        to_email: &str,
        to_name: &str,
        token: &str,
    ) -> Result<(), MailError> {
        let url = format!("{}/api/v1/users/reset-password/{}", self.base_url, token);
        let body = format!(
            "Forgot your password? Submit a new one at {}\n\n\
             If you didn't request this, ignore this email.\n",
            url
        );
        self.send(
            to_email,
            to_name,
            "Your password reset token (valid for 10 minutes)",
            &body,
        )
        .await
    }

    async fn send(
        &self,
        to_email: &str,
        to_name: &str,
        subject: &str,
        body: &str,
    ) -> Result<(), MailError> {
        let from: Mailbox = self.from.parse()?;
        let to: Mailbox = format!("{} <{}>", to_name, to_email).parse()?;

        let message = Message::builder()
            .from(from)
            .to(to)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())?;

        match &self.transport {
            Transport::Smtp(smtp) => {
                smtp.send(message).await?;
            }
            Transport::File(file) => {
                file.send(message).await?;
            }
        }
        Ok(())
    }
}
