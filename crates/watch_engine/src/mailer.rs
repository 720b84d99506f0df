use std::fmt;

use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use watch_core::Report;

use crate::notify::MailTransport;
use crate::TransportError;

/// Port that expects STARTTLS rather than implicit TLS.
const SUBMISSION_PORT: u16 = 587;

#[derive(Clone)]
pub struct SmtpSettings {
    pub host: String,
    pub port: Option<u16>,
    pub username: String,
    pub password: String,
    /// Sender address; the SMTP user when unset.
    pub from: Option<String>,
}

impl fmt::Debug for SmtpSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmtpSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("from", &self.from)
            .finish()
    }
}

/// Well-known SMTP relay for a mail service name such as `gmail`.
pub fn service_host(service: &str) -> Option<&'static str> {
    match service.trim().to_ascii_lowercase().as_str() {
        "gmail" | "googlemail" => Some("smtp.gmail.com"),
        "outlook" | "hotmail" | "outlook365" | "office365" => Some("smtp-mail.outlook.com"),
        "yahoo" => Some("smtp.mail.yahoo.com"),
        "zoho" => Some("smtp.zoho.com"),
        _ => None,
    }
}

/// Sends reports as multipart (plain text + HTML) mail over authenticated SMTP.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(settings: &SmtpSettings) -> Result<Self, TransportError> {
        let builder = if settings.port == Some(SUBMISSION_PORT) {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&settings.host)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&settings.host)
        }
        .map_err(|err| TransportError::Smtp(err.to_string()))?;
        let builder = match settings.port {
            Some(port) => builder.port(port),
            None => builder,
        };
        let transport = builder
            .credentials(Credentials::new(
                settings.username.clone(),
                settings.password.clone(),
            ))
            .build();

        let from = parse_mailbox(settings.from.as_deref().unwrap_or(&settings.username))?;
        Ok(Self { transport, from })
    }

    fn build_message(&self, recipients: &[String], report: &Report) -> Result<Message, TransportError> {
        let mut builder = Message::builder()
            .from(self.from.clone())
            .subject(report.subject.clone());
        for recipient in recipients {
            builder = builder.to(parse_mailbox(recipient)?);
        }
        builder
            .multipart(MultiPart::alternative_plain_html(
                report.text.clone(),
                report.html.clone(),
            ))
            .map_err(|err| TransportError::Message(err.to_string()))
    }
}

#[async_trait::async_trait]
impl MailTransport for SmtpMailer {
    async fn deliver(&self, recipients: &[String], report: &Report) -> Result<(), TransportError> {
        let message = self.build_message(recipients, report)?;
        self.transport
            .send(message)
            .await
            .map(|_| ())
            .map_err(|err| TransportError::Smtp(err.to_string()))
    }
}

fn parse_mailbox(address: &str) -> Result<Mailbox, TransportError> {
    address
        .trim()
        .parse::<Mailbox>()
        .map_err(|err| TransportError::Address {
            address: address.to_string(),
            message: err.to_string(),
        })
}
