use std::sync::Arc;

use watch_core::{format_report, EventKind, Report, ReportEntries};
use watch_logging::{watch_error, watch_info, watch_warn};

use crate::TransportError;

/// Delivers a rendered report to a list of recipients.
#[async_trait::async_trait]
pub trait MailTransport: Send + Sync {
    async fn deliver(&self, recipients: &[String], report: &Report) -> Result<(), TransportError>;
}

#[async_trait::async_trait]
impl<T: MailTransport + ?Sized> MailTransport for Arc<T> {
    async fn deliver(&self, recipients: &[String], report: &Report) -> Result<(), TransportError> {
        (**self).deliver(recipients, report).await
    }
}

/// No transport configured: every delivery fails.
#[async_trait::async_trait]
impl<T: MailTransport> MailTransport for Option<T> {
    async fn deliver(&self, recipients: &[String], report: &Report) -> Result<(), TransportError> {
        match self {
            Some(transport) => transport.deliver(recipients, report).await,
            None => Err(TransportError::Message(
                "no mail transport configured".to_string(),
            )),
        }
    }
}

/// What happened to one report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Sent { recipients: usize },
    /// No recipients configured.
    Skipped,
    Failed,
}

/// Formats reports and hands them to the transport.
///
/// Delivery problems never escape: they are logged and reported back as
/// [`Delivery::Failed`].
pub struct Notifier<T> {
    transport: T,
    recipients: Vec<String>,
}

impl<T: MailTransport> Notifier<T> {
    pub fn new(transport: T, recipients: Vec<String>) -> Self {
        Self {
            transport,
            recipients,
        }
    }

    pub fn recipients(&self) -> &[String] {
        &self.recipients
    }

    pub async fn notify(
        &self,
        kind: EventKind,
        entries: ReportEntries<'_>,
        checked_utc: &str,
    ) -> Delivery {
        if self.recipients.is_empty() {
            watch_warn!("No recipient emails configured. Skipping \"{}\" email.", kind);
            return Delivery::Skipped;
        }

        let report = format_report(kind, entries, checked_utc);
        match self.transport.deliver(&self.recipients, &report).await {
            Ok(()) => {
                watch_info!(
                    "Sent \"{}\" to {} recipient(s)",
                    report.subject,
                    self.recipients.len()
                );
                Delivery::Sent {
                    recipients: self.recipients.len(),
                }
            }
            Err(err) => {
                watch_error!("Error sending \"{}\" email: {}", report.subject, err);
                Delivery::Failed
            }
        }
    }
}
