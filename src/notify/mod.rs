//! Customer notifications. Messages are rendered from booking data and handed
//! to a `Notifier`; delivery runs on a background worker so a slow or failing
//! channel never holds up a request.

pub mod templates;

use async_trait::async_trait;
use serde::Serialize;
use tracing::info;

use crate::error::AppError;
use crate::models::booking::Booking;

pub use templates::{format_phone_e164, status_info, StatusInfo, TemplateContext};

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Sms,
    Email,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Sms => "sms",
            Channel::Email => "email",
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Notification {
    pub channel: Channel,
    pub to: String,
    pub subject: Option<String>,
    pub body: String,
}

#[derive(Debug, Clone)]
pub enum NotificationJob {
    BookingConfirmation(Booking),
    StatusUpdate(Booking),
}

impl NotificationJob {
    pub fn booking(&self) -> &Booking {
        match self {
            NotificationJob::BookingConfirmation(booking) | NotificationJob::StatusUpdate(booking) => {
                booking
            }
        }
    }

    /// One SMS and one email per job.
    pub fn render(&self, ctx: &TemplateContext, service_name: &str) -> [Notification; 2] {
        match self {
            NotificationJob::BookingConfirmation(booking) => [
                templates::confirmation_sms(ctx, booking, service_name),
                templates::confirmation_email(ctx, booking, service_name),
            ],
            NotificationJob::StatusUpdate(booking) => [
                templates::status_sms(ctx, booking),
                templates::status_email(ctx, booking),
            ],
        }
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, notification: &Notification) -> Result<(), AppError>;
}

/// Writes messages to the log instead of a provider.
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), AppError> {
        info!(
            channel = notification.channel.as_str(),
            to = %notification.to,
            subject = notification.subject.as_deref().unwrap_or(""),
            body_len = notification.body.len(),
            "notification sent"
        );
        Ok(())
    }
}
