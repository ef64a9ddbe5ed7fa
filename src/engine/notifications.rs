use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::notify::NotificationJob;
use crate::state::AppState;

pub async fn run_notification_worker(
    state: Arc<AppState>,
    mut job_rx: mpsc::Receiver<NotificationJob>,
) {
    info!("notification worker started");

    while let Some(job) = job_rx.recv().await {
        state.metrics.notifications_in_queue.dec();
        deliver(&state, &job).await;
    }

    warn!("notification worker stopped: queue channel closed");
}

/// Sends every rendered message for the job. A failed channel is logged and
/// counted; the other channel is still attempted.
pub async fn deliver(state: &AppState, job: &NotificationJob) -> usize {
    let booking = job.booking();
    let service_name = state
        .catalog
        .get(&booking.service)
        .map_or(booking.service.as_str(), |service| service.name);

    let mut delivered = 0;
    for notification in job.render(&state.templates, service_name) {
        let channel = notification.channel.as_str();
        match state.notifier.send(&notification).await {
            Ok(()) => {
                delivered += 1;
                state
                    .metrics
                    .notifications_total
                    .with_label_values(&[channel, "success"])
                    .inc();
            }
            Err(err) => {
                state
                    .metrics
                    .notifications_total
                    .with_label_values(&[channel, "error"])
                    .inc();
                error!(booking_id = %booking.id, channel, error = %err, "failed to send notification");
            }
        }
    }
    delivered
}
