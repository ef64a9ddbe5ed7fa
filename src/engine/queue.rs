use crate::error::AppError;
use crate::notify::NotificationJob;
use crate::state::AppState;

/// Waits for room in the bounded queue.
pub async fn enqueue_notification(state: &AppState, job: NotificationJob) -> Result<(), AppError> {
    state
        .notification_tx
        .send(job)
        .await
        .map_err(|err| AppError::Internal(format!("notification queue send failed: {err}")))?;

    state.metrics.notifications_in_queue.inc();
    Ok(())
}
