//! Periodic archival of old notification logs.
//!
//! Deletes log rows older than the configured retention period on a fixed
//! interval. Logs attached to a non-terminal campaign are never touched,
//! whatever their age.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;

use meridian_notify::store::NotificationStore;

/// Run the retention sweep loop until `cancel` is triggered.
pub async fn run(
    store: Arc<dyn NotificationStore>,
    sweep_interval: Duration,
    retention_days: i64,
    cancel: CancellationToken,
) {
    tracing::info!(
        retention_days,
        interval_secs = sweep_interval.as_secs(),
        "Log retention job started"
    );

    let mut interval = tokio::time::interval(sweep_interval);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Log retention job stopping");
                break;
            }
            _ = interval.tick() => {
                let cutoff = Utc::now() - chrono::Duration::days(retention_days);
                match store.archive_logs_older_than(cutoff).await {
                    Ok(removed) => {
                        if removed > 0 {
                            tracing::info!(removed, "Log retention: archived old rows");
                        } else {
                            tracing::debug!("Log retention: nothing to archive");
                        }
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Log retention: sweep failed");
                    }
                }
            }
        }
    }
}
