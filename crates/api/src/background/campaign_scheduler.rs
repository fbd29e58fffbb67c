//! Scheduled-campaign poller.
//!
//! Checks for `scheduled` campaigns whose `scheduled_at` has passed and
//! hands them to the dispatch engine. Whether a due campaign then runs
//! inline (within this task) or on the dispatch queue is the engine's
//! policy decision, same as for an operator-triggered execute.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;

use meridian_notify::dispatch::CampaignEngine;
use meridian_notify::store::NotificationStore;

/// Run the scheduler loop until `cancel` is triggered.
pub async fn run(
    store: Arc<dyn NotificationStore>,
    engine: Arc<CampaignEngine>,
    poll_interval: Duration,
    cancel: CancellationToken,
) {
    tracing::info!(
        poll_interval_secs = poll_interval.as_secs(),
        "Campaign scheduler started"
    );

    let mut interval = tokio::time::interval(poll_interval);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Campaign scheduler stopping");
                break;
            }
            _ = interval.tick() => {
                if let Err(e) = run_due_campaigns(&store, &engine).await {
                    tracing::error!(error = %e, "Scheduler cycle failed");
                }
            }
        }
    }
}

/// One scheduler cycle: execute every due campaign.
///
/// A failure on one campaign is logged and does not block the others; a
/// conflict just means another caller got there first.
async fn run_due_campaigns(
    store: &Arc<dyn NotificationStore>,
    engine: &Arc<CampaignEngine>,
) -> Result<(), meridian_notify::error::StoreError> {
    let due = store.due_scheduled_campaigns(Utc::now()).await?;
    for campaign in due {
        tracing::info!(
            campaign_id = campaign.id,
            name = %campaign.name,
            "Executing scheduled campaign"
        );
        if let Err(e) = engine.execute(campaign.id).await {
            tracing::error!(
                campaign_id = campaign.id,
                error = %e,
                "Scheduled campaign failed to start"
            );
        }
    }
    Ok(())
}
