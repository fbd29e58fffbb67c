//! End-to-end engine scenarios on the in-memory store and a mock
//! transport: dispatch policy branching, throttling, pause/resume,
//! webhook reconciliation, and retry semantics.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use assert_matches::assert_matches;
use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::mpsc::UnboundedReceiver;

use meridian_core::channels::Channel;
use meridian_core::error::CoreError;
use meridian_core::status::{CampaignStatus, DeliveryStatus};
use meridian_core::types::DbId;
use meridian_db::models::campaign::CreateCampaign;
use meridian_db::models::customer::Customer;
use meridian_notify::dispatch::{
    BulkOutcome, BulkSendRequest, CampaignEngine, DispatchPolicy, ExecuteOutcome,
};
use meridian_notify::error::NotifyError;
use meridian_notify::queue::{QueuedJob, TokioDispatchQueue};
use meridian_notify::reconciler::{StatusReconciler, WebhookMeta};
use meridian_notify::sender::{NotificationSender, SenderConfig};
use meridian_notify::source::MemoryEntitySource;
use meridian_notify::store::memory::MemoryStore;
use meridian_notify::store::NotificationStore;
use meridian_notify::transport::{OutboundMessage, ProviderReceipt, Transport, TransportError};

// ---------------------------------------------------------------------------
// Mock transport
// ---------------------------------------------------------------------------

/// Transport double: succeeds unless the recipient is on the failure list.
#[derive(Default)]
struct MockTransport {
    fail_recipients: Mutex<HashSet<String>>,
    sent: Mutex<Vec<String>>,
}

impl MockTransport {
    fn fail_for(&self, recipient: &str) {
        self.fail_recipients
            .lock()
            .unwrap()
            .insert(recipient.to_string());
    }

    fn clear_failures(&self) {
        self.fail_recipients.lock().unwrap().clear();
    }

    fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, message: &OutboundMessage) -> Result<ProviderReceipt, TransportError> {
        if message.recipient.trim().is_empty() {
            return Err(TransportError::Rejected(
                "recipient has no address on file".to_string(),
            ));
        }
        if self
            .fail_recipients
            .lock()
            .unwrap()
            .contains(&message.recipient)
        {
            return Err(TransportError::HttpStatus(503));
        }
        let mut sent = self.sent.lock().unwrap();
        sent.push(message.recipient.clone());
        Ok(ProviderReceipt {
            message_id: format!("mock-{}", sent.len()),
        })
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

struct Harness {
    store: Arc<MemoryStore>,
    source: Arc<MemoryEntitySource>,
    transport: Arc<MockTransport>,
    sender: Arc<NotificationSender>,
    engine: Arc<CampaignEngine>,
    reconciler: StatusReconciler,
    queue_rx: UnboundedReceiver<QueuedJob>,
}

fn harness(policy: DispatchPolicy) -> Harness {
    let store = Arc::new(MemoryStore::new());
    let source = Arc::new(MemoryEntitySource::new());
    let transport = Arc::new(MockTransport::default());
    let (queue, queue_rx) = TokioDispatchQueue::new();
    let sender = Arc::new(NotificationSender::new(
        store.clone(),
        transport.clone(),
        SenderConfig::default(),
    ));
    let engine = Arc::new(CampaignEngine::new(
        store.clone(),
        source.clone(),
        Arc::clone(&sender),
        Arc::new(queue),
        policy,
    ));
    let reconciler = StatusReconciler::new(store.clone());
    Harness {
        store,
        source,
        transport,
        sender,
        engine,
        reconciler,
        queue_rx,
    }
}

fn phone(id: DbId) -> String {
    format!("+3933300{id:04}")
}

/// Seed `count` leads with both a phone and an email, returning their ids.
fn seed_leads(source: &MemoryEntitySource, count: usize) -> Vec<DbId> {
    (1..=count as DbId)
        .map(|id| {
            source.add_customer(Customer {
                id,
                name: format!("Lead {id}"),
                email: Some(format!("lead{id}@example.com")),
                phone: Some(phone(id)),
                is_lead: true,
                created_at: Utc::now(),
            });
            id
        })
        .collect()
}

fn campaign_spec(ids: &[DbId], messages_per_minute: i32) -> CreateCampaign {
    CreateCampaign {
        name: "Renewal reminder".to_string(),
        message_template: "Hi {customer_name}, your policy awaits.".to_string(),
        channel: "whatsapp".to_string(),
        target_criteria: serde_json::json!({ "customer_ids": ids }),
        scheduled_at: None,
        messages_per_minute,
    }
}

async fn campaign(h: &Harness, id: DbId) -> meridian_db::models::campaign::Campaign {
    h.store.campaign_by_id(id).await.unwrap().unwrap()
}

fn assert_counter_invariants(c: &meridian_db::models::campaign::Campaign) {
    assert!(c.sent_count + c.failed_count <= c.total_leads, "sent + failed exceeds total");
    assert!(c.delivered_count <= c.sent_count, "delivered exceeds sent");
    assert!(c.read_count <= c.delivered_count, "read exceeds delivered");
}

// ---------------------------------------------------------------------------
// Campaign creation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn create_validates_rate_schedule_and_criteria() {
    let h = harness(DispatchPolicy::default());

    let too_fast = campaign_spec(&[1], 1001);
    assert_matches!(
        h.engine.create_campaign(too_fast).await,
        Err(NotifyError::Core(CoreError::Validation(_)))
    );

    let mut past = campaign_spec(&[1], 10);
    past.scheduled_at = Some(Utc::now() - chrono::Duration::hours(1));
    assert_matches!(
        h.engine.create_campaign(past).await,
        Err(NotifyError::Core(CoreError::Validation(_)))
    );

    let mut bad_criteria = campaign_spec(&[1], 10);
    bad_criteria.target_criteria = serde_json::json!({ "segment": "everyone" });
    assert_matches!(
        h.engine.create_campaign(bad_criteria).await,
        Err(NotifyError::Core(CoreError::Validation(_)))
    );

    let draft = h.engine.create_campaign(campaign_spec(&[1], 10)).await.unwrap();
    assert_eq!(draft.status(), CampaignStatus::Draft);

    let mut future = campaign_spec(&[1], 10);
    future.scheduled_at = Some(Utc::now() + chrono::Duration::hours(1));
    let scheduled = h.engine.create_campaign(future).await.unwrap();
    assert_eq!(scheduled.status(), CampaignStatus::Scheduled);
}

// ---------------------------------------------------------------------------
// Dispatch policy branching
// ---------------------------------------------------------------------------

#[tokio::test]
async fn five_recipients_run_inline_and_complete() {
    let mut h = harness(DispatchPolicy::default());
    let ids = seed_leads(&h.source, 5);

    let created = h.engine.create_campaign(campaign_spec(&ids, 100)).await.unwrap();
    let outcome = h.engine.execute(created.id).await.unwrap();

    let ExecuteOutcome::Inline { campaign } = outcome else {
        panic!("five recipients must run inline");
    };
    assert_eq!(campaign.total_leads, 5);
    assert_eq!(campaign.sent_count, 5);
    assert_eq!(campaign.failed_count, 0);
    assert_eq!(campaign.status(), CampaignStatus::Completed);
    assert_counter_invariants(&campaign);

    // Nothing was deferred, and every target points at its log.
    assert!(h.queue_rx.try_recv().is_err());
    assert!(h
        .store
        .all_targets()
        .iter()
        .all(|t| t.notification_log_id.is_some()));
    assert_eq!(h.transport.sent_count(), 5);
}

#[tokio::test]
async fn campaign_above_threshold_is_queued_then_drained() {
    let mut h = harness(DispatchPolicy::default());
    let ids = seed_leads(&h.source, 60);

    let created = h.engine.create_campaign(campaign_spec(&ids, 1000)).await.unwrap();
    let outcome = h.engine.execute(created.id).await.unwrap();

    assert_matches!(
        outcome,
        ExecuteOutcome::Queued { total_leads: 60, .. }
    );
    let mid = campaign(&h, created.id).await;
    assert_eq!(mid.status(), CampaignStatus::Executing);
    assert_eq!(mid.sent_count, 0);

    // Drain the job the way the queue worker would.
    let job = h.queue_rx.try_recv().expect("job must be enqueued");
    h.engine.process_job(job).await.unwrap();

    let done = campaign(&h, created.id).await;
    assert_eq!(done.status(), CampaignStatus::Completed);
    assert_eq!(done.sent_count, 60);
}

#[tokio::test]
async fn execute_is_rejected_outside_draft_or_scheduled() {
    let h = harness(DispatchPolicy::default());
    let ids = seed_leads(&h.source, 2);

    let created = h.engine.create_campaign(campaign_spec(&ids, 100)).await.unwrap();
    h.engine.execute(created.id).await.unwrap();

    assert_matches!(
        h.engine.execute(created.id).await,
        Err(NotifyError::Core(CoreError::Conflict(_)))
    );
    assert_matches!(
        h.engine.execute(999).await,
        Err(NotifyError::Core(CoreError::NotFound { .. }))
    );
}

// ---------------------------------------------------------------------------
// Throttling and pause
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn rate_bound_holds_for_120_recipients_at_60_per_minute() {
    let h = harness(DispatchPolicy {
        campaign_queue_threshold: 1000,
        bulk_inline_limit: 10,
    });
    let ids = seed_leads(&h.source, 120);

    let created = h.engine.create_campaign(campaign_spec(&ids, 60)).await.unwrap();
    let started = tokio::time::Instant::now();
    let outcome = h.engine.execute(created.id).await.unwrap();
    let elapsed = started.elapsed();

    let ExecuteOutcome::Inline { campaign } = outcome else {
        panic!("raised threshold keeps the run inline");
    };
    assert_eq!(campaign.sent_count, 120);
    assert_eq!(campaign.status(), CampaignStatus::Completed);
    // Two chunks of 60 with one full window between them.
    assert!(
        elapsed >= Duration::from_secs(60),
        "dispatch finished too fast: {elapsed:?}"
    );
}

#[tokio::test(start_paused = true)]
async fn pause_stops_before_the_next_chunk_and_resume_finishes() {
    let mut h = harness(DispatchPolicy {
        campaign_queue_threshold: 1000,
        bulk_inline_limit: 10,
    });
    let ids = seed_leads(&h.source, 5);

    let created = h.engine.create_campaign(campaign_spec(&ids, 2)).await.unwrap();
    let engine = Arc::clone(&h.engine);
    let id = created.id;
    let run = tokio::spawn(async move { engine.execute(id).await });

    // Let the first chunk of two sends land, then pause during the
    // throttle sleep.
    while h.store.all_logs().len() < 2 {
        tokio::task::yield_now().await;
    }
    h.engine.pause(id).await.unwrap();
    run.await.unwrap().unwrap();

    let paused = campaign(&h, id).await;
    assert_eq!(paused.status(), CampaignStatus::Paused);
    assert_eq!(paused.sent_count, 2);
    assert_eq!(h.store.all_logs().len(), 2, "no send may start after pause");

    // Pausing a paused campaign is a conflict.
    assert_matches!(
        h.engine.pause(id).await,
        Err(NotifyError::Core(CoreError::Conflict(_)))
    );

    // Resume hands the remaining targets back to the queue.
    h.engine.resume(id).await.unwrap();
    let job = h.queue_rx.try_recv().expect("resume must enqueue the rest");
    h.engine.process_job(job).await.unwrap();

    let done = campaign(&h, id).await;
    assert_eq!(done.status(), CampaignStatus::Completed);
    assert_eq!(done.sent_count, 5);
    assert_counter_invariants(&done);
}

#[tokio::test]
async fn cancel_blocks_later_execution() {
    let h = harness(DispatchPolicy::default());
    let ids = seed_leads(&h.source, 2);

    let created = h.engine.create_campaign(campaign_spec(&ids, 100)).await.unwrap();
    let cancelled = h.engine.cancel(created.id).await.unwrap();
    assert_eq!(cancelled.status(), CampaignStatus::Cancelled);

    assert_matches!(
        h.engine.cancel(created.id).await,
        Err(NotifyError::Core(CoreError::Conflict(_)))
    );
    assert_matches!(
        h.engine.execute(created.id).await,
        Err(NotifyError::Core(CoreError::Conflict(_)))
    );
}

// ---------------------------------------------------------------------------
// Webhook reconciliation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn read_webhook_applied_twice_increments_counters_once() {
    let h = harness(DispatchPolicy::default());
    let ids = seed_leads(&h.source, 1);

    let created = h.engine.create_campaign(campaign_spec(&ids, 100)).await.unwrap();
    h.engine.execute(created.id).await.unwrap();
    let log_id = h.store.all_logs()[0].id;

    let first = h
        .reconciler
        .apply_webhook_status(log_id, "read", WebhookMeta::default())
        .await
        .unwrap();
    assert!(first.changed);
    assert_eq!(first.new_status, "read");

    let replay = h
        .reconciler
        .apply_webhook_status(log_id, "read", WebhookMeta::default())
        .await
        .unwrap();
    assert!(!replay.changed);

    let c = campaign(&h, created.id).await;
    // A read without a prior delivered event implies delivery.
    assert_eq!(c.delivered_count, 1);
    assert_eq!(c.read_count, 1);
    assert_counter_invariants(&c);
}

#[tokio::test]
async fn delivered_log_ignores_late_sent_webhook() {
    let h = harness(DispatchPolicy::default());
    let ids = seed_leads(&h.source, 1);

    let created = h.engine.create_campaign(campaign_spec(&ids, 100)).await.unwrap();
    h.engine.execute(created.id).await.unwrap();
    let log_id = h.store.all_logs()[0].id;

    h.reconciler
        .apply_webhook_status(log_id, "delivered", WebhookMeta::default())
        .await
        .unwrap();
    let regression = h
        .reconciler
        .apply_webhook_status(log_id, "sent", WebhookMeta::default())
        .await
        .unwrap();

    assert!(!regression.changed);
    assert_eq!(regression.new_status, "delivered");
    assert_eq!(
        h.store.all_logs()[0].status(),
        DeliveryStatus::Delivered
    );
    assert_eq!(campaign(&h, created.id).await.delivered_count, 1);
}

#[tokio::test]
async fn provider_vocabulary_is_canonicalised() {
    let h = harness(DispatchPolicy::default());
    let ids = seed_leads(&h.source, 1);

    let created = h.engine.create_campaign(campaign_spec(&ids, 100)).await.unwrap();
    h.engine.execute(created.id).await.unwrap();
    let log_id = h.store.all_logs()[0].id;

    // Email-provider `opened` lands as canonical `read`.
    let outcome = h
        .reconciler
        .apply_webhook_status(log_id, "opened", WebhookMeta::default())
        .await
        .unwrap();
    assert_eq!(outcome.new_status, "read");

    assert_matches!(
        h.reconciler
            .apply_webhook_status(log_id, "exploded", WebhookMeta::default())
            .await,
        Err(NotifyError::Core(CoreError::Validation(_)))
    );
    assert_matches!(
        h.reconciler
            .apply_webhook_status(999, "read", WebhookMeta::default())
            .await,
        Err(NotifyError::Core(CoreError::NotFound { .. }))
    );
}

#[tokio::test]
async fn invariants_survive_a_mixed_event_sequence() {
    let h = harness(DispatchPolicy::default());
    let ids = seed_leads(&h.source, 4);
    h.transport.fail_for(&phone(4));

    let created = h.engine.create_campaign(campaign_spec(&ids, 100)).await.unwrap();
    h.engine.execute(created.id).await.unwrap();

    let logs = h.store.all_logs();
    for (log, raw) in logs.iter().zip(["delivered", "read", "sent", "delivered"]) {
        // The failed log rejects every progress event; the others advance.
        let _ = h
            .reconciler
            .apply_webhook_status(log.id, raw, WebhookMeta::default())
            .await
            .unwrap();
    }
    // Replay the whole batch: nothing may move twice.
    for (log, raw) in logs.iter().zip(["delivered", "read", "sent", "delivered"]) {
        let replay = h
            .reconciler
            .apply_webhook_status(log.id, raw, WebhookMeta::default())
            .await
            .unwrap();
        assert!(!replay.changed, "replayed event must be a no-op");
    }

    let c = campaign(&h, created.id).await;
    assert_eq!(c.sent_count, 3);
    assert_eq!(c.failed_count, 1);
    assert_counter_invariants(&c);
}

// ---------------------------------------------------------------------------
// Retry
// ---------------------------------------------------------------------------

#[tokio::test]
async fn retry_failed_shifts_counters_once_transport_recovers() {
    let h = harness(DispatchPolicy::default());
    let ids = seed_leads(&h.source, 3);
    h.transport.fail_for(&phone(2));

    let created = h.engine.create_campaign(campaign_spec(&ids, 100)).await.unwrap();
    h.engine.execute(created.id).await.unwrap();

    let before = campaign(&h, created.id).await;
    assert_eq!(before.sent_count, 2);
    assert_eq!(before.failed_count, 1);

    h.transport.clear_failures();
    let report = h.engine.retry_failed(created.id).await.unwrap();
    assert_eq!(report.retried, 1);
    assert_eq!(report.skipped, 0);

    let after = campaign(&h, created.id).await;
    assert_eq!(after.sent_count, 3);
    assert_eq!(after.failed_count, 0);
    assert_counter_invariants(&after);

    let retried_log = h
        .store
        .all_logs()
        .into_iter()
        .find(|l| l.recipient == phone(2))
        .unwrap();
    assert_eq!(retried_log.status(), DeliveryStatus::Sent);
    assert_eq!(retried_log.attempt_count, 2);
}

#[tokio::test]
async fn retry_is_refused_after_the_attempt_cap() {
    let h = harness(DispatchPolicy::default());
    let ids = seed_leads(&h.source, 1);
    h.transport.fail_for(&phone(1));

    let created = h.engine.create_campaign(campaign_spec(&ids, 100)).await.unwrap();
    h.engine.execute(created.id).await.unwrap();

    // Attempts 2 and 3 keep failing; the cap is 3.
    for _ in 0..2 {
        let report = h.engine.retry_failed(created.id).await.unwrap();
        assert_eq!(report.retried, 1);
    }
    let log = h.store.all_logs()[0].clone();
    assert_eq!(log.attempt_count, 3);
    assert_eq!(log.status(), DeliveryStatus::Failed);
    assert!(!NotificationSender::can_retry(&log));

    let exhausted = h.engine.retry_failed(created.id).await.unwrap();
    assert_eq!(exhausted.retried, 0);
    assert_eq!(exhausted.skipped, 1);

    assert_matches!(
        h.sender.retry(log.id).await,
        Err(NotifyError::Core(CoreError::RetryNotAllowed(_)))
    );

    // Send-time failures count once, however often the retry fails again.
    let c = campaign(&h, created.id).await;
    assert_eq!(c.failed_count, 1);
    assert_counter_invariants(&c);
}

#[tokio::test]
async fn retry_is_refused_for_sent_logs() {
    let h = harness(DispatchPolicy::default());
    let ids = seed_leads(&h.source, 1);

    let created = h.engine.create_campaign(campaign_spec(&ids, 100)).await.unwrap();
    h.engine.execute(created.id).await.unwrap();
    let log_id = h.store.all_logs()[0].id;

    assert_matches!(
        h.sender.retry(log_id).await,
        Err(NotifyError::Core(CoreError::RetryNotAllowed(_)))
    );
}

// ---------------------------------------------------------------------------
// Bulk sends
// ---------------------------------------------------------------------------

fn bulk_request(ids: Vec<DbId>) -> BulkSendRequest {
    BulkSendRequest {
        channel: Channel::Whatsapp,
        body: "Hello {customer_name}".to_string(),
        subject: None,
        customer_ids: ids,
    }
}

#[tokio::test]
async fn bulk_send_with_15_recipients_is_queued() {
    let mut h = harness(DispatchPolicy::default());
    let ids = seed_leads(&h.source, 15);

    let outcome = h.engine.bulk_send(bulk_request(ids)).await.unwrap();
    assert_matches!(outcome, BulkOutcome::Queued { total: 15 });
    assert_eq!(h.transport.sent_count(), 0, "queued bulk must not send inline");

    let job = h.queue_rx.try_recv().expect("bulk job must be enqueued");
    h.engine.process_job(job).await.unwrap();
    assert_eq!(h.transport.sent_count(), 15);
}

#[tokio::test]
async fn bulk_send_with_8_recipients_returns_inline_results() {
    let mut h = harness(DispatchPolicy::default());
    let mut ids = seed_leads(&h.source, 7);
    ids.push(999); // unknown customer

    let outcome = h.engine.bulk_send(bulk_request(ids)).await.unwrap();
    let BulkOutcome::Completed {
        sent_count,
        failed_count,
        results,
    } = outcome
    else {
        panic!("eight recipients must run inline");
    };

    assert_eq!(results.len(), 8);
    assert_eq!(sent_count, 7);
    assert_eq!(failed_count, 1);
    let missing = results.iter().find(|r| r.customer_id == 999).unwrap();
    assert_eq!(missing.status, "skipped");
    assert!(missing.log_id.is_none());
    assert!(h.queue_rx.try_recv().is_err());
}

#[tokio::test]
async fn bulk_send_renders_per_recipient_and_records_rejections() {
    let h = harness(DispatchPolicy::default());
    h.source.add_customer(Customer {
        id: 1,
        name: "Ada Rossi".to_string(),
        email: Some("ada@example.com".to_string()),
        phone: Some(phone(1)),
        is_lead: true,
        created_at: Utc::now(),
    });
    // No phone on file: the whatsapp transport rejects the send and the
    // failure is recorded, not thrown.
    h.source.add_customer(Customer {
        id: 2,
        name: "Bo Conti".to_string(),
        email: Some("bo@example.com".to_string()),
        phone: None,
        is_lead: true,
        created_at: Utc::now(),
    });

    let outcome = h.engine.bulk_send(bulk_request(vec![1, 2])).await.unwrap();
    let BulkOutcome::Completed { results, .. } = outcome else {
        panic!("two recipients run inline");
    };

    assert_eq!(results[0].status, "sent");
    assert_eq!(results[1].status, "failed");
    assert!(results[1].error.as_deref().unwrap().contains("no address"));

    let logs = h.store.all_logs();
    assert_eq!(logs[0].message_content, "Hello Ada Rossi");
    assert_eq!(logs[1].status(), DeliveryStatus::Failed);
}

#[tokio::test]
async fn bulk_send_rejects_an_empty_recipient_list() {
    let h = harness(DispatchPolicy::default());
    assert_matches!(
        h.engine.bulk_send(bulk_request(Vec::new())).await,
        Err(NotifyError::Core(CoreError::Validation(_)))
    );
}
