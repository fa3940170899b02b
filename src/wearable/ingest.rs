use chrono::{DateTime, Utc};
use serde_json::Value;

use super::{request_all_categories, HistoryWindow, WearableError};
use crate::db::WearableRepository;
use crate::models::terra::{TerraWebhookEvent, WebhookEventKind};
use crate::models::wearable::{
    AuthenticatedLink, BucketEntry, Category, HealthBucket, PendingStatus, Provider,
};
use crate::services::TerraClient;

/// What a webhook delivery changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    Linked { reference_id: String },
    AuthFailed,
    StatusUpdated { matched: bool },
    ChunksDeclared { matched: bool },
    Merged { category: Category, items: usize, completed: bool },
    UnknownUser,
    Ignored,
}

/// Extracts the dedup key of one item. Numbers are accepted and stringified.
fn dedup_key(category: Category, item: &Value) -> Option<String> {
    match item.pointer(category.dedup_pointer())? {
        Value::String(key) if !key.is_empty() => Some(key.clone()),
        Value::Number(key) => Some(key.to_string()),
        _ => None,
    }
}

/// Keys every item of a data delivery. Items without a key are dropped; the last
/// item wins when a delivery repeats a key.
pub fn collect_entries(category: Category, data: &Value, received_at: DateTime<Utc>) -> HealthBucket {
    let items: Vec<&Value> = match data {
        Value::Array(items) => items.iter().collect(),
        Value::Null => Vec::new(),
        item => vec![item],
    };

    let mut entries = HealthBucket::new();
    for item in items {
        match dedup_key(category, item) {
            Some(key) => {
                entries.insert(
                    key.clone(),
                    BucketEntry { key, payload: item.clone(), received_at },
                );
            }
            None => tracing::debug!(%category, "Dropping item without a dedup key"),
        }
    }
    entries
}

fn require_terra_user(event: &TerraWebhookEvent) -> Result<&str, WearableError> {
    event
        .terra_user_id()
        .ok_or_else(|| WearableError::Validation(format!("{} event is missing user.user_id", event.event_type)))
}

/// Applies one aggregator webhook event to the store.
#[tracing::instrument(
    name = "Process Terra webhook event",
    skip(store, terra, event, now),
    fields(event_type = %event.event_type)
)]
pub async fn process_event(
    store: &dyn WearableRepository,
    terra: &TerraClient,
    event: &TerraWebhookEvent,
    now: DateTime<Utc>,
) -> Result<IngestOutcome, WearableError> {
    match event.kind() {
        WebhookEventKind::AuthSuccess => handle_auth_success(store, terra, event, now).await,
        WebhookEventKind::AuthFailure => {
            tracing::warn!(
                status = ?event.status,
                message = ?event.message,
                reference_id = ?event.reference_id,
                "Device authentication did not succeed"
            );
            Ok(IngestOutcome::AuthFailed)
        }
        WebhookEventKind::LargeRequestProcessing => {
            let terra_user_id = require_terra_user(event)?;
            let matched = store.set_pending_status(terra_user_id, PendingStatus::Processing).await?;
            tracing::info!(terra_user_id, matched, "Large request processing");
            Ok(IngestOutcome::StatusUpdated { matched })
        }
        WebhookEventKind::LargeRequestSending => {
            let terra_user_id = require_terra_user(event)?;
            let matched = store
                .declare_total_chunks(terra_user_id, event.number_of_payloads)
                .await?;
            tracing::info!(
                terra_user_id,
                total_chunks = ?event.number_of_payloads,
                matched,
                "Large request sending"
            );
            Ok(IngestOutcome::ChunksDeclared { matched })
        }
        WebhookEventKind::Data(category) => handle_data(store, category, event, now).await,
        WebhookEventKind::Other => {
            tracing::debug!("Ignoring unhandled webhook event type");
            Ok(IngestOutcome::Ignored)
        }
    }
}

async fn handle_auth_success(
    store: &dyn WearableRepository,
    terra: &TerraClient,
    event: &TerraWebhookEvent,
    now: DateTime<Utc>,
) -> Result<IngestOutcome, WearableError> {
    let user = event
        .user
        .as_ref()
        .filter(|user| !user.user_id.is_empty())
        .ok_or_else(|| WearableError::Validation("auth event is missing user.user_id".into()))?;
    let reference_id = event
        .reference_id
        .as_deref()
        .or(user.reference_id.as_deref())
        .filter(|id| !id.is_empty())
        .ok_or_else(|| WearableError::Validation("auth event is missing reference_id".into()))?;

    let link = AuthenticatedLink {
        reference_id: reference_id.to_string(),
        terra_user_id: user.user_id.clone(),
        provider: user.provider.as_deref().map(Provider::parse).unwrap_or(Provider::Other),
        scopes: user.scopes.clone(),
    };
    store.link_authenticated(&link, now).await?;
    tracing::info!(reference_id, terra_user_id = %link.terra_user_id, provider = %link.provider, "Wearable linked");

    let window = HistoryWindow::trailing(now.date_naive());
    for (category, result) in request_all_categories(terra, &link.terra_user_id, &window).await {
        if let Err(e) = result {
            tracing::error!(%category, "Backfill request after linking failed");
            return Err(e.into());
        }
    }

    Ok(IngestOutcome::Linked { reference_id: link.reference_id })
}

async fn handle_data(
    store: &dyn WearableRepository,
    category: Category,
    event: &TerraWebhookEvent,
    now: DateTime<Utc>,
) -> Result<IngestOutcome, WearableError> {
    let terra_user_id = require_terra_user(event)?;
    let Some(link) = store.find_by_terra_user(terra_user_id).await? else {
        tracing::info!(terra_user_id, %category, "Dropping data for an unlinked user");
        return Ok(IngestOutcome::UnknownUser);
    };

    let entries = collect_entries(category, &event.data, now);
    let Some(progress) = store
        .merge_bucket(&link.reference_id, category, &entries, now)
        .await?
    else {
        // Link vanished between lookup and update
        return Ok(IngestOutcome::UnknownUser);
    };

    let completed = progress.is_complete();
    if completed {
        store.complete_pending_request(&link.reference_id, now).await?;
        tracing::info!(reference_id = %link.reference_id, "All chunks received");
    }

    tracing::info!(
        reference_id = %link.reference_id,
        %category,
        items = entries.len(),
        chunks_received = progress.chunks_received,
        total_chunks = ?progress.total_chunks,
        "Merged health data"
    );
    Ok(IngestOutcome::Merged { category, items: entries.len(), completed })
}
