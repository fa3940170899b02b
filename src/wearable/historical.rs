use chrono::{DateTime, Utc};
use rand::Rng;

use super::{request_all_categories, HistoryWindow, WearableError};
use crate::db::WearableRepository;
use crate::models::wearable::{Category, PendingRequest, PendingStatus};
use crate::services::TerraClient;

const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

#[derive(Debug, Clone)]
pub struct HistoricalRequest {
    pub reference: String,
    pub window: HistoryWindow,
    pub failed: Vec<Category>,
}

/// Unique tag for one backfill batch: `hist_<unix millis>_<9 base36 chars>`.
pub fn batch_reference(now: DateTime<Utc>) -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..9)
        .map(|_| BASE36[rng.gen_range(0..BASE36.len())] as char)
        .collect();
    format!("hist_{}_{}", now.timestamp_millis(), suffix)
}

/// Records a pending request on the link and asks the aggregator for every
/// category. Individual category failures are reported, not raised.
#[tracing::instrument(name = "Initiate historical data request", skip(store, terra, now))]
pub async fn initiate(
    store: &dyn WearableRepository,
    terra: &TerraClient,
    reference_id: &str,
    now: DateTime<Utc>,
) -> Result<HistoricalRequest, WearableError> {
    let link = store
        .find_by_reference(reference_id)
        .await?
        .filter(|link| !link.terra_user_id.is_empty())
        .ok_or_else(|| WearableError::NotFound("User not found or not connected to Terra".into()))?;

    let window = HistoryWindow::trailing(now.date_naive());
    let reference = batch_reference(now);
    let pending = PendingRequest {
        reference: Some(reference.clone()),
        endpoints: Category::ALL.to_vec(),
        start_date: Some(window.start_date),
        end_date: Some(window.end_date),
        requested_at: Some(now),
        status: PendingStatus::Initiated,
        chunks_received: 0,
        total_chunks: None,
    };
    store.start_pending_request(reference_id, &pending).await?;

    let failed: Vec<Category> = request_all_categories(terra, &link.terra_user_id, &window)
        .await
        .into_iter()
        .filter_map(|(category, result)| result.err().map(|_| category))
        .collect();

    if !failed.is_empty() {
        tracing::warn!(?failed, "Some data type requests failed");
    }

    Ok(HistoricalRequest { reference, window, failed })
}
