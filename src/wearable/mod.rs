//! Wearable-data linking and reconciliation.

use chrono::{Days, NaiveDate};
use futures::future::join_all;
use serde_json::Value;
use thiserror::Error;

use crate::db::StoreError;
use crate::models::wearable::Category;
use crate::services::{TerraClient, TerraError};

pub mod historical;
pub mod ingest;
pub mod signature;

/// Days of history requested when a device is linked or a backfill is asked for.
pub const HISTORY_WINDOW_DAYS: u64 = 28;

#[derive(Debug, Error)]
pub enum WearableError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Terra(#[from] TerraError),
}

/// Inclusive calendar-date range sent to the aggregator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryWindow {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

impl HistoryWindow {
    /// `HISTORY_WINDOW_DAYS` back from `today`, ending tomorrow so today's data is complete.
    pub fn trailing(today: NaiveDate) -> Self {
        Self {
            start_date: today - Days::new(HISTORY_WINDOW_DAYS),
            end_date: today + Days::new(1),
        }
    }

    pub fn start_param(&self) -> String {
        self.start_date.format("%Y-%m-%d").to_string()
    }

    pub fn end_param(&self) -> String {
        self.end_date.format("%Y-%m-%d").to_string()
    }
}

/// Requests every category concurrently and waits for all of them to settle.
pub async fn request_all_categories(
    terra: &TerraClient,
    terra_user_id: &str,
    window: &HistoryWindow,
) -> Vec<(Category, Result<Value, TerraError>)> {
    let requests = Category::ALL.iter().map(|category| async move {
        let result = terra.request_history(*category, terra_user_id, window).await;
        match &result {
            Ok(response) => tracing::debug!(%category, ?response, "Requested historical data"),
            Err(e) => tracing::error!(%category, error = %e, "Historical data request failed"),
        }
        (*category, result)
    });
    join_all(requests).await
}
