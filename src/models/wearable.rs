use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Device vendor behind a linked aggregator account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Provider {
    Garmin,
    Fitbit,
    Oura,
    Whoop,
    #[serde(other)]
    Other,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Garmin => "GARMIN",
            Provider::Fitbit => "FITBIT",
            Provider::Oura => "OURA",
            Provider::Whoop => "WHOOP",
            Provider::Other => "OTHER",
        }
    }

    /// Case-insensitive; anything unrecognised becomes `Other`.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_uppercase().as_str() {
            "GARMIN" => Provider::Garmin,
            "FITBIT" => Provider::Fitbit,
            "OURA" => Provider::Oura,
            "WHOOP" => Provider::Whoop,
            _ => Provider::Other,
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The four health-data categories the aggregator delivers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Activity,
    Daily,
    Sleep,
    Body,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Activity,
        Category::Daily,
        Category::Sleep,
        Category::Body,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Activity => "activity",
            Category::Daily => "daily",
            Category::Sleep => "sleep",
            Category::Body => "body",
        }
    }

    /// JSON pointer of the field that identifies one logical record in this category.
    /// Activities and sleeps carry a summary id; daily and body records are per period.
    pub fn dedup_pointer(&self) -> &'static str {
        match self {
            Category::Activity | Category::Sleep => "/metadata/summary_id",
            Category::Daily | Category::Body => "/metadata/start_time",
        }
    }

    pub fn from_event_type(value: &str) -> Option<Self> {
        match value {
            "activity" => Some(Category::Activity),
            "daily" => Some(Category::Daily),
            "sleep" => Some(Category::Sleep),
            "body" => Some(Category::Body),
            _ => None,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One stored payload plus the key it was deduplicated under.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BucketEntry {
    pub key: String,
    pub payload: Value,
    pub received_at: DateTime<Utc>,
}

/// Dedup key -> most recently received entry.
pub type HealthBucket = BTreeMap<String, BucketEntry>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HealthData {
    #[serde(default)]
    pub activity: HealthBucket,
    #[serde(default)]
    pub daily: HealthBucket,
    #[serde(default)]
    pub sleep: HealthBucket,
    #[serde(default)]
    pub body: HealthBucket,
}

impl HealthData {
    pub fn bucket(&self, category: Category) -> &HealthBucket {
        match category {
            Category::Activity => &self.activity,
            Category::Daily => &self.daily,
            Category::Sleep => &self.sleep,
            Category::Body => &self.body,
        }
    }

    pub fn bucket_mut(&mut self, category: Category) -> &mut HealthBucket {
        match category {
            Category::Activity => &mut self.activity,
            Category::Daily => &mut self.daily,
            Category::Sleep => &mut self.sleep,
            Category::Body => &mut self.body,
        }
    }

    /// Bucket payloads in key order, dedup keys and envelopes dropped.
    pub fn payloads(&self, category: Category) -> Vec<Value> {
        self.bucket(category)
            .values()
            .map(|entry| entry.payload.clone())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        Category::ALL.iter().all(|category| self.bucket(*category).is_empty())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PendingStatus {
    Initiated,
    Processing,
    Receiving,
    Completed,
    Error,
}

impl PendingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PendingStatus::Initiated => "initiated",
            PendingStatus::Processing => "processing",
            PendingStatus::Receiving => "receiving",
            PendingStatus::Completed => "completed",
            PendingStatus::Error => "error",
        }
    }
}

impl FromStr for PendingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "initiated" => Ok(PendingStatus::Initiated),
            "processing" => Ok(PendingStatus::Processing),
            "receiving" => Ok(PendingStatus::Receiving),
            "completed" => Ok(PendingStatus::Completed),
            "error" => Ok(PendingStatus::Error),
            other => Err(format!("unknown pending request status: {}", other)),
        }
    }
}

/// Bookkeeping for an outstanding historical-data request.
///
/// Status events from the aggregator can arrive for a link that never
/// initiated a request itself (e.g. the backfill triggered on auth), so the
/// descriptive fields are optional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingRequest {
    pub reference: Option<String>,
    pub endpoints: Vec<Category>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub requested_at: Option<DateTime<Utc>>,
    pub status: PendingStatus,
    pub chunks_received: i32,
    pub total_chunks: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WearableLink {
    pub reference_id: String,
    pub terra_user_id: String,
    pub provider: Provider,
    pub scopes: Option<String>,
    pub last_sync: DateTime<Utc>,
    pub health_data: HealthData,
    pub pending_request: Option<PendingRequest>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields written when the aggregator reports a successful device link.
#[derive(Debug, Clone)]
pub struct AuthenticatedLink {
    pub reference_id: String,
    pub terra_user_id: String,
    pub provider: Provider,
    pub scopes: Option<String>,
}

/// Chunk counters after a category merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkProgress {
    pub chunks_received: i32,
    pub total_chunks: Option<i32>,
}

impl ChunkProgress {
    pub fn is_complete(&self) -> bool {
        self.total_chunks == Some(self.chunks_received)
    }
}
