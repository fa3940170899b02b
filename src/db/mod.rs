//! Persistence for wearable links and AI interactions.
//!
//! Handlers only see the repository traits; the concrete backend is picked
//! from configuration at startup.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use thiserror::Error;

use crate::models::ai_interaction::{AIInteraction, NewInteraction};
use crate::models::wearable::{
    AuthenticatedLink, Category, ChunkProgress, HealthBucket, PendingRequest, PendingStatus,
    Provider, WearableLink,
};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Corrupt record: {0}")]
    Corrupt(String),
}

#[async_trait]
pub trait WearableRepository: Send + Sync {
    /// Upserts the link for a successful device authorisation and empties all buckets.
    async fn link_authenticated(
        &self,
        link: &AuthenticatedLink,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// Upserts the link from the browser callback; buckets and scopes are left alone.
    async fn link_from_callback(
        &self,
        reference_id: &str,
        terra_user_id: &str,
        provider: Provider,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    async fn find_by_reference(&self, reference_id: &str) -> Result<Option<WearableLink>, StoreError>;

    async fn find_by_terra_user(&self, terra_user_id: &str) -> Result<Option<WearableLink>, StoreError>;

    /// Replaces the pending-request descriptor. Returns false when no link matched.
    async fn start_pending_request(
        &self,
        reference_id: &str,
        pending: &PendingRequest,
    ) -> Result<bool, StoreError>;

    async fn set_pending_status(
        &self,
        terra_user_id: &str,
        status: PendingStatus,
    ) -> Result<bool, StoreError>;

    /// Records the chunk count announced by the aggregator and moves to `receiving`.
    async fn declare_total_chunks(
        &self,
        terra_user_id: &str,
        total_chunks: Option<i32>,
    ) -> Result<bool, StoreError>;

    /// Merges `entries` into one category bucket, bumps last sync and the chunk
    /// counter in a single atomic update.
    async fn merge_bucket(
        &self,
        reference_id: &str,
        category: Category,
        entries: &HealthBucket,
        now: DateTime<Utc>,
    ) -> Result<Option<ChunkProgress>, StoreError>;

    async fn complete_pending_request(
        &self,
        reference_id: &str,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    async fn list_links(&self, limit: i64) -> Result<Vec<WearableLink>, StoreError>;
}

#[async_trait]
pub trait InteractionRepository: Send + Sync {
    async fn record_interaction(&self, interaction: NewInteraction) -> Result<AIInteraction, StoreError>;

    /// Most recent first.
    async fn recent_interactions(&self, limit: i64) -> Result<Vec<AIInteraction>, StoreError>;
}

/// Process-wide handles to both repositories.
#[derive(Clone)]
pub struct Store {
    pub wearables: Arc<dyn WearableRepository>,
    pub interactions: Arc<dyn InteractionRepository>,
}

impl Store {
    pub fn postgres(pool: PgPool) -> Self {
        let store = Arc::new(PgStore::new(pool));
        Self {
            wearables: store.clone(),
            interactions: store,
        }
    }

    pub fn in_memory() -> Self {
        let store = Arc::new(MemoryStore::default());
        Self {
            wearables: store.clone(),
            interactions: store,
        }
    }
}
