use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use super::{InteractionRepository, StoreError, WearableRepository};
use crate::models::ai_interaction::{AIInteraction, NewInteraction};
use crate::models::wearable::{
    AuthenticatedLink, Category, ChunkProgress, HealthBucket, HealthData, PendingRequest,
    PendingStatus, Provider, WearableLink,
};

const LINK_COLUMNS: &str = r#"
    reference_id, terra_user_id, provider, scopes, last_sync,
    activity, daily, sleep, body,
    pending_reference, pending_endpoints, pending_start_date, pending_end_date,
    pending_requested_at, pending_status, chunks_received, total_chunks,
    created_at, updated_at
"#;

/// Picks the single link owned by an aggregator user id.
const BY_TERRA_USER: &str =
    "reference_id = (SELECT reference_id FROM user_wearables WHERE terra_user_id = $1 ORDER BY created_at, reference_id LIMIT 1)";

#[derive(Debug, FromRow)]
struct WearableRow {
    reference_id: String,
    terra_user_id: String,
    provider: String,
    scopes: Option<String>,
    last_sync: DateTime<Utc>,
    activity: Json<HealthBucket>,
    daily: Json<HealthBucket>,
    sleep: Json<HealthBucket>,
    body: Json<HealthBucket>,
    pending_reference: Option<String>,
    pending_endpoints: Option<Vec<String>>,
    pending_start_date: Option<NaiveDate>,
    pending_end_date: Option<NaiveDate>,
    pending_requested_at: Option<DateTime<Utc>>,
    pending_status: Option<String>,
    chunks_received: i32,
    total_chunks: Option<i32>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<WearableRow> for WearableLink {
    type Error = StoreError;

    fn try_from(row: WearableRow) -> Result<Self, Self::Error> {
        let pending_request = match row.pending_status {
            Some(status) => {
                let status = status.parse::<PendingStatus>().map_err(StoreError::Corrupt)?;
                let endpoints = row
                    .pending_endpoints
                    .unwrap_or_default()
                    .iter()
                    .map(|name| {
                        Category::from_event_type(name)
                            .ok_or_else(|| StoreError::Corrupt(format!("unknown endpoint: {}", name)))
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Some(PendingRequest {
                    reference: row.pending_reference,
                    endpoints,
                    start_date: row.pending_start_date,
                    end_date: row.pending_end_date,
                    requested_at: row.pending_requested_at,
                    status,
                    chunks_received: row.chunks_received,
                    total_chunks: row.total_chunks,
                })
            }
            None => None,
        };

        Ok(WearableLink {
            reference_id: row.reference_id,
            terra_user_id: row.terra_user_id,
            provider: Provider::parse(&row.provider),
            scopes: row.scopes,
            last_sync: row.last_sync,
            health_data: HealthData {
                activity: row.activity.0,
                daily: row.daily.0,
                sleep: row.sleep.0,
                body: row.body.0,
            },
            pending_request,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch_link(&self, filter: &str, value: &str) -> Result<Option<WearableLink>, StoreError> {
        let query = format!("SELECT {} FROM user_wearables WHERE {} LIMIT 1", LINK_COLUMNS, filter);
        let row: Option<WearableRow> = sqlx::query_as(&query)
            .bind(value)
            .fetch_optional(&self.pool)
            .await?;
        row.map(WearableLink::try_from).transpose()
    }
}

#[async_trait]
impl WearableRepository for PgStore {
    #[tracing::instrument(name = "Upsert authenticated wearable link", skip(self, link), fields(reference_id = %link.reference_id))]
    async fn link_authenticated(
        &self,
        link: &AuthenticatedLink,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO user_wearables (reference_id, terra_user_id, provider, scopes, last_sync)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (reference_id) DO UPDATE SET
                terra_user_id = EXCLUDED.terra_user_id,
                provider = EXCLUDED.provider,
                scopes = EXCLUDED.scopes,
                last_sync = EXCLUDED.last_sync,
                activity = '{}'::jsonb,
                daily = '{}'::jsonb,
                sleep = '{}'::jsonb,
                body = '{}'::jsonb,
                updated_at = NOW()
            "#,
        )
        .bind(&link.reference_id)
        .bind(&link.terra_user_id)
        .bind(link.provider.as_str())
        .bind(link.scopes.as_deref())
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn link_from_callback(
        &self,
        reference_id: &str,
        terra_user_id: &str,
        provider: Provider,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO user_wearables (reference_id, terra_user_id, provider, last_sync)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (reference_id) DO UPDATE SET
                terra_user_id = EXCLUDED.terra_user_id,
                provider = EXCLUDED.provider,
                last_sync = EXCLUDED.last_sync,
                updated_at = NOW()
            "#,
        )
        .bind(reference_id)
        .bind(terra_user_id)
        .bind(provider.as_str())
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_by_reference(&self, reference_id: &str) -> Result<Option<WearableLink>, StoreError> {
        self.fetch_link("reference_id = $1", reference_id).await
    }

    async fn find_by_terra_user(&self, terra_user_id: &str) -> Result<Option<WearableLink>, StoreError> {
        self.fetch_link(BY_TERRA_USER, terra_user_id).await
    }

    async fn start_pending_request(
        &self,
        reference_id: &str,
        pending: &PendingRequest,
    ) -> Result<bool, StoreError> {
        let endpoints: Vec<String> = pending
            .endpoints
            .iter()
            .map(|category| category.as_str().to_string())
            .collect();

        let result = sqlx::query(
            r#"
            UPDATE user_wearables SET
                pending_reference = $2,
                pending_endpoints = $3,
                pending_start_date = $4,
                pending_end_date = $5,
                pending_requested_at = $6,
                pending_status = $7,
                chunks_received = $8,
                total_chunks = $9,
                updated_at = NOW()
            WHERE reference_id = $1
            "#,
        )
        .bind(reference_id)
        .bind(pending.reference.as_deref())
        .bind(&endpoints)
        .bind(pending.start_date)
        .bind(pending.end_date)
        .bind(pending.requested_at)
        .bind(pending.status.as_str())
        .bind(pending.chunks_received)
        .bind(pending.total_chunks)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn set_pending_status(
        &self,
        terra_user_id: &str,
        status: PendingStatus,
    ) -> Result<bool, StoreError> {
        let query = format!(
            "UPDATE user_wearables SET pending_status = $2, updated_at = NOW() WHERE {}",
            BY_TERRA_USER
        );
        let result = sqlx::query(&query)
            .bind(terra_user_id)
            .bind(status.as_str())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn declare_total_chunks(
        &self,
        terra_user_id: &str,
        total_chunks: Option<i32>,
    ) -> Result<bool, StoreError> {
        // A new descriptor, or one replacing a finished request, starts counting from zero
        let query = format!(
            r#"
            UPDATE user_wearables SET
                chunks_received = CASE
                    WHEN pending_status IS NULL OR pending_status = 'completed' THEN 0
                    ELSE chunks_received
                END,
                total_chunks = $2,
                pending_status = $3,
                updated_at = NOW()
            WHERE {}
            "#,
            BY_TERRA_USER
        );
        let result = sqlx::query(&query)
            .bind(terra_user_id)
            .bind(total_chunks)
            .bind(PendingStatus::Receiving.as_str())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    #[tracing::instrument(name = "Merge health bucket", skip(self, entries, now), fields(items = entries.len()))]
    async fn merge_bucket(
        &self,
        reference_id: &str,
        category: Category,
        entries: &HealthBucket,
        now: DateTime<Utc>,
    ) -> Result<Option<ChunkProgress>, StoreError> {
        // `||` on jsonb objects overwrites colliding keys, so the merge happens in one statement.
        // The column name comes from the closed `Category` set.
        let query = format!(
            r#"
            UPDATE user_wearables SET
                {column} = {column} || $2,
                last_sync = $3,
                chunks_received = CASE WHEN pending_status IS NULL THEN chunks_received ELSE chunks_received + 1 END,
                updated_at = NOW()
            WHERE reference_id = $1
            RETURNING pending_status, chunks_received, total_chunks
            "#,
            column = category.as_str()
        );
        let row: Option<(Option<String>, i32, Option<i32>)> = sqlx::query_as(&query)
            .bind(reference_id)
            .bind(Json(entries))
            .bind(now)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|(status, chunks_received, total_chunks)| match status {
            Some(_) => ChunkProgress { chunks_received, total_chunks },
            None => ChunkProgress { chunks_received: 0, total_chunks: None },
        }))
    }

    async fn complete_pending_request(
        &self,
        reference_id: &str,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE user_wearables SET pending_status = $2, last_sync = $3, updated_at = NOW()
            WHERE reference_id = $1
            "#,
        )
        .bind(reference_id)
        .bind(PendingStatus::Completed.as_str())
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_links(&self, limit: i64) -> Result<Vec<WearableLink>, StoreError> {
        let query = format!(
            "SELECT {} FROM user_wearables ORDER BY created_at, reference_id LIMIT $1",
            LINK_COLUMNS
        );
        let rows: Vec<WearableRow> = sqlx::query_as(&query)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(WearableLink::try_from).collect()
    }
}

#[async_trait]
impl InteractionRepository for PgStore {
    async fn record_interaction(&self, interaction: NewInteraction) -> Result<AIInteraction, StoreError> {
        let record: AIInteraction = sqlx::query_as(
            r#"
            INSERT INTO ai_interactions (id, prompt, response, model)
            VALUES ($1, $2, $3, $4)
            RETURNING id, prompt, response, model, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&interaction.prompt)
        .bind(&interaction.response)
        .bind(&interaction.model)
        .fetch_one(&self.pool)
        .await?;
        Ok(record)
    }

    async fn recent_interactions(&self, limit: i64) -> Result<Vec<AIInteraction>, StoreError> {
        let records: Vec<AIInteraction> = sqlx::query_as(
            r#"
            SELECT id, prompt, response, model, created_at
            FROM ai_interactions
            ORDER BY created_at DESC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(records)
    }
}
