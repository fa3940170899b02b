use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{InteractionRepository, StoreError, WearableRepository};
use crate::models::ai_interaction::{AIInteraction, NewInteraction};
use crate::models::wearable::{
    AuthenticatedLink, Category, ChunkProgress, HealthBucket, HealthData, PendingRequest,
    PendingStatus, Provider, WearableLink,
};

/// In-process store. Every mutation of one link happens under the write lock.
#[derive(Default)]
pub struct MemoryStore {
    links: RwLock<HashMap<String, WearableLink>>,
    interactions: RwLock<Vec<AIInteraction>>,
}

fn pending_or_default(link: &mut WearableLink, status: PendingStatus) -> &mut PendingRequest {
    link.pending_request.get_or_insert_with(|| PendingRequest {
        reference: None,
        endpoints: Vec::new(),
        start_date: None,
        end_date: None,
        requested_at: None,
        status,
        chunks_received: 0,
        total_chunks: None,
    })
}

/// Oldest link for the aggregator user, matching the Postgres ordering.
fn owner_reference(links: &HashMap<String, WearableLink>, terra_user_id: &str) -> Option<String> {
    links
        .values()
        .filter(|link| link.terra_user_id == terra_user_id)
        .min_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.reference_id.cmp(&b.reference_id))
        })
        .map(|link| link.reference_id.clone())
}

fn find_by_terra_user_mut<'a>(
    links: &'a mut HashMap<String, WearableLink>,
    terra_user_id: &str,
) -> Option<&'a mut WearableLink> {
    let reference_id = owner_reference(links, terra_user_id)?;
    links.get_mut(&reference_id)
}

#[async_trait]
impl WearableRepository for MemoryStore {
    async fn link_authenticated(
        &self,
        link: &AuthenticatedLink,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut links = self.links.write().await;
        match links.get_mut(&link.reference_id) {
            Some(existing) => {
                existing.terra_user_id = link.terra_user_id.clone();
                existing.provider = link.provider;
                existing.scopes = link.scopes.clone();
                existing.last_sync = now;
                existing.health_data = HealthData::default();
                existing.updated_at = now;
            }
            None => {
                links.insert(
                    link.reference_id.clone(),
                    WearableLink {
                        reference_id: link.reference_id.clone(),
                        terra_user_id: link.terra_user_id.clone(),
                        provider: link.provider,
                        scopes: link.scopes.clone(),
                        last_sync: now,
                        health_data: HealthData::default(),
                        pending_request: None,
                        created_at: now,
                        updated_at: now,
                    },
                );
            }
        }
        Ok(())
    }

    async fn link_from_callback(
        &self,
        reference_id: &str,
        terra_user_id: &str,
        provider: Provider,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut links = self.links.write().await;
        let link = links
            .entry(reference_id.to_string())
            .or_insert_with(|| WearableLink {
                reference_id: reference_id.to_string(),
                terra_user_id: terra_user_id.to_string(),
                provider,
                scopes: None,
                last_sync: now,
                health_data: HealthData::default(),
                pending_request: None,
                created_at: now,
                updated_at: now,
            });
        link.terra_user_id = terra_user_id.to_string();
        link.provider = provider;
        link.last_sync = now;
        link.updated_at = now;
        Ok(())
    }

    async fn find_by_reference(&self, reference_id: &str) -> Result<Option<WearableLink>, StoreError> {
        Ok(self.links.read().await.get(reference_id).cloned())
    }

    async fn find_by_terra_user(&self, terra_user_id: &str) -> Result<Option<WearableLink>, StoreError> {
        let links = self.links.read().await;
        Ok(owner_reference(&links, terra_user_id).and_then(|reference_id| links.get(&reference_id).cloned()))
    }

    async fn start_pending_request(
        &self,
        reference_id: &str,
        pending: &PendingRequest,
    ) -> Result<bool, StoreError> {
        let mut links = self.links.write().await;
        match links.get_mut(reference_id) {
            Some(link) => {
                link.pending_request = Some(pending.clone());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn set_pending_status(
        &self,
        terra_user_id: &str,
        status: PendingStatus,
    ) -> Result<bool, StoreError> {
        let mut links = self.links.write().await;
        match find_by_terra_user_mut(&mut links, terra_user_id) {
            Some(link) => {
                pending_or_default(link, status).status = status;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn declare_total_chunks(
        &self,
        terra_user_id: &str,
        total_chunks: Option<i32>,
    ) -> Result<bool, StoreError> {
        let mut links = self.links.write().await;
        match find_by_terra_user_mut(&mut links, terra_user_id) {
            Some(link) => {
                let pending = pending_or_default(link, PendingStatus::Receiving);
                if pending.status == PendingStatus::Completed {
                    pending.chunks_received = 0;
                }
                pending.total_chunks = total_chunks;
                pending.status = PendingStatus::Receiving;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn merge_bucket(
        &self,
        reference_id: &str,
        category: Category,
        entries: &HealthBucket,
        now: DateTime<Utc>,
    ) -> Result<Option<ChunkProgress>, StoreError> {
        let mut links = self.links.write().await;
        let Some(link) = links.get_mut(reference_id) else {
            return Ok(None);
        };

        let bucket = link.health_data.bucket_mut(category);
        for (key, entry) in entries {
            bucket.insert(key.clone(), entry.clone());
        }
        link.last_sync = now;
        link.updated_at = now;

        // Chunks are only counted against a recorded descriptor
        let progress = match link.pending_request.as_mut() {
            Some(pending) => {
                pending.chunks_received += 1;
                ChunkProgress {
                    chunks_received: pending.chunks_received,
                    total_chunks: pending.total_chunks,
                }
            }
            None => ChunkProgress { chunks_received: 0, total_chunks: None },
        };
        Ok(Some(progress))
    }

    async fn complete_pending_request(
        &self,
        reference_id: &str,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut links = self.links.write().await;
        if let Some(link) = links.get_mut(reference_id) {
            pending_or_default(link, PendingStatus::Completed).status = PendingStatus::Completed;
            link.last_sync = now;
            link.updated_at = now;
        }
        Ok(())
    }

    async fn list_links(&self, limit: i64) -> Result<Vec<WearableLink>, StoreError> {
        let links = self.links.read().await;
        let mut all: Vec<WearableLink> = links.values().cloned().collect();
        all.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.reference_id.cmp(&b.reference_id)));
        all.truncate(limit.max(0) as usize);
        Ok(all)
    }
}

#[async_trait]
impl InteractionRepository for MemoryStore {
    async fn record_interaction(&self, interaction: NewInteraction) -> Result<AIInteraction, StoreError> {
        let record = AIInteraction {
            id: Uuid::new_v4(),
            prompt: interaction.prompt,
            response: interaction.response,
            model: interaction.model,
            created_at: Utc::now(),
        };
        self.interactions.write().await.push(record.clone());
        Ok(record)
    }

    async fn recent_interactions(&self, limit: i64) -> Result<Vec<AIInteraction>, StoreError> {
        // Appended in creation order, so newest is last
        Ok(self
            .interactions
            .read()
            .await
            .iter()
            .rev()
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }
}
