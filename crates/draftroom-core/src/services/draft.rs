use serde::{Deserialize, Serialize};

use crate::api::ApiError;
use crate::cache::Tag;
use crate::models::Draft;
use crate::query::{MutationDescriptor, QueryClient, QueryDescriptor, QuerySubscription};

/// Collection for all draft operations
pub const DRAFT_COLLECTION: &str = "draft";

pub const DRAFT_TAG: &str = "Draft";

/// Which draft entries a pick marks stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InvalidationScope {
    /// Every cached draft.
    #[default]
    Collection,
    /// Only the draft the pick was made in.
    Entity,
}

/// Typed operations on drafts.
#[derive(Clone)]
pub struct DraftApi {
    client: QueryClient,
    scope: InvalidationScope,
}

impl DraftApi {
    pub fn new(client: QueryClient) -> Self {
        Self {
            client,
            scope: InvalidationScope::default(),
        }
    }

    pub fn with_scope(mut self, scope: InvalidationScope) -> Self {
        self.scope = scope;
        self
    }

    pub fn client(&self) -> &QueryClient {
        &self.client
    }

    /// `GET /draft/{id}`, filed under `Draft` and `Draft:{id}`.
    pub fn draft_query(id: &str) -> QueryDescriptor {
        QueryDescriptor::new(DRAFT_COLLECTION, id)
            .provides(Tag::new(DRAFT_TAG))
            .provides(Tag::with_id(DRAFT_TAG, id))
    }

    /// `POST /draft/{id}/pick?name={player}`
    pub fn pick_mutation(&self, id: &str, player: &str) -> MutationDescriptor {
        let tag = match self.scope {
            InvalidationScope::Collection => Tag::new(DRAFT_TAG),
            InvalidationScope::Entity => Tag::with_id(DRAFT_TAG, id),
        };
        MutationDescriptor::post(DRAFT_COLLECTION, id)
            .action("pick")
            .with_param("name", player)
            .invalidates(tag)
    }

    pub async fn get_draft(&self, id: &str) -> Result<Draft, ApiError> {
        self.client.fetch_as(&Self::draft_query(id)).await
    }

    pub fn subscribe_draft(&self, id: &str) -> QuerySubscription<Draft> {
        self.client.subscribe(&Self::draft_query(id))
    }

    /// Draft a player. Subscribed drafts start refetching before this returns.
    pub async fn draft_player(&self, id: &str, player: &str) -> Result<(), ApiError> {
        self.client.mutate(&self.pick_mutation(id, player)).await?;
        Ok(())
    }
}
