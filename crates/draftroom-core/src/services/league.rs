use crate::api::ApiError;
use crate::cache::Tag;
use crate::models::League;
use crate::query::{MutationDescriptor, QueryClient, QueryDescriptor, QuerySubscription};

pub const LEAGUE_COLLECTION: &str = "league";

pub const LEAGUE_TAG: &str = "League";

/// Typed operations on leagues.
#[derive(Clone)]
pub struct LeagueApi {
    client: QueryClient,
}

impl LeagueApi {
    pub fn new(client: QueryClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &QueryClient {
        &self.client
    }

    /// `GET /league/{id}`, filed under `League` and `League:{id}`.
    pub fn league_query(id: &str) -> QueryDescriptor {
        QueryDescriptor::new(LEAGUE_COLLECTION, id)
            .provides(Tag::new(LEAGUE_TAG))
            .provides(Tag::with_id(LEAGUE_TAG, id))
    }

    pub async fn get_league(&self, id: &str) -> Result<League, ApiError> {
        self.client.fetch_as(&Self::league_query(id)).await
    }

    pub fn subscribe_league(&self, id: &str) -> QuerySubscription<League> {
        self.client.subscribe(&Self::league_query(id))
    }

    /// `PUT /league/{id}` with the full league settings.
    pub async fn update_league(&self, id: &str, league: &League) -> Result<(), ApiError> {
        let mutation = MutationDescriptor::put(LEAGUE_COLLECTION, id)
            .with_body(serde_json::to_value(league)?)
            .invalidates(Tag::new(LEAGUE_TAG));
        self.client.mutate(&mutation).await?;
        Ok(())
    }
}
