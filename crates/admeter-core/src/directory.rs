//! Client / advertiser directory and ML affinity scores

use crate::error::StoreError;
use crate::types::{Advertiser, AdvertiserId, Client, ClientId, MlScore};
use async_trait::async_trait;
use dashmap::DashMap;
use std::fmt::Debug;

/// Records the engine reads about who is asking and who is paying
#[async_trait]
pub trait Directory: Send + Sync + Debug {
    /// Client by id
    async fn client(&self, id: ClientId) -> Result<Option<Client>, StoreError>;

    /// Insert or replace a client
    async fn upsert_client(&self, client: Client) -> Result<Client, StoreError>;

    /// Advertiser by id
    async fn advertiser(&self, id: AdvertiserId) -> Result<Option<Advertiser>, StoreError>;

    /// Insert or replace an advertiser
    async fn upsert_advertiser(&self, advertiser: Advertiser) -> Result<Advertiser, StoreError>;

    /// Affinity of a client to an advertiser, 0 when unknown
    async fn affinity(
        &self,
        client: ClientId,
        advertiser: AdvertiserId,
    ) -> Result<u64, StoreError>;

    /// Insert or replace an affinity score
    async fn upsert_affinity(&self, score: MlScore) -> Result<MlScore, StoreError>;
}

/// Memory-backed directory
#[derive(Debug, Default)]
pub struct InMemoryDirectory {
    clients: DashMap<ClientId, Client>,
    advertisers: DashMap<AdvertiserId, Advertiser>,
    affinity: DashMap<(ClientId, AdvertiserId), u64>,
}

impl InMemoryDirectory {
    /// Create empty directory
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Directory for InMemoryDirectory {
    async fn client(&self, id: ClientId) -> Result<Option<Client>, StoreError> {
        Ok(self.clients.get(&id).map(|c| c.clone()))
    }

    async fn upsert_client(&self, client: Client) -> Result<Client, StoreError> {
        self.clients.insert(client.client_id, client.clone());
        Ok(client)
    }

    async fn advertiser(&self, id: AdvertiserId) -> Result<Option<Advertiser>, StoreError> {
        Ok(self.advertisers.get(&id).map(|a| a.clone()))
    }

    async fn upsert_advertiser(&self, advertiser: Advertiser) -> Result<Advertiser, StoreError> {
        self.advertisers
            .insert(advertiser.advertiser_id, advertiser.clone());
        Ok(advertiser)
    }

    async fn affinity(
        &self,
        client: ClientId,
        advertiser: AdvertiserId,
    ) -> Result<u64, StoreError> {
        Ok(self.affinity.get(&(client, advertiser)).map_or(0, |s| *s))
    }

    async fn upsert_affinity(&self, score: MlScore) -> Result<MlScore, StoreError> {
        self.affinity
            .insert((score.client_id, score.advertiser_id), score.score);
        Ok(score)
    }
}
