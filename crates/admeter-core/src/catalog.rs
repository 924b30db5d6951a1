//! Campaign catalog
//!
//! [`CampaignCatalog`] is the read side consumed by ad selection and stats;
//! [`CampaignStore`] adds the writes used by campaign management. Updates are
//! compare-and-set on the stored version so a stale writer gets a conflict
//! instead of silently overwriting a newer record.

use crate::campaign::Campaign;
use crate::error::{EngineError, EngineResult, NotFound, StoreError};
use crate::types::{AdvertiserId, CampaignId, Day};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt::Debug;

/// Read access to campaigns
#[async_trait]
pub trait CampaignCatalog: Send + Sync + Debug {
    /// Campaigns with `start_day <= day <= end_day`
    async fn active_campaigns(&self, day: Day) -> Result<Vec<Campaign>, StoreError>;

    /// Campaign by id
    async fn get_campaign(&self, id: CampaignId) -> Result<Option<Campaign>, StoreError>;

    /// All campaigns of an advertiser, ordered by start day
    async fn advertiser_campaigns(
        &self,
        advertiser_id: AdvertiserId,
    ) -> Result<Vec<Campaign>, StoreError>;
}

/// Write access to campaigns
#[async_trait]
pub trait CampaignStore: CampaignCatalog {
    /// Store a new campaign
    async fn insert(&self, campaign: Campaign) -> Result<(), StoreError>;

    /// Replace a campaign if the stored version still equals `expected_version`
    ///
    /// # Errors
    /// - `NotFound` if the campaign is gone
    /// - `ConcurrentUpdate` on version mismatch
    async fn replace(&self, campaign: Campaign, expected_version: u64) -> EngineResult<()>;

    /// Remove a campaign, returning it
    async fn remove(&self, id: CampaignId) -> Result<Option<Campaign>, StoreError>;
}

/// Memory-backed catalog
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    campaigns: RwLock<HashMap<CampaignId, Campaign>>,
}

impl InMemoryCatalog {
    /// Create empty catalog
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored campaigns
    #[must_use]
    pub fn len(&self) -> usize {
        self.campaigns.read().len()
    }

    /// Whether the catalog is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.campaigns.read().is_empty()
    }

    fn sorted(mut campaigns: Vec<Campaign>) -> Vec<Campaign> {
        campaigns.sort_by(|a, b| {
            a.start_day
                .cmp(&b.start_day)
                .then_with(|| a.campaign_id.cmp(&b.campaign_id))
        });
        campaigns
    }
}

#[async_trait]
impl CampaignCatalog for InMemoryCatalog {
    async fn active_campaigns(&self, day: Day) -> Result<Vec<Campaign>, StoreError> {
        let guard = self.campaigns.read();
        Ok(Self::sorted(
            guard.values().filter(|c| c.is_active_on(day)).cloned().collect(),
        ))
    }

    async fn get_campaign(&self, id: CampaignId) -> Result<Option<Campaign>, StoreError> {
        Ok(self.campaigns.read().get(&id).cloned())
    }

    async fn advertiser_campaigns(
        &self,
        advertiser_id: AdvertiserId,
    ) -> Result<Vec<Campaign>, StoreError> {
        let guard = self.campaigns.read();
        Ok(Self::sorted(
            guard
                .values()
                .filter(|c| c.advertiser_id == advertiser_id)
                .cloned()
                .collect(),
        ))
    }
}

#[async_trait]
impl CampaignStore for InMemoryCatalog {
    async fn insert(&self, campaign: Campaign) -> Result<(), StoreError> {
        self.campaigns.write().insert(campaign.campaign_id, campaign);
        Ok(())
    }

    async fn replace(&self, campaign: Campaign, expected_version: u64) -> EngineResult<()> {
        let mut guard = self.campaigns.write();
        let stored = guard
            .get_mut(&campaign.campaign_id)
            .ok_or(NotFound::Campaign(campaign.campaign_id))?;
        if stored.version != expected_version {
            return Err(EngineError::ConcurrentUpdate {
                expected: expected_version,
                actual: stored.version,
            });
        }
        *stored = campaign;
        Ok(())
    }

    async fn remove(&self, id: CampaignId) -> Result<Option<Campaign>, StoreError> {
        Ok(self.campaigns.write().remove(&id))
    }
}
