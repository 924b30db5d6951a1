//! Ad engine service context
//!
//! [`AdEngine`] owns every collaborator an operation needs:
//! - The virtual clock (constructed at the configured start day)
//! - The campaign catalog and the client/advertiser directory
//! - The metering store and the selector
//!
//! Nothing is global; a server or test builds one engine and shares it.

use crate::campaign::{Campaign, CampaignDraft};
use crate::catalog::{CampaignStore, InMemoryCatalog};
use crate::clock::VirtualClock;
use crate::config::EngineConfig;
use crate::directory::{Directory, InMemoryDirectory};
use crate::error::{EngineError, EngineResult, NotFound, ValidationError};
use crate::metering::{EventKind, MemoryBackend, MeterBackend, MeteringStore};
use crate::selection::{Candidate, Selector};
use crate::stats::{DailyStats, Stats, StatsAggregator};
use crate::targeting;
use crate::types::{Ad, Advertiser, AdvertiserId, CampaignId, Client, ClientId, Day, MlScore};
use futures::future::try_join_all;
use futures::TryFutureExt;
use std::sync::Arc;

/// Default campaign page size
pub const DEFAULT_PAGE_SIZE: usize = 10;

/// Ad selection, metering and reporting over one set of stores
#[derive(Debug)]
pub struct AdEngine {
    config: EngineConfig,
    clock: Arc<VirtualClock>,
    catalog: Arc<dyn CampaignStore>,
    directory: Arc<dyn Directory>,
    meter: MeteringStore,
    selector: Selector,
}

impl AdEngine {
    /// Engine over in-memory stores
    #[must_use]
    pub fn new(config: EngineConfig) -> Self {
        Self::with_parts(
            config,
            Arc::new(InMemoryCatalog::new()),
            Arc::new(InMemoryDirectory::new()),
            Arc::new(MemoryBackend::new()),
        )
    }

    /// Engine over caller-supplied stores
    #[must_use]
    pub fn with_parts(
        config: EngineConfig,
        catalog: Arc<dyn CampaignStore>,
        directory: Arc<dyn Directory>,
        meter_backend: Arc<dyn MeterBackend>,
    ) -> Self {
        let clock = Arc::new(VirtualClock::starting_at(config.start_day));
        let meter = MeteringStore::new(meter_backend, Arc::clone(&clock));
        let selector = Selector::new(&config);
        tracing::info!(
            start_day = config.start_day,
            overshoot_factor = config.overshoot_factor,
            tie_break = ?config.tie_break,
            "ad engine initialised"
        );
        Self {
            config,
            clock,
            catalog,
            directory,
            meter,
            selector,
        }
    }

    /// Active configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Shared clock
    #[inline]
    #[must_use]
    pub fn clock(&self) -> &Arc<VirtualClock> {
        &self.clock
    }

    /// Metering store
    #[inline]
    #[must_use]
    pub fn meter(&self) -> &MeteringStore {
        &self.meter
    }

    /// Current virtual day
    #[inline]
    #[must_use]
    pub fn current_day(&self) -> Day {
        self.clock.current()
    }

    /// Move the virtual clock forward
    ///
    /// # Errors
    /// `Clock` if `day` precedes the current day
    pub fn advance_clock(&self, day: Day) -> EngineResult<Day> {
        Ok(self.clock.advance(day)?)
    }

    // ---- Serving -------------------------------------------------------

    /// Choose an ad for a client and record the impression
    ///
    /// # Workflow
    /// 1. Load the client
    /// 2. Fetch campaigns active today and keep those targeting the client
    /// 3. Enrich each with affinity and lifetime counters
    /// 4. Select a winner and log exactly one impression for it
    ///
    /// # Errors
    /// - `NotFound` if the client is unknown, nothing is active, nothing
    ///   targets the client or every candidate is capped
    /// - `StoreUnavailable` if a backend fails
    pub async fn serve_ad(&self, client_id: ClientId) -> EngineResult<Ad> {
        let client = self.client_record(client_id).await?;
        let day = self.clock.current();

        let active = self.catalog.active_campaigns(day).await?;
        if active.is_empty() {
            return Err(NotFound::NoActiveCampaigns(day).into());
        }

        let matching: Vec<Campaign> = active
            .into_iter()
            .filter(|c| targeting::matches(c.targeting.as_ref(), &client))
            .collect();
        if matching.is_empty() {
            return Err(NotFound::NoTargetingMatch(client_id).into());
        }
        tracing::debug!(%client_id, day, candidates = matching.len(), "targeting matched");

        let candidates =
            try_join_all(matching.into_iter().map(|c| self.enrich(c, client_id))).await?;
        let winner = self
            .selector
            .select(candidates)
            .ok_or(NotFound::NoEligibleCampaign(client_id))?;

        let campaign = winner.candidate.campaign;
        self.meter.log_impression(&campaign, client_id).await?;
        tracing::info!(
            %client_id,
            campaign_id = %campaign.campaign_id,
            score = winner.score,
            day,
            "ad served"
        );
        Ok(Ad::from(&campaign))
    }

    async fn enrich(&self, campaign: Campaign, client_id: ClientId) -> EngineResult<Candidate> {
        let id = campaign.campaign_id;
        let (ml_score, impressions, clicks) = tokio::try_join!(
            self.directory
                .affinity(client_id, campaign.advertiser_id)
                .map_err(EngineError::from),
            self.meter.count(id, EventKind::Impression),
            self.meter.count(id, EventKind::Click),
        )?;
        Ok(Candidate {
            campaign,
            ml_score,
            impressions,
            clicks,
        })
    }

    /// Record a click on a served ad
    ///
    /// Clicks without a prior impression are ignored.
    ///
    /// # Returns
    /// Distinct click count of the campaign
    ///
    /// # Errors
    /// - `NotFound` if the ad or the client is unknown
    /// - `StoreUnavailable` if a backend fails
    pub async fn record_click(&self, ad_id: CampaignId, client_id: ClientId) -> EngineResult<u64> {
        let campaign = self.campaign_record(ad_id).await?;
        self.client_record(client_id).await?;
        self.meter.log_click(&campaign, client_id).await
    }

    // ---- Directory -----------------------------------------------------

    /// Insert or replace clients
    ///
    /// The whole batch is validated before anything is written.
    ///
    /// # Errors
    /// - `Validation` for the first invalid client
    /// - `StoreUnavailable` if the directory fails
    pub async fn upsert_clients(&self, clients: Vec<Client>) -> EngineResult<Vec<Client>> {
        for client in &clients {
            client.validate()?;
        }
        let mut stored = Vec::with_capacity(clients.len());
        for client in clients {
            stored.push(self.directory.upsert_client(client).await?);
        }
        tracing::info!(count = stored.len(), "clients upserted");
        Ok(stored)
    }

    /// Client by id
    ///
    /// # Errors
    /// `NotFound` if unknown
    pub async fn get_client(&self, client_id: ClientId) -> EngineResult<Client> {
        self.client_record(client_id).await
    }

    /// Insert or replace advertisers
    ///
    /// # Errors
    /// - `Validation` for the first invalid advertiser
    /// - `StoreUnavailable` if the directory fails
    pub async fn upsert_advertisers(
        &self,
        advertisers: Vec<Advertiser>,
    ) -> EngineResult<Vec<Advertiser>> {
        for advertiser in &advertisers {
            advertiser.validate()?;
        }
        let mut stored = Vec::with_capacity(advertisers.len());
        for advertiser in advertisers {
            stored.push(self.directory.upsert_advertiser(advertiser).await?);
        }
        tracing::info!(count = stored.len(), "advertisers upserted");
        Ok(stored)
    }

    /// Advertiser by id
    ///
    /// # Errors
    /// `NotFound` if unknown
    pub async fn get_advertiser(&self, advertiser_id: AdvertiserId) -> EngineResult<Advertiser> {
        self.advertiser_record(advertiser_id).await
    }

    /// Set the affinity of a client to an advertiser
    ///
    /// # Errors
    /// `NotFound` if the client or the advertiser is unknown
    pub async fn upsert_ml_score(&self, score: MlScore) -> EngineResult<MlScore> {
        self.client_record(score.client_id).await?;
        self.advertiser_record(score.advertiser_id).await?;
        let stored = self.directory.upsert_affinity(score).await?;
        tracing::debug!(
            client_id = %stored.client_id,
            advertiser_id = %stored.advertiser_id,
            score = stored.score,
            "ml score upserted"
        );
        Ok(stored)
    }

    // ---- Campaigns -----------------------------------------------------

    /// Create a campaign for an advertiser
    ///
    /// # Errors
    /// - `NotFound` if the advertiser is unknown
    /// - `Validation` if the draft is rejected
    pub async fn create_campaign(
        &self,
        advertiser_id: AdvertiserId,
        draft: CampaignDraft,
    ) -> EngineResult<Campaign> {
        self.advertiser_record(advertiser_id).await?;
        draft.validate_new(self.clock.current())?;

        let campaign = Campaign::from_draft(advertiser_id, draft);
        self.catalog.insert(campaign.clone()).await?;
        tracing::info!(
            %advertiser_id,
            campaign_id = %campaign.campaign_id,
            start_day = campaign.start_day,
            end_day = campaign.end_day,
            "campaign created"
        );
        Ok(campaign)
    }

    /// Campaign owned by an advertiser
    ///
    /// # Errors
    /// `NotFound` if absent or owned by another advertiser
    pub async fn get_campaign(
        &self,
        advertiser_id: AdvertiserId,
        campaign_id: CampaignId,
    ) -> EngineResult<Campaign> {
        self.owned_campaign(advertiser_id, campaign_id).await
    }

    /// One page of an advertiser's campaigns, ordered by start day
    ///
    /// Pages are 1-based.
    ///
    /// # Errors
    /// - `NotFound` if the advertiser is unknown
    /// - `Validation` for page 0 or size 0
    pub async fn list_campaigns(
        &self,
        advertiser_id: AdvertiserId,
        page: usize,
        size: usize,
    ) -> EngineResult<Vec<Campaign>> {
        if page == 0 {
            return Err(ValidationError::InvalidPage.into());
        }
        if size == 0 {
            return Err(ValidationError::NonPositive("size").into());
        }
        self.advertiser_record(advertiser_id).await?;

        let campaigns = self.catalog.advertiser_campaigns(advertiser_id).await?;
        Ok(campaigns
            .into_iter()
            .skip((page - 1).saturating_mul(size))
            .take(size)
            .collect())
    }

    /// Replace a campaign's editable fields
    ///
    /// When `expected_version` is given it must equal the stored version.
    ///
    /// # Errors
    /// - `NotFound` if the campaign is absent
    /// - `Validation` if the draft is rejected or touches frozen fields
    /// - `ConcurrentUpdate` on a version mismatch
    pub async fn update_campaign(
        &self,
        advertiser_id: AdvertiserId,
        campaign_id: CampaignId,
        draft: CampaignDraft,
        expected_version: Option<u64>,
    ) -> EngineResult<Campaign> {
        let current = self.owned_campaign(advertiser_id, campaign_id).await?;
        if let Some(expected) = expected_version {
            if expected != current.version {
                tracing::warn!(%campaign_id, expected, actual = current.version, "stale campaign update");
                return Err(EngineError::ConcurrentUpdate {
                    expected,
                    actual: current.version,
                });
            }
        }

        let updated = current.apply_update(draft, self.clock.current())?;
        self.catalog.replace(updated.clone(), current.version).await?;
        tracing::info!(%campaign_id, version = updated.version, "campaign updated");
        Ok(updated)
    }

    /// Delete a campaign; its metering data is kept
    ///
    /// # Errors
    /// `NotFound` if absent or owned by another advertiser
    pub async fn delete_campaign(
        &self,
        advertiser_id: AdvertiserId,
        campaign_id: CampaignId,
    ) -> EngineResult<()> {
        self.owned_campaign(advertiser_id, campaign_id).await?;
        self.catalog
            .remove(campaign_id)
            .await?
            .ok_or(NotFound::Campaign(campaign_id))?;
        tracing::info!(%advertiser_id, %campaign_id, "campaign deleted");
        Ok(())
    }

    /// Attach or clear a campaign's image reference
    ///
    /// # Errors
    /// - `NotFound` if the campaign is absent
    /// - `ConcurrentUpdate` if it changed while being edited
    pub async fn set_campaign_image(
        &self,
        campaign_id: CampaignId,
        image_url: Option<String>,
    ) -> EngineResult<Campaign> {
        let current = self.campaign_record(campaign_id).await?;
        let updated = Campaign {
            image_url,
            version: current.version + 1,
            ..current.clone()
        };
        self.catalog.replace(updated.clone(), current.version).await?;
        tracing::info!(%campaign_id, has_image = updated.image_url.is_some(), "campaign image set");
        Ok(updated)
    }

    /// Campaigns running on `day`
    ///
    /// # Errors
    /// `StoreUnavailable` if the catalog fails
    pub async fn active_campaigns(&self, day: Day) -> EngineResult<Vec<Campaign>> {
        Ok(self.catalog.active_campaigns(day).await?)
    }

    // ---- Stats ---------------------------------------------------------

    fn stats(&self) -> StatsAggregator<'_> {
        StatsAggregator::new(&self.meter, self.clock.current())
            .with_window(self.config.report_window_days)
    }

    /// Lifetime stats of a campaign
    ///
    /// # Errors
    /// `NotFound` if the campaign is unknown
    pub async fn campaign_stats(&self, campaign_id: CampaignId) -> EngineResult<Stats> {
        let campaign = self.campaign_record(campaign_id).await?;
        self.stats().campaign_stats(&campaign).await
    }

    /// Per-day stats of a campaign up to today
    ///
    /// # Errors
    /// `NotFound` if the campaign is unknown
    pub async fn campaign_daily_stats(
        &self,
        campaign_id: CampaignId,
    ) -> EngineResult<Vec<DailyStats>> {
        let campaign = self.campaign_record(campaign_id).await?;
        self.stats().campaign_daily_stats(&campaign).await
    }

    /// Lifetime stats summed over an advertiser's campaigns
    ///
    /// # Errors
    /// `NotFound` if the advertiser is unknown
    pub async fn advertiser_stats(&self, advertiser_id: AdvertiserId) -> EngineResult<Stats> {
        self.advertiser_record(advertiser_id).await?;
        let campaigns = self.catalog.advertiser_campaigns(advertiser_id).await?;
        self.stats().advertiser_stats(&campaigns).await
    }

    /// Per-day stats summed over an advertiser's campaigns
    ///
    /// # Errors
    /// `NotFound` if the advertiser is unknown
    pub async fn advertiser_daily_stats(
        &self,
        advertiser_id: AdvertiserId,
    ) -> EngineResult<Vec<DailyStats>> {
        self.advertiser_record(advertiser_id).await?;
        let campaigns = self.catalog.advertiser_campaigns(advertiser_id).await?;
        self.stats().advertiser_daily_stats(&campaigns).await
    }

    // ---- Lookups -------------------------------------------------------

    async fn client_record(&self, client_id: ClientId) -> EngineResult<Client> {
        Ok(self
            .directory
            .client(client_id)
            .await?
            .ok_or(NotFound::Client(client_id))?)
    }

    async fn advertiser_record(&self, advertiser_id: AdvertiserId) -> EngineResult<Advertiser> {
        Ok(self
            .directory
            .advertiser(advertiser_id)
            .await?
            .ok_or(NotFound::Advertiser(advertiser_id))?)
    }

    async fn campaign_record(&self, campaign_id: CampaignId) -> EngineResult<Campaign> {
        Ok(self
            .catalog
            .get_campaign(campaign_id)
            .await?
            .ok_or(NotFound::Campaign(campaign_id))?)
    }

    async fn owned_campaign(
        &self,
        advertiser_id: AdvertiserId,
        campaign_id: CampaignId,
    ) -> EngineResult<Campaign> {
        let campaign = self.campaign_record(campaign_id).await?;
        if campaign.advertiser_id != advertiser_id {
            return Err(NotFound::Campaign(campaign_id).into());
        }
        Ok(campaign)
    }
}

impl Default for AdEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}
