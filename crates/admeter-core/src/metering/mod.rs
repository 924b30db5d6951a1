//! Idempotent impression/click metering
//!
//! For every campaign the store keeps:
//! - a global dedup set of clients per event kind (impression, click)
//! - a per-day dedup set recording the day each event was first seen
//! - spend accumulators, global and per day
//!
//! The first-seen check is a single atomic [`MeterBackend::set_insert`]; the
//! daily mirror and the spend increments follow it and are attempted exactly
//! once per newly inserted entry. If one of those follow-up writes fails the
//! event stays counted and the error is surfaced; spend is then undercounted
//! rather than double-billed on a retry.

mod memory;

pub use memory::MemoryBackend;

use crate::campaign::Campaign;
use crate::clock::VirtualClock;
use crate::error::{EngineResult, StoreError};
use crate::money::Money;
use crate::types::{CampaignId, ClientId, Day};
use async_trait::async_trait;
use std::fmt::Debug;
use std::sync::Arc;

/// Billable event kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Impression,
    Click,
}

impl EventKind {
    fn counter_name(self) -> &'static str {
        match self {
            EventKind::Impression => "ad_impressions_total",
            EventKind::Click => "ad_clicks_total",
        }
    }

    fn revenue_name(self) -> &'static str {
        match self {
            EventKind::Impression => "ad_impression_revenue",
            EventKind::Click => "ad_click_revenue",
        }
    }
}

/// Address of one dedup set / spend accumulator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MeterKey {
    pub campaign_id: CampaignId,
    pub kind: EventKind,
    /// `None` for the campaign-lifetime bucket
    pub day: Option<Day>,
}

impl MeterKey {
    /// Campaign-lifetime bucket
    #[inline]
    #[must_use]
    pub fn global(campaign_id: CampaignId, kind: EventKind) -> Self {
        Self {
            campaign_id,
            kind,
            day: None,
        }
    }

    /// Single-day bucket
    #[inline]
    #[must_use]
    pub fn daily(campaign_id: CampaignId, kind: EventKind, day: Day) -> Self {
        Self {
            campaign_id,
            kind,
            day: Some(day),
        }
    }
}

/// Counter store primitives the metering logic relies on
#[async_trait]
pub trait MeterBackend: Send + Sync + Debug {
    /// Add `client` to the set; `true` only for the call that inserted it
    async fn set_insert(&self, key: MeterKey, client: ClientId) -> Result<bool, StoreError>;

    /// Membership test
    async fn set_contains(&self, key: MeterKey, client: ClientId) -> Result<bool, StoreError>;

    /// Set cardinality
    async fn set_len(&self, key: MeterKey) -> Result<u64, StoreError>;

    /// Atomically add to an accumulator, returning the new value
    async fn spend_add(&self, key: MeterKey, amount: Money) -> Result<Money, StoreError>;

    /// Accumulator value (zero when never written)
    async fn spend_get(&self, key: MeterKey) -> Result<Money, StoreError>;
}

/// Point-in-time counters for one bucket
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MeterSnapshot {
    pub impressions: u64,
    pub clicks: u64,
    pub spend_impressions: Money,
    pub spend_clicks: Money,
}

/// Metering store
#[derive(Debug, Clone)]
pub struct MeteringStore {
    backend: Arc<dyn MeterBackend>,
    clock: Arc<VirtualClock>,
}

impl MeteringStore {
    /// Create store over a backend, tagging events with `clock`'s day
    #[inline]
    #[must_use]
    pub fn new(backend: Arc<dyn MeterBackend>, clock: Arc<VirtualClock>) -> Self {
        Self { backend, clock }
    }

    /// In-memory store
    #[inline]
    #[must_use]
    pub fn in_memory(clock: Arc<VirtualClock>) -> Self {
        Self::new(Arc::new(MemoryBackend::new()), clock)
    }

    /// Record that `client` was shown `campaign`
    ///
    /// Repeat calls for the same client are no-ops.
    ///
    /// # Returns
    /// Distinct impression count for the campaign
    ///
    /// # Errors
    /// `StoreUnavailable` if the backend fails
    pub async fn log_impression(&self, campaign: &Campaign, client: ClientId) -> EngineResult<u64> {
        self.record(campaign, client, EventKind::Impression).await
    }

    /// Record that `client` clicked `campaign`
    ///
    /// Ignored unless the client already has a counted impression for the
    /// campaign; repeat calls are no-ops.
    ///
    /// # Returns
    /// Distinct click count for the campaign
    ///
    /// # Errors
    /// `StoreUnavailable` if the backend fails
    pub async fn log_click(&self, campaign: &Campaign, client: ClientId) -> EngineResult<u64> {
        let id = campaign.campaign_id;
        let seen = self
            .backend
            .set_contains(MeterKey::global(id, EventKind::Impression), client)
            .await?;
        if !seen {
            tracing::debug!(campaign_id = %id, client_id = %client, "click without impression ignored");
            return self.count(id, EventKind::Click).await;
        }
        self.record(campaign, client, EventKind::Click).await
    }

    async fn record(
        &self,
        campaign: &Campaign,
        client: ClientId,
        kind: EventKind,
    ) -> EngineResult<u64> {
        let id = campaign.campaign_id;
        let global = MeterKey::global(id, kind);

        if self.backend.set_insert(global, client).await? {
            let day = self.clock.current();
            let cost = campaign.cost_of(kind);
            if let Err(err) = self.settle(global, MeterKey::daily(id, kind, day), client, cost).await {
                tracing::warn!(
                    campaign_id = %id,
                    client_id = %client,
                    ?kind,
                    error = %err,
                    "event counted but spend not recorded"
                );
                return Err(err.into());
            }

            let label = id.to_string();
            metrics::counter!(kind.counter_name(), "campaign_id" => label.clone()).increment(1);
            metrics::gauge!(kind.revenue_name(), "campaign_id" => label).increment(cost.to_f64());
            tracing::info!(campaign_id = %id, client_id = %client, ?kind, day, %cost, "event recorded");
        }

        self.count(id, kind).await
    }

    async fn settle(
        &self,
        global: MeterKey,
        daily: MeterKey,
        client: ClientId,
        cost: Money,
    ) -> Result<(), StoreError> {
        self.backend.set_insert(daily, client).await?;
        self.backend.spend_add(global, cost).await?;
        self.backend.spend_add(daily, cost).await?;
        Ok(())
    }

    /// Distinct clients with a counted event over the campaign lifetime
    ///
    /// # Errors
    /// `StoreUnavailable` if the backend fails
    pub async fn count(&self, campaign_id: CampaignId, kind: EventKind) -> EngineResult<u64> {
        Ok(self.backend.set_len(MeterKey::global(campaign_id, kind)).await?)
    }

    /// Distinct clients whose event was first seen on `day`
    ///
    /// # Errors
    /// `StoreUnavailable` if the backend fails
    pub async fn daily_count(
        &self,
        campaign_id: CampaignId,
        kind: EventKind,
        day: Day,
    ) -> EngineResult<u64> {
        Ok(self
            .backend
            .set_len(MeterKey::daily(campaign_id, kind, day))
            .await?)
    }

    /// Lifetime spend on one event kind
    ///
    /// # Errors
    /// `StoreUnavailable` if the backend fails
    pub async fn spend(&self, campaign_id: CampaignId, kind: EventKind) -> EngineResult<Money> {
        Ok(self
            .backend
            .spend_get(MeterKey::global(campaign_id, kind))
            .await?)
    }

    /// Spend on one event kind attributed to `day`
    ///
    /// # Errors
    /// `StoreUnavailable` if the backend fails
    pub async fn daily_spend(
        &self,
        campaign_id: CampaignId,
        kind: EventKind,
        day: Day,
    ) -> EngineResult<Money> {
        Ok(self
            .backend
            .spend_get(MeterKey::daily(campaign_id, kind, day))
            .await?)
    }

    /// Lifetime counters for a campaign
    ///
    /// # Errors
    /// `StoreUnavailable` if the backend fails
    pub async fn snapshot(&self, campaign_id: CampaignId) -> EngineResult<MeterSnapshot> {
        let (impressions, clicks, spend_impressions, spend_clicks) = tokio::try_join!(
            self.count(campaign_id, EventKind::Impression),
            self.count(campaign_id, EventKind::Click),
            self.spend(campaign_id, EventKind::Impression),
            self.spend(campaign_id, EventKind::Click),
        )?;
        Ok(MeterSnapshot {
            impressions,
            clicks,
            spend_impressions,
            spend_clicks,
        })
    }

    /// Counters attributed to a single day
    ///
    /// # Errors
    /// `StoreUnavailable` if the backend fails
    pub async fn daily_snapshot(
        &self,
        campaign_id: CampaignId,
        day: Day,
    ) -> EngineResult<MeterSnapshot> {
        let (impressions, clicks, spend_impressions, spend_clicks) = tokio::try_join!(
            self.daily_count(campaign_id, EventKind::Impression, day),
            self.daily_count(campaign_id, EventKind::Click, day),
            self.daily_spend(campaign_id, EventKind::Impression, day),
            self.daily_spend(campaign_id, EventKind::Click, day),
        )?;
        Ok(MeterSnapshot {
            impressions,
            clicks,
            spend_impressions,
            spend_clicks,
        })
    }
}
