//! Statistics rollups
//!
//! All figures are derived on demand from the [`MeteringStore`]; nothing
//! here writes. Conversion is `clicks / impressions * 100`, recomputed from
//! summed totals whenever campaigns are aggregated.

use crate::campaign::Campaign;
use crate::config::DEFAULT_REPORT_WINDOW_DAYS;
use crate::error::EngineResult;
use crate::metering::{MeterSnapshot, MeteringStore};
use crate::money::Money;
use crate::types::Day;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Aggregated counters and spend
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Stats {
    pub impressions_count: u64,
    pub clicks_count: u64,
    pub conversion: f64,
    pub spent_impressions: Money,
    pub spent_clicks: Money,
    pub spent_total: Money,
}

impl Stats {
    /// Derive conversion and total from raw counters
    #[must_use]
    pub fn new(impressions: u64, clicks: u64, spent_impressions: Money, spent_clicks: Money) -> Self {
        Self {
            impressions_count: impressions,
            clicks_count: clicks,
            conversion: conversion(impressions, clicks),
            spent_impressions,
            spent_clicks,
            spent_total: spent_impressions.saturating_add(spent_clicks),
        }
    }

    /// Sum of two stats with conversion recomputed from the totals
    ///
    /// Counters and spend saturate instead of overflowing.
    #[must_use]
    pub fn merge(&self, other: &Stats) -> Stats {
        Stats::new(
            self.impressions_count.saturating_add(other.impressions_count),
            self.clicks_count.saturating_add(other.clicks_count),
            self.spent_impressions.saturating_add(other.spent_impressions),
            self.spent_clicks.saturating_add(other.spent_clicks),
        )
    }
}

impl From<MeterSnapshot> for Stats {
    fn from(snap: MeterSnapshot) -> Self {
        Stats::new(
            snap.impressions,
            snap.clicks,
            snap.spend_impressions,
            snap.spend_clicks,
        )
    }
}

/// Stats for one day
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DailyStats {
    pub date: Day,
    #[serde(flatten)]
    pub stats: Stats,
}

fn conversion(impressions: u64, clicks: u64) -> f64 {
    if impressions == 0 {
        return 0.0;
    }
    (Decimal::from(clicks) / Decimal::from(impressions) * Decimal::ONE_HUNDRED)
        .to_f64()
        .unwrap_or_default()
}

/// Read-only rollups over the metering store
///
/// Daily reports never reach back further than `window` days from their last
/// day, however far the clock has been advanced.
#[derive(Debug, Clone, Copy)]
pub struct StatsAggregator<'a> {
    meter: &'a MeteringStore,
    current_day: Day,
    window: u64,
}

impl<'a> StatsAggregator<'a> {
    /// Aggregator observing the store as of `current_day`
    #[inline]
    #[must_use]
    pub fn new(meter: &'a MeteringStore, current_day: Day) -> Self {
        Self {
            meter,
            current_day,
            window: DEFAULT_REPORT_WINDOW_DAYS,
        }
    }

    /// With daily report window (at least one day)
    #[inline]
    #[must_use]
    pub fn with_window(mut self, days: u64) -> Self {
        self.window = days.max(1);
        self
    }

    fn first_reported(&self, start: Day, last: Day) -> Day {
        start.max(last.saturating_sub(self.window - 1))
    }

    /// Lifetime stats of one campaign
    ///
    /// # Errors
    /// `StoreUnavailable` if the metering backend fails
    pub async fn campaign_stats(&self, campaign: &Campaign) -> EngineResult<Stats> {
        Ok(self.meter.snapshot(campaign.campaign_id).await?.into())
    }

    /// Per-day stats from the start day through `min(current_day, end_day)`,
    /// trimmed to the report window
    ///
    /// A day with clicks but no impressions (a click whose impression was
    /// served on an earlier day) is reported as all zeros.
    ///
    /// # Errors
    /// `StoreUnavailable` if the metering backend fails
    pub async fn campaign_daily_stats(&self, campaign: &Campaign) -> EngineResult<Vec<DailyStats>> {
        let last = self.current_day.min(campaign.end_day);
        let mut days = Vec::new();
        for day in self.first_reported(campaign.start_day, last)..=last {
            let snap = self.meter.daily_snapshot(campaign.campaign_id, day).await?;
            let stats = if snap.impressions == 0 && snap.clicks > 0 {
                tracing::debug!(campaign_id = %campaign.campaign_id, day, "zeroing click-only day");
                Stats::default()
            } else {
                Stats::from(snap)
            };
            days.push(DailyStats { date: day, stats });
        }
        Ok(days)
    }

    /// Lifetime stats summed over an advertiser's campaigns
    ///
    /// # Errors
    /// `StoreUnavailable` if the metering backend fails
    pub async fn advertiser_stats(&self, campaigns: &[Campaign]) -> EngineResult<Stats> {
        let mut total = Stats::default();
        for campaign in campaigns {
            total = total.merge(&self.campaign_stats(campaign).await?);
        }
        Ok(total)
    }

    /// Per-day stats over the earliest start day through the current day,
    /// summing each campaign's daily stats, trimmed to the report window
    ///
    /// # Errors
    /// `StoreUnavailable` if the metering backend fails
    pub async fn advertiser_daily_stats(
        &self,
        campaigns: &[Campaign],
    ) -> EngineResult<Vec<DailyStats>> {
        let Some(first) = campaigns.iter().map(|c| c.start_day).min() else {
            return Ok(Vec::new());
        };

        let first = self.first_reported(first, self.current_day);
        let mut by_day: BTreeMap<Day, Stats> = (first..=self.current_day)
            .map(|day| (day, Stats::default()))
            .collect();
        for campaign in campaigns {
            for daily in self.campaign_daily_stats(campaign).await? {
                if let Some(acc) = by_day.get_mut(&daily.date) {
                    *acc = acc.merge(&daily.stats);
                }
            }
        }

        Ok(by_day
            .into_iter()
            .map(|(date, stats)| DailyStats { date, stats })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::campaign::CampaignDraft;
    use crate::clock::VirtualClock;
    use crate::types::{AdvertiserId, ClientId};
    use std::str::FromStr;
    use std::sync::Arc;

    fn money(s: &str) -> Money {
        Money::from_str(s).unwrap()
    }

    fn campaign(advertiser_id: AdvertiserId, start: Day, end: Day) -> Campaign {
        Campaign::from_draft(
            advertiser_id,
            CampaignDraft {
                impressions_limit: 1000,
                clicks_limit: 100,
                cost_per_impression: money("0.5"),
                cost_per_click: money("3"),
                ad_title: "t".into(),
                ad_text: "x".into(),
                start_day: start,
                end_day: end,
                targeting: None,
            },
        )
    }

    #[test]
    fn conversion_handles_zero_impressions() {
        assert_eq!(Stats::new(0, 0, Money::ZERO, Money::ZERO).conversion, 0.0);
        assert_eq!(Stats::new(4, 1, Money::ZERO, Money::ZERO).conversion, 25.0);
    }

    #[test]
    fn merge_recomputes_conversion() {
        let a = Stats::new(1, 1, money("1"), money("2"));
        let b = Stats::new(3, 0, money("3"), Money::ZERO);
        let sum = a.merge(&b);
        assert_eq!(sum.impressions_count, 4);
        assert_eq!(sum.conversion, 25.0);
        assert_eq!(sum.spent_total, money("6"));
    }

    #[test]
    fn merge_saturates_at_the_top_of_the_range() {
        let top = Stats::new(u64::MAX, 1, Money::new(Decimal::MAX), Money::ZERO);
        let sum = top.merge(&Stats::new(1, 1, money("1"), money("1")));
        assert_eq!(sum.impressions_count, u64::MAX);
        assert_eq!(sum.spent_impressions, Money::new(Decimal::MAX));
        assert_eq!(sum.spent_total, Money::new(Decimal::MAX));
    }

    #[test]
    fn daily_stats_flatten_in_json() {
        let daily = DailyStats {
            date: 3,
            stats: Stats::new(2, 1, money("1"), money("3")),
        };
        let value = serde_json::to_value(daily).unwrap();
        assert_eq!(value["date"], 3);
        assert_eq!(value["clicks_count"], 1);
        assert_eq!(value["conversion"], 50.0);
        assert_eq!(value["spent_total"], 4.0);
    }

    #[tokio::test]
    async fn click_only_day_is_zeroed() {
        let clock = Arc::new(VirtualClock::new());
        let meter = MeteringStore::in_memory(Arc::clone(&clock));
        let c = campaign(AdvertiserId::new(), 0, 5);
        let client = ClientId::new();

        meter.log_impression(&c, client).await.unwrap();
        clock.advance(1).unwrap();
        meter.log_click(&c, client).await.unwrap();

        let days = StatsAggregator::new(&meter, 1)
            .campaign_daily_stats(&c)
            .await
            .unwrap();
        assert_eq!(days.len(), 2);
        assert_eq!(days[0].stats.impressions_count, 1);
        assert_eq!(days[1].stats, Stats::default());

        let total = StatsAggregator::new(&meter, 1).campaign_stats(&c).await.unwrap();
        assert_eq!(total.clicks_count, 1);
        assert_eq!(total.spent_total, money("3.5"));
    }

    #[tokio::test]
    async fn daily_range_stops_at_end_day() {
        let meter = MeteringStore::in_memory(Arc::new(VirtualClock::new()));
        let c = campaign(AdvertiserId::new(), 2, 4);

        let days = StatsAggregator::new(&meter, 10)
            .campaign_daily_stats(&c)
            .await
            .unwrap();
        let dates: Vec<Day> = days.iter().map(|d| d.date).collect();
        assert_eq!(dates, vec![2, 3, 4]);

        let early = StatsAggregator::new(&meter, 1)
            .campaign_daily_stats(&c)
            .await
            .unwrap();
        assert!(early.is_empty());
    }

    #[tokio::test]
    async fn advertiser_daily_covers_earliest_start_to_today() {
        let meter = MeteringStore::in_memory(Arc::new(VirtualClock::new()));
        let adv = AdvertiserId::new();
        let campaigns = vec![campaign(adv, 1, 2), campaign(adv, 3, 9)];

        let days = StatsAggregator::new(&meter, 4)
            .advertiser_daily_stats(&campaigns)
            .await
            .unwrap();
        let dates: Vec<Day> = days.iter().map(|d| d.date).collect();
        assert_eq!(dates, vec![1, 2, 3, 4]);

        let none = StatsAggregator::new(&meter, 4)
            .advertiser_daily_stats(&[])
            .await
            .unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn far_future_clock_reports_only_the_window() {
        let clock = Arc::new(VirtualClock::new());
        let meter = MeteringStore::in_memory(Arc::clone(&clock));
        let adv = AdvertiserId::new();
        let open_ended = campaign(adv, 0, u64::MAX);

        let today = 10_000_000_000;
        clock.advance(today).unwrap();
        meter.log_impression(&open_ended, ClientId::new()).await.unwrap();

        let stats = StatsAggregator::new(&meter, today).with_window(3);
        let days = stats.campaign_daily_stats(&open_ended).await.unwrap();
        let dates: Vec<Day> = days.iter().map(|d| d.date).collect();
        assert_eq!(dates, vec![today - 2, today - 1, today]);
        assert_eq!(days[2].stats.impressions_count, 1);

        let rollup = stats
            .advertiser_daily_stats(std::slice::from_ref(&open_ended))
            .await
            .unwrap();
        assert_eq!(rollup.len(), 3);
        assert_eq!(rollup[2].stats.impressions_count, 1);
    }
}
