//! Engine configuration

use crate::types::Day;
use serde::{Deserialize, Serialize};

/// Burst allowance over a campaign's impression limit
pub const DEFAULT_OVERSHOOT_FACTOR: f64 = 1.05;

/// Weight of normalized projected income in the selection score
pub const DEFAULT_INCOME_WEIGHT: f64 = 0.8;

/// Weight of normalized click-through rate in the selection score
pub const DEFAULT_CTR_WEIGHT: f64 = 0.2;

/// Longest span, in days, a daily stats report covers
pub const DEFAULT_REPORT_WINDOW_DAYS: u64 = 3650;

/// How equal scores are resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TieBreak {
    /// Smallest campaign id wins
    #[default]
    LowestCampaignId,
    /// First candidate in catalog order wins
    FirstEncountered,
}

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// A campaign is capped once `impressions + 1 >= limit * overshoot_factor`
    pub overshoot_factor: f64,
    /// Score weight of normalized income
    pub income_weight: f64,
    /// Score weight of normalized CTR
    pub ctr_weight: f64,
    /// Equal-score resolution
    pub tie_break: TieBreak,
    /// Day the virtual clock starts at
    pub start_day: Day,
    /// Daily reports keep only the most recent this-many days
    pub report_window_days: u64,
}

impl EngineConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With overshoot factor
    #[inline]
    #[must_use]
    pub fn with_overshoot_factor(mut self, factor: f64) -> Self {
        self.overshoot_factor = factor;
        self
    }

    /// With score weights
    #[inline]
    #[must_use]
    pub fn with_weights(mut self, income: f64, ctr: f64) -> Self {
        self.income_weight = income;
        self.ctr_weight = ctr;
        self
    }

    /// With tie-break rule
    #[inline]
    #[must_use]
    pub fn with_tie_break(mut self, tie_break: TieBreak) -> Self {
        self.tie_break = tie_break;
        self
    }

    /// With daily report window (at least one day)
    #[inline]
    #[must_use]
    pub fn with_report_window_days(mut self, days: u64) -> Self {
        self.report_window_days = days.max(1);
        self
    }

    /// With initial clock day
    #[inline]
    #[must_use]
    pub fn with_start_day(mut self, day: Day) -> Self {
        self.start_day = day;
        self
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            overshoot_factor: DEFAULT_OVERSHOOT_FACTOR,
            income_weight: DEFAULT_INCOME_WEIGHT,
            ctr_weight: DEFAULT_CTR_WEIGHT,
            tie_break: TieBreak::default(),
            start_day: 0,
            report_window_days: DEFAULT_REPORT_WINDOW_DAYS,
        }
    }
}
