//! Scoring and selection
//!
//! Given day-active, targeting-matched candidates:
//! 1. Drop every candidate whose next impression would reach
//!    `impressions_limit * overshoot_factor`
//! 2. Compute `ctr = clicks / impressions` and
//!    `projected_income = ml_score * cost_per_click + cost_per_impression`
//! 3. Normalize both by their maximum over the remaining candidates (raw
//!    value when the maximum is zero)
//! 4. `score = income_weight * income + ctr_weight * ctr`; highest wins

use crate::campaign::Campaign;
use crate::config::{EngineConfig, TieBreak};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::cmp::Ordering;

/// Campaign enriched with the counters selection needs
#[derive(Debug, Clone)]
pub struct Candidate {
    pub campaign: Campaign,
    /// Affinity of the client to the campaign's advertiser
    pub ml_score: u64,
    /// Lifetime distinct impressions
    pub impressions: u64,
    /// Lifetime distinct clicks
    pub clicks: u64,
}

impl Candidate {
    /// Click-through rate, zero before the first impression
    #[must_use]
    pub fn ctr(&self) -> f64 {
        if self.impressions == 0 {
            0.0
        } else {
            self.clicks as f64 / self.impressions as f64
        }
    }

    /// Expected revenue of showing this campaign to the client
    ///
    /// Saturates at `Decimal::MAX`.
    #[must_use]
    pub fn projected_income(&self) -> Decimal {
        Decimal::from(self.ml_score)
            .saturating_mul(self.campaign.cost_per_click.amount())
            .saturating_add(self.campaign.cost_per_impression.amount())
    }
}

/// Candidate with its score breakdown
#[derive(Debug, Clone)]
pub struct ScoredCandidate {
    pub candidate: Candidate,
    pub normalized_income: f64,
    pub normalized_ctr: f64,
    pub score: f64,
}

/// Check whether a campaign has used up its impression budget
#[inline]
#[must_use]
pub fn is_capped(impressions: u64, limit: u64, overshoot_factor: f64) -> bool {
    (impressions + 1) as f64 >= limit as f64 * overshoot_factor
}

/// Weighted selector
#[derive(Debug, Clone)]
pub struct Selector {
    overshoot_factor: f64,
    income_weight: f64,
    ctr_weight: f64,
    tie_break: TieBreak,
}

impl Selector {
    /// Create selector from engine configuration
    #[must_use]
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            overshoot_factor: config.overshoot_factor,
            income_weight: config.income_weight,
            ctr_weight: config.ctr_weight,
            tie_break: config.tie_break,
        }
    }

    /// Score every candidate that passes the budget pre-filter
    #[must_use]
    pub fn score(&self, candidates: Vec<Candidate>) -> Vec<ScoredCandidate> {
        let eligible: Vec<Candidate> = candidates
            .into_iter()
            .filter(|c| {
                let capped = is_capped(c.impressions, c.campaign.impressions_limit, self.overshoot_factor);
                if capped {
                    tracing::debug!(
                        campaign_id = %c.campaign.campaign_id,
                        impressions = c.impressions,
                        limit = c.campaign.impressions_limit,
                        "candidate capped"
                    );
                }
                !capped
            })
            .collect();

        let max_income = eligible
            .iter()
            .map(Candidate::projected_income)
            .max()
            .unwrap_or(Decimal::ZERO);
        let max_ctr = eligible.iter().map(Candidate::ctr).fold(0.0_f64, f64::max);

        eligible
            .into_iter()
            .map(|candidate| {
                let income = candidate.projected_income();
                let normalized_income = if max_income > Decimal::ZERO {
                    income / max_income
                } else {
                    income
                }
                .to_f64()
                .unwrap_or_default();

                let ctr = candidate.ctr();
                let normalized_ctr = if max_ctr > 0.0 { ctr / max_ctr } else { ctr };

                let score = self.income_weight * normalized_income + self.ctr_weight * normalized_ctr;
                tracing::debug!(
                    campaign_id = %candidate.campaign.campaign_id,
                    normalized_income,
                    normalized_ctr,
                    score,
                    "candidate scored"
                );
                ScoredCandidate {
                    candidate,
                    normalized_income,
                    normalized_ctr,
                    score,
                }
            })
            .collect()
    }

    /// Pick the highest-scoring eligible candidate
    #[must_use]
    pub fn select(&self, candidates: Vec<Candidate>) -> Option<ScoredCandidate> {
        let mut best: Option<ScoredCandidate> = None;
        for scored in self.score(candidates) {
            let wins = match &best {
                None => true,
                Some(current) => self.beats(&scored, current),
            };
            if wins {
                best = Some(scored);
            }
        }
        best
    }

    fn beats(&self, challenger: &ScoredCandidate, current: &ScoredCandidate) -> bool {
        match challenger.score.partial_cmp(&current.score) {
            Some(Ordering::Greater) => true,
            Some(Ordering::Equal) => match self.tie_break {
                TieBreak::LowestCampaignId => {
                    challenger.candidate.campaign.campaign_id < current.candidate.campaign.campaign_id
                }
                TieBreak::FirstEncountered => false,
            },
            _ => false,
        }
    }
}

impl Default for Selector {
    fn default() -> Self {
        Self::new(&EngineConfig::default())
    }
}
