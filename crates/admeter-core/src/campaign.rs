//! Campaign records
//!
//! A campaign is created from a [`CampaignDraft`] and later replaced by
//! another draft. The schedule (`start_date`/`end_date`) and both limits are
//! frozen once the virtual clock reaches the stored start day; costs, texts
//! and targeting stay editable. Every stored campaign carries a version that
//! is bumped on each successful update.

use crate::error::ValidationError;
use crate::metering::EventKind;
use crate::money::Money;
use crate::targeting::Targeting;
use crate::types::{Ad, AdvertiserId, CampaignId, Day};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Highest accepted cost per impression or per click
pub const MAX_COST: Money = Money::new(Decimal::from_parts(1_000_000, 0, 0, false, 0));

/// Stored campaign
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Campaign {
    pub campaign_id: CampaignId,
    pub advertiser_id: AdvertiserId,
    pub impressions_limit: u64,
    pub clicks_limit: u64,
    pub cost_per_impression: Money,
    pub cost_per_click: Money,
    pub ad_title: String,
    pub ad_text: String,
    #[serde(rename = "start_date")]
    pub start_day: Day,
    #[serde(rename = "end_date")]
    pub end_day: Day,
    pub targeting: Option<Targeting>,
    pub image_url: Option<String>,
    pub version: u64,
}

impl Campaign {
    /// Materialize a validated draft
    #[must_use]
    pub fn from_draft(advertiser_id: AdvertiserId, draft: CampaignDraft) -> Self {
        Self {
            campaign_id: CampaignId::new(),
            advertiser_id,
            impressions_limit: draft.impressions_limit,
            clicks_limit: draft.clicks_limit,
            cost_per_impression: draft.cost_per_impression,
            cost_per_click: draft.cost_per_click,
            ad_title: draft.ad_title,
            ad_text: draft.ad_text,
            start_day: draft.start_day,
            end_day: draft.end_day,
            targeting: draft.targeting,
            image_url: None,
            version: 1,
        }
    }

    /// Whether the campaign runs on `day`
    #[inline]
    #[must_use]
    pub fn is_active_on(&self, day: Day) -> bool {
        self.start_day <= day && day <= self.end_day
    }

    /// Whether the clock has reached the start day
    #[inline]
    #[must_use]
    pub fn has_started(&self, current_day: Day) -> bool {
        current_day >= self.start_day
    }

    /// Price of one billable event
    #[inline]
    #[must_use]
    pub fn cost_of(&self, kind: EventKind) -> Money {
        match kind {
            EventKind::Impression => self.cost_per_impression,
            EventKind::Click => self.cost_per_click,
        }
    }

    /// Apply a replacement draft, enforcing the post-start freeze
    ///
    /// # Errors
    /// - Any draft validation error
    /// - `ImmutableAfterStart` if schedule or limits change once started
    pub fn apply_update(
        &self,
        draft: CampaignDraft,
        current_day: Day,
    ) -> Result<Campaign, ValidationError> {
        draft.validate_fields()?;

        if self.has_started(current_day) {
            let frozen = [
                ("start_date", self.start_day == draft.start_day),
                ("end_date", self.end_day == draft.end_day),
                ("impressions_limit", self.impressions_limit == draft.impressions_limit),
                ("clicks_limit", self.clicks_limit == draft.clicks_limit),
            ];
            if let Some((field, _)) = frozen.into_iter().find(|(_, unchanged)| !*unchanged) {
                return Err(ValidationError::ImmutableAfterStart(field));
            }
        } else {
            draft.validate_not_past(current_day)?;
        }

        Ok(Campaign {
            impressions_limit: draft.impressions_limit,
            clicks_limit: draft.clicks_limit,
            cost_per_impression: draft.cost_per_impression,
            cost_per_click: draft.cost_per_click,
            ad_title: draft.ad_title,
            ad_text: draft.ad_text,
            start_day: draft.start_day,
            end_day: draft.end_day,
            targeting: draft.targeting,
            version: self.version + 1,
            ..self.clone()
        })
    }
}

impl From<&Campaign> for Ad {
    fn from(campaign: &Campaign) -> Self {
        Ad {
            ad_id: campaign.campaign_id,
            ad_title: campaign.ad_title.clone(),
            ad_text: campaign.ad_text.clone(),
            advertiser_id: campaign.advertiser_id,
            image_url: campaign.image_url.clone(),
        }
    }
}

/// Caller-supplied campaign fields, used for both create and update
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignDraft {
    pub impressions_limit: u64,
    pub clicks_limit: u64,
    pub cost_per_impression: Money,
    pub cost_per_click: Money,
    pub ad_title: String,
    pub ad_text: String,
    #[serde(rename = "start_date")]
    pub start_day: Day,
    #[serde(rename = "end_date")]
    pub end_day: Day,
    #[serde(default)]
    pub targeting: Option<Targeting>,
}

impl CampaignDraft {
    /// Validate a draft for creation on `current_day`
    ///
    /// # Errors
    /// Returns the first violated constraint
    pub fn validate_new(&self, current_day: Day) -> Result<(), ValidationError> {
        self.validate_fields()?;
        self.validate_not_past(current_day)
    }

    fn validate_fields(&self) -> Result<(), ValidationError> {
        if self.impressions_limit == 0 {
            return Err(ValidationError::NonPositive("impressions_limit"));
        }
        if self.clicks_limit == 0 {
            return Err(ValidationError::NonPositive("clicks_limit"));
        }
        if self.clicks_limit > self.impressions_limit {
            return Err(ValidationError::ClicksExceedImpressions {
                clicks: self.clicks_limit,
                impressions: self.impressions_limit,
            });
        }
        if !self.cost_per_impression.is_positive() {
            return Err(ValidationError::NonPositive("cost_per_impression"));
        }
        if !self.cost_per_click.is_positive() {
            return Err(ValidationError::NonPositive("cost_per_click"));
        }
        for (field, cost) in [
            ("cost_per_impression", self.cost_per_impression),
            ("cost_per_click", self.cost_per_click),
        ] {
            if cost > MAX_COST {
                return Err(ValidationError::TooLarge {
                    field,
                    max: MAX_COST,
                });
            }
        }
        if self.ad_title.trim().is_empty() {
            return Err(ValidationError::Empty("ad_title"));
        }
        if self.ad_text.trim().is_empty() {
            return Err(ValidationError::Empty("ad_text"));
        }
        if self.end_day < self.start_day {
            return Err(ValidationError::EndBeforeStart {
                start: self.start_day,
                end: self.end_day,
            });
        }
        if let Some(targeting) = &self.targeting {
            targeting.validate()?;
        }
        Ok(())
    }

    fn validate_not_past(&self, current_day: Day) -> Result<(), ValidationError> {
        for (field, day) in [("start_date", self.start_day), ("end_date", self.end_day)] {
            if day < current_day {
                return Err(ValidationError::DayInPast {
                    field,
                    day,
                    current: current_day,
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn draft() -> CampaignDraft {
        CampaignDraft {
            impressions_limit: 100,
            clicks_limit: 10,
            cost_per_impression: Money::from_str("0.1").unwrap(),
            cost_per_click: Money::from_str("1.5").unwrap(),
            ad_title: "Title".into(),
            ad_text: "Text".into(),
            start_day: 2,
            end_day: 5,
            targeting: None,
        }
    }

    #[test]
    fn draft_validation() {
        assert!(draft().validate_new(0).is_ok());

        let mut d = draft();
        d.end_day = 1;
        assert!(matches!(
            d.validate_new(0),
            Err(ValidationError::EndBeforeStart { start: 2, end: 1 })
        ));

        let mut d = draft();
        d.clicks_limit = 101;
        assert!(matches!(
            d.validate_new(0),
            Err(ValidationError::ClicksExceedImpressions { .. })
        ));

        let mut d = draft();
        d.cost_per_click = Money::ZERO;
        assert_eq!(
            d.validate_new(0),
            Err(ValidationError::NonPositive("cost_per_click"))
        );

        let mut d = draft();
        d.cost_per_impression = Money::from_str("50000000000000000000000000000").unwrap();
        assert_eq!(
            d.validate_new(0),
            Err(ValidationError::TooLarge {
                field: "cost_per_impression",
                max: MAX_COST,
            })
        );
        let mut d = draft();
        d.cost_per_click = MAX_COST;
        assert!(d.validate_new(0).is_ok());

        assert!(matches!(
            draft().validate_new(3),
            Err(ValidationError::DayInPast {
                field: "start_date",
                ..
            })
        ));
    }

    #[test]
    fn schedule_and_limits_freeze_after_start() {
        let campaign = Campaign::from_draft(AdvertiserId::new(), draft());

        let mut moved = draft();
        moved.end_day = 9;
        assert!(campaign.apply_update(moved.clone(), 1).is_ok());
        assert_eq!(
            campaign.apply_update(moved, 2),
            Err(ValidationError::ImmutableAfterStart("end_date"))
        );

        let mut bigger = draft();
        bigger.impressions_limit = 500;
        assert_eq!(
            campaign.apply_update(bigger, 4),
            Err(ValidationError::ImmutableAfterStart("impressions_limit"))
        );
    }

    #[test]
    fn costs_and_text_stay_mutable_while_running() {
        let campaign = Campaign::from_draft(AdvertiserId::new(), draft());

        let mut edit = draft();
        edit.ad_text = "New text".into();
        edit.cost_per_click = Money::from_str("2").unwrap();
        let updated = campaign.apply_update(edit, 4).unwrap();

        assert_eq!(updated.ad_text, "New text");
        assert_eq!(updated.version, campaign.version + 1);
        assert_eq!(updated.campaign_id, campaign.campaign_id);
    }

    #[test]
    fn json_uses_date_field_names() {
        let campaign = Campaign::from_draft(AdvertiserId::new(), draft());
        let value = serde_json::to_value(&campaign).unwrap();
        assert_eq!(value["start_date"], 2);
        assert_eq!(value["end_date"], 5);
        assert_eq!(value["cost_per_impression"], 0.1);
    }
}
