//! Error types for the ad engine
//!
//! Provides the error taxonomy shared by every layer:
//! - Missing clients, advertisers and campaigns
//! - Input validation failures (rejected before any state mutation)
//! - Virtual clock regressions
//! - Optimistic-concurrency conflicts on campaign edits
//! - Backend (metering / catalog) unavailability

use crate::types::{AdvertiserId, CampaignId, ClientId, Day};

/// Main engine error type
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Entity absent or nothing to serve
    #[error("not found: {0}")]
    NotFound(#[from] NotFound),

    /// Input rejected before mutation
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// Virtual clock moved backwards
    #[error(transparent)]
    Clock(#[from] ClockError),

    /// Campaign edit raced with another writer
    #[error("concurrent update: expected version {expected}, found {actual}")]
    ConcurrentUpdate {
        /// Version the caller based its edit on
        expected: u64,
        /// Version currently stored
        actual: u64,
    },

    /// Metering or catalog backend unreachable
    #[error("store unavailable: {0}")]
    StoreUnavailable(#[from] StoreError),
}

impl EngineError {
    /// Check if error is a missing-entity error
    #[inline]
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Check if error was caused by the caller's input
    #[inline]
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::NotFound(_) | Self::Validation(_) | Self::Clock(_) | Self::ConcurrentUpdate { .. }
        )
    }

    /// Check if a deliberate retry by the caller may succeed
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ConcurrentUpdate { .. } | Self::StoreUnavailable(StoreError::Unreachable(_))
        )
    }

    /// HTTP status the error maps to
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::NotFound(_) => 404,
            Self::Validation(_) | Self::Clock(_) => 400,
            Self::ConcurrentUpdate { .. } => 409,
            Self::StoreUnavailable(StoreError::Unreachable(_)) => 503,
            Self::StoreUnavailable(StoreError::Overflow) => 500,
        }
    }
}

/// Things that can be missing
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NotFound {
    /// Unknown client
    #[error("client {0}")]
    Client(ClientId),

    /// Unknown advertiser
    #[error("advertiser {0}")]
    Advertiser(AdvertiserId),

    /// Unknown campaign
    #[error("campaign {0}")]
    Campaign(CampaignId),

    /// No campaign is active on the current day
    #[error("no active campaigns on day {0}")]
    NoActiveCampaigns(Day),

    /// Active campaigns exist but none targets the client
    #[error("no campaign targets client {0}")]
    NoTargetingMatch(ClientId),

    /// Every matching campaign is capped
    #[error("no eligible campaign for client {0}")]
    NoEligibleCampaign(ClientId),
}

/// Input validation errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// Age outside 0..=120
    #[error("{field} must be within 0..=120, got {value}")]
    AgeOutOfRange {
        /// Offending field
        field: &'static str,
        /// Offending value
        value: u32,
    },

    /// age_to below age_from
    #[error("age_to ({age_to}) must not be less than age_from ({age_from})")]
    AgeBoundsInverted { age_from: u32, age_to: u32 },

    /// end_day before start_day
    #[error("end day {end} precedes start day {start}")]
    EndBeforeStart { start: Day, end: Day },

    /// Day earlier than the virtual clock
    #[error("{field} {day} is in the past (current day {current})")]
    DayInPast {
        field: &'static str,
        day: Day,
        current: Day,
    },

    /// Zero limit or non-positive cost
    #[error("{0} must be positive")]
    NonPositive(&'static str),

    /// Cost above the accepted ceiling
    #[error("{field} must not exceed {max}")]
    TooLarge {
        field: &'static str,
        max: crate::money::Money,
    },

    /// More clicks allowed than impressions
    #[error("clicks limit {clicks} exceeds impressions limit {impressions}")]
    ClicksExceedImpressions { clicks: u64, impressions: u64 },

    /// Required text left blank
    #[error("{0} must not be empty")]
    Empty(&'static str),

    /// Schedule or limits edited after the campaign started
    #[error("{0} cannot change after the campaign has started")]
    ImmutableAfterStart(&'static str),

    /// Pagination below the first page
    #[error("page must be at least 1")]
    InvalidPage,
}

/// Virtual clock errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ClockError {
    /// Requested day precedes the current one
    #[error("cannot move clock back to day {requested} (current day {current})")]
    Regression { requested: Day, current: Day },
}

/// Backend errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// Backend could not be reached
    #[error("backend unreachable: {0}")]
    Unreachable(String),

    /// Spend accumulator would leave the representable range
    #[error("spend accumulator overflow")]
    Overflow,
}

/// Result alias for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_error_display() {
        let err = EngineError::from(ValidationError::Empty("ad_title"));
        assert!(err.to_string().contains("ad_title must not be empty"));

        let err = EngineError::from(ClockError::Regression {
            requested: 1,
            current: 3,
        });
        assert!(err.to_string().contains("current day 3"));
    }

    #[test]
    fn engine_error_classification() {
        let missing = EngineError::from(NotFound::NoActiveCampaigns(0));
        assert!(missing.is_not_found());
        assert!(missing.is_client_error());
        assert!(!missing.is_retryable());

        let conflict = EngineError::ConcurrentUpdate {
            expected: 1,
            actual: 2,
        };
        assert!(conflict.is_client_error());
        assert!(conflict.is_retryable());

        let down = EngineError::from(StoreError::Unreachable("redis".into()));
        assert!(!down.is_client_error());
        assert!(down.is_retryable());
        assert_eq!(down.status_code(), 503);
        assert_eq!(conflict.status_code(), 409);
        assert_eq!(missing.status_code(), 404);

        let overflow = EngineError::from(StoreError::Overflow);
        assert!(!overflow.is_client_error());
        assert!(!overflow.is_retryable());
        assert_eq!(overflow.status_code(), 500);
    }
}
