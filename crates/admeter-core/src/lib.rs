//! Admeter Core - ad selection, metering and statistics
//!
//! Decides which campaign to show a client and meters that decision:
//! - Filters day-active campaigns by targeting
//! - Scores candidates under an impression cap with overshoot allowance
//! - Counts impressions and clicks at most once per client per campaign
//! - Accumulates spend in fixed-point money, globally and per day
//! - Derives campaign and advertiser statistics on demand
//!
//! # Example
//!
//! ```rust,ignore
//! use admeter_core::prelude::*;
//!
//! # async fn example() -> Result<(), EngineError> {
//! let engine = AdEngine::new(EngineConfig::new());
//!
//! let ad = engine.serve_ad(client_id).await?;
//! engine.record_click(ad.ad_id, client_id).await?;
//!
//! let stats = engine.campaign_stats(ad.ad_id).await?;
//! println!("conversion {}%", stats.conversion);
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod campaign;
pub mod catalog;
pub mod clock;
pub mod config;
pub mod directory;
pub mod engine;
pub mod error;
pub mod metering;
pub mod money;
pub mod selection;
pub mod stats;
pub mod targeting;
pub mod types;

// Re-exports for convenience
pub use campaign::{Campaign, CampaignDraft, MAX_COST};
pub use catalog::{CampaignCatalog, CampaignStore, InMemoryCatalog};
pub use clock::VirtualClock;
pub use config::{EngineConfig, TieBreak, DEFAULT_REPORT_WINDOW_DAYS};
pub use directory::{Directory, InMemoryDirectory};
pub use engine::{AdEngine, DEFAULT_PAGE_SIZE};
pub use error::{ClockError, EngineError, EngineResult, NotFound, StoreError, ValidationError};
pub use metering::{EventKind, MemoryBackend, MeterBackend, MeterKey, MeterSnapshot, MeteringStore};
pub use money::Money;
pub use selection::{is_capped, Candidate, ScoredCandidate, Selector};
pub use stats::{DailyStats, Stats, StatsAggregator};
pub use targeting::{TargetGender, Targeting};
pub use types::{
    Ad, Advertiser, AdvertiserId, CampaignId, Client, ClientId, Day, Gender, MlScore, MAX_AGE,
};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with the ad engine
    pub use crate::{
        Ad, AdEngine, Advertiser, AdvertiserId, Campaign, CampaignDraft, CampaignId, Client,
        ClientId, DailyStats, Day, EngineConfig, EngineError, EngineResult, Gender, MlScore,
        Money, Stats, TargetGender, Targeting,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
