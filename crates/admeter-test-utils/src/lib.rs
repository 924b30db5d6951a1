//! Testing utilities for the admeter workspace
//!
//! Shared fixtures for clients, advertisers, campaign drafts and a
//! pre-wired engine.

#![allow(missing_docs)]

use admeter_core::{
    AdEngine, Advertiser, AdvertiserId, CampaignDraft, CampaignId, Client, ClientId, Day,
    EngineConfig, Gender, Money, Targeting,
};
use std::str::FromStr;
use uuid::Uuid;

pub fn money(amount: &str) -> Money {
    Money::from_str(amount).unwrap()
}

/// Client id with a fixed, ordered value
pub fn client_id(n: u128) -> ClientId {
    ClientId(Uuid::from_u128(n))
}

/// Campaign id with a fixed, ordered value
pub fn campaign_id(n: u128) -> CampaignId {
    CampaignId(Uuid::from_u128(n))
}

pub fn create_client_with(age: u32, gender: Gender, location: &str) -> Client {
    let client_id = ClientId::new();
    Client {
        client_id,
        login: format!("user-{client_id}"),
        age,
        location: location.to_string(),
        gender,
    }
}

pub fn create_client() -> Client {
    create_client_with(30, Gender::Male, "Moscow")
}

pub fn create_advertiser(name: &str) -> Advertiser {
    Advertiser {
        advertiser_id: AdvertiserId::new(),
        name: name.to_string(),
    }
}

/// Untargeted draft running `start..=end` with generous limits
pub fn create_draft(start_day: Day, end_day: Day) -> CampaignDraft {
    CampaignDraft {
        impressions_limit: 1_000,
        clicks_limit: 100,
        cost_per_impression: money("0.1"),
        cost_per_click: money("1"),
        ad_title: "Test campaign".to_string(),
        ad_text: "Buy now".to_string(),
        start_day,
        end_day,
        targeting: None,
    }
}

/// Draft builder for tests that tweak a few fields
#[derive(Debug, Clone)]
pub struct DraftBuilder {
    draft: CampaignDraft,
}

impl DraftBuilder {
    pub fn new(start_day: Day, end_day: Day) -> Self {
        Self {
            draft: create_draft(start_day, end_day),
        }
    }

    pub fn limits(mut self, impressions: u64, clicks: u64) -> Self {
        self.draft.impressions_limit = impressions;
        self.draft.clicks_limit = clicks;
        self
    }

    pub fn costs(mut self, per_impression: &str, per_click: &str) -> Self {
        self.draft.cost_per_impression = money(per_impression);
        self.draft.cost_per_click = money(per_click);
        self
    }

    pub fn title(mut self, title: &str) -> Self {
        self.draft.ad_title = title.to_string();
        self
    }

    pub fn targeting(mut self, targeting: Targeting) -> Self {
        self.draft.targeting = Some(targeting);
        self
    }

    pub fn build(self) -> CampaignDraft {
        self.draft
    }
}

/// Engine with default configuration
pub fn setup_test_engine() -> AdEngine {
    AdEngine::new(EngineConfig::new())
}

/// Engine with one registered advertiser
pub async fn setup_engine_with_advertiser() -> (AdEngine, AdvertiserId) {
    let engine = setup_test_engine();
    let advertiser = create_advertiser("Acme");
    let advertiser_id = advertiser.advertiser_id;
    engine.upsert_advertisers(vec![advertiser]).await.unwrap();
    (engine, advertiser_id)
}

/// Register `count` default clients, returning their ids
pub async fn seed_clients(engine: &AdEngine, count: usize) -> Vec<ClientId> {
    let clients: Vec<Client> = (0..count).map(|_| create_client()).collect();
    let ids = clients.iter().map(|c| c.client_id).collect();
    engine.upsert_clients(clients).await.unwrap();
    ids
}
