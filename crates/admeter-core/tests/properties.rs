use admeter_core::{
    is_capped, AdvertiserId, Campaign, Candidate, EventKind, MeteringStore, Money, Selector,
    VirtualClock,
};
use admeter_test_utils::{client_id, create_draft, money, DraftBuilder};
use proptest::prelude::*;
use std::sync::Arc;

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap()
}

fn campaign_with_limit(limit: u64) -> Campaign {
    Campaign::from_draft(
        AdvertiserId::new(),
        DraftBuilder::new(0, 10).limits(limit, 1).build(),
    )
}

fn candidate(campaign: Campaign, ml_score: u64, impressions: u64) -> Candidate {
    Candidate {
        campaign,
        ml_score,
        impressions,
        clicks: 0,
    }
}

proptest! {
    #[test]
    fn prop_repeated_impressions_bill_once(repeats in 1usize..8, client in 0u128..1_000) {
        let rt = runtime();
        let store = MeteringStore::in_memory(Arc::new(VirtualClock::new()));
        let campaign = Campaign::from_draft(AdvertiserId::new(), create_draft(0, 5));
        let client = client_id(client);

        for _ in 0..repeats {
            let count = rt.block_on(store.log_impression(&campaign, client)).unwrap();
            prop_assert_eq!(count, 1);
        }
        let snap = rt.block_on(store.snapshot(campaign.campaign_id)).unwrap();
        prop_assert_eq!(snap.impressions, 1);
        prop_assert_eq!(snap.spend_impressions, campaign.cost_per_impression);
    }

    #[test]
    fn prop_clicks_never_precede_impressions(
        shown in proptest::collection::btree_set(0u128..64, 0..16),
        clicked in proptest::collection::btree_set(0u128..64, 0..16),
    ) {
        let rt = runtime();
        let store = MeteringStore::in_memory(Arc::new(VirtualClock::new()));
        let campaign = Campaign::from_draft(AdvertiserId::new(), create_draft(0, 5));

        for n in &shown {
            rt.block_on(store.log_impression(&campaign, client_id(*n))).unwrap();
        }
        for n in &clicked {
            rt.block_on(store.log_click(&campaign, client_id(*n))).unwrap();
        }

        let expected = shown.intersection(&clicked).count() as u64;
        let clicks = rt.block_on(store.count(campaign.campaign_id, EventKind::Click)).unwrap();
        let spend = rt.block_on(store.spend(campaign.campaign_id, EventKind::Click)).unwrap();
        prop_assert_eq!(clicks, expected);
        prop_assert_eq!(spend, campaign.cost_per_click.times(expected));
    }

    #[test]
    fn prop_capped_campaign_never_selected(limit in 1u64..500, extra in 0u64..50, ml in 0u64..1_000) {
        // smallest count at which the cap applies, plus some
        let threshold = (limit as f64 * 1.05).ceil() as u64;
        let impressions = threshold.saturating_sub(1) + extra;
        prop_assume!(is_capped(impressions, limit, 1.05));

        let capped = candidate(campaign_with_limit(limit), ml, impressions);
        let modest = candidate(
            Campaign::from_draft(
                AdvertiserId::new(),
                DraftBuilder::new(0, 10).costs("0.01", "0.01").build(),
            ),
            0,
            0,
        );
        let modest_id = modest.campaign.campaign_id;

        let winner = Selector::default().select(vec![capped, modest]).unwrap();
        prop_assert_eq!(winner.candidate.campaign.campaign_id, modest_id);
    }

    #[test]
    fn prop_raising_affinity_never_lowers_rank(
        base in 0u64..500,
        bump in 1u64..500,
        rival_ml in 0u64..1_000,
        cpc in 1u32..1_000,
    ) {
        let cpc = Money::new(rust_decimal_cents(cpc));
        let mut draft = create_draft(0, 10);
        draft.cost_per_click = cpc;
        let ours = Campaign::from_draft(AdvertiserId::new(), draft.clone());
        let rival = Campaign::from_draft(AdvertiserId::new(), draft);
        let our_id = ours.campaign_id;
        let selector = Selector::default();

        let before = candidate(ours.clone(), base, 0);
        let after = candidate(ours, base + bump, 0);
        prop_assert!(after.projected_income() > before.projected_income());

        let rival = candidate(rival, rival_ml, 0);
        let scored_before = selector.score(vec![before.clone(), rival.clone()]);
        let scored_after = selector.score(vec![after.clone(), rival.clone()]);
        prop_assert!(scored_after[0].normalized_income >= scored_before[0].normalized_income);

        let won_before = selector.select(vec![before, rival.clone()]).unwrap();
        if won_before.candidate.campaign.campaign_id == our_id {
            let won_after = selector.select(vec![after, rival]).unwrap();
            prop_assert_eq!(won_after.candidate.campaign.campaign_id, our_id);
        }
    }

    #[test]
    fn prop_clock_never_moves_back(days in proptest::collection::vec(0u64..100, 1..32)) {
        let clock = VirtualClock::new();
        let mut high = 0;
        for day in days {
            let result = clock.advance(day);
            if day >= high {
                prop_assert_eq!(result.unwrap(), day);
                high = day;
            } else {
                prop_assert!(result.is_err());
            }
            prop_assert_eq!(clock.current(), high);
        }
    }
}

fn rust_decimal_cents(cents: u32) -> rust_decimal::Decimal {
    rust_decimal::Decimal::new(i64::from(cents), 2)
}

#[test]
fn cap_threshold_matches_overshoot_formula() {
    assert!(!is_capped(103, 100, 1.05));
    assert!(is_capped(104, 100, 1.05));
    assert_eq!(money("0.3"), Money::new(rust_decimal_cents(30)));
}
