//! Racing duplicate requests against one engine

use admeter_core::VirtualClock;
use admeter_test_utils::{money, seed_clients, setup_engine_with_advertiser, DraftBuilder};
use std::sync::Arc;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn duplicate_ad_requests_bill_once() {
    let (engine, adv) = setup_engine_with_advertiser().await;
    let engine = Arc::new(engine);
    let campaign = engine
        .create_campaign(adv, DraftBuilder::new(0, 3).costs("0.25", "3").build())
        .await
        .unwrap();
    let client_id = seed_clients(&engine, 1).await[0];

    let tasks: Vec<_> = (0..32)
        .map(|_| {
            let engine = Arc::clone(&engine);
            tokio::spawn(async move { engine.serve_ad(client_id).await.unwrap() })
        })
        .collect();
    for task in tasks {
        assert_eq!(task.await.unwrap().ad_id, campaign.campaign_id);
    }

    let clicks: Vec<_> = (0..32)
        .map(|_| {
            let engine = Arc::clone(&engine);
            let ad_id = campaign.campaign_id;
            tokio::spawn(async move { engine.record_click(ad_id, client_id).await.unwrap() })
        })
        .collect();
    for task in clicks {
        assert_eq!(task.await.unwrap(), 1);
    }

    let stats = engine.campaign_stats(campaign.campaign_id).await.unwrap();
    assert_eq!((stats.impressions_count, stats.clicks_count), (1, 1));
    assert_eq!(stats.spent_impressions, money("0.25"));
    assert_eq!(stats.spent_clicks, money("3"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn distinct_clients_are_all_counted() {
    let (engine, adv) = setup_engine_with_advertiser().await;
    let engine = Arc::new(engine);
    let campaign = engine
        .create_campaign(adv, DraftBuilder::new(0, 3).limits(500, 50).build())
        .await
        .unwrap();
    let clients = seed_clients(&engine, 200).await;

    let tasks: Vec<_> = clients
        .into_iter()
        .map(|client_id| {
            let engine = Arc::clone(&engine);
            tokio::spawn(async move { engine.serve_ad(client_id).await.unwrap() })
        })
        .collect();
    for task in tasks {
        task.await.unwrap();
    }

    let stats = engine.campaign_stats(campaign.campaign_id).await.unwrap();
    assert_eq!(stats.impressions_count, 200);
    assert_eq!(stats.spent_impressions, money("20"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_clock_advances_settle_on_the_latest_day() {
    let clock = Arc::new(VirtualClock::new());
    let tasks: Vec<_> = (1..=50u64)
        .map(|day| {
            let clock = Arc::clone(&clock);
            tokio::spawn(async move { clock.advance(day).is_ok() })
        })
        .collect();

    let mut accepted = 0;
    for task in tasks {
        if task.await.unwrap() {
            accepted += 1;
        }
    }
    assert!(accepted >= 1);
    assert_eq!(clock.current(), 50);
}
