//! Route table
//!
//! Paths are matched before methods so an unknown path is a 404 rather than
//! a 405 from whichever route happened to be tried last.

use crate::handlers;
use admeter_core::{AdEngine, AdvertiserId, CampaignId, ClientId};
use serde::de::DeserializeOwned;
use std::convert::Infallible;
use std::sync::Arc;
use warp::filters::BoxedFilter;
use warp::reply::Response;
use warp::{Filter, Rejection, Reply};

/// Largest accepted request body
pub const MAX_BODY_BYTES: u64 = 64 * 1024;

fn with_engine(
    engine: Arc<AdEngine>,
) -> impl Filter<Extract = (Arc<AdEngine>,), Error = Infallible> + Clone {
    warp::any().map(move || Arc::clone(&engine))
}

fn json_body<T: DeserializeOwned + Send>() -> impl Filter<Extract = (T,), Error = Rejection> + Clone
{
    warp::body::content_length_limit(MAX_BODY_BYTES).and(warp::body::json())
}

/// Expected campaign version from `If-Match`, bare (`3`) or quoted (`"3"`)
fn if_match() -> impl Filter<Extract = (Option<u64>,), Error = Rejection> + Clone {
    warp::header::optional::<String>("if-match").and_then(|raw: Option<String>| async move {
        match raw {
            Some(value) => handlers::parse_if_match(&value).map_err(warp::reject::custom),
            None => Ok(None),
        }
    })
}

fn serving(engine: &Arc<AdEngine>) -> BoxedFilter<(Response,)> {
    let serve = warp::path!("ads")
        .and(warp::get())
        .and(warp::query::<handlers::AdQuery>())
        .and(with_engine(Arc::clone(engine)))
        .and_then(handlers::serve_ad);

    let click = warp::path!("ads" / CampaignId / "click")
        .and(warp::post())
        .and(json_body())
        .and(with_engine(Arc::clone(engine)))
        .and_then(handlers::record_click);

    let advance = warp::path!("time" / "advance")
        .and(warp::post())
        .and(json_body())
        .and(with_engine(Arc::clone(engine)))
        .and_then(handlers::advance_time);

    serve.or(click).unify().or(advance).unify().boxed()
}

fn stats(engine: &Arc<AdEngine>) -> BoxedFilter<(Response,)> {
    let campaign = warp::path!("stats" / "campaigns" / CampaignId)
        .and(warp::get())
        .and(with_engine(Arc::clone(engine)))
        .and_then(handlers::campaign_stats);

    let campaign_daily = warp::path!("stats" / "campaigns" / CampaignId / "daily")
        .and(warp::get())
        .and(with_engine(Arc::clone(engine)))
        .and_then(handlers::campaign_daily_stats);

    let advertiser = warp::path!("stats" / "advertisers" / AdvertiserId / "campaigns")
        .and(warp::get())
        .and(with_engine(Arc::clone(engine)))
        .and_then(handlers::advertiser_stats);

    let advertiser_daily = warp::path!("stats" / "advertisers" / AdvertiserId / "campaigns" / "daily")
        .and(warp::get())
        .and(with_engine(Arc::clone(engine)))
        .and_then(handlers::advertiser_daily_stats);

    campaign
        .or(campaign_daily)
        .unify()
        .or(advertiser)
        .unify()
        .or(advertiser_daily)
        .unify()
        .boxed()
}

fn directory(engine: &Arc<AdEngine>) -> BoxedFilter<(Response,)> {
    let clients_bulk = warp::path!("clients" / "bulk")
        .and(warp::post())
        .and(json_body())
        .and(with_engine(Arc::clone(engine)))
        .and_then(handlers::upsert_clients);

    let client = warp::path!("clients" / ClientId)
        .and(warp::get())
        .and(with_engine(Arc::clone(engine)))
        .and_then(handlers::get_client);

    let advertisers_bulk = warp::path!("advertisers" / "bulk")
        .and(warp::post())
        .and(json_body())
        .and(with_engine(Arc::clone(engine)))
        .and_then(handlers::upsert_advertisers);

    let advertiser = warp::path!("advertisers" / AdvertiserId)
        .and(warp::get())
        .and(with_engine(Arc::clone(engine)))
        .and_then(handlers::get_advertiser);

    let ml_score = warp::path!("ml-scores")
        .and(warp::post())
        .and(json_body())
        .and(with_engine(Arc::clone(engine)))
        .and_then(handlers::upsert_ml_score);

    clients_bulk
        .or(client)
        .unify()
        .or(advertisers_bulk)
        .unify()
        .or(advertiser)
        .unify()
        .or(ml_score)
        .unify()
        .boxed()
}

fn campaigns(engine: &Arc<AdEngine>) -> BoxedFilter<(Response,)> {
    let create = warp::path!("advertisers" / AdvertiserId / "campaigns")
        .and(warp::post())
        .and(json_body())
        .and(with_engine(Arc::clone(engine)))
        .and_then(handlers::create_campaign);

    let list = warp::path!("advertisers" / AdvertiserId / "campaigns")
        .and(warp::get())
        .and(warp::query::<handlers::PageQuery>())
        .and(with_engine(Arc::clone(engine)))
        .and_then(handlers::list_campaigns);

    let get = warp::path!("advertisers" / AdvertiserId / "campaigns" / CampaignId)
        .and(warp::get())
        .and(with_engine(Arc::clone(engine)))
        .and_then(handlers::get_campaign);

    let update = warp::path!("advertisers" / AdvertiserId / "campaigns" / CampaignId)
        .and(warp::put())
        .and(if_match())
        .and(json_body())
        .and(with_engine(Arc::clone(engine)))
        .and_then(handlers::update_campaign);

    let delete = warp::path!("advertisers" / AdvertiserId / "campaigns" / CampaignId)
        .and(warp::delete())
        .and(with_engine(Arc::clone(engine)))
        .and_then(handlers::delete_campaign);

    let image = warp::path!("advertisers" / AdvertiserId / "campaigns" / CampaignId / "image")
        .and(warp::put())
        .and(json_body())
        .and(with_engine(Arc::clone(engine)))
        .and_then(handlers::set_campaign_image);

    create
        .or(list)
        .unify()
        .or(get)
        .unify()
        .or(update)
        .unify()
        .or(delete)
        .unify()
        .or(image)
        .unify()
        .boxed()
}

/// Every route, without rejection handling
#[must_use]
pub fn api(engine: Arc<AdEngine>) -> BoxedFilter<(Response,)> {
    serving(&engine)
        .or(stats(&engine))
        .unify()
        .or(directory(&engine))
        .unify()
        .or(campaigns(&engine))
        .unify()
        .boxed()
}

/// Complete application: routes, JSON error mapping and request tracing
pub fn app(
    engine: Arc<AdEngine>,
) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
    api(engine)
        .recover(handlers::handle_rejection)
        .unify()
        .with(warp::trace::request())
}
