//! Request handlers
//!
//! Every handler is infallible at the warp level: engine errors are turned
//! into a status code plus a `{"detail": ...}` body here, and leftover
//! rejections into the same shape by [`handle_rejection`].

use admeter_core::{
    AdEngine, Advertiser, AdvertiserId, CampaignDraft, CampaignId, Client, ClientId, Day,
    EngineError, EngineResult, MlScore, DEFAULT_PAGE_SIZE,
};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;
use warp::http::StatusCode;
use warp::reply::{self, Reply, Response};
use warp::Rejection;

/// Body of every error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub detail: String,
}

/// `GET /ads` query
#[derive(Debug, Deserialize)]
pub struct AdQuery {
    pub client_id: ClientId,
}

/// `POST /ads/{id}/click` body
#[derive(Debug, Deserialize)]
pub struct ClickRequest {
    pub client_id: ClientId,
}

/// `POST /time/advance` body and response
#[derive(Debug, Serialize, Deserialize)]
pub struct TimeAdvance {
    pub current_date: Day,
}

/// Campaign listing query
#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub page: Option<usize>,
    pub size: Option<usize>,
}

/// Image reference update body
#[derive(Debug, Deserialize)]
pub struct ImageRequest {
    pub image_url: Option<String>,
}

/// `If-Match` value that names no version
#[derive(Debug)]
pub struct InvalidIfMatch(pub String);

impl warp::reject::Reject for InvalidIfMatch {}

/// Parse an `If-Match` value
///
/// Accepts a bare or quoted version number; `*` matches any version.
///
/// # Errors
/// `InvalidIfMatch` for anything else, including weak tags
pub fn parse_if_match(raw: &str) -> Result<Option<u64>, InvalidIfMatch> {
    let value = raw.trim();
    if value == "*" {
        return Ok(None);
    }
    let bare = value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value);
    bare.parse()
        .map(Some)
        .map_err(|_| InvalidIfMatch(raw.to_string()))
}

fn detail(status: StatusCode, detail: String) -> Response {
    reply::with_status(reply::json(&ErrorBody { detail }), status).into_response()
}

/// Map an engine error to its response
pub fn error_response(err: &EngineError) -> Response {
    let status =
        StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    if status.is_server_error() {
        tracing::warn!(error = %err, "request failed");
    } else {
        tracing::debug!(error = %err, %status, "request rejected");
    }
    detail(status, err.to_string())
}

fn respond<T: Serialize>(result: EngineResult<T>, status: StatusCode) -> Response {
    match result {
        Ok(body) => reply::with_status(reply::json(&body), status).into_response(),
        Err(err) => error_response(&err),
    }
}

fn no_content(result: EngineResult<impl Sized>) -> Response {
    match result {
        Ok(_) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => error_response(&err),
    }
}

// ---- Serving ----------------------------------------------------------

pub async fn serve_ad(query: AdQuery, engine: Arc<AdEngine>) -> Result<Response, Infallible> {
    Ok(respond(engine.serve_ad(query.client_id).await, StatusCode::OK))
}

pub async fn record_click(
    ad_id: CampaignId,
    body: ClickRequest,
    engine: Arc<AdEngine>,
) -> Result<Response, Infallible> {
    Ok(no_content(engine.record_click(ad_id, body.client_id).await))
}

pub async fn advance_time(
    body: TimeAdvance,
    engine: Arc<AdEngine>,
) -> Result<Response, Infallible> {
    let result = engine
        .advance_clock(body.current_date)
        .map(|current_date| TimeAdvance { current_date });
    Ok(respond(result, StatusCode::OK))
}

// ---- Stats ------------------------------------------------------------

pub async fn campaign_stats(
    campaign_id: CampaignId,
    engine: Arc<AdEngine>,
) -> Result<Response, Infallible> {
    Ok(respond(engine.campaign_stats(campaign_id).await, StatusCode::OK))
}

pub async fn campaign_daily_stats(
    campaign_id: CampaignId,
    engine: Arc<AdEngine>,
) -> Result<Response, Infallible> {
    Ok(match engine.campaign_daily_stats(campaign_id).await {
        Ok(days) if days.is_empty() => detail(
            StatusCode::NOT_FOUND,
            format!("no daily stats for campaign {campaign_id} yet"),
        ),
        result => respond(result, StatusCode::OK),
    })
}

pub async fn advertiser_stats(
    advertiser_id: AdvertiserId,
    engine: Arc<AdEngine>,
) -> Result<Response, Infallible> {
    Ok(respond(engine.advertiser_stats(advertiser_id).await, StatusCode::OK))
}

pub async fn advertiser_daily_stats(
    advertiser_id: AdvertiserId,
    engine: Arc<AdEngine>,
) -> Result<Response, Infallible> {
    Ok(respond(
        engine.advertiser_daily_stats(advertiser_id).await,
        StatusCode::OK,
    ))
}

// ---- Directory --------------------------------------------------------

pub async fn upsert_clients(
    clients: Vec<Client>,
    engine: Arc<AdEngine>,
) -> Result<Response, Infallible> {
    Ok(respond(engine.upsert_clients(clients).await, StatusCode::CREATED))
}

pub async fn get_client(
    client_id: ClientId,
    engine: Arc<AdEngine>,
) -> Result<Response, Infallible> {
    Ok(respond(engine.get_client(client_id).await, StatusCode::OK))
}

pub async fn upsert_advertisers(
    advertisers: Vec<Advertiser>,
    engine: Arc<AdEngine>,
) -> Result<Response, Infallible> {
    Ok(respond(
        engine.upsert_advertisers(advertisers).await,
        StatusCode::CREATED,
    ))
}

pub async fn get_advertiser(
    advertiser_id: AdvertiserId,
    engine: Arc<AdEngine>,
) -> Result<Response, Infallible> {
    Ok(respond(engine.get_advertiser(advertiser_id).await, StatusCode::OK))
}

pub async fn upsert_ml_score(
    score: MlScore,
    engine: Arc<AdEngine>,
) -> Result<Response, Infallible> {
    Ok(respond(engine.upsert_ml_score(score).await, StatusCode::OK))
}

// ---- Campaigns --------------------------------------------------------

pub async fn create_campaign(
    advertiser_id: AdvertiserId,
    draft: CampaignDraft,
    engine: Arc<AdEngine>,
) -> Result<Response, Infallible> {
    Ok(respond(
        engine.create_campaign(advertiser_id, draft).await,
        StatusCode::CREATED,
    ))
}

pub async fn list_campaigns(
    advertiser_id: AdvertiserId,
    query: PageQuery,
    engine: Arc<AdEngine>,
) -> Result<Response, Infallible> {
    let page = query.page.unwrap_or(1);
    let size = query.size.unwrap_or(DEFAULT_PAGE_SIZE);
    Ok(respond(
        engine.list_campaigns(advertiser_id, page, size).await,
        StatusCode::OK,
    ))
}

pub async fn get_campaign(
    advertiser_id: AdvertiserId,
    campaign_id: CampaignId,
    engine: Arc<AdEngine>,
) -> Result<Response, Infallible> {
    Ok(respond(
        engine.get_campaign(advertiser_id, campaign_id).await,
        StatusCode::OK,
    ))
}

pub async fn update_campaign(
    advertiser_id: AdvertiserId,
    campaign_id: CampaignId,
    expected_version: Option<u64>,
    draft: CampaignDraft,
    engine: Arc<AdEngine>,
) -> Result<Response, Infallible> {
    Ok(respond(
        engine
            .update_campaign(advertiser_id, campaign_id, draft, expected_version)
            .await,
        StatusCode::OK,
    ))
}

pub async fn delete_campaign(
    advertiser_id: AdvertiserId,
    campaign_id: CampaignId,
    engine: Arc<AdEngine>,
) -> Result<Response, Infallible> {
    Ok(no_content(
        engine.delete_campaign(advertiser_id, campaign_id).await,
    ))
}

pub async fn set_campaign_image(
    advertiser_id: AdvertiserId,
    campaign_id: CampaignId,
    body: ImageRequest,
    engine: Arc<AdEngine>,
) -> Result<Response, Infallible> {
    let result = match engine.get_campaign(advertiser_id, campaign_id).await {
        Ok(_) => engine.set_campaign_image(campaign_id, body.image_url).await,
        Err(err) => Err(err),
    };
    Ok(respond(result, StatusCode::OK))
}

// ---- Rejections -------------------------------------------------------

/// Turn unmatched routes and malformed requests into JSON errors
pub async fn handle_rejection(rejection: Rejection) -> Result<Response, Infallible> {
    let (status, message) = if rejection.is_not_found() {
        (StatusCode::NOT_FOUND, "not found".to_string())
    } else if let Some(err) = rejection.find::<warp::filters::body::BodyDeserializeError>() {
        (StatusCode::BAD_REQUEST, err.to_string())
    } else if let Some(err) = rejection.find::<warp::reject::InvalidQuery>() {
        (StatusCode::BAD_REQUEST, err.to_string())
    } else if let Some(InvalidIfMatch(value)) = rejection.find::<InvalidIfMatch>() {
        (
            StatusCode::BAD_REQUEST,
            format!("If-Match must be a campaign version, got {value:?}"),
        )
    } else if let Some(err) = rejection.find::<warp::reject::InvalidHeader>() {
        (StatusCode::BAD_REQUEST, err.to_string())
    } else if let Some(err) = rejection.find::<warp::reject::MissingHeader>() {
        (StatusCode::BAD_REQUEST, err.to_string())
    } else if rejection.find::<warp::reject::LengthRequired>().is_some() {
        (StatusCode::LENGTH_REQUIRED, "content-length required".to_string())
    } else if rejection.find::<warp::reject::PayloadTooLarge>().is_some() {
        (StatusCode::PAYLOAD_TOO_LARGE, "payload too large".to_string())
    } else if rejection.find::<warp::reject::UnsupportedMediaType>().is_some() {
        (
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            "expected application/json".to_string(),
        )
    } else if rejection.find::<warp::reject::MethodNotAllowed>().is_some() {
        (StatusCode::METHOD_NOT_ALLOWED, "method not allowed".to_string())
    } else {
        tracing::error!(?rejection, "unhandled rejection");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal error".to_string(),
        )
    };
    Ok(detail(status, message))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn if_match_accepts_bare_quoted_and_wildcard() {
        assert_eq!(parse_if_match("3").unwrap(), Some(3));
        assert_eq!(parse_if_match("\"3\"").unwrap(), Some(3));
        assert_eq!(parse_if_match(" \"12\" ").unwrap(), Some(12));
        assert_eq!(parse_if_match("*").unwrap(), None);
    }

    #[test]
    fn if_match_rejects_non_versions() {
        assert!(parse_if_match("abc").is_err());
        assert!(parse_if_match("W/\"3\"").is_err());
        assert!(parse_if_match("\"3").is_err());
        assert!(parse_if_match("").is_err());
    }
}
