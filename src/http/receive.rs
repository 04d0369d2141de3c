//! Ingestion Handler (C7): `POST /metrics/v1/receive`.

use std::sync::Arc;

use base64::Engine as _;
use bytes::Bytes;
use serde::Deserialize;
use warp::Reply;

use super::extract_bearer;
use crate::clock::Clock;
use crate::decode::decode_remote_write;
use crate::errors::Error;
use crate::validate::{enforce_size_limit, validate_for_receive};
use crate::AppState;

#[derive(Debug, Deserialize)]
struct CompositeToken {
    authorization_token: String,
    cluster_id: String,
}

fn decode_composite_token(token: &str) -> Result<CompositeToken, Error> {
    let decoded = base64::engine::general_purpose::STANDARD
        .decode(token)
        .or_else(|_| base64::engine::general_purpose::URL_SAFE.decode(token))
        .map_err(|_| Error::Unauthorized)?;
    serde_json::from_slice(&decoded).map_err(|_| Error::Unauthorized)
}

pub async fn handle(
    authorization: Option<String>,
    body: Bytes,
    state: Arc<AppState>,
) -> Result<Box<dyn Reply>, warp::Rejection> {
    let composite_raw = extract_bearer(authorization)?;
    let composite = decode_composite_token(&composite_raw).map_err(warp::reject::custom)?;

    let (subject, _labels) = state
        .authorizer
        .authorize_cluster(&composite.authorization_token, &composite.cluster_id)
        .await
        .map_err(warp::reject::custom)?;

    if !state.rate_limiter.admit(&subject) {
        return Err(warp::reject::custom(Error::RateLimited { tenant: subject }));
    }

    enforce_size_limit(&body, state.validator_config.limit_bytes).map_err(warp::reject::custom)?;

    let families = decode_remote_write(&body).map_err(warp::reject::custom)?;

    let partitioned =
        validate_for_receive(&state.validator_config, &subject, families).map_err(warp::reject::custom)?;

    Arc::clone(&state.forwarder).forward_in_background(partitioned, state.clock.now_millis());

    Ok(Box::new(warp::reply::with_status("", warp::http::StatusCode::OK)))
}
