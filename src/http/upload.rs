//! Ingestion Handler (C7): `POST /upload`.

use std::sync::Arc;

use bytes::Bytes;
use warp::Reply;

use super::extract_bearer;
use crate::clock::Clock;
use crate::decode::decode_upload_body;
use crate::errors::Error;
use crate::validate::{enforce_size_limit, validate_for_upload};
use crate::AppState;

pub async fn handle(
    authorization: Option<String>,
    body: Bytes,
    content_type: Option<String>,
    state: Arc<AppState>,
) -> Result<Box<dyn Reply>, warp::Rejection> {
    let token = extract_bearer(authorization)?;

    let (subject, labels) = state
        .signer
        .authorize(&token, &state.audiences)
        .map_err(warp::reject::custom)?;

    if !state.rate_limiter.admit(&subject) {
        return Err(warp::reject::custom(Error::RateLimited { tenant: subject }));
    }

    enforce_size_limit(&body, state.validator_config.limit_bytes).map_err(warp::reject::custom)?;

    let is_protobuf = content_type
        .as_deref()
        .is_some_and(|ct| ct.contains("application/vnd.google.protobuf"));
    let families = decode_upload_body(&body, is_protobuf).map_err(warp::reject::custom)?;

    let partitioned =
        validate_for_upload(&state.validator_config, &subject, &labels, families).map_err(warp::reject::custom)?;

    state.store.write(partitioned.clone()).await;
    Arc::clone(&state.forwarder).forward_in_background(partitioned, state.clock.now_millis());

    Ok(Box::new(warp::reply::with_status("", warp::http::StatusCode::OK)))
}
