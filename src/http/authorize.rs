//! Cluster-Authorize Handler (C8): `POST /authorize?id=<clusterId>`.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use warp::Reply;

use crate::errors::Error;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct AuthorizeQuery {
    pub id: Option<String>,
}

#[derive(Debug, Serialize)]
struct AuthorizeResponse {
    token: String,
    labels: std::collections::BTreeMap<String, String>,
}

pub async fn handle(
    authorization: Option<String>,
    query: AuthorizeQuery,
    state: Arc<AppState>,
) -> Result<Box<dyn Reply>, warp::Rejection> {
    let cluster_id = query
        .id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| {
            warp::reject::custom(Error::BadRequest {
                reason: "missing `id` query parameter".to_owned(),
            })
        })?;
    let token = authorization
        .as_deref()
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::to_owned)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| {
            warp::reject::custom(Error::BadRequest {
                reason: "missing `id` or empty bearer token".to_owned(),
            })
        })?;

    let (account_id, upstream_labels) = state
        .authorizer
        .authorize_cluster(&token, &cluster_id)
        .await
        .map_err(warp::reject::custom)?;

    // The cluster's own declared id always wins over whatever the upstream
    // authorizer returned under the same label name.
    let mut labels = upstream_labels;
    labels.insert(state.validator_config.cluster_id_label.clone(), cluster_id.clone());

    let signed = state
        .signer
        .mint(&account_id, labels.clone(), state.token_expiry_seconds, &state.audiences)
        .map_err(warp::reject::custom)?;

    tracing::info!(cluster_id, account_id, "minted tenant credential");

    Ok(Box::new(warp::reply::json(&AuthorizeResponse {
        token: signed,
        labels,
    })))
}
