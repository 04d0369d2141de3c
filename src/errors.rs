//! Typed error taxonomy shared by the ingestion pipeline (C1-C8), mapped to
//! HTTP status for the handler layer.

use snafu::Snafu;
use warp::http::StatusCode;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display("missing or malformed bearer token"))]
    Unauthorized,

    #[snafu(display("token expired"))]
    Expired,

    #[snafu(display("token audience does not match any configured audience"))]
    AudienceMismatch,

    #[snafu(display("signature verification failed against all configured keys: {source}"))]
    BadSignature { source: jsonwebtoken::errors::Error },

    #[snafu(display("invalid signing/verification key: {reason}"))]
    InvalidKey { reason: String },

    #[snafu(display("upstream authorizer rejected the request"))]
    Forbidden,

    #[snafu(display("upstream authorizer is unavailable: {source}"))]
    UpstreamUnavailable { source: reqwest::Error },

    #[snafu(display("request body exceeds the configured limit of {limit} bytes"))]
    RequestTooLarge { limit: usize },

    #[snafu(display("rate limit exceeded for tenant {tenant}"))]
    RateLimited { tenant: String },

    #[snafu(display("malformed request: {reason}"))]
    BadRequest { reason: String },

    #[snafu(display("sample is missing the cluster-id label, or it does not match the authorized tenant"))]
    MissingClusterId,

    #[snafu(display("unexpected internal error: {reason}"))]
    Internal { reason: String },
}

impl Error {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::Unauthorized
            | Error::Expired
            | Error::AudienceMismatch
            | Error::BadSignature { .. } => StatusCode::UNAUTHORIZED,
            Error::Forbidden => StatusCode::FORBIDDEN,
            Error::UpstreamUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            Error::RequestTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Error::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Error::BadRequest { .. } | Error::MissingClusterId => StatusCode::BAD_REQUEST,
            Error::InvalidKey { .. } | Error::Internal { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl warp::reject::Reject for Error {}

/// Maps a rejected filter chain to a plain-text response with the status
/// carried by the underlying `Error`, falling back to 404/405 for warp's
/// own built-in rejections.
pub async fn handle_rejection(
    err: warp::Rejection,
) -> Result<Box<dyn warp::Reply>, std::convert::Infallible> {
    let (code, message) = if err.is_not_found() {
        (StatusCode::NOT_FOUND, "not found".to_owned())
    } else if let Some(e) = err.find::<Error>() {
        tracing::warn!(error = %e, status = %e.status_code(), "request rejected");
        (e.status_code(), e.to_string())
    } else if err.find::<warp::reject::PayloadTooLarge>().is_some() {
        (StatusCode::PAYLOAD_TOO_LARGE, "payload too large".to_owned())
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        (StatusCode::METHOD_NOT_ALLOWED, "method not allowed".to_owned())
    } else {
        tracing::error!(?err, "unhandled rejection");
        (StatusCode::INTERNAL_SERVER_ERROR, "internal error".to_owned())
    };

    Ok(Box::new(warp::reply::with_status(message, code)))
}
