//! HTTP surface: `/authorize` (C8), `/upload` and `/metrics/v1/receive`
//! (C7), plus `/healthz` and `/metrics`.

mod authorize;
mod health;
mod receive;
mod upload;

use std::future::Future;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use metrics_exporter_prometheus::PrometheusHandle;
use warp::{Filter, Reply};

use crate::errors::handle_rejection;
use crate::AppState;

/// Optional TLS identity for serving HTTPS directly, as an alternative to
/// terminating TLS at a front proxy.
pub struct TlsConfig<'a> {
    pub cert_path: &'a Path,
    pub key_path: &'a Path,
}

/// Binds the listener and serves until `shutdown` resolves, then drains
/// in-flight requests before returning. Mirrors the corpus's
/// bind-with-graceful-shutdown pattern for warp servers.
pub async fn serve(
    address: SocketAddr,
    state: Arc<AppState>,
    metrics_handle: PrometheusHandle,
    tls: Option<TlsConfig<'_>>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) {
    let routes = routes(state, metrics_handle);
    match tls {
        Some(tls) => {
            let (_, server) = warp::serve(routes)
                .tls()
                .cert_path(tls.cert_path)
                .key_path(tls.key_path)
                .bind_with_graceful_shutdown(address, shutdown);
            server.await;
        }
        None => {
            let (_, server) = warp::serve(routes).bind_with_graceful_shutdown(address, shutdown);
            server.await;
        }
    }
}

/// Extracts the opaque/signed token from an `Authorization: Bearer <...>`
/// header value, shared by all three authenticated endpoints.
pub(crate) fn extract_bearer(header: Option<String>) -> Result<String, warp::Rejection> {
    header
        .as_deref()
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::to_owned)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| warp::reject::custom(crate::errors::Error::Unauthorized))
}

type BoxedReply = Box<dyn Reply>;

fn routes(
    state: Arc<AppState>,
    metrics_handle: PrometheusHandle,
) -> warp::filters::BoxedFilter<(BoxedReply,)> {
    let state_filter = warp::any().map(move || Arc::clone(&state));

    let authorize_route = warp::post()
        .and(warp::path("authorize"))
        .and(warp::path::end())
        .and(warp::header::optional::<String>("authorization"))
        .and(warp::query::<authorize::AuthorizeQuery>())
        .and(state_filter.clone())
        .and_then(authorize::handle)
        .boxed();

    let upload_route = warp::post()
        .and(warp::path("upload"))
        .and(warp::path::end())
        .and(warp::header::optional::<String>("authorization"))
        .and(warp::body::bytes())
        .and(warp::header::optional::<String>("content-type"))
        .and(state_filter.clone())
        .and_then(upload::handle)
        .boxed();

    let receive_route = warp::post()
        .and(warp::path!("metrics" / "v1" / "receive"))
        .and(warp::header::optional::<String>("authorization"))
        .and(warp::body::bytes())
        .and(state_filter.clone())
        .and_then(receive::handle)
        .boxed();

    let healthz_route = warp::get()
        .and(warp::path("healthz"))
        .and(warp::path::end())
        .and_then(health::handle_healthz)
        .boxed();

    let metrics_route = warp::get()
        .and(warp::path("metrics"))
        .and(warp::path::end())
        .map(move || {
            let reply = warp::reply::with_header(
                metrics_handle.render(),
                "content-type",
                "text/plain; version=0.0.4",
            );
            Box::new(reply) as BoxedReply
        })
        .boxed();

    authorize_route
        .or(upload_route)
        .unify()
        .or(receive_route)
        .unify()
        .or(healthz_route)
        .unify()
        .or(metrics_route)
        .unify()
        .recover(handle_rejection)
        .unify()
        .boxed()
}
