//! Telemeter ingestion server: authenticated, per-tenant, rate-limited
//! Prometheus push-federation collector.

pub mod auth;
pub mod authclient;
pub mod clock;
pub mod config;
pub mod decode;
pub mod errors;
pub mod forward;
pub mod http;
pub mod matcher;
pub mod metric;
pub mod ratelimit;
pub mod store;
pub mod validate;

use std::sync::Arc;

use clock::SystemClock;

/// Shared, read-only-after-construction wiring for every HTTP handler.
pub struct AppState {
    pub signer: auth::Signer<SystemClock>,
    pub authorizer: authclient::AuthorizerClient,
    pub rate_limiter: ratelimit::RateLimiter,
    pub validator_config: validate::ValidatorConfig,
    pub store: Arc<store::Store<SystemClock>>,
    pub forwarder: Arc<forward::Forwarder>,
    pub clock: Arc<SystemClock>,
    pub token_expiry_seconds: i64,
    pub audiences: Vec<String>,
}
