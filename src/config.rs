//! Config & Entrypoint (C9): process configuration, parsed once at startup.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::matcher::LabelMatcher;

fn parse_duration(s: &str) -> Result<Duration, humantime::DurationError> {
    humantime::parse_duration(s)
}

fn parse_matcher(s: &str) -> Result<LabelMatcher, String> {
    LabelMatcher::parse(s).map_err(|e| e.to_string())
}

/// `telemeter-server`: authenticated, per-tenant, rate-limited Prometheus
/// push-federation collector.
#[derive(Parser, Debug)]
#[command(name = "telemeter-server", about = "Telemeter ingestion server")]
pub struct Options {
    /// Address the HTTP server listens on.
    #[arg(long, env = "TELEMETER_LISTEN", default_value = "0.0.0.0:8443")]
    pub listen: SocketAddr,

    /// Upstream authorization endpoint, called by `/authorize` and
    /// `/metrics/v1/receive`.
    #[arg(long, env = "TELEMETER_AUTHORIZE_ENDPOINT")]
    pub authorize_endpoint: reqwest::Url,

    /// Upstream Prometheus remote-write endpoint.
    #[arg(long, env = "TELEMETER_FORWARD_ENDPOINT")]
    pub forward_endpoint: reqwest::Url,

    /// Maximum accepted request body size, in bytes.
    #[arg(long, default_value_t = 200 * 1024)]
    pub upload_limit_bytes: usize,

    /// Minimum interval between accepted requests from a single tenant.
    #[arg(long, value_parser = parse_duration, default_value = "4m30s")]
    pub ratelimit_interval: Duration,

    /// Lifetime of tokens minted by `/authorize`.
    #[arg(long, value_parser = parse_duration, default_value = "1h")]
    pub token_expiry: Duration,

    /// TTL for stale per-tenant slices in the in-memory store.
    #[arg(long, value_parser = parse_duration, default_value = "20m")]
    pub store_ttl: Duration,

    /// Interval at which the store cleaner sweeps for expired slices.
    #[arg(long, value_parser = parse_duration, default_value = "1m")]
    pub cleaner_interval: Duration,

    /// Repeatable whitelist matcher, e.g. `{__name__="up"}`. No matchers
    /// means everything is accepted.
    #[arg(long = "whitelist", value_parser = parse_matcher)]
    pub whitelist: Vec<LabelMatcher>,

    /// Repeatable label name to strip from every sample.
    #[arg(long = "elide-label")]
    pub elide_labels: Vec<String>,

    /// Label name used to carry the tenant's cluster ID.
    #[arg(long, default_value = "_id")]
    pub cluster_id_label: String,

    /// Path to a PEM-encoded PKCS#8 private key used to sign tokens.
    #[arg(long, env = "TELEMETER_SIGNING_KEY")]
    pub signing_key_path: PathBuf,

    /// Repeatable path to a PEM-encoded public key, tried in order when
    /// verifying tokens. Must include the signing key's public counterpart.
    #[arg(long = "verification-key")]
    pub verification_key_paths: Vec<PathBuf>,

    /// `iss` claim embedded in and checked against minted tokens.
    #[arg(long, default_value = "telemeter.selfsigned")]
    pub issuer: String,

    /// `aud` claim embedded in minted tokens and required on verification.
    #[arg(long = "audience", default_value = "telemeter-client")]
    pub audiences: Vec<String>,

    /// Optional TLS certificate, for serving HTTPS directly.
    #[arg(long)]
    pub tls_cert_path: Option<PathBuf>,

    /// Optional TLS private key, required if `tls_cert_path` is set.
    #[arg(long)]
    pub tls_key_path: Option<PathBuf>,
}
