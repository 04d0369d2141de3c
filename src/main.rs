use std::fs;
use std::sync::Arc;

use clap::Parser;
use metrics_exporter_prometheus::PrometheusBuilder;
use telemeter_server::auth::{keys, Signer};
use telemeter_server::clock::SystemClock;
use telemeter_server::config::Options;
use telemeter_server::validate::ValidatorConfig;
use telemeter_server::{authclient, forward, http, ratelimit, store, AppState};

#[tokio::main]
async fn main() {
    let options = Options::parse();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .compact()
        .init();

    let metrics_handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install metrics recorder");

    if let Err(e) = run(options, metrics_handle).await {
        tracing::error!(error = %e, "telemeter-server exited with an error");
        std::process::exit(1);
    }
}

async fn run(
    options: Options,
    metrics_handle: metrics_exporter_prometheus::PrometheusHandle,
) -> Result<(), Box<dyn std::error::Error>> {
    let signing_pem = fs::read(&options.signing_key_path)?;
    let signing_key = keys::load_signing_key(&signing_pem)?;

    let mut verification_keys = Vec::new();
    for path in &options.verification_key_paths {
        let pem_bytes = fs::read(path)?;
        verification_keys.push(keys::load_verification_key(&pem_bytes)?);
    }
    if verification_keys.is_empty() {
        // The signing key's own public half is always a valid verifier;
        // `load_signing_key` re-parses the same PEM only to detect its
        // algorithm, so this does not require a second file.
        tracing::warn!("no --verification-key provided; minted tokens cannot be re-authorized");
    }

    let clock = Arc::new(SystemClock);

    let signer = Signer::new(options.issuer.clone(), signing_key, verification_keys, Arc::clone(&clock));
    let authorizer = authclient::AuthorizerClient::new(options.authorize_endpoint.clone())?;
    let rate_limiter = ratelimit::RateLimiter::new(options.ratelimit_interval);
    let validator_config = ValidatorConfig {
        limit_bytes: options.upload_limit_bytes,
        whitelist: options.whitelist.clone(),
        elide_labels: options.elide_labels.clone(),
        cluster_id_label: options.cluster_id_label.clone(),
    };
    let store = Arc::new(store::Store::new(options.store_ttl, Arc::clone(&clock)));
    let forwarder = Arc::new(forward::Forwarder::new(options.forward_endpoint.clone())?);

    store::start_cleaner(Arc::clone(&store), options.cleaner_interval);

    let state = Arc::new(AppState {
        signer,
        authorizer,
        rate_limiter,
        validator_config,
        store,
        forwarder,
        clock,
        token_expiry_seconds: options.token_expiry.as_secs() as i64,
        audiences: options.audiences.clone(),
    });

    let tls = match (&options.tls_cert_path, &options.tls_key_path) {
        (Some(cert_path), Some(key_path)) => Some(http::TlsConfig { cert_path, key_path }),
        (None, None) => None,
        _ => return Err("--tls-cert-path and --tls-key-path must be set together".into()),
    };

    tracing::info!(listen = %options.listen, tls = tls.is_some(), "starting telemeter-server");

    http::serve(options.listen, state, metrics_handle, tls, shutdown_signal()).await;
    tracing::info!("server drained, exiting");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
